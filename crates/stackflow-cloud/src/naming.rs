//! Logical resource ids
//!
//! Every resource in a stack is named from the stack name or the service id
//! plus a fixed suffix. Template engines only accept alphanumeric ids, so
//! other characters are dropped.

/// Concatenate `prefix` and `suffix`, keeping ASCII alphanumerics only.
pub fn logical_id(prefix: &str, suffix: &str) -> String {
    prefix
        .chars()
        .chain(suffix.chars())
        .filter(char::is_ascii_alphanumeric)
        .collect()
}

pub fn vpc(stack: &str) -> String {
    logical_id(stack, "Vpc")
}

pub fn cluster(stack: &str) -> String {
    logical_id(stack, "Cluster")
}

pub fn load_balancer(stack: &str) -> String {
    logical_id(stack, "LoadBalancer")
}

pub fn http_redirect(stack: &str) -> String {
    logical_id(stack, "HttpRedirect")
}

pub fn https_listener(stack: &str) -> String {
    logical_id(stack, "HttpsListener")
}

pub fn certificate(stack: &str) -> String {
    logical_id(stack, "Certificate")
}

pub fn zone(stack: &str) -> String {
    logical_id(stack, "Zone")
}

pub fn site(stack: &str) -> String {
    logical_id(stack, "Site")
}

pub fn dns_output(stack: &str) -> String {
    logical_id(stack, "DNS")
}

pub fn task_definition(service: &str) -> String {
    logical_id(service, "TaskDefinition")
}

pub fn container(service: &str) -> String {
    logical_id(service, "Container")
}

pub fn logs(service: &str) -> String {
    logical_id(service, "Logs")
}

pub fn fargate_service(service: &str) -> String {
    logical_id(service, "FargateService")
}

pub fn target_group(service: &str) -> String {
    logical_id(service, "HttpTarget")
}

pub fn listener_rule(service: &str) -> String {
    logical_id(service, "HttpRule")
}

/// Template parameter carrying the pushed image of an asset service.
pub fn image_parameter(service: &str) -> String {
    logical_id(service, "ImageUri")
}
