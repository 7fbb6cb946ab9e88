//! Stack plan
//!
//! Wraps the routing plan together with everything the provisioner needs to
//! declare the whole stack: network, cluster, one Fargate service per
//! declared service, the load balancer with its listeners, the certificate
//! and the DNS record pointing at the load balancer.

use crate::action::{Action, Plan, ResourceKind};
use crate::error::{ConfigurationError, Result};
use crate::naming;
use crate::routing::{DefaultAction, RoutingPlan, build_plan};
use serde::Serialize;
use serde_json::json;
use stackflow_core::{
    NetworkConfig, ServiceSpec, StackDefinition, StackEnvironment, Tag, join_fqdn,
};
use std::collections::HashMap;
use tracing::{debug, instrument};

/// Hard memory limit of every container, in MiB.
pub const CONTAINER_MEMORY_MIB: u32 = 256;

/// Fargate task size shared by all services.
pub const TASK_CPU_UNITS: u32 = 256;
pub const TASK_MEMORY_MIB: u32 = 512;

/// Managed policy attached to every task role.
pub const SSM_READ_ONLY_POLICY: &str = "arn:aws:iam::aws:policy/AmazonSSMReadOnlyAccess";

const CERTIFICATE_ARN_PREFIX: &str = "arn:";

/// Domain with the certificate resolved to a full ARN.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedDomain {
    pub domain_name: String,
    pub subdomain_name: String,
    pub certificate_arn: String,
}

impl ResolvedDomain {
    pub fn fqdn(&self) -> String {
        join_fqdn(&self.subdomain_name, &self.domain_name)
    }
}

/// Everything handed to a provisioner for one deployment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StackPlan {
    pub stack_name: String,
    pub environment: StackEnvironment,
    pub network: NetworkConfig,
    pub domain: ResolvedDomain,
    pub tags: Vec<Tag>,
    pub services: Vec<ServiceSpec>,
    pub routing: RoutingPlan,
    pub plan: Plan,
}

impl StackPlan {
    /// Build the plan for a loaded stack definition.
    #[instrument(skip(stack), fields(stack = %stack.stack_name()))]
    pub fn build(stack: &StackDefinition) -> Result<Self> {
        let stack_name = stack.stack_name();

        let routing = build_plan(&stack.services)?;

        if let Some(service) = stack.services.iter().find(|s| s.image.is_none()) {
            return Err(ConfigurationError::MissingImage(service.id.clone()));
        }

        let domain = stack
            .domain
            .as_ref()
            .ok_or_else(|| ConfigurationError::MissingDomain(stack_name.clone()))?;
        let domain = ResolvedDomain {
            domain_name: domain.domain_name.clone(),
            subdomain_name: domain.subdomain_name.clone(),
            certificate_arn: certificate_arn(&domain.certificate, &stack.environment)?,
        };

        check_logical_ids(&stack.services)?;

        let plan = resource_actions(&stack_name, stack, &domain, &routing);
        debug!(actions = plan.actions.len(), "Stack plan built");

        Ok(Self {
            stack_name,
            environment: stack.environment.clone(),
            network: stack.network.clone(),
            domain,
            tags: stack.tags.clone(),
            services: stack.services.clone(),
            routing,
            plan,
        })
    }

    /// Services whose image is built from a local directory.
    pub fn asset_services(&self) -> impl Iterator<Item = &ServiceSpec> {
        self.services
            .iter()
            .filter(|s| s.image.as_ref().is_some_and(|i| i.is_asset()))
    }
}

/// Expand a bare ACM certificate id into its ARN.
///
/// Values that already are ARNs are returned unchanged.
pub fn certificate_arn(certificate: &str, environment: &StackEnvironment) -> Result<String> {
    if certificate.starts_with(CERTIFICATE_ARN_PREFIX) {
        return Ok(certificate.to_string());
    }

    let missing = |field| ConfigurationError::CertificateContext {
        certificate: certificate.to_string(),
        missing: field,
    };
    let region = environment.region.as_deref().ok_or_else(|| missing("region"))?;
    let account = environment.account.as_deref().ok_or_else(|| missing("account"))?;

    Ok(format!(
        "arn:aws:acm:{}:{}:certificate/{}",
        region, account, certificate
    ))
}

/// Service ids differing only in dropped characters would share resources.
fn check_logical_ids(services: &[ServiceSpec]) -> Result<()> {
    let mut owners: HashMap<String, &str> = HashMap::new();
    for service in services {
        let key = naming::logical_id(&service.id, "");
        if let Some(first) = owners.insert(key.clone(), &service.id) {
            return Err(ConfigurationError::LogicalIdCollision {
                logical_id: key,
                first: first.to_string(),
                second: service.id.clone(),
            });
        }
    }
    Ok(())
}

fn resource_actions(
    stack_name: &str,
    stack: &StackDefinition,
    domain: &ResolvedDomain,
    routing: &RoutingPlan,
) -> Plan {
    let vpc = naming::vpc(stack_name);
    let cluster = naming::cluster(stack_name);
    let certificate = naming::certificate(stack_name);
    let load_balancer = naming::load_balancer(stack_name);
    let https_listener = naming::https_listener(stack_name);
    let zone = naming::zone(stack_name);

    let mut actions = Vec::new();

    actions.push(match &stack.network {
        NetworkConfig::Create { max_azs } => Action::create(
            ResourceKind::Network,
            vpc.clone(),
            format!("VPC across {} availability zones", max_azs),
        )
        .detail("max_azs", json!(max_azs)),
        NetworkConfig::Import { vpc_id, subnet_ids } => Action::reference(
            ResourceKind::Network,
            vpc.clone(),
            format!("existing VPC {}", vpc_id),
        )
        .detail("vpc_id", json!(vpc_id))
        .detail("subnet_ids", json!(subnet_ids)),
    });

    actions.push(
        Action::create(ResourceKind::Cluster, cluster.clone(), "ECS cluster".to_string())
            .after(&vpc),
    );

    actions.push(
        Action::reference(
            ResourceKind::Certificate,
            certificate.clone(),
            format!("certificate {}", domain.certificate_arn),
        )
        .detail("arn", json!(domain.certificate_arn)),
    );

    actions.push(
        Action::create(
            ResourceKind::LoadBalancer,
            load_balancer.clone(),
            "internet-facing application load balancer".to_string(),
        )
        .after(&vpc)
        .detail("ingress", json!(routing.ingress)),
    );

    actions.push(
        Action::create(
            ResourceKind::Listener,
            naming::http_redirect(stack_name),
            format!(
                "HTTP:{} redirect to HTTPS:{} ({})",
                routing.redirect.from_port, routing.redirect.to_port, routing.redirect.status_code
            ),
        )
        .after(&load_balancer),
    );

    let default_description = match &routing.default_action {
        DefaultAction::Forward(target) => format!("HTTPS listener, default to {}", target.service_id),
        DefaultAction::FixedResponse(response) => format!(
            "HTTPS listener, default {} {}",
            response.status_code, response.body
        ),
    };
    actions.push(
        Action::create(
            ResourceKind::Listener,
            https_listener.clone(),
            default_description,
        )
        .after(&load_balancer)
        .after(&certificate)
        .detail("default_action", json!(routing.default_action)),
    );

    for service in &stack.services {
        let id = service.id.as_str();
        let logs = naming::logs(id);
        let task_definition = naming::task_definition(id);
        let target_group = naming::target_group(id);

        actions.push(Action::create(
            ResourceKind::LogGroup,
            logs.clone(),
            format!("log stream prefix {}", id),
        ));

        actions.push(
            Action::create(
                ResourceKind::TaskDefinition,
                task_definition.clone(),
                format!(
                    "container {} MiB, port {}",
                    CONTAINER_MEMORY_MIB, service.container_port
                ),
            )
            .after(&logs)
            .detail(
                "image",
                json!(service.image.as_ref().map(|i| i.to_string())),
            )
            .detail("environment", json!(service.environment)),
        );

        actions.push(
            Action::create(
                ResourceKind::TargetGroup,
                target_group.clone(),
                format!("HTTP:{}", service.container_port),
            )
            .after(&vpc),
        );

        if let Some(rule) = routing.rule_for(id) {
            let conditions: Vec<String> = rule.conditions.iter().map(|c| c.to_string()).collect();
            actions.push(
                Action::create(
                    ResourceKind::ListenerRule,
                    naming::listener_rule(id),
                    format!("priority {}: {}", rule.priority, conditions.join(" & ")),
                )
                .after(&https_listener)
                .after(&target_group)
                .detail("priority", json!(rule.priority)),
            );
        }

        actions.push(
            Action::create(
                ResourceKind::Service,
                naming::fargate_service(id),
                format!("Fargate service {}", id),
            )
            .after(&cluster)
            .after(&task_definition)
            .after(&https_listener),
        );
    }

    actions.push(
        Action::reference(
            ResourceKind::HostedZone,
            zone.clone(),
            format!("hosted zone {}", domain.domain_name),
        )
        .detail("domain_name", json!(domain.domain_name)),
    );

    actions.push(
        Action::create(
            ResourceKind::DnsRecord,
            naming::site(stack_name),
            format!("CNAME {} to the load balancer", domain.fqdn()),
        )
        .after(&zone)
        .after(&load_balancer),
    );

    actions.push(
        Action::create(
            ResourceKind::Output,
            naming::dns_output(stack_name),
            "load balancer DNS name".to_string(),
        )
        .after(&load_balancer),
    );

    Plan::new(actions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionType;
    use stackflow_core::{DomainConfig, ImageSource, RouteCondition};
    use std::path::PathBuf;

    fn starter() -> StackDefinition {
        let mut stack = StackDefinition::new("AppName");
        stack.stage = Some("prod".to_string());
        stack.environment = StackEnvironment {
            region: Some("eu-west-1".to_string()),
            account: Some("872821666058".to_string()),
        };
        stack.domain = Some(DomainConfig {
            domain_name: "olmi.be".to_string(),
            subdomain_name: "site".to_string(),
            certificate: "0f1e2d3c".to_string(),
        });
        stack.tags = vec![Tag::new("Application", "starter-app")];
        stack.services = vec![
            ServiceSpec::new("AppName1")
                .with_image(ImageSource::Asset(PathBuf::from("./app")))
                .with_condition(RouteCondition::path("/example*")),
            ServiceSpec::new("AppName2")
                .with_image(ImageSource::Asset(PathBuf::from("./app")))
                .with_condition(RouteCondition::path("/v2*")),
            ServiceSpec::new("EcsSample")
                .with_image(ImageSource::Registry("amazon/amazon-ecs-sample".to_string()))
                .with_condition(RouteCondition::host("site-prod.olmi.be")),
        ];
        stack
    }

    #[test]
    fn test_build_starter_stack() {
        let plan = StackPlan::build(&starter()).unwrap();

        assert_eq!(plan.stack_name, "AppName-prod");
        assert_eq!(
            plan.domain.certificate_arn,
            "arn:aws:acm:eu-west-1:872821666058:certificate/0f1e2d3c"
        );
        assert_eq!(plan.domain.fqdn(), "site.olmi.be");
        assert_eq!(plan.routing.rules.len(), 3);

        let asset_ids: Vec<&str> = plan.asset_services().map(|s| s.id.as_str()).collect();
        assert_eq!(asset_ids, vec!["AppName1", "AppName2"]);
    }

    #[test]
    fn test_resource_logical_ids() {
        let plan = StackPlan::build(&starter()).unwrap().plan;

        for id in [
            "AppNameprodVpc",
            "AppNameprodCluster",
            "AppNameprodCertificate",
            "AppNameprodLoadBalancer",
            "AppNameprodHttpRedirect",
            "AppNameprodHttpsListener",
            "AppName1Logs",
            "AppName1TaskDefinition",
            "AppName1HttpTarget",
            "AppName1HttpRule",
            "AppName1FargateService",
            "EcsSampleFargateService",
            "AppNameprodZone",
            "AppNameprodSite",
            "AppNameprodDNS",
        ] {
            assert!(plan.get(id).is_some(), "missing {}", id);
        }

        assert_eq!(
            plan.get("AppNameprodZone").unwrap().action_type,
            ActionType::Reference
        );
        assert_eq!(
            plan.get("EcsSampleHttpRule").unwrap().details["priority"],
            json!(40)
        );
    }

    #[test]
    fn test_actions_in_dependency_order() {
        let plan = StackPlan::build(&starter()).unwrap().plan;

        let position = |id: &str| {
            plan.actions
                .iter()
                .position(|a| a.resource_id == id)
                .unwrap()
        };
        for action in &plan.actions {
            for dependency in &action.depends_on {
                assert!(
                    position(dependency) < position(&action.resource_id),
                    "{} depends on later {}",
                    action.resource_id,
                    dependency
                );
            }
        }
    }

    #[test]
    fn test_summary_per_kind() {
        let summary = StackPlan::build(&starter()).unwrap().plan.summary();

        assert_eq!(summary.by_kind[&ResourceKind::Service], 3);
        assert_eq!(summary.by_kind[&ResourceKind::ListenerRule], 3);
        assert_eq!(summary.by_kind[&ResourceKind::Listener], 2);
        assert_eq!(summary.reference, 2);
    }

    #[test]
    fn test_default_service_has_no_rule() {
        let mut stack = starter();
        stack.services[1].conditions.clear();

        let plan = StackPlan::build(&stack).unwrap();

        assert!(plan.plan.get("AppName2HttpRule").is_none());
        assert!(plan.plan.get("AppName2FargateService").is_some());
        assert_eq!(plan.routing.default_service(), Some("AppName2"));
    }

    #[test]
    fn test_fixed_response_lives_on_https_listener() {
        let plan = StackPlan::build(&starter()).unwrap().plan;

        assert!(
            !plan
                .actions
                .iter()
                .any(|a| a.resource_id.ends_with("FixedResponse"))
        );
        let listener = plan.get("AppNameprodHttpsListener").unwrap();
        assert_eq!(listener.details["default_action"]["type"], json!("fixed-response"));
        assert_eq!(listener.details["default_action"]["status_code"], json!(404));
    }

    #[test]
    fn test_resolved_domain_fqdn_matches_config() {
        let stack = starter();
        let plan = StackPlan::build(&stack).unwrap();
        let config = stack.domain.as_ref().unwrap();

        assert_eq!(plan.domain.fqdn(), config.fqdn());

        let apex = ResolvedDomain {
            subdomain_name: String::new(),
            ..plan.domain.clone()
        };
        assert_eq!(apex.fqdn(), "olmi.be");
    }

    #[test]
    fn test_imported_vpc_is_referenced() {
        let mut stack = starter();
        stack.network = NetworkConfig::Import {
            vpc_id: "vpc-0abc".to_string(),
            subnet_ids: vec!["subnet-a".to_string(), "subnet-b".to_string()],
        };

        let plan = StackPlan::build(&stack).unwrap().plan;
        let vpc = plan.get("AppNameprodVpc").unwrap();
        assert_eq!(vpc.action_type, ActionType::Reference);
        assert_eq!(vpc.details["vpc_id"], json!("vpc-0abc"));
    }

    #[test]
    fn test_certificate_arn_passthrough() {
        let arn = "arn:aws:acm:us-east-1:123456789012:certificate/abc";
        assert_eq!(
            certificate_arn(arn, &StackEnvironment::default()).unwrap(),
            arn
        );
    }

    #[test]
    fn test_certificate_id_needs_region_and_account() {
        let environment = StackEnvironment {
            region: Some("eu-west-1".to_string()),
            account: None,
        };
        assert_eq!(
            certificate_arn("abc", &environment),
            Err(ConfigurationError::CertificateContext {
                certificate: "abc".to_string(),
                missing: "account",
            })
        );
    }

    #[test]
    fn test_missing_domain() {
        let mut stack = starter();
        stack.domain = None;
        assert_eq!(
            StackPlan::build(&stack),
            Err(ConfigurationError::MissingDomain("AppName-prod".to_string()))
        );
    }

    #[test]
    fn test_missing_image() {
        let mut stack = starter();
        stack.services[2].image = None;
        assert_eq!(
            StackPlan::build(&stack),
            Err(ConfigurationError::MissingImage("EcsSample".to_string()))
        );
    }

    #[test]
    fn test_routing_errors_propagate() {
        let mut stack = starter();
        stack.services[2].id = "AppName1".to_string();
        assert_eq!(
            StackPlan::build(&stack),
            Err(ConfigurationError::DuplicateServiceId("AppName1".to_string()))
        );
    }

    #[test]
    fn test_logical_id_collision() {
        let mut stack = starter();
        stack.services[1].id = "App-Name1".to_string();
        assert_eq!(
            StackPlan::build(&stack),
            Err(ConfigurationError::LogicalIdCollision {
                logical_id: "AppName1".to_string(),
                first: "AppName1".to_string(),
                second: "App-Name1".to_string(),
            })
        );
    }
}
