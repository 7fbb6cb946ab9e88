//! CloudFormation template synthesis
//!
//! Translates a [`StackPlan`] into a CloudFormation template. The template
//! only depends on the plan, so synthesizing the same plan twice yields the
//! same JSON.

use serde_json::{Map, Value, json};
use stackflow_cloud::naming;
use stackflow_cloud::routing::{DefaultAction, HTTPS_PORT, ListenerRule};
use stackflow_cloud::stack::{
    CONTAINER_MEMORY_MIB, SSM_READ_ONLY_POLICY, StackPlan, TASK_CPU_UNITS, TASK_MEMORY_MIB,
};
use stackflow_core::{ImageSource, NetworkConfig, RouteCondition, ServiceSpec, Tag};
use tracing::debug;

const TEMPLATE_FORMAT_VERSION: &str = "2010-09-09";
const VPC_CIDR: &str = "10.0.0.0/16";
const EXECUTION_ROLE_POLICY: &str =
    "arn:aws:iam::aws:policy/service-role/AmazonECSTaskExecutionRolePolicy";
const DNS_TTL: &str = "300";

/// Build the CloudFormation template for `plan`.
pub fn synthesize(plan: &StackPlan) -> Value {
    let mut builder = TemplateBuilder::new(plan);
    builder.network();
    builder.cluster();
    builder.load_balancer();
    for service in &plan.services {
        builder.service(service);
    }
    builder.dns();
    builder.finish()
}

/// Logical id of the synthesized public subnet `index` (1-based).
pub fn public_subnet_id(stack_name: &str, index: u8) -> String {
    naming::logical_id(stack_name, &format!("VpcPublicSubnet{}", index))
}

struct TemplateBuilder<'a> {
    plan: &'a StackPlan,
    parameters: Map<String, Value>,
    resources: Map<String, Value>,
    outputs: Map<String, Value>,
    vpc: Value,
    subnets: Vec<Value>,
}

impl<'a> TemplateBuilder<'a> {
    fn new(plan: &'a StackPlan) -> Self {
        Self {
            plan,
            parameters: Map::new(),
            resources: Map::new(),
            outputs: Map::new(),
            vpc: Value::Null,
            subnets: Vec::new(),
        }
    }

    fn stack(&self) -> &str {
        &self.plan.stack_name
    }

    fn add(&mut self, logical_id: String, resource: Value) {
        self.resources.insert(logical_id, resource);
    }

    fn tags(&self) -> Value {
        tags_json(&self.plan.tags)
    }

    fn network(&mut self) {
        let plan = self.plan;
        let vpc_id = naming::vpc(&plan.stack_name);

        match &plan.network {
            NetworkConfig::Import { vpc_id, subnet_ids } => {
                self.vpc = json!(vpc_id);
                self.subnets = subnet_ids.iter().map(|s| json!(s)).collect();
            }
            NetworkConfig::Create { max_azs } => {
                let gateway = naming::logical_id(&vpc_id, "InternetGateway");
                let attachment = naming::logical_id(&vpc_id, "GatewayAttachment");
                let route_table = naming::logical_id(&vpc_id, "PublicRouteTable");

                self.add(
                    vpc_id.clone(),
                    json!({
                        "Type": "AWS::EC2::VPC",
                        "Properties": {
                            "CidrBlock": VPC_CIDR,
                            "EnableDnsHostnames": true,
                            "EnableDnsSupport": true,
                            "Tags": self.tags(),
                        }
                    }),
                );
                self.add(
                    gateway.clone(),
                    json!({
                        "Type": "AWS::EC2::InternetGateway",
                        "Properties": { "Tags": self.tags() }
                    }),
                );
                self.add(
                    attachment.clone(),
                    json!({
                        "Type": "AWS::EC2::VPCGatewayAttachment",
                        "Properties": {
                            "VpcId": { "Ref": vpc_id },
                            "InternetGatewayId": { "Ref": gateway },
                        }
                    }),
                );
                self.add(
                    route_table.clone(),
                    json!({
                        "Type": "AWS::EC2::RouteTable",
                        "Properties": {
                            "VpcId": { "Ref": vpc_id },
                            "Tags": self.tags(),
                        }
                    }),
                );
                self.add(
                    naming::logical_id(&vpc_id, "PublicDefaultRoute"),
                    json!({
                        "Type": "AWS::EC2::Route",
                        "DependsOn": attachment,
                        "Properties": {
                            "RouteTableId": { "Ref": route_table },
                            "DestinationCidrBlock": "0.0.0.0/0",
                            "GatewayId": { "Ref": gateway },
                        }
                    }),
                );

                for index in 1..=*max_azs {
                    let subnet = public_subnet_id(&plan.stack_name, index);
                    self.add(
                        subnet.clone(),
                        json!({
                            "Type": "AWS::EC2::Subnet",
                            "Properties": {
                                "VpcId": { "Ref": vpc_id },
                                "CidrBlock": subnet_cidr(index),
                                "AvailabilityZone": {
                                    "Fn::Select": [index - 1, { "Fn::GetAZs": "" }]
                                },
                                "MapPublicIpOnLaunch": true,
                                "Tags": self.tags(),
                            }
                        }),
                    );
                    self.add(
                        naming::logical_id(&subnet, "RouteTableAssociation"),
                        json!({
                            "Type": "AWS::EC2::SubnetRouteTableAssociation",
                            "Properties": {
                                "SubnetId": { "Ref": subnet },
                                "RouteTableId": { "Ref": route_table },
                            }
                        }),
                    );
                    self.subnets.push(json!({ "Ref": subnet }));
                }

                self.vpc = json!({ "Ref": vpc_id });
            }
        }
    }

    fn cluster(&mut self) {
        self.add(
            naming::cluster(self.stack()),
            json!({ "Type": "AWS::ECS::Cluster" }),
        );
    }

    fn load_balancer(&mut self) {
        let plan = self.plan;
        let stack = plan.stack_name.as_str();
        let load_balancer = naming::load_balancer(stack);
        let security_group = naming::logical_id(&load_balancer, "SecurityGroup");
        let routing = &plan.routing;

        // the HTTPS listener port is opened next to the redirect ingress
        let mut ingress: Vec<Value> = routing
            .ingress
            .iter()
            .map(|rule| ingress_json(rule.protocol, rule.port, rule.cidr))
            .collect();
        ingress.push(ingress_json("tcp", HTTPS_PORT, "0.0.0.0/0"));

        self.add(
            security_group.clone(),
            json!({
                "Type": "AWS::EC2::SecurityGroup",
                "Properties": {
                    "GroupDescription": format!("Load balancer of {}", stack),
                    "VpcId": self.vpc,
                    "SecurityGroupIngress": ingress,
                    "Tags": self.tags(),
                }
            }),
        );

        self.add(
            load_balancer.clone(),
            json!({
                "Type": "AWS::ElasticLoadBalancingV2::LoadBalancer",
                "Properties": {
                    "Type": "application",
                    "Scheme": "internet-facing",
                    "Subnets": self.subnets,
                    "SecurityGroups": [{ "Fn::GetAtt": [security_group, "GroupId"] }],
                    "Tags": self.tags(),
                }
            }),
        );

        let redirect = &routing.redirect;
        self.add(
            naming::http_redirect(stack),
            json!({
                "Type": "AWS::ElasticLoadBalancingV2::Listener",
                "Properties": {
                    "LoadBalancerArn": { "Ref": load_balancer },
                    "Port": redirect.from_port,
                    "Protocol": "HTTP",
                    "DefaultActions": [{
                        "Type": "redirect",
                        "RedirectConfig": {
                            "Protocol": redirect.protocol,
                            "Port": redirect.to_port.to_string(),
                            "StatusCode": redirect.status_code,
                        }
                    }],
                }
            }),
        );

        let default_action = match &routing.default_action {
            DefaultAction::Forward(target) => json!({
                "Type": "forward",
                "TargetGroupArn": { "Ref": naming::target_group(&target.service_id) },
            }),
            DefaultAction::FixedResponse(response) => json!({
                "Type": "fixed-response",
                "FixedResponseConfig": {
                    "StatusCode": response.status_code.to_string(),
                    "ContentType": response.content_type,
                    "MessageBody": response.body,
                }
            }),
        };
        self.add(
            naming::https_listener(stack),
            json!({
                "Type": "AWS::ElasticLoadBalancingV2::Listener",
                "Properties": {
                    "LoadBalancerArn": { "Ref": load_balancer },
                    "Port": HTTPS_PORT,
                    "Protocol": "HTTPS",
                    "Certificates": [{ "CertificateArn": plan.domain.certificate_arn }],
                    "DefaultActions": [default_action],
                }
            }),
        );
    }

    fn service(&mut self, service: &ServiceSpec) {
        let plan = self.plan;
        let stack = plan.stack_name.as_str();
        let id = service.id.as_str();
        let logs = naming::logs(id);
        let task_role = naming::logical_id(id, "TaskRole");
        let execution_role = naming::logical_id(id, "TaskExecutionRole");
        let task_definition = naming::task_definition(id);
        let target_group = naming::target_group(id);
        let security_group = naming::logical_id(id, "ServiceSecurityGroup");
        let lb_security_group =
            naming::logical_id(&naming::load_balancer(stack), "SecurityGroup");

        self.add(
            logs.clone(),
            json!({
                "Type": "AWS::Logs::LogGroup",
                "Properties": { "Tags": self.tags() }
            }),
        );

        self.add(
            task_role.clone(),
            json!({
                "Type": "AWS::IAM::Role",
                "Properties": {
                    "AssumeRolePolicyDocument": assume_ecs_tasks(),
                    "ManagedPolicyArns": [SSM_READ_ONLY_POLICY],
                }
            }),
        );
        self.add(
            execution_role.clone(),
            json!({
                "Type": "AWS::IAM::Role",
                "Properties": {
                    "AssumeRolePolicyDocument": assume_ecs_tasks(),
                    "ManagedPolicyArns": [EXECUTION_ROLE_POLICY],
                }
            }),
        );

        let environment: Vec<Value> = service
            .environment
            .iter()
            .map(|(name, value)| json!({ "Name": name, "Value": value }))
            .collect();
        let image = self.image(service);

        self.add(
            task_definition.clone(),
            json!({
                "Type": "AWS::ECS::TaskDefinition",
                "Properties": {
                    "RequiresCompatibilities": ["FARGATE"],
                    "NetworkMode": "awsvpc",
                    "Cpu": TASK_CPU_UNITS.to_string(),
                    "Memory": TASK_MEMORY_MIB.to_string(),
                    "TaskRoleArn": { "Fn::GetAtt": [task_role, "Arn"] },
                    "ExecutionRoleArn": { "Fn::GetAtt": [execution_role, "Arn"] },
                    "ContainerDefinitions": [{
                        "Name": naming::container(id),
                        "Image": image,
                        "Essential": true,
                        "Memory": CONTAINER_MEMORY_MIB,
                        "Environment": environment,
                        "PortMappings": [{
                            "ContainerPort": service.container_port,
                            "Protocol": "tcp",
                        }],
                        "LogConfiguration": {
                            "LogDriver": "awslogs",
                            "Options": {
                                "awslogs-group": { "Ref": logs },
                                "awslogs-stream-prefix": id,
                                "awslogs-region": { "Ref": "AWS::Region" },
                            }
                        },
                    }],
                    "Tags": self.tags(),
                }
            }),
        );

        self.add(
            target_group.clone(),
            json!({
                "Type": "AWS::ElasticLoadBalancingV2::TargetGroup",
                "Properties": {
                    "Port": service.container_port,
                    "Protocol": "HTTP",
                    "TargetType": "ip",
                    "VpcId": self.vpc,
                }
            }),
        );

        // a service without a rule is reached through the listener default
        let attached_by = match plan.routing.rule_for(id) {
            Some(rule) => {
                let rule_id = naming::listener_rule(id);
                self.add(rule_id.clone(), listener_rule_json(stack, rule));
                rule_id
            }
            None => naming::https_listener(stack),
        };

        self.add(
            security_group.clone(),
            json!({
                "Type": "AWS::EC2::SecurityGroup",
                "Properties": {
                    "GroupDescription": format!("Fargate service {}", id),
                    "VpcId": self.vpc,
                    "SecurityGroupIngress": [{
                        "IpProtocol": "tcp",
                        "FromPort": service.container_port,
                        "ToPort": service.container_port,
                        "SourceSecurityGroupId": { "Fn::GetAtt": [lb_security_group, "GroupId"] },
                    }],
                    "Tags": self.tags(),
                }
            }),
        );

        self.add(
            naming::fargate_service(id),
            json!({
                "Type": "AWS::ECS::Service",
                "DependsOn": [attached_by],
                "Properties": {
                    "Cluster": { "Ref": naming::cluster(stack) },
                    "LaunchType": "FARGATE",
                    "DesiredCount": 1,
                    "TaskDefinition": { "Ref": task_definition },
                    "NetworkConfiguration": {
                        "AwsvpcConfiguration": {
                            "AssignPublicIp": "ENABLED",
                            "Subnets": self.subnets,
                            "SecurityGroups": [{ "Fn::GetAtt": [security_group, "GroupId"] }],
                        }
                    },
                    "LoadBalancers": [{
                        "ContainerName": naming::container(id),
                        "ContainerPort": service.container_port,
                        "TargetGroupArn": { "Ref": target_group },
                    }],
                    "Tags": self.tags(),
                }
            }),
        );
    }

    /// Registry images are used verbatim, assets become parameters.
    fn image(&mut self, service: &ServiceSpec) -> Value {
        match &service.image {
            Some(ImageSource::Registry(reference)) => json!(reference),
            Some(ImageSource::Asset(path)) => {
                let parameter = naming::image_parameter(&service.id);
                self.parameters.insert(
                    parameter.clone(),
                    json!({
                        "Type": "String",
                        "Description": format!(
                            "Image URI built from {} for {}",
                            path.display(),
                            service.id
                        ),
                    }),
                );
                json!({ "Ref": parameter })
            }
            // rejected by StackPlan::build
            None => Value::Null,
        }
    }

    fn dns(&mut self) {
        let plan = self.plan;
        let stack = plan.stack_name.as_str();
        let load_balancer = naming::load_balancer(stack);
        let domain = &plan.domain;

        self.add(
            naming::site(stack),
            json!({
                "Type": "AWS::Route53::RecordSet",
                "Properties": {
                    "HostedZoneName": format!("{}.", domain.domain_name),
                    "Name": format!("{}.", domain.fqdn()),
                    "Type": "CNAME",
                    "TTL": DNS_TTL,
                    "ResourceRecords": [{ "Fn::GetAtt": [load_balancer, "DNSName"] }],
                }
            }),
        );

        self.outputs.insert(
            naming::dns_output(stack),
            json!({ "Value": { "Fn::GetAtt": [load_balancer, "DNSName"] } }),
        );
    }

    fn finish(self) -> Value {
        debug!(
            stack = %self.plan.stack_name,
            resources = self.resources.len(),
            parameters = self.parameters.len(),
            "CloudFormation template synthesized"
        );

        let mut template = Map::new();
        template.insert(
            "AWSTemplateFormatVersion".to_string(),
            json!(TEMPLATE_FORMAT_VERSION),
        );
        template.insert(
            "Description".to_string(),
            json!(format!("StackFlow stack {}", self.plan.stack_name)),
        );
        if !self.parameters.is_empty() {
            template.insert("Parameters".to_string(), Value::Object(self.parameters));
        }
        template.insert("Resources".to_string(), Value::Object(self.resources));
        template.insert("Outputs".to_string(), Value::Object(self.outputs));
        Value::Object(template)
    }
}

fn listener_rule_json(stack: &str, rule: &ListenerRule) -> Value {
    let conditions: Vec<Value> = rule.conditions.iter().map(condition_json).collect();
    json!({
        "Type": "AWS::ElasticLoadBalancingV2::ListenerRule",
        "Properties": {
            "ListenerArn": { "Ref": naming::https_listener(stack) },
            "Priority": rule.priority,
            "Conditions": conditions,
            "Actions": [{
                "Type": "forward",
                "TargetGroupArn": { "Ref": naming::target_group(&rule.target.service_id) },
            }],
        }
    })
}

fn condition_json(condition: &RouteCondition) -> Value {
    match condition {
        RouteCondition::PathPattern(values) => json!({
            "Field": condition.field(),
            "PathPatternConfig": { "Values": values },
        }),
        RouteCondition::HostHeader(values) => json!({
            "Field": condition.field(),
            "HostHeaderConfig": { "Values": values },
        }),
    }
}

fn ingress_json(protocol: &str, port: u16, cidr: &str) -> Value {
    json!({
        "IpProtocol": protocol,
        "FromPort": port,
        "ToPort": port,
        "CidrIp": cidr,
    })
}

fn tags_json(tags: &[Tag]) -> Value {
    Value::Array(
        tags.iter()
            .map(|tag| json!({ "Key": tag.name, "Value": tag.value }))
            .collect(),
    )
}

fn assume_ecs_tasks() -> Value {
    json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Allow",
            "Principal": { "Service": "ecs-tasks.amazonaws.com" },
            "Action": "sts:AssumeRole",
        }]
    })
}

/// /20 blocks from the start of the VPC range, one per availability zone.
fn subnet_cidr(index: u8) -> String {
    format!("10.0.{}.0/20", (u32::from(index) - 1) * 16)
}
