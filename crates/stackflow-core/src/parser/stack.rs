//! stack / domain / tag ノードのパース

use super::{first_integer, first_string, positional_strings, required_string};
use crate::error::{Result, StackError};
use crate::model::{DomainConfig, MAX_AZS, MIN_AZS, NetworkConfig, StackDefinition, Tag};
use kdl::KdlNode;

/// stack ノードを適用
///
/// ```kdl
/// stack "AppName" {
///     region "eu-west-1"
///     account "123456789012"
///     max_azs 2
/// }
/// ```
pub(crate) fn apply_stack_node(node: &KdlNode, stack: &mut StackDefinition) -> Result<()> {
    if let Some(name) = first_string(node) {
        stack.name = name.to_string();
    }

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "region" => {
                    stack.environment.region = Some(required_string(child, "region")?);
                }
                "account" => {
                    stack.environment.account = Some(required_string(child, "account")?);
                }
                "max_azs" | "max-azs" => {
                    let max_azs = first_integer(child)
                        .and_then(|v| u8::try_from(v).ok())
                        .filter(|v| (MIN_AZS..=MAX_AZS).contains(v))
                        .ok_or_else(|| {
                            StackError::InvalidConfig(format!(
                                "max_azs must be an integer between {} and {}",
                                MIN_AZS, MAX_AZS
                            ))
                        })?;
                    if let NetworkConfig::Import { .. } = stack.network {
                        return Err(StackError::InvalidConfig(
                            "max_azs cannot be combined with an imported vpc".to_string(),
                        ));
                    }
                    stack.network = NetworkConfig::Create { max_azs };
                }
                "vpc" => {
                    stack.network = parse_vpc(child)?;
                }
                _ => {}
            }
        }
    }

    Ok(())
}

/// 既存VPCの指定をパース
fn parse_vpc(node: &KdlNode) -> Result<NetworkConfig> {
    let vpc_id = required_string(node, "vpc")?;
    let mut subnet_ids = Vec::new();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            if matches!(child.name().value(), "subnet" | "subnets") {
                subnet_ids.extend(positional_strings(child)?);
            }
        }
    }

    if subnet_ids.len() < usize::from(MIN_AZS) {
        return Err(StackError::InvalidConfig(format!(
            "vpc '{}' requires at least {} subnets in different availability zones",
            vpc_id, MIN_AZS
        )));
    }

    Ok(NetworkConfig::Import { vpc_id, subnet_ids })
}

/// domain ノードをパース
///
/// ```kdl
/// domain "example.com" {
///     subdomain "site"
///     certificate "0f1e2d3c-..."
/// }
/// ```
pub fn parse_domain(node: &KdlNode) -> Result<DomainConfig> {
    let domain_name = required_string(node, "domain")?;
    let mut subdomain_name = String::new();
    let mut certificate = None;

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "subdomain" => {
                    subdomain_name = required_string(child, "subdomain")?;
                }
                "certificate" | "certificate_arn" | "certificate_id" => {
                    certificate = Some(required_string(child, "certificate")?);
                }
                _ => {}
            }
        }
    }

    let certificate = certificate.ok_or_else(|| {
        StackError::InvalidConfig(format!("domain '{}' requires a certificate", domain_name))
    })?;

    Ok(DomainConfig {
        domain_name,
        subdomain_name,
        certificate,
    })
}

/// tag ノードをパース (`tag "Application" "starter-app"`)
pub fn parse_tag(node: &KdlNode) -> Result<Tag> {
    let args = positional_strings(node)?;
    match args.as_slice() {
        [name, value] => Ok(Tag::new(name, value)),
        _ => Err(StackError::InvalidConfig(format!(
            "tag requires a name and a value, got {} argument(s)",
            args.len()
        ))),
    }
}
