//! サービスノードのパース

use super::route::{parse_condition, parse_route};
use super::{first_integer, required_string, scalar_string};
use crate::error::{Result, StackError};
use crate::model::{ImageSource, ServiceSpec};
use kdl::KdlNode;
use std::path::PathBuf;
use tracing::warn;

/// service ノードを新しいサービスとしてパース
pub fn parse_service(node: &KdlNode) -> Result<ServiceSpec> {
    let id = required_string(node, "service")?;
    let mut service = ServiceSpec::new(id);
    apply_service_children(node, &mut service)?;
    Ok(service)
}

/// service ノードを一覧に適用
///
/// 既存IDなら宣言位置を維持したまま上書き、新規IDなら末尾に追加します。
pub(crate) fn apply_service_node(node: &KdlNode, services: &mut Vec<ServiceSpec>) -> Result<()> {
    let id = required_string(node, "service")?;

    if let Some(existing) = services.iter_mut().find(|s| s.id == id) {
        apply_service_children(node, existing)
    } else {
        let mut service = ServiceSpec::new(id);
        apply_service_children(node, &mut service)?;
        services.push(service);
        Ok(())
    }
}

/// 子ノードの設定をサービスに適用
fn apply_service_children(node: &KdlNode, service: &mut ServiceSpec) -> Result<()> {
    let Some(children) = node.children() else {
        return Ok(());
    };

    // 同じノード内で初めてルーティング条件が現れた時点で既存の条件を破棄
    let mut conditions_replaced = false;

    for child in children.nodes() {
        match child.name().value() {
            "image" => {
                let reference = required_string(child, "image")?;
                service.image = Some(ImageSource::Registry(reference));
            }
            "asset" | "build" => {
                let context = required_string(child, "asset")?;
                service.image = Some(ImageSource::Asset(PathBuf::from(context)));
            }
            "port" | "container_port" => {
                let value = first_integer(child).ok_or_else(|| {
                    StackError::InvalidConfig(format!(
                        "service '{}': port requires an integer",
                        service.id
                    ))
                })?;
                // 範囲外の値はプラン構築時に検証するため、u32に収まれば受け付ける
                service.container_port = u32::try_from(value).map_err(|_| {
                    StackError::InvalidConfig(format!(
                        "service '{}': invalid port {}",
                        service.id, value
                    ))
                })?;
            }
            // env と environment 両方をサポート
            "environment" | "env" => {
                if let Some(envs) = child.children() {
                    for env_node in envs.nodes() {
                        let key = env_node.name().value().to_string();
                        let value = scalar_string(env_node).ok_or_else(|| {
                            StackError::InvalidConfig(format!(
                                "service '{}': environment '{}' requires a string, number or boolean value",
                                service.id, key
                            ))
                        })?;
                        service.environment.insert(key, value);
                    }
                } else {
                    // フラットな env "KEY=VALUE" 形式
                    let entry = required_string(child, "env")?;
                    let (key, value) = entry.split_once('=').ok_or_else(|| {
                        StackError::InvalidConfig(format!(
                            "service '{}': env \"{}\" must be written as KEY=VALUE",
                            service.id, entry
                        ))
                    })?;
                    service
                        .environment
                        .insert(key.trim().to_string(), value.trim().to_string());
                }
            }
            "route" => {
                service.conditions = parse_route(child)?;
                conditions_replaced = true;
            }
            // 旧形式: サービス直下の path / host
            _ => match parse_condition(child)? {
                Some(condition) => {
                    if !conditions_replaced {
                        service.conditions.clear();
                        conditions_replaced = true;
                    }
                    service.conditions.push(condition);
                }
                None => {
                    warn!(
                        service = %service.id,
                        node = %child.name().value(),
                        "Ignoring unknown service setting"
                    );
                }
            },
        }
    }

    Ok(())
}
