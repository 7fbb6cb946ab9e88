//! ルーティング条件のパース

use super::positional_strings;
use crate::error::{Result, StackError};
use crate::model::RouteCondition;
use kdl::KdlNode;

/// route ブロックをパース
///
/// ```kdl
/// route {
///     path "/api*" "/v2*"
///     host "api.example.com"
/// }
/// ```
pub fn parse_route(node: &KdlNode) -> Result<Vec<RouteCondition>> {
    let mut conditions = Vec::new();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match parse_condition(child)? {
                Some(condition) => conditions.push(condition),
                None => {
                    return Err(StackError::InvalidConfig(format!(
                        "unknown route condition: {} (expected path or host)",
                        child.name().value()
                    )));
                }
            }
        }
    }

    Ok(conditions)
}

/// 単一の条件ノードをパース（path / host 以外は None）
pub(crate) fn parse_condition(node: &KdlNode) -> Result<Option<RouteCondition>> {
    let condition = match node.name().value() {
        "path" | "path_pattern" | "path-pattern" => {
            RouteCondition::PathPattern(positional_strings(node)?)
        }
        "host" | "host_header" | "host-header" => {
            RouteCondition::HostHeader(positional_strings(node)?)
        }
        _ => return Ok(None),
    };
    Ok(Some(condition))
}
