//! ステージノードのパース

use super::required_string;
use super::service::apply_service_node;
use super::stack::{parse_domain, parse_tag};
use crate::error::Result;
use crate::model::{StackDefinition, upsert_tag};
use kdl::KdlNode;

/// stage ノードからステージ名を取得
pub(crate) fn stage_name(node: &KdlNode) -> Result<String> {
    required_string(node, "stage")
}

/// 対象ステージのブロックをスタック定義に適用
///
/// ステージ内の service はトップレベルの同名サービスを上書きし、
/// 新しいサービスは末尾に追加されます。
pub(crate) fn apply_stage(node: &KdlNode, stack: &mut StackDefinition) -> Result<()> {
    let Some(children) = node.children() else {
        return Ok(());
    };

    for child in children.nodes() {
        match child.name().value() {
            "service" => apply_service_node(child, &mut stack.services)?,
            "tag" => upsert_tag(&mut stack.tags, parse_tag(child)?),
            "domain" => {
                stack.domain = Some(parse_domain(child)?);
            }
            "region" => {
                stack.environment.region = Some(required_string(child, "region")?);
            }
            "account" => {
                stack.environment.account = Some(required_string(child, "account")?);
            }
            _ => {}
        }
    }

    Ok(())
}
