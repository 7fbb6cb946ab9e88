//! KDLパーサー
//!
//! StackFlowのKDL設定ファイルをパースします。
//! 各ノードタイプのパース処理はモジュールに分離されています。

mod route;
mod service;
mod stack;
mod stage;

// 外部クレートから再利用可能なパース関数
pub use route::parse_route;
pub use service::parse_service;
pub use stack::{parse_domain, parse_tag};

use crate::error::{Result, StackError};
use crate::model::{StackDefinition, upsert_tag};
use kdl::{KdlDocument, KdlNode, KdlValue};
use service::apply_service_node;
use stack::apply_stack_node;
use stage::{apply_stage, stage_name};
use std::fs;
use std::path::Path;
use tracing::debug;

/// KDLファイルをパースしてStackDefinitionを生成
pub fn parse_kdl_file<P: AsRef<Path>>(path: P) -> Result<StackDefinition> {
    let content = fs::read_to_string(path.as_ref())?;
    let name = path
        .as_ref()
        .parent()
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .unwrap_or("unnamed")
        .to_string();
    parse_kdl_string(&content, name)
}

/// KDL文字列をパース
pub fn parse_kdl_string(content: &str, default_name: String) -> Result<StackDefinition> {
    parse_kdl_string_with_stage(content, default_name, None)
}

/// KDL文字列をステージ指定でパース
///
/// 同じIDの service ノードが複数回現れた場合は、最初の宣言位置を保ったまま
/// 後の定義で上書きします（ルール優先度は宣言順で決まるため）。
pub fn parse_kdl_string_with_stage(
    content: &str,
    default_name: String,
    target_stage: Option<&str>,
) -> Result<StackDefinition> {
    let doc: KdlDocument = content.parse()?;

    let mut stack = StackDefinition::new(default_name);
    let mut target_stage_nodes: Vec<&KdlNode> = Vec::new();

    for node in doc.nodes() {
        match node.name().value() {
            "stack" => apply_stack_node(node, &mut stack)?,
            "domain" => {
                stack.domain = Some(parse_domain(node)?);
            }
            "tag" => {
                upsert_tag(&mut stack.tags, parse_tag(node)?);
            }
            "service" => apply_service_node(node, &mut stack.services)?,
            "stage" => {
                let name = stage_name(node)?;
                if target_stage == Some(name.as_str()) {
                    target_stage_nodes.push(node);
                }
                if !stack.stages.contains(&name) {
                    stack.stages.push(name);
                }
            }
            "variables" => {
                // テンプレート展開時に処理済み
            }
            other => {
                debug!(node = %other, "Skipping unknown top-level node");
            }
        }
    }

    if let Some(stage) = target_stage {
        // stage ブロックを1つも定義していないプロジェクトは任意のステージ名を受け付ける
        if !stack.stages.is_empty() && !stack.stages.iter().any(|s| s == stage) {
            return Err(StackError::StageNotFound {
                stage: stage.to_string(),
                available: stack.stages.join(", "),
            });
        }
        for node in target_stage_nodes {
            apply_stage(node, &mut stack)?;
        }
        stack.stage = Some(stage.to_string());
    }

    Ok(stack)
}

/// 最初の位置引数を文字列として取得
pub(crate) fn first_string(node: &KdlNode) -> Option<&str> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
}

/// 最初の位置引数を文字列として取得（数値・真偽値は文字列に変換）
pub(crate) fn scalar_string(node: &KdlNode) -> Option<String> {
    let value = node.entries().iter().find(|e| e.name().is_none())?.value();
    match value {
        KdlValue::String(s) => Some(s.clone()),
        KdlValue::Integer(i) => Some(i.to_string()),
        KdlValue::Float(f) => Some(f.to_string()),
        KdlValue::Bool(b) => Some(b.to_string()),
        KdlValue::Null => None,
    }
}

/// 最初の位置引数を必須の文字列として取得
pub(crate) fn required_string(node: &KdlNode, what: &str) -> Result<String> {
    first_string(node).map(|s| s.to_string()).ok_or_else(|| {
        StackError::InvalidConfig(format!(
            "{} requires a string argument",
            what
        ))
    })
}

/// 全ての位置引数を文字列として取得
pub(crate) fn positional_strings(node: &KdlNode) -> Result<Vec<String>> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .map(|e| {
            e.value().as_string().map(|s| s.to_string()).ok_or_else(|| {
                StackError::InvalidConfig(format!(
                    "{} expects string arguments, got {}",
                    node.name().value(),
                    e.value()
                ))
            })
        })
        .collect()
}

/// 最初の位置引数を整数として取得
pub(crate) fn first_integer(node: &KdlNode) -> Option<i128> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_integer())
}
