//! KDL ファイルのテンプレート展開（Tera）
//!
//! 変数の出どころは4つ。後から追加したものが勝ちます:
//! ビルトイン (`STAGE`, `PROJECT_ROOT`) → `.env` → 環境変数 → `variables` ブロック

use crate::error::{Result, StackError};
use kdl::{KdlDocument, KdlValue};
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use tera::{Context, Tera};
use tracing::{debug, info};

/// 変数名 → 値
pub type Variables = BTreeMap<String, Value>;

/// テンプレートから参照できる環境変数のプレフィックス
pub const ALLOWED_ENV_PREFIXES: &[&str] = &["STACK_", "CI_", "APP_"];

const STAGE_BLOCK: &str = r#"\bstage\s+"(?P<label>[^"]+)"\s*\{"#;
const VARIABLES_BLOCK: &str = r"\bvariables\s*\{";

pub struct TemplateProcessor {
    tera: Tera,
    variables: Variables,
}

impl TemplateProcessor {
    pub fn new() -> Self {
        Self {
            tera: Tera::default(),
            variables: Variables::new(),
        }
    }

    pub fn add_variable(&mut self, key: impl Into<String>, value: Value) {
        self.variables.insert(key.into(), value);
    }

    pub fn add_variables(&mut self, variables: Variables) {
        self.variables.extend(variables);
    }

    /// 許可されたプレフィックスの環境変数だけを取り込む
    #[tracing::instrument(skip(self))]
    pub fn add_env_variables(&mut self) {
        let before = self.variables.len();
        self.variables.extend(
            std::env::vars()
                .filter(|(key, _)| is_allowed_env_key(key))
                .map(|(key, value)| (key, Value::String(value))),
        );
        info!(
            env_var_count = self.variables.len() - before,
            "Added filtered environment variables"
        );
    }

    /// `.env` の変数はプレフィックス制限なしで取り込む
    #[tracing::instrument(skip(self))]
    pub fn add_env_file_variables(&mut self, env_file_path: &Path) -> Result<()> {
        let content =
            std::fs::read_to_string(env_file_path).map_err(|source| StackError::ReadFile {
                path: env_file_path.to_path_buf(),
                source,
            })?;

        let variables = parse_env_file(&content);
        info!(
            env_file = %env_file_path.display(),
            variable_count = variables.len(),
            "Loaded variables from .env file"
        );
        self.add_variables(variables);
        Ok(())
    }

    pub fn render_str(&mut self, template: &str) -> Result<String> {
        let mut context = Context::new();
        for (key, value) in &self.variables {
            context.insert(key.as_str(), value);
        }
        self.tera
            .render_str(template, &context)
            .map_err(|e| StackError::TemplateRenderError(describe_tera_error(&e)))
    }

    /// 展開エラーにはファイルパスを付ける
    pub fn render_file(&mut self, path: &Path) -> Result<String> {
        let content = std::fs::read_to_string(path).map_err(|source| StackError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;

        self.render_str(&content).map_err(|e| match e {
            StackError::TemplateRenderError(message) => StackError::TemplateError {
                file: path.to_path_buf(),
                message,
            },
            other => other,
        })
    }
}

impl Default for TemplateProcessor {
    fn default() -> Self {
        Self::new()
    }
}

fn is_allowed_env_key(key: &str) -> bool {
    ALLOWED_ENV_PREFIXES
        .iter()
        .any(|prefix| key.starts_with(prefix))
}

/// `.env` の内容を変数にする
///
/// `KEY=value` 形式。`#` で始まる行と空行は無視し、`export ` 前置きと引用符は外します。
pub fn parse_env_file(content: &str) -> Variables {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let line = line.strip_prefix("export ").unwrap_or(line);
            line.split_once('=')
        })
        .map(|(key, value)| {
            debug!(key = %key.trim(), "Variable from .env file");
            (
                key.trim().to_string(),
                Value::String(strip_quotes(value.trim()).to_string()),
            )
        })
        .collect()
}

pub fn extract_variables(kdl_content: &str) -> Result<Variables> {
    extract_variables_with_stage(kdl_content, None)
}

/// `variables` ブロックを集める
///
/// 展開前の内容は KDL として読めないことがあるので、ブロックは波括弧の対応で切り出します。
/// 指定ステージの `stage` ブロック内の `variables` はトップレベルの値を上書きします。
pub fn extract_variables_with_stage(kdl_content: &str, stage: Option<&str>) -> Result<Variables> {
    let stage_re = compile(STAGE_BLOCK)?;
    let variables_re = compile(VARIABLES_BLOCK)?;

    let stages = find_blocks(kdl_content, &stage_re);

    let mut top_level = String::with_capacity(kdl_content.len());
    let mut cursor = 0;
    for block in &stages {
        top_level.push_str(&kdl_content[cursor..block.start]);
        cursor = block.end;
    }
    top_level.push_str(&kdl_content[cursor..]);

    let mut variables = variables_in(&top_level, &variables_re)?;
    if let Some(stage) = stage {
        for block in stages.iter().filter(|b| b.label == Some(stage)) {
            variables.extend(variables_in(block.body, &variables_re)?);
        }
    }

    Ok(variables)
}

/// `keyword ... { body }` の出現位置
struct Block<'a> {
    label: Option<&'a str>,
    start: usize,
    end: usize,
    body: &'a str,
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern)
        .map_err(|e| StackError::InvalidConfig(format!("正規表現のコンパイルエラー: {}", e)))
}

/// 重なりのないブロックを先頭から順に探す（外側優先）
fn find_blocks<'a>(content: &'a str, opening: &Regex) -> Vec<Block<'a>> {
    let mut blocks = Vec::new();
    let mut cursor = 0;

    for cap in opening.captures_iter(content) {
        let Some(whole) = cap.get(0) else {
            continue;
        };
        if whole.start() < cursor {
            continue;
        }
        let open = whole.end() - 1;
        let Some(close) = find_matching_brace(content, open) else {
            continue;
        };
        blocks.push(Block {
            label: cap.name("label").map(|m| m.as_str()),
            start: whole.start(),
            end: close + 1,
            body: &content[open + 1..close],
        });
        cursor = close + 1;
    }

    blocks
}

fn variables_in(content: &str, variables_re: &Regex) -> Result<Variables> {
    let mut variables = Variables::new();

    for block in find_blocks(content, variables_re) {
        let doc: KdlDocument = block.body.parse().map_err(|e| {
            StackError::InvalidConfig(format!("variables ブロックを解釈できません: {}", e))
        })?;
        for node in doc.nodes() {
            if let Some(entry) = node.entries().first() {
                variables.insert(node.name().value().to_string(), kdl_to_json(entry.value()));
            }
        }
    }

    Ok(variables)
}

/// `open_pos` の `{` に対応する `}` の位置（文字列リテラル内は数えない）
fn find_matching_brace(content: &str, open_pos: usize) -> Option<usize> {
    let bytes = content.as_bytes();
    if bytes.get(open_pos) != Some(&b'{') {
        return None;
    }

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (pos, &c) in bytes.iter().enumerate().skip(open_pos) {
        match c {
            _ if escaped => escaped = false,
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(pos);
                }
            }
            _ => {}
        }
    }

    None
}

fn strip_quotes(s: &str) -> &str {
    for quote in ['"', '\''] {
        if s.len() >= 2
            && let Some(inner) = s.strip_prefix(quote).and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    s
}

/// Tera のエラーチェーンを1行にまとめる。未定義変数なら変数名を示す
fn describe_tera_error(e: &tera::Error) -> String {
    let chain: Vec<String> =
        std::iter::successors(Some(e as &(dyn std::error::Error + 'static)), |err| err.source())
            .map(|err| err.to_string())
            .collect();
    let full = chain.join(" | ");

    if let Ok(re) = Regex::new(r"Variable `(?P<name>[^`]+)` not found")
        && let Some(name) = re.captures(&full).and_then(|cap| cap.name("name"))
    {
        return format!(
            "未定義の変数: `{}`\nヒント: variables ブロックで定義するか、.env ファイルに追加してください",
            name.as_str()
        );
    }

    full
}

fn kdl_to_json(value: &KdlValue) -> Value {
    match value {
        KdlValue::String(s) => Value::String(s.clone()),
        KdlValue::Integer(i) => i64::try_from(*i)
            .map(|i| Value::Number(i.into()))
            .unwrap_or(Value::Null),
        KdlValue::Float(f) => serde_json::Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        KdlValue::Bool(b) => Value::Bool(*b),
        KdlValue::Null => Value::Null,
    }
}
