//! 統合ローダー
//!
//! ファイル発見、テンプレート展開、パースを統合

use crate::discovery::{DiscoveredFiles, discover_files_with_stage, find_project_root};
use crate::error::{Result, StackError};
use crate::model::StackDefinition;
use crate::parser::parse_kdl_string_with_stage;
use crate::template::{TemplateProcessor, Variables, extract_variables_with_stage};
use std::path::Path;
use tracing::{debug, info, instrument};

/// ファイルあたりの推定バイト数（容量事前確保用）
const ESTIMATED_BYTES_PER_FILE: usize = 500;

/// プロジェクト全体をロードしてStackDefinitionを生成
///
/// 以下の処理を実行:
/// 1. プロジェクトルートの検出
/// 2. ファイルの自動発見
/// 3. 変数の収集
/// 4. テンプレート展開
/// 5. KDLパース
/// 6. 必須項目の検証
#[instrument]
pub fn load_project(stage: Option<&str>) -> Result<StackDefinition> {
    info!("Starting project load");
    let project_root = find_project_root()?;
    load_project_from_root_with_stage(&project_root, stage)
}

/// 指定されたルートディレクトリからプロジェクトをロード
pub fn load_project_from_root(project_root: &Path) -> Result<StackDefinition> {
    load_project_from_root_with_stage(project_root, None)
}

/// ステージ指定でプロジェクトをロード
///
/// 読み込み順序: stack.kdl → services/**/*.kdl → stack.{stage}.kdl → stack.local.kdl
#[instrument(skip(project_root), fields(project_root = %project_root.display()))]
pub fn load_project_from_root_with_stage(
    project_root: &Path,
    stage: Option<&str>,
) -> Result<StackDefinition> {
    // 1. ファイル発見
    debug!("Step 1: Discovering files");
    let discovered = discover_files_with_stage(project_root, stage)?;
    if discovered.root.is_none() {
        return Err(StackError::ProjectRootNotFound(project_root.to_path_buf()));
    }

    // 2. 変数収集とテンプレート準備
    debug!("Step 2: Preparing template processor");
    let mut processor = prepare_template_processor(&discovered, project_root, stage)?;

    // 3. テンプレート展開
    debug!("Step 3: Expanding templates");
    let expanded_content = expand_all_files(&discovered, &mut processor)?;
    info!(
        content_size = expanded_content.len(),
        "Template expansion complete"
    );

    // 4. KDLパース
    debug!("Step 4: Parsing KDL");
    let name = project_root
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unnamed")
        .to_string();
    let stack = parse_kdl_string_with_stage(&expanded_content, name, stage)?;

    // 5. 検証
    stack.validate()?;
    info!(
        stack = %stack.stack_name(),
        services = stack.services.len(),
        tags = stack.tags.len(),
        "Project loaded successfully"
    );

    Ok(stack)
}

/// テンプレートプロセッサを準備
///
/// 優先度（後勝ち）: ビルトイン → .env → 環境変数 → variables ブロック
fn prepare_template_processor(
    discovered: &DiscoveredFiles,
    project_root: &Path,
    stage: Option<&str>,
) -> Result<TemplateProcessor> {
    let mut processor = TemplateProcessor::new();

    // ビルトイン変数
    processor.add_variable(
        "PROJECT_ROOT",
        serde_json::Value::String(project_root.to_string_lossy().to_string()),
    );
    processor.add_variable(
        "STAGE",
        stage
            .map(|s| serde_json::Value::String(s.to_string()))
            .unwrap_or(serde_json::Value::Null),
    );

    if let Some(env_file) = &discovered.env_file {
        processor.add_env_file_variables(env_file)?;
    }

    processor.add_env_variables();

    let mut all_variables = Variables::new();
    for file in discovered.kdl_files() {
        let content = std::fs::read_to_string(file).map_err(|source| StackError::ReadFile {
            path: file.to_path_buf(),
            source,
        })?;
        all_variables.extend(extract_variables_with_stage(&content, stage)?);
    }
    debug!(vars = ?all_variables, "Adding collected variables to processor");
    processor.add_variables(all_variables);

    Ok(processor)
}

/// 全ファイルをテンプレート展開して結合
fn expand_all_files(
    discovered: &DiscoveredFiles,
    processor: &mut TemplateProcessor,
) -> Result<String> {
    let files = discovered.kdl_files();
    let mut expanded = String::with_capacity(files.len() * ESTIMATED_BYTES_PER_FILE);

    for file in files {
        debug!(file = %file.display(), "Rendering file");
        let rendered = processor.render_file(file)?;
        expanded.push_str(&rendered);
        expanded.push_str("\n\n");
    }

    Ok(expanded)
}
