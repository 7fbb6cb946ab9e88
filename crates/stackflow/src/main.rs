mod commands;

use clap::{Parser, Subcommand};
use colored::Colorize;
use stackflow_core::{StackDefinition, StackError};
use stackflow_config::Settings;
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stack")]
#[command(about = "書いた順に、ルーティングになる。", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 設定を検証してルーティングを確認
    Validate {
        /// ステージ名 (dev, prod など)
        stage: Option<String>,
        /// ステージ名 (-s/--stage フラグ、STACK_STAGE 環境変数)
        #[arg(
            short = 's',
            long = "stage",
            env = "STACK_STAGE",
            conflicts_with = "stage",
            hide = true
        )]
        stage_flag: Option<String>,
    },
    /// リスナールールと作成されるリソースを表示
    Plan {
        /// ステージ名 (dev, prod など)
        stage: Option<String>,
        /// ステージ名 (-s/--stage フラグ、STACK_STAGE 環境変数)
        #[arg(
            short = 's',
            long = "stage",
            env = "STACK_STAGE",
            conflicts_with = "stage",
            hide = true
        )]
        stage_flag: Option<String>,
        /// JSON で出力
        #[arg(long)]
        json: bool,
    },
    /// CloudFormation テンプレートを出力
    Synth {
        /// ステージ名 (dev, prod など)
        stage: Option<String>,
        /// ステージ名 (-s/--stage フラグ、STACK_STAGE 環境変数)
        #[arg(
            short = 's',
            long = "stage",
            env = "STACK_STAGE",
            conflicts_with = "stage",
            hide = true
        )]
        stage_flag: Option<String>,
        /// 出力ディレクトリ（省略時は設定ファイルの out_dir、なければ cdk.out）
        #[arg(short = 'o', long = "out")]
        out: Option<PathBuf>,
    },
    /// バージョン情報を表示
    Version,
}

impl Commands {
    fn stage_hint(&self) -> Option<&str> {
        match self {
            Commands::Validate { stage, stage_flag }
            | Commands::Plan {
                stage, stage_flag, ..
            }
            | Commands::Synth {
                stage, stage_flag, ..
            } => stage.as_deref().or(stage_flag.as_deref()),
            Commands::Version => None,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // stdout はプランや JSON の出力に使うので、ログは stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Versionコマンドは設定ファイル不要
    if matches!(cli.command, Commands::Version) {
        println!("stackflow {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let settings = stackflow_config::load_settings()?;

    let project_root = match stackflow_core::find_project_root() {
        Ok(root) => root,
        Err(e @ StackError::ProjectRootNotFound(_)) => {
            eprintln!("{}", "✗ プロジェクトルートが見つかりません".red().bold());
            eprintln!("  {}", e);
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };

    let stage = cli
        .command
        .stage_hint()
        .map(str::to_string)
        .or_else(|| settings.default_stage.clone());

    let stack = load_stack(&project_root, stage.as_deref(), &settings)?;
    debug!(
        stack = %stack.stack_name(),
        services = stack.services.len(),
        "Stack loaded"
    );

    // コマンドディスパッチ
    match cli.command {
        Commands::Validate { .. } => {
            commands::validate::handle(&project_root, &stack)?;
        }
        Commands::Plan { json, .. } => {
            commands::plan::handle(&stack, json)?;
        }
        Commands::Synth { out, .. } => {
            let out_dir = resolve_out_dir(&project_root, out, &settings);
            commands::synth::handle(&stack, &out_dir).await?;
        }
        Commands::Version => {
            unreachable!("Version is handled before config loading");
        }
    }

    Ok(())
}

/// プロジェクトをロードし、ユーザー設定の region / account で補完する
fn load_stack(
    project_root: &Path,
    stage: Option<&str>,
    settings: &Settings,
) -> anyhow::Result<StackDefinition> {
    let mut stack =
        match stackflow_core::load_project_from_root_with_stage(project_root, stage) {
            Ok(stack) => stack,
            Err(ref e)
                if stage.is_none()
                    && matches!(
                        e,
                        StackError::TemplateError { .. } | StackError::TemplateRenderError(_)
                    ) =>
            {
                eprintln!("{} {}", "Error:".red().bold(), e);
                eprintln!();
                eprintln!(
                    "{}",
                    "ヒント: テンプレートが STAGE を参照している場合はステージを指定してください:"
                        .yellow()
                );
                eprintln!("  stack <command> <stage>              例: stack plan prod");
                eprintln!("  stack <command> -s <stage>           例: stack plan -s prod");
                eprintln!("  STACK_STAGE=<stage> stack <command>  例: STACK_STAGE=prod stack plan");
                std::process::exit(1);
            }
            Err(e) => return Err(e.into()),
        };

    if stack.environment.region.is_none() {
        stack.environment.region = settings.default_region.clone();
    }
    if stack.environment.account.is_none() {
        stack.environment.account = settings.default_account.clone();
    }

    Ok(stack)
}

/// 相対パスはプロジェクトルート基準
fn resolve_out_dir(project_root: &Path, out: Option<PathBuf>, settings: &Settings) -> PathBuf {
    let out_dir = out.unwrap_or_else(|| settings.out_dir());
    if out_dir.is_absolute() {
        out_dir
    } else {
        project_root.join(out_dir)
    }
}
