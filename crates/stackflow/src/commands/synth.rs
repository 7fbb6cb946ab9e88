use colored::Colorize;
use stackflow_cloud::{Provisioner, StackPlan};
use stackflow_cloud_aws::{CloudFormationSynth, Manifest};
use stackflow_core::StackDefinition;
use std::path::Path;

pub async fn handle(stack: &StackDefinition, out_dir: &Path) -> anyhow::Result<()> {
    let plan = StackPlan::build(stack)?;
    let synth = CloudFormationSynth::new(out_dir);

    println!(
        "{} {} を {} で合成中...",
        "▶".blue(),
        plan.stack_name.cyan(),
        synth.display_name()
    );

    let result = synth.submit(&plan).await?;

    if !result.is_success() {
        eprintln!("{}", "✗ 合成に失敗したリソースがあります".red().bold());
        for failure in &result.failed {
            eprintln!(
                "  {} {}",
                failure.action_id,
                failure.error.as_deref().unwrap_or_default()
            );
        }
        std::process::exit(1);
    }

    println!("{}", "✓ テンプレートを出力しました".green().bold());
    for path in &result.artifacts {
        println!("  {}", path.display().to_string().cyan());
    }

    let manifest = Manifest::for_plan(&plan);
    if !manifest.assets.is_empty() {
        println!();
        println!(
            "{}",
            "デプロイ前に以下のイメージをビルドし、パラメータに URI を渡してください:".yellow()
        );
        for asset in &manifest.assets {
            println!(
                "  {} ({}) → {}",
                asset.service.cyan(),
                asset.path.display(),
                asset.parameter
            );
        }
    }

    Ok(())
}
