use colored::Colorize;
use stackflow_cloud::StackPlan;
use stackflow_core::StackDefinition;
use std::path::Path;

pub fn handle(project_root: &Path, stack: &StackDefinition) -> anyhow::Result<()> {
    println!("{}", "設定を検証中...".blue());
    println!(
        "プロジェクトルート: {}",
        project_root.display().to_string().cyan()
    );

    let plan = match StackPlan::build(stack) {
        Ok(plan) => plan,
        Err(e) => {
            eprintln!();
            eprintln!("{}", "✗ 設定エラー".red().bold());
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    };

    println!("{}", "✓ 設定ファイルは正常です！".green().bold());
    println!();
    println!("サマリー:");
    println!("  スタック: {}", plan.stack_name.cyan());
    if let Some(region) = &plan.environment.region {
        println!("  リージョン: {}", region);
    }
    println!("  ドメイン: {}", plan.domain.fqdn());
    if !plan.tags.is_empty() {
        let tags: Vec<String> = plan
            .tags
            .iter()
            .map(|t| format!("{}={}", t.name, t.value))
            .collect();
        println!("  タグ: {}", tags.join(", "));
    }
    println!("  サービス: {}個", plan.services.len());
    super::print_routes(&plan);
    println!("  リソース: {}", plan.plan.summary());

    Ok(())
}
