use colored::Colorize;
use stackflow_cloud::{ActionType, StackPlan};
use stackflow_core::StackDefinition;

pub fn handle(stack: &StackDefinition, json: bool) -> anyhow::Result<()> {
    let plan = StackPlan::build(stack)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    println!("スタック: {}", plan.stack_name.cyan().bold());
    println!();
    println!("{}", "ルーティング:".bold());
    super::print_routes(&plan);
    println!();

    println!("{}", "リソース:".bold());
    for action in &plan.plan.actions {
        let marker = match action.action_type {
            ActionType::Create => "+".green(),
            ActionType::Reference => "=".blue(),
        };
        println!(
            "  {} {:<16} {} {}",
            marker,
            action.resource_kind.to_string(),
            action.resource_id.cyan(),
            action.description.dimmed()
        );
    }
    println!();
    println!("{}", plan.plan.summary());

    Ok(())
}
