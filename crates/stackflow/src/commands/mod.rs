pub mod plan;
pub mod synth;
pub mod validate;

use colored::Colorize;
use stackflow_cloud::{DefaultAction, RoutingPlan, StackPlan};

/// 各サービスのルーティングを1行ずつ表示
pub(crate) fn print_routes(plan: &StackPlan) {
    let routing: &RoutingPlan = &plan.routing;

    for service in &plan.services {
        let image = service
            .image
            .as_ref()
            .map(|i| i.to_string())
            .unwrap_or_else(|| "(未設定)".to_string());

        match routing.rule_for(&service.id) {
            Some(rule) => {
                let conditions: Vec<String> =
                    rule.conditions.iter().map(|c| c.to_string()).collect();
                println!(
                    "    - {} ({}) priority {} → {}",
                    service.id.cyan(),
                    image,
                    rule.priority.to_string().bold(),
                    conditions.join(" & ")
                );
            }
            None => {
                println!(
                    "    - {} ({}) {}",
                    service.id.cyan(),
                    image,
                    "デフォルト".yellow()
                );
            }
        }
    }

    let default = match &routing.default_action {
        DefaultAction::Forward(target) => format!("forward → {}:{}", target.service_id, target.port),
        DefaultAction::FixedResponse(response) => {
            format!("{} {}", response.status_code, response.body)
        }
    };
    println!("  デフォルトアクション: {}", default);
    println!(
        "  リダイレクト: HTTP:{} → HTTPS:{} ({})",
        routing.redirect.from_port, routing.redirect.to_port, routing.redirect.status_code
    );
}
