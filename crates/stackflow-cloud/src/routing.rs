//! Routing plan builder
//!
//! Maps an ordered list of services onto the HTTPS listener of the
//! application load balancer. Every service with at least one routing
//! condition gets a prioritized listener rule. A single condition-less
//! service becomes the listener's default action; without one, the
//! listener answers with a fixed 404.

use crate::error::{ConfigurationError, Result};
use serde::Serialize;
use stackflow_core::{RouteCondition, ServiceSpec};
use std::collections::HashSet;
use tracing::debug;

/// Priority of the rule for the first declared service.
pub const BASE_PRIORITY: u32 = 20;

/// Distance between the priorities of consecutive services.
pub const PRIORITY_STEP: u32 = 10;

/// Highest listener rule priority accepted by the load balancer.
pub const MAX_PRIORITY: u32 = 50_000;

pub const HTTP_PORT: u16 = 80;
pub const HTTPS_PORT: u16 = 443;

const MAX_CONTAINER_PORT: u32 = 65_535;

/// Forwarding target of a rule or of the default action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Target {
    pub service_id: String,
    pub port: u32,
}

impl Target {
    fn of(service: &ServiceSpec) -> Self {
        Self {
            service_id: service.id.clone(),
            port: service.container_port,
        }
    }
}

/// Prioritized rule on the HTTPS listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListenerRule {
    pub priority: u32,
    pub conditions: Vec<RouteCondition>,
    pub target: Target,
}

/// Plain HTTP listener that redirects every request to HTTPS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RedirectRule {
    pub from_port: u16,
    pub to_port: u16,
    pub protocol: &'static str,
    pub status_code: &'static str,
}

impl Default for RedirectRule {
    fn default() -> Self {
        Self {
            from_port: HTTP_PORT,
            to_port: HTTPS_PORT,
            protocol: "HTTPS",
            status_code: "HTTP_302",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FixedResponse {
    pub status_code: u16,
    pub content_type: &'static str,
    pub body: &'static str,
}

impl FixedResponse {
    pub fn not_found() -> Self {
        Self {
            status_code: 404,
            content_type: "text/plain",
            body: "Not Found",
        }
    }
}

/// What the HTTPS listener does when no rule matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum DefaultAction {
    Forward(Target),
    FixedResponse(FixedResponse),
}

impl DefaultAction {
    pub fn forward_target(&self) -> Option<&Target> {
        match self {
            DefaultAction::Forward(target) => Some(target),
            DefaultAction::FixedResponse(_) => None,
        }
    }
}

/// Inbound rule for the load balancer security group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngressRule {
    pub protocol: &'static str,
    pub port: u16,
    pub cidr: &'static str,
}

impl IngressRule {
    fn tcp_from_anywhere(port: u16) -> Self {
        Self {
            protocol: "tcp",
            port,
            cidr: "0.0.0.0/0",
        }
    }
}

/// Listener layout for one stack. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoutingPlan {
    pub redirect: RedirectRule,
    pub rules: Vec<ListenerRule>,
    pub default_action: DefaultAction,
    pub ingress: Vec<IngressRule>,
}

impl RoutingPlan {
    pub fn rule_for(&self, service_id: &str) -> Option<&ListenerRule> {
        self.rules.iter().find(|r| r.target.service_id == service_id)
    }

    /// Service receiving traffic that matches no rule, if any.
    pub fn default_service(&self) -> Option<&str> {
        self.default_action
            .forward_target()
            .map(|t| t.service_id.as_str())
    }
}

/// Build the routing plan for `services` in declaration order.
///
/// The whole input is validated before anything is emitted, so either a
/// complete plan or an error comes back.
pub fn build_plan(services: &[ServiceSpec]) -> Result<RoutingPlan> {
    validate(services)?;

    let mut rules = Vec::new();
    let mut default_target = None;

    for (index, service) in services.iter().enumerate() {
        if service.is_default_target() {
            default_target = Some(Target::of(service));
            continue;
        }
        rules.push(ListenerRule {
            priority: priority_for(index, service)?,
            conditions: service.conditions.clone(),
            target: Target::of(service),
        });
    }

    let default_action = match default_target {
        Some(target) => DefaultAction::Forward(target),
        None => DefaultAction::FixedResponse(FixedResponse::not_found()),
    };

    debug!(
        rules = rules.len(),
        default = ?default_action,
        "Routing plan built"
    );

    Ok(RoutingPlan {
        redirect: RedirectRule::default(),
        rules,
        default_action,
        ingress: vec![IngressRule::tcp_from_anywhere(HTTP_PORT)],
    })
}

/// Priority for the service at `index`. Condition-less services keep their
/// slot, so inserting a default service never shifts the others.
pub fn priority_for(index: usize, service: &ServiceSpec) -> Result<u32> {
    u32::try_from(index)
        .ok()
        .and_then(|i| i.checked_mul(PRIORITY_STEP))
        .and_then(|offset| offset.checked_add(BASE_PRIORITY))
        .filter(|p| *p <= MAX_PRIORITY)
        .ok_or_else(|| ConfigurationError::PriorityOverflow {
            service: service.id.clone(),
            max: MAX_PRIORITY,
        })
}

fn validate(services: &[ServiceSpec]) -> Result<()> {
    if services.is_empty() {
        return Err(ConfigurationError::NoServices);
    }

    let mut seen = HashSet::with_capacity(services.len());
    let mut defaults = Vec::new();

    for (index, service) in services.iter().enumerate() {
        if service.id.is_empty() {
            return Err(ConfigurationError::EmptyServiceId { index });
        }
        if !seen.insert(service.id.as_str()) {
            return Err(ConfigurationError::DuplicateServiceId(service.id.clone()));
        }
        if !(1..=MAX_CONTAINER_PORT).contains(&service.container_port) {
            return Err(ConfigurationError::PortOutOfRange {
                service: service.id.clone(),
                port: service.container_port,
            });
        }
        if service.environment.keys().any(|k| k.is_empty()) {
            return Err(ConfigurationError::EmptyEnvironmentKey {
                service: service.id.clone(),
            });
        }
        if let Some(condition) = service
            .conditions
            .iter()
            .find(|c| c.values().is_empty() || c.values().iter().any(|v| v.is_empty()))
        {
            return Err(ConfigurationError::EmptyCondition {
                service: service.id.clone(),
                field: condition.field(),
            });
        }

        if service.is_default_target() {
            defaults.push(service.id.clone());
        } else {
            priority_for(index, service)?;
        }
    }

    if defaults.len() > 1 {
        return Err(ConfigurationError::MultipleDefaultServices(defaults));
    }

    Ok(())
}
