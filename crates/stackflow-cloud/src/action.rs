//! Action types for stack resources

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Represents a planned action for one resource of the stack
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Action {
    /// Unique identifier for the action
    pub id: String,

    /// Type of action to perform
    pub action_type: ActionType,

    /// Kind of resource the action touches
    pub resource_kind: ResourceKind,

    /// Logical id of the resource
    pub resource_id: String,

    /// Logical ids this resource must come after
    pub depends_on: Vec<String>,

    /// Description of the action
    pub description: String,

    /// Additional details about the action
    pub details: BTreeMap<String, serde_json::Value>,
}

impl Action {
    pub fn create(kind: ResourceKind, resource_id: String, description: String) -> Self {
        Self::new(ActionType::Create, kind, resource_id, description)
    }

    pub fn reference(kind: ResourceKind, resource_id: String, description: String) -> Self {
        Self::new(ActionType::Reference, kind, resource_id, description)
    }

    fn new(
        action_type: ActionType,
        resource_kind: ResourceKind,
        resource_id: String,
        description: String,
    ) -> Self {
        Self {
            id: format!("{}-{}", action_type, resource_id),
            action_type,
            resource_kind,
            resource_id,
            depends_on: Vec::new(),
            description,
            details: BTreeMap::new(),
        }
    }

    pub fn after(mut self, logical_id: impl Into<String>) -> Self {
        self.depends_on.push(logical_id.into());
        self
    }

    pub fn detail(mut self, key: &str, value: serde_json::Value) -> Self {
        self.details.insert(key.to_string(), value);
        self
    }
}

/// Type of action to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Declare a new resource
    Create,
    /// Look up an existing resource
    Reference,
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionType::Create => write!(f, "create"),
            ActionType::Reference => write!(f, "reference"),
        }
    }
}

/// Kind of resource in the stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    Network,
    Cluster,
    Certificate,
    LoadBalancer,
    Listener,
    ListenerRule,
    TargetGroup,
    LogGroup,
    TaskDefinition,
    Service,
    HostedZone,
    DnsRecord,
    Output,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ResourceKind::Network => "network",
            ResourceKind::Cluster => "cluster",
            ResourceKind::Certificate => "certificate",
            ResourceKind::LoadBalancer => "load-balancer",
            ResourceKind::Listener => "listener",
            ResourceKind::ListenerRule => "listener-rule",
            ResourceKind::TargetGroup => "target-group",
            ResourceKind::LogGroup => "log-group",
            ResourceKind::TaskDefinition => "task-definition",
            ResourceKind::Service => "service",
            ResourceKind::HostedZone => "hosted-zone",
            ResourceKind::DnsRecord => "dns-record",
            ResourceKind::Output => "output",
        };
        f.write_str(name)
    }
}

/// Result of submitting a plan
#[derive(Debug, Clone, Serialize)]
pub struct ApplyResult {
    /// Successfully handled actions
    pub succeeded: Vec<ActionResult>,

    /// Failed actions
    pub failed: Vec<ActionResult>,

    /// Files written by the provisioner
    pub artifacts: Vec<PathBuf>,

    /// Total execution time in milliseconds
    pub duration_ms: u64,
}

impl ApplyResult {
    pub fn new() -> Self {
        Self {
            succeeded: Vec::new(),
            failed: Vec::new(),
            artifacts: Vec::new(),
            duration_ms: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn add_success(&mut self, action_id: String, message: String) {
        self.succeeded.push(ActionResult {
            action_id,
            success: true,
            message,
            error: None,
        });
    }
}

impl Default for ApplyResult {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of a single action
#[derive(Debug, Clone, Serialize)]
pub struct ActionResult {
    /// ID of the action
    pub action_id: String,

    /// Whether the action succeeded
    pub success: bool,

    /// Success message
    pub message: String,

    /// Error message if failed
    pub error: Option<String>,
}

/// Plan containing all actions in dependency order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Plan {
    pub actions: Vec<Action>,
}

impl Plan {
    pub fn new(actions: Vec<Action>) -> Self {
        Self { actions }
    }

    /// Get actions by type
    pub fn actions_by_type(&self, action_type: ActionType) -> Vec<&Action> {
        self.actions
            .iter()
            .filter(|a| a.action_type == action_type)
            .collect()
    }

    /// Get actions by resource kind
    pub fn actions_by_kind(&self, kind: ResourceKind) -> Vec<&Action> {
        self.actions
            .iter()
            .filter(|a| a.resource_kind == kind)
            .collect()
    }

    pub fn get(&self, resource_id: &str) -> Option<&Action> {
        self.actions.iter().find(|a| a.resource_id == resource_id)
    }

    /// Summary of the plan
    pub fn summary(&self) -> PlanSummary {
        let mut by_kind = BTreeMap::new();
        for action in &self.actions {
            *by_kind.entry(action.resource_kind).or_insert(0) += 1;
        }
        PlanSummary {
            create: self.actions_by_type(ActionType::Create).len(),
            reference: self.actions_by_type(ActionType::Reference).len(),
            by_kind,
        }
    }
}

/// Summary of planned actions
#[derive(Debug, Clone, Serialize)]
pub struct PlanSummary {
    pub create: usize,
    pub reference: usize,
    pub by_kind: BTreeMap<ResourceKind, usize>,
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to create, {} to reference",
            self.create, self.reference
        )
    }
}
