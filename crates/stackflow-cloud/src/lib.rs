//! StackFlow Cloud
//!
//! Turns a loaded stack definition into the desired state handed to a
//! provisioning engine.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                  StackFlow CLI                   │
//! │            (stack validate/plan/synth)           │
//! └─────────────────┬───────────────────────────────┘
//!                   │ StackDefinition
//! ┌─────────────────▼───────────────────────────────┐
//! │                stackflow-cloud                   │
//! │  ┌──────────────────┐  ┌─────────────────────┐  │
//! │  │ Routing Builder  │─▶│     Stack Plan      │  │
//! │  │  (build_plan)    │  │ (actions, naming)   │  │
//! │  └──────────────────┘  └──────────┬──────────┘  │
//! │  ┌───────────────────────────────▼──────────┐   │
//! │  │      trait Provisioner { submit() }       │   │
//! │  └──────────────────────────────────────────┘   │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//!           ┌───────▼────────┐
//!           │ cloudformation │
//!           │   synthesis    │
//!           └────────────────┘
//! ```

pub mod action;
pub mod error;
pub mod naming;
pub mod provider;
pub mod routing;
pub mod stack;

// Re-exports
pub use action::{Action, ActionResult, ActionType, ApplyResult, Plan, PlanSummary, ResourceKind};
pub use error::{ConfigurationError, ProvisioningError, ProvisioningResult, Result};
pub use provider::Provisioner;
pub use routing::{
    DefaultAction, FixedResponse, IngressRule, ListenerRule, RedirectRule, RoutingPlan, Target,
    build_plan,
};
pub use stack::{ResolvedDomain, StackPlan, certificate_arn};
