//! Error types for plan construction and provisioning

use std::path::PathBuf;
use thiserror::Error;

/// Invalid or ambiguous stack input. Raised before any plan exists.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("No services declared")]
    NoServices,

    #[error("Service at position {index} has an empty id")]
    EmptyServiceId { index: usize },

    #[error("Duplicate service id: {0}")]
    DuplicateServiceId(String),

    #[error("Service '{service}' has container port {port} outside 1-65535")]
    PortOutOfRange { service: String, port: u32 },

    #[error("Service '{service}' has an empty environment variable name")]
    EmptyEnvironmentKey { service: String },

    #[error("Service '{service}' has a {field} condition without a pattern")]
    EmptyCondition { service: String, field: &'static str },

    #[error("More than one service without routing conditions: {}", .0.join(", "))]
    MultipleDefaultServices(Vec<String>),

    #[error("Listener rule priority for service '{service}' exceeds {max}")]
    PriorityOverflow { service: String, max: u32 },

    #[error("Service '{0}' has no image or asset")]
    MissingImage(String),

    #[error("Stack '{0}' has no domain; the HTTPS listener needs a certificate")]
    MissingDomain(String),

    #[error("Certificate '{certificate}' is not an ARN and no {missing} is configured")]
    CertificateContext {
        certificate: String,
        missing: &'static str,
    },

    #[error("Logical id '{logical_id}' is produced by both '{first}' and '{second}'")]
    LogicalIdCollision {
        logical_id: String,
        first: String,
        second: String,
    },
}

/// Failure reported by a provisioner while handling a submitted plan.
#[derive(Error, Debug)]
pub enum ProvisioningError {
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Plan rejected by {provider}: {reason}")]
    Rejected { provider: String, reason: String },
}

pub type Result<T> = std::result::Result<T, ConfigurationError>;

pub type ProvisioningResult<T> = std::result::Result<T, ProvisioningError>;
