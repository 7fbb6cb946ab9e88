//! AWS CloudFormation backend for StackFlow
//!
//! This crate implements the Provisioner trait by synthesizing a
//! CloudFormation template from a stack plan.
//!
//! # Example
//!
//! ```ignore
//! use stackflow_cloud::{Provisioner, StackPlan};
//! use stackflow_cloud_aws::CloudFormationSynth;
//!
//! let plan = StackPlan::build(&stack)?;
//! let synth = CloudFormationSynth::new("cdk.out");
//! let result = synth.submit(&plan).await?;
//! for path in &result.artifacts {
//!     println!("{}", path.display());
//! }
//! ```

pub mod provider;
pub mod template;

pub use provider::{AssetEntry, CloudFormationSynth, MANIFEST_FILE, Manifest, template_file_name};
pub use template::synthesize;
