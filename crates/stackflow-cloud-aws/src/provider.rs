//! CloudFormation synthesis provisioner
//!
//! Writes the template and an asset manifest to an output directory.
//! Deploying the template is left to the CloudFormation engine.

use crate::template::synthesize;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use stackflow_cloud::{ApplyResult, ProvisioningError, ProvisioningResult, Provisioner, StackPlan};
use stackflow_cloud::naming;
use stackflow_core::ImageSource;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::fs;
use tracing::{debug, info};

pub const MANIFEST_FILE: &str = "manifest.json";

/// Asset image that has to be built and pushed before deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetEntry {
    pub service: String,
    pub path: PathBuf,
    pub parameter: String,
}

/// Contents of `manifest.json`
#[derive(Debug, Clone, Serialize)]
pub struct Manifest {
    pub stack_name: String,
    pub template: String,
    pub generated_at: DateTime<Utc>,
    pub assets: Vec<AssetEntry>,
}

impl Manifest {
    pub fn for_plan(plan: &StackPlan) -> Self {
        let assets = plan
            .asset_services()
            .filter_map(|service| match &service.image {
                Some(ImageSource::Asset(path)) => Some(AssetEntry {
                    service: service.id.clone(),
                    path: path.clone(),
                    parameter: naming::image_parameter(&service.id),
                }),
                _ => None,
            })
            .collect();

        Self {
            stack_name: plan.stack_name.clone(),
            template: template_file_name(&plan.stack_name),
            generated_at: Utc::now(),
            assets,
        }
    }
}

pub fn template_file_name(stack_name: &str) -> String {
    format!("{}.template.json", stack_name)
}

/// CloudFormation provisioner that stops after synthesis
pub struct CloudFormationSynth {
    out_dir: PathBuf,
}

impl CloudFormationSynth {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    async fn write_json(&self, file_name: &str, value: &impl Serialize) -> ProvisioningResult<PathBuf> {
        let path = self.out_dir.join(file_name);
        let content = serde_json::to_string_pretty(value)?;
        fs::write(&path, content)
            .await
            .map_err(|source| ProvisioningError::Write {
                path: path.clone(),
                source,
            })?;
        debug!(path = %path.display(), "Wrote file");
        Ok(path)
    }
}

#[async_trait]
impl Provisioner for CloudFormationSynth {
    fn name(&self) -> &str {
        "cloudformation"
    }

    fn display_name(&self) -> &str {
        "AWS CloudFormation"
    }

    async fn submit(&self, plan: &StackPlan) -> ProvisioningResult<ApplyResult> {
        let start = Instant::now();
        let mut result = ApplyResult::new();

        fs::create_dir_all(&self.out_dir)
            .await
            .map_err(|source| ProvisioningError::Write {
                path: self.out_dir.clone(),
                source,
            })?;

        let manifest = Manifest::for_plan(plan);
        let template = synthesize(plan);
        result
            .artifacts
            .push(self.write_json(&manifest.template, &template).await?);
        result
            .artifacts
            .push(self.write_json(MANIFEST_FILE, &manifest).await?);

        for action in &plan.plan.actions {
            result.add_success(action.id.clone(), action.description.clone());
        }
        result.duration_ms = start.elapsed().as_millis() as u64;

        info!(
            stack = %plan.stack_name,
            out_dir = %self.out_dir.display(),
            assets = manifest.assets.len(),
            "CloudFormation template synthesized"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackflow_core::{DomainConfig, RouteCondition, ServiceSpec, StackDefinition};

    fn plan() -> StackPlan {
        let mut stack = StackDefinition::new("AppName");
        stack.stage = Some("dev".to_string());
        stack.domain = Some(DomainConfig {
            domain_name: "example.com".to_string(),
            subdomain_name: "site-dev".to_string(),
            certificate: "arn:aws:acm:eu-west-1:123456789012:certificate/abc".to_string(),
        });
        stack.services = vec![
            ServiceSpec::new("api")
                .with_image(ImageSource::Asset(PathBuf::from("./api")))
                .with_condition(RouteCondition::path("/api*")),
            ServiceSpec::new("web").with_image(ImageSource::Registry("nginx".to_string())),
        ];
        StackPlan::build(&stack).unwrap()
    }

    #[test]
    fn test_manifest_lists_assets() {
        let manifest = Manifest::for_plan(&plan());

        assert_eq!(manifest.template, "AppName-dev.template.json");
        assert_eq!(
            manifest.assets,
            vec![AssetEntry {
                service: "api".to_string(),
                path: PathBuf::from("./api"),
                parameter: "apiImageUri".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_submit_writes_template_and_manifest() {
        let temp_dir = tempfile::tempdir().unwrap();
        let out_dir = temp_dir.path().join("cdk.out");
        let synth = CloudFormationSynth::new(&out_dir);
        let plan = plan();

        let result = synth.submit(&plan).await.unwrap();

        assert!(result.is_success());
        assert_eq!(result.succeeded.len(), plan.plan.actions.len());
        assert_eq!(
            result.artifacts,
            vec![
                out_dir.join("AppName-dev.template.json"),
                out_dir.join("manifest.json"),
            ]
        );

        let template: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(out_dir.join("AppName-dev.template.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(template, synthesize(&plan));
        assert_eq!(
            template["Resources"]["AppNamedevHttpsListener"]["Properties"]["DefaultActions"][0]
                ["TargetGroupArn"]["Ref"],
            "webHttpTarget"
        );

        let manifest: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(out_dir.join("manifest.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(manifest["assets"][0]["parameter"], "apiImageUri");
    }

    #[tokio::test]
    async fn test_submit_into_file_path_fails() {
        let temp_dir = tempfile::tempdir().unwrap();
        let blocker = temp_dir.path().join("not-a-dir");
        std::fs::write(&blocker, "").unwrap();

        let result = CloudFormationSynth::new(&blocker).submit(&plan()).await;

        assert!(matches!(result, Err(ProvisioningError::Write { .. })));
    }
}
