//! Provisioner trait definition

use crate::action::ApplyResult;
use crate::error::ProvisioningResult;
use crate::stack::StackPlan;
use async_trait::async_trait;

/// Seam to the engine that turns a stack plan into real resources.
///
/// Implementations receive the complete plan and own every retry or
/// rollback decision. Nothing here calls `submit` more than once.
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Returns the provisioner name (e.g., "cloudformation")
    fn name(&self) -> &str;

    /// Returns the provisioner display name for UI
    fn display_name(&self) -> &str;

    /// Hand the plan over to the provisioning engine
    async fn submit(&self, plan: &StackPlan) -> ProvisioningResult<ApplyResult>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProvisioningError;
    use stackflow_core::{DomainConfig, ImageSource, ServiceSpec, StackDefinition};
    use std::sync::Mutex;

    /// Records submitted stack names
    #[derive(Default)]
    struct RecordingProvisioner {
        submitted: Mutex<Vec<String>>,
        reject: bool,
    }

    #[async_trait]
    impl Provisioner for RecordingProvisioner {
        fn name(&self) -> &str {
            "recording"
        }

        fn display_name(&self) -> &str {
            "Recording"
        }

        async fn submit(&self, plan: &StackPlan) -> ProvisioningResult<ApplyResult> {
            if self.reject {
                return Err(ProvisioningError::Rejected {
                    provider: self.name().to_string(),
                    reason: "quota exceeded".to_string(),
                });
            }
            if let Ok(mut submitted) = self.submitted.lock() {
                submitted.push(plan.stack_name.clone());
            }
            let mut result = ApplyResult::new();
            for action in &plan.plan.actions {
                result.add_success(action.id.clone(), action.description.clone());
            }
            Ok(result)
        }
    }

    fn plan() -> StackPlan {
        let mut stack = StackDefinition::new("AppName");
        stack.domain = Some(DomainConfig {
            domain_name: "example.com".to_string(),
            subdomain_name: "site".to_string(),
            certificate: "arn:aws:acm:eu-west-1:123456789012:certificate/abc".to_string(),
        });
        stack.services = vec![
            ServiceSpec::new("web").with_image(ImageSource::Registry("nginx".to_string())),
        ];
        StackPlan::build(&stack).unwrap()
    }

    #[tokio::test]
    async fn test_submit_through_trait_object() {
        let provisioner = RecordingProvisioner::default();
        let dynamic: &dyn Provisioner = &provisioner;

        let result = dynamic.submit(&plan()).await.unwrap();

        assert!(result.is_success());
        assert_eq!(result.succeeded.len(), plan().plan.actions.len());
        assert_eq!(*provisioner.submitted.lock().unwrap(), vec!["AppName".to_string()]);
    }

    #[test]
    fn test_rejection_is_provisioning_error() {
        let provisioner = RecordingProvisioner {
            reject: true,
            ..Default::default()
        };

        let result = tokio_test::block_on(provisioner.submit(&plan()));

        assert!(matches!(result, Err(ProvisioningError::Rejected { .. })));
        assert!(provisioner.submitted.lock().unwrap().is_empty());
    }
}
