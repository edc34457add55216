//! Step 8: build the container image

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::generation::steps::StepDependencies;
use crate::generation::{GenerationContext, GenerationStep, StepError};
use crate::infrastructure::ContainerToolchain;
use crate::registry::{Layer, ServiceRegistry, ServiceStatus};

pub struct BuildImageStep {
    container: Arc<dyn ContainerToolchain>,
    registry: Arc<ServiceRegistry>,
}

impl BuildImageStep {
    pub fn new(deps: &StepDependencies) -> Self {
        Self {
            container: Arc::clone(&deps.container),
            registry: Arc::clone(&deps.registry),
        }
    }
}

#[async_trait]
impl GenerationStep for BuildImageStep {
    fn name(&self) -> &str {
        "Build Image"
    }

    fn order(&self) -> u32 {
        8
    }

    fn failure_status(&self) -> ServiceStatus {
        ServiceStatus::BuildFailed
    }

    async fn run(
        &self,
        context: &mut GenerationContext,
        cancel: &CancellationToken,
    ) -> Result<(), StepError> {
        let paths = context.paths()?.clone();
        context.record.status = ServiceStatus::DockerBuilding;
        self.registry.upsert(&context.record);

        let tag = context.record.image_tag.clone();
        let result = self
            .container
            .build_image(paths.root(), &paths.project_name(Layer::Api), &tag, cancel)
            .await;
        if !result.ok {
            error!(service = %context.record.name, error = %result.message(), "Image build failed");
            return Err(StepError::toolchain(
                "docker build",
                result.exit_code,
                result.message(),
            ));
        }
        info!(service = %context.record.name, image_tag = %tag, "Image built");
        Ok(())
    }

    async fn rollback(&self, context: &mut GenerationContext) -> Result<(), StepError> {
        let tag = context.record.image_tag.clone();
        if tag.is_empty() {
            debug!(service = %context.record.name, "No image tag to remove");
            return Ok(());
        }
        // Rollback runs after cancellation too, so it gets its own token.
        let cancel = CancellationToken::new();
        if !self.container.image_exists(&tag, &cancel).await {
            return Ok(());
        }
        info!(image_tag = %tag, "Removing image");
        let result = self.container.remove_image(&tag, &cancel).await;
        if !result.ok {
            return Err(StepError::toolchain("docker rmi", result.exit_code, result.message()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::steps::test_support::{harness, initialized_context};
    use crate::infrastructure::shell::command_executor::MockCommandExecutor;

    #[tokio::test]
    async fn test_image_build_uses_api_dockerfile() {
        let harness = harness(MockCommandExecutor::new(), true).await;
        let step = BuildImageStep::new(&harness.deps);
        let mut context = initialized_context(&harness);

        step.run(&mut context, &CancellationToken::new()).await.unwrap();

        assert_eq!(context.record.status, ServiceStatus::DockerBuilding);
        assert_eq!(
            harness.executor.command_lines(),
            vec!["docker build -t invoiceservice:1 -f InvoiceService.Api/Dockerfile ."]
        );
    }

    #[tokio::test]
    async fn test_rollback_removes_only_existing_image() {
        let harness = harness(
            MockCommandExecutor::new().with_result(
                "docker image inspect invoiceservice:1",
                1,
                "",
                "No such image",
            ),
            true,
        )
        .await;
        let step = BuildImageStep::new(&harness.deps);
        let mut context = initialized_context(&harness);

        step.rollback(&mut context).await.unwrap();
        assert_eq!(
            harness.executor.command_lines(),
            vec!["docker image inspect invoiceservice:1"]
        );
    }

    #[tokio::test]
    async fn test_rollback_removes_tagged_image() {
        let harness = harness(MockCommandExecutor::new(), true).await;
        let step = BuildImageStep::new(&harness.deps);
        let mut context = initialized_context(&harness);

        step.rollback(&mut context).await.unwrap();
        assert_eq!(
            harness.executor.command_lines(),
            vec![
                "docker image inspect invoiceservice:1",
                "docker rmi invoiceservice:1"
            ]
        );
    }
}
