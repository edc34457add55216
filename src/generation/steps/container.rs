//! Step 9: start the compose stack

use async_trait::async_trait;
use std::sync::Arc;
use tokio::fs;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::generation::steps::StepDependencies;
use crate::generation::{GenerationContext, GenerationStep, StepError};
use crate::infrastructure::ContainerToolchain;
use crate::registry::{ServiceRegistry, ServiceStatus};

pub struct RunContainerStep {
    container: Arc<dyn ContainerToolchain>,
    registry: Arc<ServiceRegistry>,
}

impl RunContainerStep {
    pub fn new(deps: &StepDependencies) -> Self {
        Self {
            container: Arc::clone(&deps.container),
            registry: Arc::clone(&deps.registry),
        }
    }
}

#[async_trait]
impl GenerationStep for RunContainerStep {
    fn name(&self) -> &str {
        "Run Container"
    }

    fn order(&self) -> u32 {
        9
    }

    fn failure_status(&self) -> ServiceStatus {
        ServiceStatus::StartFailed
    }

    async fn run(
        &self,
        context: &mut GenerationContext,
        cancel: &CancellationToken,
    ) -> Result<(), StepError> {
        let paths = context.paths()?.clone();
        if context.record.image_tag.is_empty() {
            return Err(StepError::Precondition("no image tag".to_string()));
        }
        info!(
            service = %context.record.name,
            app_port = context.record.app_port,
            db_port = context.record.db_port,
            "Starting containers"
        );
        context.record.status = ServiceStatus::Starting;
        self.registry.upsert(&context.record);

        let compose = paths.compose_file();
        if !fs::try_exists(&compose).await? {
            return Err(StepError::Precondition(format!(
                "compose file not found: {}",
                compose.display()
            )));
        }

        let result = self
            .container
            .compose_up(
                paths.root(),
                &context.record.name,
                context.record.app_port,
                context.record.db_port,
                cancel,
            )
            .await;
        if !result.ok {
            error!(service = %context.record.name, error = %result.message(), "Container start failed");
            return Err(StepError::toolchain(
                "docker compose up",
                result.exit_code,
                result.message(),
            ));
        }
        info!(service = %context.record.name, container = %result.output, "Containers started");
        Ok(())
    }

    async fn rollback(&self, context: &mut GenerationContext) -> Result<(), StepError> {
        let Some(paths) = context.record.paths.clone() else {
            debug!(service = %context.record.name, "No paths, nothing to stop");
            return Ok(());
        };
        if !fs::try_exists(paths.compose_file()).await? {
            return Ok(());
        }
        info!(service = %context.record.name, "Stopping containers");
        let result = self
            .container
            .compose_down(paths.root(), &CancellationToken::new())
            .await;
        if !result.ok {
            return Err(StepError::toolchain(
                "docker compose down",
                result.exit_code,
                result.message(),
            ));
        }
        Ok(())
    }
}
