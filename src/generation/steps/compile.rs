//! Step 7: compile the generated solution

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::generation::steps::{StepDependencies, ensure_success};
use crate::generation::{GenerationContext, GenerationStep, StepError};
use crate::infrastructure::BuildToolchain;
use crate::registry::{ServiceRegistry, ServiceStatus};

pub struct BuildProjectStep {
    build: Arc<dyn BuildToolchain>,
    registry: Arc<ServiceRegistry>,
}

impl BuildProjectStep {
    pub fn new(deps: &StepDependencies) -> Self {
        Self {
            build: Arc::clone(&deps.build),
            registry: Arc::clone(&deps.registry),
        }
    }
}

#[async_trait]
impl GenerationStep for BuildProjectStep {
    fn name(&self) -> &str {
        "Build Project"
    }

    fn order(&self) -> u32 {
        7
    }

    fn failure_status(&self) -> ServiceStatus {
        ServiceStatus::BuildFailed
    }

    async fn run(
        &self,
        context: &mut GenerationContext,
        cancel: &CancellationToken,
    ) -> Result<(), StepError> {
        let root = context.paths()?.root().to_path_buf();
        context.record.status = ServiceStatus::Building;
        self.registry.upsert(&context.record);

        let output = self.build.build(&root, cancel).await?;
        if !output.ok {
            error!(
                service = %context.record.name,
                stdout = %output.stdout,
                stderr = %output.stderr,
                "Compilation failed"
            );
        }
        ensure_success(output, "dotnet build")?;
        info!(service = %context.record.name, "Compilation succeeded");
        Ok(())
    }
}
