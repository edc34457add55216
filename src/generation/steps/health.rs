//! Step 10: wait for the database container to accept connections

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::core::Config;
use crate::generation::retry::{BackoffPolicy, PollOutcome, Sleeper, poll_with_backoff};
use crate::generation::steps::StepDependencies;
use crate::generation::{GenerationContext, GenerationStep, StepError};
use crate::infrastructure::ContainerToolchain;
use crate::registry::ServiceStatus;

pub struct CheckDependencyHealthStep {
    container: Arc<dyn ContainerToolchain>,
    sleeper: Arc<dyn Sleeper>,
    config: Arc<Config>,
}

impl CheckDependencyHealthStep {
    pub fn new(deps: &StepDependencies) -> Self {
        Self {
            container: Arc::clone(&deps.container),
            sleeper: Arc::clone(&deps.sleeper),
            config: Arc::clone(&deps.config),
        }
    }
}

#[async_trait]
impl GenerationStep for CheckDependencyHealthStep {
    fn name(&self) -> &str {
        "Check Dependency Health"
    }

    fn order(&self) -> u32 {
        10
    }

    fn failure_status(&self) -> ServiceStatus {
        ServiceStatus::StartFailed
    }

    async fn run(
        &self,
        context: &mut GenerationContext,
        cancel: &CancellationToken,
    ) -> Result<(), StepError> {
        let root = context.paths()?.root().to_path_buf();
        let name = context.record.name.as_str();
        let policy = BackoffPolicy::new(
            self.config.health.db_max_attempts,
            self.config.health.base_delay(),
        );
        info!(service = %name, max_attempts = policy.max_attempts, "Checking database health");

        let container = self.container.as_ref();
        let root = root.as_path();
        let outcome = poll_with_backoff(policy, self.sleeper.as_ref(), cancel, |attempt| async move {
            let result = container.check_dependency_health(root, name, cancel).await;
            if !result.ok {
                warn!(service = %name, attempt = attempt + 1, error = %result.message(), "Database not ready");
            }
            result.ok
        })
        .await;

        match outcome {
            PollOutcome::Ready { attempts } => {
                info!(service = %name, attempts, "Database is ready");
                Ok(())
            }
            PollOutcome::Cancelled { .. } => Err(StepError::Cancelled),
            PollOutcome::Exhausted { attempts } => Err(StepError::DependencyNotReady {
                dependency: "database".to_string(),
                attempts,
            }),
        }
    }
}
