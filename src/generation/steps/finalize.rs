//! Step 12: mark the service running and persist it

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::generation::steps::StepDependencies;
use crate::generation::{GenerationContext, GenerationStep, StepError};
use crate::registry::{ServiceRegistry, ServiceStatus};

pub struct FinalizeStep {
    registry: Arc<ServiceRegistry>,
}

impl FinalizeStep {
    pub fn new(deps: &StepDependencies) -> Self {
        Self {
            registry: Arc::clone(&deps.registry),
        }
    }
}

#[async_trait]
impl GenerationStep for FinalizeStep {
    fn name(&self) -> &str {
        "Finalize"
    }

    fn order(&self) -> u32 {
        12
    }

    async fn run(
        &self,
        context: &mut GenerationContext,
        _cancel: &CancellationToken,
    ) -> Result<(), StepError> {
        context.record.status = ServiceStatus::Running;
        self.registry.upsert(&context.record);
        // The registered record now holds the ports.
        if let Some((app_port, db_port)) = context.record.ports() {
            self.registry.release_ports(app_port, db_port);
        }
        info!(
            service = %context.record.name,
            url = %context.record.url,
            version = context.record.version,
            "Service is running"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::steps::test_support::{harness, initialized_context};
    use crate::infrastructure::shell::command_executor::MockCommandExecutor;

    #[tokio::test]
    async fn test_finalize_registers_running_service() {
        let harness = harness(MockCommandExecutor::new(), true).await;
        let registry = Arc::clone(&harness.deps.registry);
        registry.reserve_ports(5100, 5432);
        let step = FinalizeStep::new(&harness.deps);
        let mut context = initialized_context(&harness);

        step.run(&mut context, &CancellationToken::new()).await.unwrap();

        let stored = registry.get("InvoiceService").unwrap();
        assert_eq!(stored.status, ServiceStatus::Running);
        assert!(registry.reserved_ports().is_empty());
        assert!(registry.used_ports().contains(&5100));
        assert!(registry.used_ports().contains(&5432));
    }
}
