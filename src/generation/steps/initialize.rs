//! Step 1: version, ports, image tag and paths

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::core::Config;
use crate::generation::steps::StepDependencies;
use crate::generation::{GenerationContext, GenerationStep, StepError};
use crate::registry::{ServicePaths, ServiceRegistry, ServiceStatus};

pub struct InitializeStep {
    registry: Arc<ServiceRegistry>,
    config: Arc<Config>,
}

impl InitializeStep {
    pub fn new(deps: &StepDependencies) -> Self {
        Self {
            registry: Arc::clone(&deps.registry),
            config: Arc::clone(&deps.config),
        }
    }
}

#[async_trait]
impl GenerationStep for InitializeStep {
    fn name(&self) -> &str {
        "Initialize"
    }

    fn order(&self) -> u32 {
        1
    }

    async fn run(
        &self,
        context: &mut GenerationContext,
        _cancel: &CancellationToken,
    ) -> Result<(), StepError> {
        let name = context.record.name.clone();
        let version = self.registry.next_version(&name);
        let (app_port, db_port) = self
            .registry
            .allocate_ports(self.config.ports.app_range(), self.config.ports.db_range());

        let record = &mut context.record;
        record.assign(version, app_port, db_port);
        record.status = ServiceStatus::Initializing;
        record.created_at = Utc::now();
        record.paths = Some(ServicePaths::new(
            self.config.generation.output_root.join(&name),
        ));

        info!(
            service = %name,
            version,
            app_port,
            db_port,
            image_tag = %record.image_tag,
            "Initialized service"
        );
        Ok(())
    }

    async fn rollback(&self, context: &mut GenerationContext) -> Result<(), StepError> {
        if let Some((app_port, db_port)) = context.record.ports() {
            self.registry.release_ports(app_port, db_port);
            info!(service = %context.record.name, app_port, db_port, "Released ports");
        }
        Ok(())
    }
}
