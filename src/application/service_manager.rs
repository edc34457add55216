//! Facade over the pipeline, the registry and service removal

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::entity::EntityDefinition;
use crate::generation::{
    CleanupReport, GenerationOrchestrator, ServiceCleanup, StepDependencies, default_pipeline,
};
use crate::registry::{ServiceRecord, ServiceRegistry};

/// Entry point for everything a caller does with generated services.
pub struct ServiceManager {
    orchestrator: GenerationOrchestrator,
    registry: Arc<ServiceRegistry>,
    cleanup: ServiceCleanup,
}

impl ServiceManager {
    /// Assemble the default twelve-step pipeline over `deps`.
    pub fn new(deps: StepDependencies) -> Self {
        let orchestrator = GenerationOrchestrator::new(
            default_pipeline(&deps),
            deps.config.generation.max_concurrent,
            Arc::clone(&deps.registry),
        );
        let cleanup = ServiceCleanup::new(Arc::clone(&deps.registry), Arc::clone(&deps.container));
        Self {
            orchestrator,
            registry: deps.registry,
            cleanup,
        }
    }

    /// Generate, build and start a service for `entity`.
    pub async fn generate(
        &self,
        entity: EntityDefinition,
        cancel: &CancellationToken,
    ) -> ServiceRecord {
        info!(entity = %entity.name, "Generation requested");
        self.orchestrator.execute(entity, cancel).await
    }

    pub fn list(&self) -> Vec<ServiceRecord> {
        self.registry.get_all()
    }

    pub fn get(&self, name: &str) -> Option<ServiceRecord> {
        self.registry.get(name)
    }

    pub fn get_by_entity(&self, entity_name: &str) -> Vec<ServiceRecord> {
        self.registry.get_by_entity(entity_name)
    }

    /// Tear down and unregister `name`. Returns whether it was registered.
    pub async fn remove(&self, name: &str, keep_image: bool, cancel: &CancellationToken) -> bool {
        self.remove_with_report(name, keep_image, cancel)
            .await
            .registered
    }

    pub async fn remove_with_report(
        &self,
        name: &str,
        keep_image: bool,
        cancel: &CancellationToken,
    ) -> CleanupReport {
        self.cleanup.remove_service(name, keep_image, cancel).await
    }

    /// Step names in execution order
    pub fn pipeline(&self) -> Vec<&str> {
        self.orchestrator.step_names()
    }

    /// Wait for pending registry writes.
    pub async fn shutdown(&self) {
        self.registry.flush().await;
    }
}
