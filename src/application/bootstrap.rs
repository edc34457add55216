//! Composition root: wires the real adapters into a [`ServiceManager`]

use std::sync::Arc;
use tracing::{info, warn};

use crate::application::ServiceManager;
use crate::core::{Config, Result};
use crate::generation::{StepDependencies, TokioSleeper};
use crate::infrastructure::{
    DockerToolchain, DotnetToolchain, HttpSmokeTester, ShellCommandExecutor, TeraTemplateEngine,
};
use crate::registry::{MemoryRegistryStore, RegistryStore, ServiceRegistry, SqliteRegistryStore};

/// Where the registry keeps its entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegistryBackend {
    #[default]
    Sqlite,
    /// Nothing outlives the process
    Memory,
}

/// Build a [`ServiceManager`] from `config`.
pub async fn build(config: Config, backend: RegistryBackend) -> Result<ServiceManager> {
    config.validate()?;

    let store: Arc<dyn RegistryStore> = match backend {
        RegistryBackend::Sqlite => {
            let path = &config.registry.database_path;
            info!(path = %path.display(), "Opening registry store");
            Arc::new(SqliteRegistryStore::open(path).await?)
        }
        RegistryBackend::Memory => {
            warn!("Using an in-memory registry, services will not be remembered");
            Arc::new(MemoryRegistryStore::new())
        }
    };
    let registry = Arc::new(ServiceRegistry::load(store).await);

    let mut templates = TeraTemplateEngine::embedded()?;
    if let Some(dir) = &config.generation.templates_dir {
        templates = templates.with_overrides(dir)?;
    }

    let executor = Arc::new(ShellCommandExecutor::new());
    let sleeper = Arc::new(TokioSleeper);
    let smoke = HttpSmokeTester::new(config.health.http_timeout(), config.health.base_delay())?
        .with_sleeper(sleeper.clone());

    let deps = StepDependencies {
        registry,
        build: Arc::new(DotnetToolchain::new(
            executor.clone(),
            &config.toolchain,
            &config.timeouts,
        )),
        container: Arc::new(DockerToolchain::new(
            executor,
            &config.toolchain,
            &config.timeouts,
        )),
        templates: Arc::new(templates),
        smoke: Arc::new(smoke),
        sleeper,
        config: Arc::new(config),
    };
    Ok(ServiceManager::new(deps))
}
