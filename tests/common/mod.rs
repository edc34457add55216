//! Shared fixtures for pipeline integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use servicegen::application::ServiceManager;
use servicegen::core::Config;
use servicegen::entity::{EntityDefinition, FieldDefinition, TypeCatalog};
use servicegen::generation::{Sleeper, StepDependencies};
use servicegen::infrastructure::{
    BuildOutput, BuildToolchain, CommandOutput, ContainerToolchain, CrudReport, SmokeTester,
    TeraTemplateEngine, ToolchainError,
};
use servicegen::registry::{MemoryRegistryStore, ServiceRegistry};

/// Build toolchain that lays out solution and project files without running anything
#[derive(Default)]
pub struct StubBuild {
    pub commands: Mutex<Vec<String>>,
    pub fail_build: bool,
}

impl StubBuild {
    fn record(&self, command: String) {
        self.commands.lock().unwrap().push(command);
    }

    fn create_project(&self, dir: &Path, name: &str) -> Result<BuildOutput, ToolchainError> {
        let project_dir = dir.join(name);
        std::fs::create_dir_all(&project_dir)?;
        let project_file = project_dir.join(format!("{name}.csproj"));
        if !project_file.exists() {
            std::fs::write(&project_file, "<Project Sdk=\"Microsoft.NET.Sdk\" />")?;
            std::fs::write(project_dir.join("Class1.cs"), "// placeholder")?;
        }
        self.record(format!("new {name}"));
        Ok(BuildOutput::skipped())
    }
}

#[async_trait]
impl BuildToolchain for StubBuild {
    async fn create_solution(
        &self,
        dir: &Path,
        name: &str,
        _cancel: &CancellationToken,
    ) -> Result<BuildOutput, ToolchainError> {
        std::fs::write(dir.join(format!("{name}.sln")), "")?;
        self.record(format!("new sln {name}"));
        Ok(BuildOutput::skipped())
    }

    async fn create_library_project(
        &self,
        dir: &Path,
        name: &str,
        _cancel: &CancellationToken,
    ) -> Result<BuildOutput, ToolchainError> {
        self.create_project(dir, name)
    }

    async fn create_service_project(
        &self,
        dir: &Path,
        name: &str,
        _cancel: &CancellationToken,
    ) -> Result<BuildOutput, ToolchainError> {
        self.create_project(dir, name)
    }

    async fn add_project_to_solution(
        &self,
        _solution_dir: &Path,
        _project_file: &Path,
        _cancel: &CancellationToken,
    ) -> Result<BuildOutput, ToolchainError> {
        Ok(BuildOutput::skipped())
    }

    async fn add_project_reference(
        &self,
        _project_dir: &Path,
        _target_project_file: &Path,
        _cancel: &CancellationToken,
    ) -> Result<BuildOutput, ToolchainError> {
        Ok(BuildOutput::skipped())
    }

    async fn add_package(
        &self,
        _project_dir: &Path,
        package: &str,
        _version: Option<&str>,
        _cancel: &CancellationToken,
    ) -> Result<BuildOutput, ToolchainError> {
        self.record(format!("add package {package}"));
        Ok(BuildOutput::skipped())
    }

    async fn build(
        &self,
        path: &Path,
        _cancel: &CancellationToken,
    ) -> Result<BuildOutput, ToolchainError> {
        self.record(format!("build {}", path.display()));
        Ok(BuildOutput {
            ok: !self.fail_build,
            stdout: String::new(),
            stderr: if self.fail_build {
                "error CS0246".to_string()
            } else {
                String::new()
            },
            exit_code: i32::from(self.fail_build),
        })
    }
}

/// Container toolchain that tracks images and stacks in memory
#[derive(Default)]
pub struct StubContainer {
    pub calls: Mutex<Vec<String>>,
    pub images: Mutex<Vec<String>>,
    pub fail_image_build: bool,
    /// Database probes that fail before the first success
    pub db_failures: u32,
    pub db_probes: AtomicU32,
}

impl StubContainer {
    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn images(&self) -> Vec<String> {
        self.images.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContainerToolchain for StubContainer {
    async fn build_image(
        &self,
        _root: &Path,
        context_dir: &str,
        tag: &str,
        _cancel: &CancellationToken,
    ) -> CommandOutput {
        self.record(format!("build {tag} {context_dir}"));
        if self.fail_image_build {
            return CommandOutput {
                exit_code: 1,
                ..CommandOutput::failure("failed to solve: dockerfile parse error")
            };
        }
        self.images.lock().unwrap().push(tag.to_string());
        CommandOutput::success("")
    }

    async fn compose_up(
        &self,
        _root: &Path,
        service_name: &str,
        app_port: u16,
        db_port: u16,
        _cancel: &CancellationToken,
    ) -> CommandOutput {
        self.record(format!("up {service_name} {app_port} {db_port}"));
        CommandOutput::success("c0ffee")
    }

    async fn compose_down(&self, root: &Path, _cancel: &CancellationToken) -> CommandOutput {
        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.record(format!("down {name}"));
        CommandOutput::success("")
    }

    async fn remove_image(&self, tag: &str, _cancel: &CancellationToken) -> CommandOutput {
        self.record(format!("rmi {tag}"));
        self.images.lock().unwrap().retain(|t| t != tag);
        CommandOutput::success("")
    }

    async fn image_exists(&self, tag: &str, _cancel: &CancellationToken) -> bool {
        self.images.lock().unwrap().iter().any(|t| t == tag)
    }

    async fn check_dependency_health(
        &self,
        _root: &Path,
        _service_name: &str,
        _cancel: &CancellationToken,
    ) -> CommandOutput {
        let probe = self.db_probes.fetch_add(1, Ordering::SeqCst);
        if probe < self.db_failures {
            CommandOutput::failure("no response")
        } else {
            CommandOutput::success("accepting connections")
        }
    }
}

/// Smoke tester that always reports a healthy service
#[derive(Default)]
pub struct HealthySmoke {
    pub urls: Mutex<Vec<String>>,
}

#[async_trait]
impl SmokeTester for HealthySmoke {
    async fn check_health(&self, url: &str, _max_attempts: u32, _cancel: &CancellationToken) -> bool {
        self.urls.lock().unwrap().push(url.to_string());
        true
    }

    async fn run_crud_checks(
        &self,
        _base_url: &str,
        _entity: &EntityDefinition,
        _cancel: &CancellationToken,
    ) -> CrudReport {
        CrudReport::default()
    }
}

/// Sleeper that records delays instead of waiting
#[derive(Default)]
pub struct RecordingSleeper {
    pub delays: Mutex<Vec<Duration>>,
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration, cancel: &CancellationToken) -> bool {
        self.delays.lock().unwrap().push(duration);
        !cancel.is_cancelled()
    }
}

pub struct Pipeline {
    pub manager: ServiceManager,
    pub registry: Arc<ServiceRegistry>,
    pub build: Arc<StubBuild>,
    pub container: Arc<StubContainer>,
    pub sleeper: Arc<RecordingSleeper>,
    pub output: TempDir,
}

impl Pipeline {
    pub fn service_root(&self, name: &str) -> PathBuf {
        self.output.path().join(name)
    }
}

/// Full twelve-step pipeline against stub toolchains and a temp output directory.
pub async fn pipeline(build: StubBuild, container: StubContainer) -> Pipeline {
    let output = TempDir::new().unwrap();
    let mut config = Config::default();
    config.generation.output_root = output.path().to_path_buf();
    config.health.base_delay_ms = 100;
    config.health.warmup_ms = 0;

    let registry = Arc::new(ServiceRegistry::load(Arc::new(MemoryRegistryStore::new())).await);
    let build = Arc::new(build);
    let container = Arc::new(container);
    let sleeper = Arc::new(RecordingSleeper::default());

    let deps = StepDependencies {
        registry: Arc::clone(&registry),
        build: build.clone(),
        container: container.clone(),
        templates: Arc::new(TeraTemplateEngine::embedded().unwrap()),
        smoke: Arc::new(HealthySmoke::default()),
        sleeper: sleeper.clone(),
        config: Arc::new(config),
    };

    Pipeline {
        manager: ServiceManager::new(deps),
        registry,
        build,
        container,
        sleeper,
        output,
    }
}

pub fn invoice() -> EntityDefinition {
    let types = TypeCatalog::builtin();
    EntityDefinition::new("Invoice")
        .with_field(
            FieldDefinition::new("Number", types.resolve("string").unwrap())
                .required()
                .unique()
                .searchable(),
        )
        .with_field(FieldDefinition::new("Amount", types.resolve("decimal").unwrap()).required())
        .with_field(FieldDefinition::new("CustomerEmail", types.resolve("email").unwrap()))
}

pub fn entity(name: &str) -> EntityDefinition {
    let types = TypeCatalog::builtin();
    EntityDefinition::new(name)
        .with_field(FieldDefinition::new("Title", types.resolve("string").unwrap()).required())
}
