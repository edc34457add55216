//! The twelve pipeline steps and the default pipeline that assembles them

pub mod compile;
pub mod container;
pub mod finalize;
pub mod health;
pub mod image;
pub mod initialize;
pub mod layers;
pub mod smoke;
pub mod structure;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::Config;
use crate::generation::StepError;
use crate::generation::retry::Sleeper;
use crate::generation::step::GenerationStep;
use crate::infrastructure::{
    BuildOutput, BuildToolchain, ContainerToolchain, SmokeTester, TemplateEngine, find_project_file,
};
use crate::registry::{Layer, ServiceRegistry};

pub use compile::BuildProjectStep;
pub use container::RunContainerStep;
pub use finalize::FinalizeStep;
pub use health::CheckDependencyHealthStep;
pub use image::BuildImageStep;
pub use initialize::InitializeStep;
pub use layers::GenerateLayerStep;
pub use smoke::SmokeTestStep;
pub use structure::CreateStructureStep;

/// Collaborators shared by the steps
#[derive(Clone)]
pub struct StepDependencies {
    pub registry: Arc<ServiceRegistry>,
    pub build: Arc<dyn BuildToolchain>,
    pub container: Arc<dyn ContainerToolchain>,
    pub templates: Arc<dyn TemplateEngine>,
    pub smoke: Arc<dyn SmokeTester>,
    pub sleeper: Arc<dyn Sleeper>,
    pub config: Arc<Config>,
}

/// All twelve steps in pipeline order.
pub fn default_pipeline(deps: &StepDependencies) -> Vec<Arc<dyn GenerationStep>> {
    vec![
        Arc::new(InitializeStep::new(deps)),
        Arc::new(CreateStructureStep::new(deps)),
        Arc::new(GenerateLayerStep::new(Layer::Domain, deps)),
        Arc::new(GenerateLayerStep::new(Layer::Application, deps)),
        Arc::new(GenerateLayerStep::new(Layer::Infrastructure, deps)),
        Arc::new(GenerateLayerStep::new(Layer::Api, deps)),
        Arc::new(BuildProjectStep::new(deps)),
        Arc::new(BuildImageStep::new(deps)),
        Arc::new(RunContainerStep::new(deps)),
        Arc::new(CheckDependencyHealthStep::new(deps)),
        Arc::new(SmokeTestStep::new(deps)),
        Arc::new(FinalizeStep::new(deps)),
    ]
}

/// Turn an unsuccessful toolchain result into a step error.
pub(crate) fn ensure_success(output: BuildOutput, operation: &str) -> Result<BuildOutput, StepError> {
    if output.ok {
        return Ok(output);
    }
    let detail = if output.stderr.is_empty() {
        output.stdout
    } else {
        output.stderr
    };
    Err(StepError::toolchain(operation, output.exit_code, detail))
}

/// The project file of a layer directory.
pub(crate) fn project_file(dir: &Path) -> Result<PathBuf, StepError> {
    find_project_file(dir).ok_or_else(|| {
        StepError::Precondition(format!("no project file in {}", dir.display()))
    })
}
