//! Steps 3-6: render the source of one architectural layer

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::core::Config;
use crate::generation::artifacts::{
    Artifact, PackageRef, api_packages, api_plan, application_plan, domain_plan,
    infrastructure_packages, infrastructure_plan, write_artifacts,
};
use crate::generation::model::RenderModel;
use crate::generation::steps::{StepDependencies, ensure_success};
use crate::generation::{GenerationContext, GenerationStep, StepError};
use crate::infrastructure::{BuildToolchain, TemplateEngine};
use crate::registry::Layer;

/// Renders the artifacts of `layer` and adds the packages that layer needs.
///
/// Files the layer writes are removed together with the service directory
/// when the structure step rolls back, so there is no rollback here.
pub struct GenerateLayerStep {
    layer: Layer,
    name: String,
    templates: Arc<dyn TemplateEngine>,
    build: Arc<dyn BuildToolchain>,
    config: Arc<Config>,
}

impl GenerateLayerStep {
    pub fn new(layer: Layer, deps: &StepDependencies) -> Self {
        Self {
            layer,
            name: format!("Generate {}", layer.suffix()),
            templates: Arc::clone(&deps.templates),
            build: Arc::clone(&deps.build),
            config: Arc::clone(&deps.config),
        }
    }

    fn packages(&self) -> Vec<PackageRef> {
        match self.layer {
            Layer::Infrastructure => infrastructure_packages(),
            Layer::Api => api_packages(),
            Layer::Domain | Layer::Application => Vec::new(),
        }
    }
}

#[async_trait]
impl GenerationStep for GenerateLayerStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn order(&self) -> u32 {
        match self.layer {
            Layer::Domain => 3,
            Layer::Application => 4,
            Layer::Infrastructure => 5,
            Layer::Api => 6,
        }
    }

    async fn run(
        &self,
        context: &mut GenerationContext,
        cancel: &CancellationToken,
    ) -> Result<(), StepError> {
        let paths = context.paths()?.clone();
        info!(
            service = %context.record.name,
            layer = self.layer.suffix(),
            "Generating layer"
        );

        let plan: Vec<Artifact> = match self.layer {
            Layer::Domain => domain_plan(&context.entity, &paths),
            Layer::Application => application_plan(&context.entity, &paths),
            Layer::Infrastructure => infrastructure_plan(&context.entity, &paths),
            Layer::Api => api_plan(&context.entity, &paths),
        };
        let model = RenderModel::new(
            &context.entity,
            &context.record,
            &self.config.toolchain.target_framework,
        );
        write_artifacts(self.templates.as_ref(), &model, paths.root(), &plan).await?;

        let project_dir = paths.layer(self.layer);
        for (package, version) in self.packages() {
            ensure_success(
                self.build
                    .add_package(&project_dir, package, version, cancel)
                    .await?,
                &format!("add package {package}"),
            )?;
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
    async fn test_infrastructure_layer_writes_and_adds_packages() {
        let harness = harness(MockCommandExecutor::new(), true).await;
        let step = GenerateLayerStep::new(Layer::Infrastructure, &harness.deps);
        let mut context = initialized_context(&harness);
        let project_dir = context.paths().unwrap().infrastructure();
        std::fs::create_dir_all(&project_dir).unwrap();
        std::fs::write(
            project_dir.join("InvoiceService.Infrastructure.csproj"),
            "<Project />",
        )
        .unwrap();

        step.run(&mut context, &CancellationToken::new()).await.unwrap();

        assert!(project_dir.join("Repositories/InvoiceRepository.cs").is_file());
        assert!(project_dir.join("Data/DbInitializer.cs").is_file());
        let lines = harness.executor.command_lines();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], "dotnet add package Dapper");
    }

    #[tokio::test]
    async fn test_layer_without_paths_fails() {
        let harness = harness(MockCommandExecutor::new(), true).await;
        let step = GenerateLayerStep::new(Layer::Domain, &harness.deps);
        let mut context = initialized_context(&harness);
        context.record.paths = None;

        let result = step.run(&mut context, &CancellationToken::new()).await;
        assert!(matches!(result, Err(StepError::Precondition(_))));
        assert_eq!(step.order(), 3);
    }
}
