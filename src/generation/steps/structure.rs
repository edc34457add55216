//! Step 2: scaffold the solution and its four layer projects

use async_trait::async_trait;
use std::sync::Arc;
use tokio::fs;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::core::Config;
use crate::generation::steps::{StepDependencies, ensure_success, project_file};
use crate::generation::{GenerationContext, GenerationStep, StepError};
use crate::infrastructure::BuildToolchain;
use crate::registry::{Layer, ServiceStatus};

/// `(project, referenced project)` pairs wiring the layers together
const REFERENCES: &[(Layer, Layer)] = &[
    (Layer::Application, Layer::Domain),
    (Layer::Infrastructure, Layer::Domain),
    (Layer::Infrastructure, Layer::Application),
    (Layer::Api, Layer::Application),
    (Layer::Api, Layer::Infrastructure),
];

pub struct CreateStructureStep {
    build: Arc<dyn BuildToolchain>,
    config: Arc<Config>,
}

impl CreateStructureStep {
    pub fn new(deps: &StepDependencies) -> Self {
        Self {
            build: Arc::clone(&deps.build),
            config: Arc::clone(&deps.config),
        }
    }
}

#[async_trait]
impl GenerationStep for CreateStructureStep {
    fn name(&self) -> &str {
        "Create Structure"
    }

    fn order(&self) -> u32 {
        2
    }

    async fn run(
        &self,
        context: &mut GenerationContext,
        cancel: &CancellationToken,
    ) -> Result<(), StepError> {
        let paths = context.paths()?.clone();
        let root = paths.root();
        info!(service = %context.record.name, path = %root.display(), "Creating structure");
        fs::create_dir_all(root).await?;

        ensure_success(
            self.build
                .create_solution(root, &context.record.name, cancel)
                .await?,
            "create solution",
        )?;

        for layer in Layer::ALL {
            let project = paths.project_name(layer);
            let output = if layer == Layer::Api {
                self.build.create_service_project(root, &project, cancel).await?
            } else {
                self.build.create_library_project(root, &project, cancel).await?
            };
            ensure_success(output, &format!("create project {project}"))?;
        }

        ensure_success(
            self.build
                .add_package(
                    &paths.api(),
                    "Serilog.AspNetCore",
                    Some(self.config.toolchain.logging_package_version.as_str()),
                    cancel,
                )
                .await?,
            "add package Serilog.AspNetCore",
        )?;

        for layer in Layer::ALL {
            let file = project_file(&paths.layer(layer))?;
            ensure_success(
                self.build.add_project_to_solution(root, &file, cancel).await?,
                "add project to solution",
            )?;
        }

        for (from, to) in REFERENCES {
            let target = project_file(&paths.layer(*to))?;
            ensure_success(
                self.build
                    .add_project_reference(&paths.layer(*from), &target, cancel)
                    .await?,
                "add project reference",
            )?;
        }

        for layer in Layer::ALL {
            for placeholder in self.build.placeholder_files() {
                let file = paths.layer(layer).join(placeholder);
                if fs::try_exists(&file).await? {
                    fs::remove_file(&file).await?;
                    debug!(path = %file.display(), "Removed placeholder");
                }
            }
        }

        context.record.status = ServiceStatus::StructureCreated;
        Ok(())
    }

    async fn rollback(&self, context: &mut GenerationContext) -> Result<(), StepError> {
        let Some(paths) = &context.record.paths else {
            return Ok(());
        };
        if fs::try_exists(paths.root()).await? {
            info!(path = %paths.root().display(), "Deleting service directory");
            fs::remove_dir_all(paths.root()).await?;
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
    async fn test_missing_project_file_is_a_precondition_failure() {
        // The mock executor creates nothing, so no project file appears.
        let harness = harness(MockCommandExecutor::new(), true).await;
        let step = CreateStructureStep::new(&harness.deps);
        let mut context = initialized_context(&harness);

        let result = step.run(&mut context, &CancellationToken::new()).await;
        assert!(matches!(result, Err(StepError::Precondition(_))));

        let lines = harness.executor.command_lines();
        assert_eq!(lines[0], "dotnet new sln -n InvoiceService");
        assert!(lines[4].starts_with("dotnet new webapi -n InvoiceService.Api"));

        let root = context.paths().unwrap().root().to_path_buf();
        assert!(root.exists());
        step.rollback(&mut context).await.unwrap();
        assert!(!root.exists());
    }

    #[tokio::test]
    async fn test_failed_solution_stops_scaffolding() {
        let harness = harness(
            MockCommandExecutor::new().with_result(
                "dotnet new sln -n InvoiceService",
                1,
                "",
                "template not found",
            ),
            true,
        )
        .await;
        let step = CreateStructureStep::new(&harness.deps);
        let mut context = initialized_context(&harness);

        let error = step
            .run(&mut context, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(error.to_string().contains("template not found"));
        assert_eq!(harness.executor.command_lines().len(), 1);
    }

    #[tokio::test]
    async fn test_rollback_without_paths_is_noop() {
        let harness = harness(MockCommandExecutor::new(), true).await;
        let step = CreateStructureStep::new(&harness.deps);
        let mut context = initialized_context(&harness);
        context.record.paths = None;
        step.rollback(&mut context).await.unwrap();
    }
}
