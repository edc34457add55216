//! Per-layer artifact plans and the writer that renders them to disk
//!
//! Every artifact carries a [`WritePolicy`]. Regenerated files are rewritten on
//! each run; seed-once files are the hand-editable halves of partial classes
//! and are only written when absent.

use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::entity::EntityDefinition;
use crate::generation::StepError;
use crate::generation::model::RenderModel;
use crate::infrastructure::TemplateEngine;
use crate::registry::{Layer, ServicePaths};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePolicy {
    /// Overwrite on every run
    Regenerate,
    /// Write only if the file does not exist yet
    SeedOnce,
}

/// One file to render: template, destination relative to the service root,
/// write policy and any per-artifact template variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub template_id: &'static str,
    pub relative_path: PathBuf,
    pub policy: WritePolicy,
    pub variables: Vec<(&'static str, Value)>,
}

impl Artifact {
    fn new(template_id: &'static str, relative_path: impl Into<PathBuf>) -> Self {
        Self {
            template_id,
            relative_path: relative_path.into(),
            policy: WritePolicy::Regenerate,
            variables: Vec::new(),
        }
    }

    fn seed_once(mut self) -> Self {
        self.policy = WritePolicy::SeedOnce;
        self
    }

    fn with(mut self, key: &'static str, value: Value) -> Self {
        self.variables.push((key, value));
        self
    }
}

/// Files written or left alone by one [`write_artifacts`] call
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WriteSummary {
    pub written: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
}

/// Project package added by a layer generation step: `(name, version)`
pub type PackageRef = (&'static str, Option<&'static str>);

pub fn domain_plan(entity: &EntityDefinition, paths: &ServicePaths) -> Vec<Artifact> {
    let project = PathBuf::from(paths.project_name(Layer::Domain));
    let name = &entity.name;
    let mut plan = vec![
        Artifact::new("domain/aggregate.g", project.join(format!("Aggregates/{name}.g.cs"))),
        Artifact::new("domain/aggregate", project.join(format!("Aggregates/{name}.cs"))).seed_once(),
        Artifact::new(
            "domain/repository_interface",
            project.join(format!("Repositories/I{name}Repository.cs")),
        ),
    ];
    for field in entity.value_object_fields() {
        plan.push(
            Artifact::new(
                "domain/value_object",
                project.join(format!("ValueObjects/{}VO.cs", field.name)),
            )
            .with("field", RenderModel::field(field)),
        );
    }
    if entity.has_searchable_fields() {
        plan.push(Artifact::new(
            "domain/filter",
            project.join(format!("Search/{name}Filter.cs")),
        ));
    }
    plan
}

pub fn application_plan(entity: &EntityDefinition, paths: &ServicePaths) -> Vec<Artifact> {
    let project = PathBuf::from(paths.project_name(Layer::Application));
    let name = &entity.name;
    let plural = entity.plural();
    let mut plan = vec![
        Artifact::new("application/create_dto", project.join(format!("DTOs/Create{name}Dto.cs"))),
        Artifact::new("application/update_dto", project.join(format!("DTOs/Update{name}Dto.cs"))),
        Artifact::new("application/show_dto", project.join(format!("DTOs/Show{name}Dto.cs"))),
        Artifact::new("application/paged_result", project.join("DTOs/PagedResultDto.cs")).seed_once(),
        Artifact::new("application/mapper", project.join(format!("Mappers/{name}Mapper.cs"))),
    ];

    for action in ["Create", "Update", "Delete"] {
        plan.push(
            Artifact::new(
                "application/command.g",
                project.join(format!("UseCases/{action}{name}.g.cs")),
            )
            .with("action", json!(action)),
        );
        plan.push(
            Artifact::new(
                "application/command",
                project.join(format!("UseCases/{action}{name}.cs")),
            )
            .seed_once()
            .with("action", json!(action)),
        );
    }

    plan.push(Artifact::new(
        "application/get_by_id",
        project.join(format!("UseCases/Get{name}ById.cs")),
    ));
    for field in entity.unique_fields() {
        plan.push(
            Artifact::new(
                "application/get_by_unique",
                project.join(format!("UseCases/Get{name}By{}.cs", field.name)),
            )
            .with("field", RenderModel::field(field)),
        );
    }
    plan.push(Artifact::new(
        "application/get_all",
        project.join(format!("UseCases/GetAll{plural}.cs")),
    ));

    if entity.has_searchable_fields() {
        plan.push(Artifact::new(
            "application/filter_dto",
            project.join(format!("DTOs/Search/{name}FilterDto.cs")),
        ));
        plan.push(Artifact::new(
            "application/search",
            project.join(format!("UseCases/Search{plural}.cs")),
        ));
    }
    plan
}

pub fn infrastructure_plan(entity: &EntityDefinition, paths: &ServicePaths) -> Vec<Artifact> {
    let project = PathBuf::from(paths.project_name(Layer::Infrastructure));
    vec![
        Artifact::new(
            "infrastructure/connection_factory_interface",
            project.join("Data/IDbConnectionFactory.cs"),
        ),
        Artifact::new(
            "infrastructure/connection_factory",
            project.join("Data/NpgsqlConnectionFactory.cs"),
        ),
        Artifact::new(
            "infrastructure/repository",
            project.join(format!("Repositories/{}Repository.cs", entity.name)),
        ),
        Artifact::new("infrastructure/create_table", project.join("Sql/create_table.sql")),
        Artifact::new("infrastructure/create_indexes", project.join("Sql/create_indexes.sql")),
        Artifact::new("infrastructure/db_initializer", project.join("Data/DbInitializer.cs")),
    ]
}

/// Packages the infrastructure project needs
pub fn infrastructure_packages() -> Vec<PackageRef> {
    vec![
        ("Dapper", None),
        ("Npgsql", None),
        ("Polly", None),
        ("Microsoft.Extensions.Configuration.Abstractions", None),
        ("Microsoft.Extensions.Logging.Abstractions", None),
    ]
}

pub fn api_plan(entity: &EntityDefinition, paths: &ServicePaths) -> Vec<Artifact> {
    let project = PathBuf::from(paths.project_name(Layer::Api));
    vec![
        Artifact::new(
            "api/controller",
            project.join(format!("Controllers/{}Controller.cs", entity.plural())),
        ),
        Artifact::new(
            "api/correlation_middleware",
            project.join("Middleware/CorrelationIdMiddleware.cs"),
        ),
        Artifact::new(
            "api/database_initializer",
            project.join("Hosting/DatabaseInitializerService.cs"),
        ),
        Artifact::new("api/program", project.join("Program.cs")),
        Artifact::new("api/dockerfile", project.join("Dockerfile")),
        Artifact::new("api/appsettings", project.join("appsettings.json")),
        Artifact::new("api/compose", "docker-compose.yml"),
    ]
}

/// Packages the API project needs
pub fn api_packages() -> Vec<PackageRef> {
    vec![
        ("Npgsql", None),
        ("Polly", None),
        ("Dapper", None),
        ("AspNetCore.HealthChecks.NpgSql", None),
    ]
}

/// Render `artifacts` against `model` and write them under `root`.
pub async fn write_artifacts(
    engine: &dyn TemplateEngine,
    model: &RenderModel,
    root: &Path,
    artifacts: &[Artifact],
) -> Result<WriteSummary, StepError> {
    let mut summary = WriteSummary::default();
    for artifact in artifacts {
        let path = root.join(&artifact.relative_path);
        if artifact.policy == WritePolicy::SeedOnce && fs::try_exists(&path).await? {
            debug!(path = %path.display(), "Keeping existing partial file");
            summary.skipped.push(path);
            continue;
        }

        let mut variables = model.as_value().clone();
        if let Value::Object(map) = &mut variables {
            for (key, value) in &artifact.variables {
                map.insert((*key).to_string(), value.clone());
            }
        }
        let content = engine.render(artifact.template_id, &variables)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut file = fs::File::create(&path).await?;
        file.write_all(content.as_bytes()).await?;
        file.flush().await?;
        debug!(path = %path.display(), template = artifact.template_id, "Wrote artifact");
        summary.written.push(path);
    }
    info!(
        written = summary.written.len(),
        skipped = summary.skipped.len(),
        "Artifacts written"
    );
    Ok(summary)
}
