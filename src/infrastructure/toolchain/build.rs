//! Build toolchain: creates and compiles the generated multi-project solution

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::core::config::{TimeoutSettings, ToolchainSettings};
use crate::infrastructure::ToolchainError;
use crate::infrastructure::shell::{CommandExecutor, CommandResult, CommandSpec};

/// Files the project templates create that the generated service replaces.
pub const PLACEHOLDER_FILES: &[&str] = &[
    "Class1.cs",
    "WeatherForecast.cs",
    "Controllers/WeatherForecastController.cs",
    "Properties/launchSettings.json",
];

/// Outcome of one toolchain invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOutput {
    pub ok: bool,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl BuildOutput {
    /// The target already existed, nothing was run
    pub fn skipped() -> Self {
        Self {
            ok: true,
            ..Self::default()
        }
    }
}

impl From<CommandResult> for BuildOutput {
    fn from(result: CommandResult) -> Self {
        Self {
            ok: result.is_success(),
            stdout: result.stdout.trim().to_string(),
            stderr: result.stderr.trim().to_string(),
            exit_code: result.exit_code,
        }
    }
}

/// Creates, wires and compiles the projects of a generated service.
///
/// Creation operations skip work that is already done, so scaffolding an
/// existing service tree is safe.
#[async_trait]
pub trait BuildToolchain: Send + Sync {
    /// Create `<dir>/<name>.sln` unless it exists.
    async fn create_solution(
        &self,
        dir: &Path,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<BuildOutput, ToolchainError>;

    /// Create the class library `<dir>/<name>` unless it already has a project file.
    async fn create_library_project(
        &self,
        dir: &Path,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<BuildOutput, ToolchainError>;

    /// Create the web service project `<dir>/<name>` unless it already has a project file.
    async fn create_service_project(
        &self,
        dir: &Path,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<BuildOutput, ToolchainError>;

    async fn add_project_to_solution(
        &self,
        solution_dir: &Path,
        project_file: &Path,
        cancel: &CancellationToken,
    ) -> Result<BuildOutput, ToolchainError>;

    /// Make the project in `project_dir` reference `target_project_file`.
    async fn add_project_reference(
        &self,
        project_dir: &Path,
        target_project_file: &Path,
        cancel: &CancellationToken,
    ) -> Result<BuildOutput, ToolchainError>;

    async fn add_package(
        &self,
        project_dir: &Path,
        package: &str,
        version: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<BuildOutput, ToolchainError>;

    /// Compile the solution rooted at `path`.
    async fn build(
        &self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<BuildOutput, ToolchainError>;

    /// Paths, relative to a project directory, of generated placeholder files
    fn placeholder_files(&self) -> &[&str] {
        PLACEHOLDER_FILES
    }
}

/// First `*.csproj` directly inside `dir`
pub fn find_project_file(dir: &Path) -> Option<PathBuf> {
    let mut projects: Vec<PathBuf> = std::fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "csproj"))
        .collect();
    projects.sort();
    projects.into_iter().next()
}

fn find_solution_file(dir: &Path) -> Option<PathBuf> {
    std::fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .find(|p| p.extension().is_some_and(|ext| ext == "sln"))
}

/// Whether the text of `file` mentions the file name of `target`
fn file_mentions(file: &Path, target: &Path) -> bool {
    let Some(target_name) = target.file_name().map(|n| n.to_string_lossy().to_lowercase()) else {
        return false;
    };
    std::fs::read_to_string(file)
        .map(|text| text.to_lowercase().contains(&target_name))
        .unwrap_or(false)
}

/// `dotnet` CLI implementation.
pub struct DotnetToolchain {
    executor: Arc<dyn CommandExecutor>,
    program: String,
    target_framework: String,
    scaffold_timeout: Duration,
    compile_timeout: Duration,
}

impl DotnetToolchain {
    pub fn new(
        executor: Arc<dyn CommandExecutor>,
        settings: &ToolchainSettings,
        timeouts: &TimeoutSettings,
    ) -> Self {
        Self {
            executor,
            program: settings.dotnet.clone(),
            target_framework: settings.target_framework.clone(),
            scaffold_timeout: Duration::from_secs(timeouts.scaffold),
            compile_timeout: Duration::from_secs(timeouts.compile),
        }
    }

    async fn run(
        &self,
        args: Vec<String>,
        working_dir: &Path,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<BuildOutput, ToolchainError> {
        let spec = CommandSpec::new(&self.program)
            .args(args)
            .current_dir(working_dir)
            .timeout(timeout);
        info!(command = %spec.command_line(), "dotnet");

        let output = BuildOutput::from(self.executor.execute(&spec, cancel).await?);
        if !output.ok {
            error!(
                command = %spec.command_line(),
                exit_code = output.exit_code,
                stderr = %output.stderr,
                "dotnet command failed"
            );
        }
        Ok(output)
    }

    async fn create_project(
        &self,
        template: &str,
        dir: &Path,
        name: &str,
        extra: &[&str],
        cancel: &CancellationToken,
    ) -> Result<BuildOutput, ToolchainError> {
        if find_project_file(&dir.join(name)).is_some() {
            return Ok(BuildOutput::skipped());
        }

        let mut args: Vec<String> = ["new", template, "-n", name, "-f", self.target_framework.as_str()]
            .iter()
            .map(|s| s.to_string())
            .collect();
        args.extend(extra.iter().map(|s| s.to_string()));
        self.run(args, dir, self.scaffold_timeout, cancel).await
    }
}

#[async_trait]
impl BuildToolchain for DotnetToolchain {
    async fn create_solution(
        &self,
        dir: &Path,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<BuildOutput, ToolchainError> {
        if dir.join(format!("{name}.sln")).is_file() {
            return Ok(BuildOutput::skipped());
        }
        let args = vec!["new".into(), "sln".into(), "-n".into(), name.to_string()];
        self.run(args, dir, self.scaffold_timeout, cancel).await
    }

    async fn create_library_project(
        &self,
        dir: &Path,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<BuildOutput, ToolchainError> {
        self.create_project("classlib", dir, name, &[], cancel).await
    }

    async fn create_service_project(
        &self,
        dir: &Path,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<BuildOutput, ToolchainError> {
        self.create_project("webapi", dir, name, &["--no-https"], cancel)
            .await
    }

    async fn add_project_to_solution(
        &self,
        solution_dir: &Path,
        project_file: &Path,
        cancel: &CancellationToken,
    ) -> Result<BuildOutput, ToolchainError> {
        if let Some(solution) = find_solution_file(solution_dir) {
            if file_mentions(&solution, project_file) {
                return Ok(BuildOutput::skipped());
            }
        }
        let args = vec![
            "sln".into(),
            "add".into(),
            project_file.to_string_lossy().into_owned(),
        ];
        self.run(args, solution_dir, self.scaffold_timeout, cancel)
            .await
    }

    async fn add_project_reference(
        &self,
        project_dir: &Path,
        target_project_file: &Path,
        cancel: &CancellationToken,
    ) -> Result<BuildOutput, ToolchainError> {
        if let Some(project) = find_project_file(project_dir) {
            if file_mentions(&project, target_project_file) {
                return Ok(BuildOutput::skipped());
            }
        }
        let args = vec![
            "add".into(),
            "reference".into(),
            target_project_file.to_string_lossy().into_owned(),
        ];
        self.run(args, project_dir, self.scaffold_timeout, cancel)
            .await
    }

    async fn add_package(
        &self,
        project_dir: &Path,
        package: &str,
        version: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<BuildOutput, ToolchainError> {
        if find_project_file(project_dir).is_none() {
            warn!(
                project = %project_dir.display(),
                package,
                "No project file, skipping package"
            );
            return Ok(BuildOutput::skipped());
        }

        let mut args = vec!["add".to_string(), "package".to_string(), package.to_string()];
        if let Some(version) = version.filter(|v| !v.is_empty()) {
            args.push("--version".to_string());
            args.push(version.to_string());
        }
        self.run(args, project_dir, self.scaffold_timeout, cancel)
            .await
    }

    async fn build(
        &self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<BuildOutput, ToolchainError> {
        info!(path = %path.display(), "Building solution");
        let args = [
            "build",
            "--configuration",
            "Release",
            "--verbosity",
            "minimal",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        self.run(args, path, self.compile_timeout, cancel).await
    }
}
