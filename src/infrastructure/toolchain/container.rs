//! Container toolchain: image builds and compose lifecycle of a generated service
//!
//! Every operation reports failure through [`CommandOutput`] instead of an
//! error, including spawn failures, timeouts and cancellation.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::core::config::{TimeoutSettings, ToolchainSettings};
use crate::infrastructure::shell::{CommandExecutor, CommandSpec};

/// Outcome of one container toolchain invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub ok: bool,
    pub output: String,
    pub error: Option<String>,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            ok: true,
            output: output.into(),
            error: None,
            exit_code: 0,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            output: String::new(),
            error: Some(error.into()),
            exit_code: -1,
        }
    }

    /// Error text, falling back to the output for tools that report on stdout
    pub fn message(&self) -> &str {
        self.error
            .as_deref()
            .filter(|e| !e.is_empty())
            .unwrap_or(self.output.as_str())
    }
}

/// Builds images and drives the compose stack of a generated service.
#[async_trait]
pub trait ContainerToolchain: Send + Sync {
    /// Build `tag` from `<root>/<context_dir>/Dockerfile` with `root` as build context.
    async fn build_image(
        &self,
        root: &Path,
        context_dir: &str,
        tag: &str,
        cancel: &CancellationToken,
    ) -> CommandOutput;

    /// Start the stack in `root` and return the id of the application container.
    async fn compose_up(
        &self,
        root: &Path,
        service_name: &str,
        app_port: u16,
        db_port: u16,
        cancel: &CancellationToken,
    ) -> CommandOutput;

    /// Stop the stack in `root` and drop its volumes.
    async fn compose_down(&self, root: &Path, cancel: &CancellationToken) -> CommandOutput;

    async fn remove_image(&self, tag: &str, cancel: &CancellationToken) -> CommandOutput;

    async fn image_exists(&self, tag: &str, cancel: &CancellationToken) -> bool;

    /// Ask the database container whether it accepts connections.
    async fn check_dependency_health(
        &self,
        root: &Path,
        service_name: &str,
        cancel: &CancellationToken,
    ) -> CommandOutput;
}

/// Docker CLI implementation
pub struct DockerToolchain {
    executor: Arc<dyn CommandExecutor>,
    program: String,
    timeouts: TimeoutSettings,
}

impl DockerToolchain {
    pub fn new(
        executor: Arc<dyn CommandExecutor>,
        settings: &ToolchainSettings,
        timeouts: &TimeoutSettings,
    ) -> Self {
        Self {
            executor,
            program: settings.docker.clone(),
            timeouts: timeouts.clone(),
        }
    }

    async fn run(
        &self,
        args: Vec<String>,
        working_dir: Option<&Path>,
        timeout_secs: u64,
        env: &[(&str, String)],
        cancel: &CancellationToken,
    ) -> CommandOutput {
        let mut spec = CommandSpec::new(&self.program)
            .args(args)
            .timeout(Duration::from_secs(timeout_secs));
        if let Some(dir) = working_dir {
            spec = spec.current_dir(dir);
        }
        for (key, value) in env {
            spec = spec.env(*key, value.clone());
        }
        info!(command = %spec.command_line(), "docker");

        match self.executor.execute(&spec, cancel).await {
            Ok(result) if result.is_success() => {
                debug!(command = %spec.command_line(), "docker command succeeded");
                CommandOutput {
                    ok: true,
                    output: result.stdout.trim().to_string(),
                    error: None,
                    exit_code: 0,
                }
            }
            Ok(result) => {
                let stderr = result.stderr.trim().to_string();
                error!(
                    command = %spec.command_line(),
                    exit_code = result.exit_code,
                    stderr = %stderr,
                    "docker command failed"
                );
                CommandOutput {
                    ok: false,
                    output: result.stdout.trim().to_string(),
                    error: Some(stderr),
                    exit_code: result.exit_code,
                }
            }
            Err(e) => {
                error!(command = %spec.command_line(), error = %e, "docker command did not complete");
                CommandOutput::failure(e.to_string())
            }
        }
    }
}

fn owned(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

#[async_trait]
impl ContainerToolchain for DockerToolchain {
    async fn build_image(
        &self,
        root: &Path,
        context_dir: &str,
        tag: &str,
        cancel: &CancellationToken,
    ) -> CommandOutput {
        let dockerfile = format!("{context_dir}/Dockerfile");
        let args = owned(&["build", "-t", tag, "-f", dockerfile.as_str(), "."]);
        self.run(args, Some(root), self.timeouts.image_build, &[], cancel)
            .await
    }

    async fn compose_up(
        &self,
        root: &Path,
        service_name: &str,
        app_port: u16,
        db_port: u16,
        cancel: &CancellationToken,
    ) -> CommandOutput {
        let env = [
            ("HOST_PORT", app_port.to_string()),
            ("DB_PORT", db_port.to_string()),
        ];
        let up = self
            .run(
                owned(&["compose", "up", "-d"]),
                Some(root),
                self.timeouts.compose_up,
                &env,
                cancel,
            )
            .await;
        if !up.ok {
            return up;
        }

        let app_container = format!("{}_app", service_name.to_lowercase());
        self.run(
            owned(&["compose", "ps", "-q", app_container.as_str()]),
            Some(root),
            self.timeouts.compose_ps,
            &env,
            cancel,
        )
        .await
    }

    async fn compose_down(&self, root: &Path, cancel: &CancellationToken) -> CommandOutput {
        self.run(
            owned(&["compose", "down", "-v"]),
            Some(root),
            self.timeouts.compose_down,
            &[],
            cancel,
        )
        .await
    }

    async fn remove_image(&self, tag: &str, cancel: &CancellationToken) -> CommandOutput {
        self.run(
            owned(&["rmi", tag]),
            None,
            self.timeouts.remove_image,
            &[],
            cancel,
        )
        .await
    }

    async fn image_exists(&self, tag: &str, cancel: &CancellationToken) -> bool {
        self.run(
            owned(&["image", "inspect", tag]),
            None,
            self.timeouts.dependency_probe,
            &[],
            cancel,
        )
        .await
        .ok
    }

    async fn check_dependency_health(
        &self,
        root: &Path,
        service_name: &str,
        cancel: &CancellationToken,
    ) -> CommandOutput {
        let db_container = format!("{}_db", service_name.to_lowercase());
        self.run(
            owned(&[
                "compose",
                "exec",
                "-T",
                db_container.as_str(),
                "pg_isready",
                "-U",
                "postgres",
            ]),
            Some(root),
            self.timeouts.dependency_probe,
            &[],
            cancel,
        )
        .await
    }
}
