//! Error types for the generation pipeline

use thiserror::Error;

use crate::infrastructure::{TemplateError, ToolchainError};

/// Why a step body gave up.
///
/// Step bodies return these; the guarded wrapper in [`crate::generation::step`]
/// turns them into a failed outcome so the orchestrator only ever sees data.
#[derive(Error, Debug)]
pub enum StepError {
    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("{operation} failed (exit code {exit_code}): {detail}")]
    Toolchain {
        operation: String,
        exit_code: i32,
        detail: String,
    },

    #[error("Toolchain error: {0}")]
    ToolchainProcess(#[from] ToolchainError),

    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{dependency} not ready after {attempts} attempts")]
    DependencyNotReady { dependency: String, attempts: u32 },

    #[error("Cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

impl StepError {
    /// The service paths were not set by initialization.
    pub fn paths_missing() -> Self {
        Self::Precondition("service paths are not initialized".to_string())
    }

    pub fn toolchain(
        operation: impl Into<String>,
        exit_code: i32,
        detail: impl Into<String>,
    ) -> Self {
        Self::Toolchain {
            operation: operation.into(),
            exit_code,
            detail: detail.into(),
        }
    }
}
