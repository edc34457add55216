//! Error types for the infrastructure adapters

use std::time::Duration;
use thiserror::Error;

/// Errors raised while running an external program
#[derive(Error, Debug)]
pub enum ToolchainError {
    /// The program could not be started
    #[error("Failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The program ran past its deadline and was killed
    #[error("'{command}' timed out after {}s", .timeout.as_secs())]
    Timeout { command: String, timeout: Duration },

    /// The caller cancelled the run; the program was killed
    #[error("'{0}' was cancelled")]
    Cancelled(String),

    /// IO error while talking to the program
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur in template operations
#[derive(Error, Debug)]
pub enum TemplateError {
    /// No template registered under the id
    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    /// A template failed to compile
    #[error("Failed to parse template {id}: {message}")]
    Parse { id: String, message: String },

    /// A template failed to render against the model
    #[error("Failed to render template {id}: {message}")]
    Render { id: String, message: String },

    /// IO error while reading override templates
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl TemplateError {
    /// Create a new template not found error
    pub fn not_found<S: Into<String>>(id: S) -> Self {
        Self::TemplateNotFound(id.into())
    }
}

/// Render a tera error with its whole source chain, which is where the useful
/// line and variable information lives.
pub(crate) fn describe_tera_error(error: &tera::Error) -> String {
    let mut message = error.to_string();
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
