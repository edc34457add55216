//! Error handling for the servicegen library.
//!
//! This module defines the top-level error type `Error` used by the
//! composition root and the application facade, along with a convenient
//! `Result` alias. Layer-specific errors (steps, toolchains, templates,
//! the registry store) convert into it through `From`.

use thiserror::Error;

use crate::core::config::ConfigError;
use crate::entity::CatalogError;
use crate::registry::StoreError;

/// Result type for servicegen operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for servicegen operations
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Entity catalog error
    #[error("Entity catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Durable registry store error
    #[error("Registry store error: {0}")]
    Store(#[from] StoreError),

    /// Template engine error
    #[error("Template error: {0}")]
    Template(#[from] crate::infrastructure::TemplateError),

    /// HTTP client setup error
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Service lookup failed
    #[error("Service not found: {0}")]
    ServiceNotFound(String),
}

impl Error {
    /// Create a new service-not-found error
    pub fn service_not_found<S: Into<String>>(name: S) -> Self {
        Self::ServiceNotFound(name.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_error_service_not_found() {
        let error = Error::service_not_found("InvoiceService");
        assert!(matches!(error, Error::ServiceNotFound(_)));
        assert_eq!(error.to_string(), "Service not found: InvoiceService");
    }

    #[test]
    fn test_error_from_io_error() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "File not found");
        let error: Error = io_error.into();
        assert!(matches!(error, Error::Io(_)));
        assert!(error.to_string().contains("I/O error"));
        assert!(error.to_string().contains("File not found"));
    }

    #[test]
    fn test_error_from_serde_json_error() {
        let json_result: std::result::Result<serde_json::Value, _> =
            serde_json::from_str("invalid json");
        let error: Error = json_result.unwrap_err().into();
        assert!(matches!(error, Error::Json(_)));
        assert!(error.to_string().contains("JSON parsing error"));
    }

    #[test]
    fn test_error_from_config_error() {
        let error: Error = ConfigError::InvalidValue("ports.app_start".to_string()).into();
        assert!(matches!(error, Error::Config(_)));
        assert!(error.to_string().contains("ports.app_start"));
    }
}
