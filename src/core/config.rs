//! Configuration for servicegen.
//!
//! Settings are read from a TOML file (every section is optional and falls
//! back to its defaults) and then overridden by `SERVICEGEN_*` environment
//! variables.
//!
//! ```toml
//! [generation]
//! output_root = "/var/lib/servicegen/generated"
//! max_concurrent = 2
//!
//! [ports]
//! app_start = 7000
//! app_end = 7100
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::registry::PortRange;

/// Configuration file name looked up under the user config directory
const CONFIG_FILE_NAME: &str = "config.toml";

/// Application directory name under the user config directory
const APP_DIR_NAME: &str = "servicegen";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub generation: GenerationSettings,
    pub ports: PortSettings,
    pub health: HealthSettings,
    pub timeouts: TimeoutSettings,
    pub registry: RegistrySettings,
    pub toolchain: ToolchainSettings,
}

/// Where services are generated and how many runs may proceed at once.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GenerationSettings {
    /// Root directory under which every service gets its own folder
    pub output_root: PathBuf,
    /// Number of generation slots
    pub max_concurrent: usize,
    /// Directory whose `*.tera` files replace embedded templates of the same id
    pub templates_dir: Option<PathBuf>,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            output_root: PathBuf::from("./generated"),
            max_concurrent: 3,
            templates_dir: None,
        }
    }
}

/// Inclusive port ranges scanned for the application and its database.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PortSettings {
    pub app_start: u16,
    pub app_end: u16,
    pub db_start: u16,
    pub db_end: u16,
}

impl Default for PortSettings {
    fn default() -> Self {
        Self {
            app_start: 5100,
            app_end: 5900,
            db_start: 5432,
            db_end: 6432,
        }
    }
}

impl PortSettings {
    pub fn app_range(&self) -> PortRange {
        PortRange::new(self.app_start, self.app_end)
    }

    pub fn db_range(&self) -> PortRange {
        PortRange::new(self.db_start, self.db_end)
    }
}

/// Readiness polling of the database and of the generated service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HealthSettings {
    pub base_delay_ms: u64,
    pub db_max_attempts: u32,
    pub service_max_attempts: u32,
    /// Pause before the first service health probe
    pub warmup_ms: u64,
    /// Exercise the generated CRUD endpoints after the health check passes
    pub crud_checks: bool,
    pub http_timeout_ms: u64,
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            base_delay_ms: 1000,
            db_max_attempts: 5,
            service_max_attempts: 5,
            warmup_ms: 5000,
            crud_checks: false,
            http_timeout_ms: 5000,
        }
    }
}

impl HealthSettings {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn warmup(&self) -> Duration {
        Duration::from_millis(self.warmup_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }
}

/// Per-command timeouts, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TimeoutSettings {
    pub image_build: u64,
    pub compose_up: u64,
    pub compose_ps: u64,
    pub compose_down: u64,
    pub remove_image: u64,
    pub dependency_probe: u64,
    pub compile: u64,
    pub scaffold: u64,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            image_build: 600,
            compose_up: 180,
            compose_ps: 60,
            compose_down: 120,
            remove_image: 120,
            dependency_probe: 10,
            compile: 600,
            scaffold: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RegistrySettings {
    /// SQLite file backing the registry
    pub database_path: PathBuf,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("./servicegen.db"),
        }
    }
}

/// External programs driven by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ToolchainSettings {
    pub dotnet: String,
    pub docker: String,
    pub target_framework: String,
    /// Version of the logging package added to the API project
    pub logging_package_version: String,
}

impl Default for ToolchainSettings {
    fn default() -> Self {
        Self {
            dotnet: "dotnet".to_string(),
            docker: "docker".to_string(),
            target_framework: "net8.0".to_string(),
            logging_package_version: "8.0.3".to_string(),
        }
    }
}

impl Config {
    /// Load configuration.
    ///
    /// An explicit `path` must exist. Without one, the user config directory is
    /// consulted and defaults are used when no file is there. Environment
    /// overrides are applied last and the result is validated.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match default_config_path().filter(|p| p.is_file()) {
                Some(found) => Self::from_file(&found)?,
                None => {
                    debug!("No configuration file found, using defaults");
                    Self::default()
                }
            },
        };

        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML configuration file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&raw)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Apply `SERVICEGEN_*` overrides resolved through `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(root) = lookup("SERVICEGEN_OUTPUT_ROOT") {
            self.generation.output_root = PathBuf::from(root);
        }
        if let Some(raw) = lookup("SERVICEGEN_MAX_CONCURRENT") {
            self.generation.max_concurrent = raw
                .parse()
                .map_err(|_| ConfigError::InvalidValue("SERVICEGEN_MAX_CONCURRENT".to_string()))?;
        }
        if let Some(db) = lookup("SERVICEGEN_DATABASE_PATH") {
            self.registry.database_path = PathBuf::from(db);
        }
        if let Some(dir) = lookup("SERVICEGEN_TEMPLATES_DIR") {
            self.generation.templates_dir = Some(PathBuf::from(dir));
        }
        Ok(())
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.generation.max_concurrent == 0 {
            return Err(ConfigError::InvalidValue(
                "generation.max_concurrent must be at least 1".to_string(),
            ));
        }
        if self.ports.app_start == 0 || self.ports.app_start > self.ports.app_end {
            return Err(ConfigError::InvalidValue(format!(
                "ports.app_start..ports.app_end ({}..{}) is empty",
                self.ports.app_start, self.ports.app_end
            )));
        }
        if self.ports.db_start == 0 || self.ports.db_start > self.ports.db_end {
            return Err(ConfigError::InvalidValue(format!(
                "ports.db_start..ports.db_end ({}..{}) is empty",
                self.ports.db_start, self.ports.db_end
            )));
        }
        if self.health.db_max_attempts == 0 || self.health.service_max_attempts == 0 {
            return Err(ConfigError::InvalidValue(
                "health attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// `<config_dir>/servicegen/config.toml`, when a config dir exists.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The configuration file is not valid TOML for this schema.
    #[error("Invalid configuration file: {0}")]
    Parse(#[from] toml::de::Error),
    /// A value is out of range or malformed.
    #[error("Invalid value: {0}")]
    InvalidValue(String),
}
