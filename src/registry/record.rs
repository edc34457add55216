//! The service record threaded through a generation run

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Lifecycle state of a generated service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceStatus {
    Initializing,
    StructureCreated,
    Building,
    DockerBuilding,
    Starting,
    Running,
    BuildFailed,
    StartFailed,
    TestFailed,
    Error,
}

impl ServiceStatus {
    /// Terminal failure states.
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            Self::BuildFailed | Self::StartFailed | Self::TestFailed | Self::Error
        )
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Architectural layer of a generated service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layer {
    Domain,
    Application,
    Infrastructure,
    Api,
}

impl Layer {
    pub const ALL: [Layer; 4] = [
        Layer::Domain,
        Layer::Application,
        Layer::Infrastructure,
        Layer::Api,
    ];

    pub fn suffix(self) -> &'static str {
        match self {
            Layer::Domain => "Domain",
            Layer::Application => "Application",
            Layer::Infrastructure => "Infrastructure",
            Layer::Api => "Api",
        }
    }
}

/// Root directory of a generated service. Layer directories are derived
/// from it and never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServicePaths {
    pub root: PathBuf,
}

impl ServicePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Name of the service, taken from the last root component
    fn service_name(&self) -> String {
        self.root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Project name of a layer, e.g. `InvoiceService.Domain`
    pub fn project_name(&self, layer: Layer) -> String {
        format!("{}.{}", self.service_name(), layer.suffix())
    }

    pub fn layer(&self, layer: Layer) -> PathBuf {
        self.root.join(self.project_name(layer))
    }

    pub fn domain(&self) -> PathBuf {
        self.layer(Layer::Domain)
    }

    pub fn application(&self) -> PathBuf {
        self.layer(Layer::Application)
    }

    pub fn infrastructure(&self) -> PathBuf {
        self.layer(Layer::Infrastructure)
    }

    pub fn api(&self) -> PathBuf {
        self.layer(Layer::Api)
    }

    pub fn compose_file(&self) -> PathBuf {
        self.root.join("docker-compose.yml")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// The mutable record of one generation attempt, and the durable registry entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRecord {
    pub name: String,
    pub entity_name: String,
    pub version: u32,
    pub app_port: u16,
    pub db_port: u16,
    pub url: String,
    pub image_tag: String,
    pub status: ServiceStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_health_check: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_healthy: bool,
    #[serde(default)]
    pub paths: Option<ServicePaths>,
}

impl ServiceRecord {
    /// A fresh record in `Initializing` state.
    pub fn new(name: impl Into<String>, entity_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entity_name: entity_name.into(),
            version: 0,
            app_port: 0,
            db_port: 0,
            url: String::new(),
            image_tag: String::new(),
            status: ServiceStatus::Initializing,
            created_at: Utc::now(),
            last_health_check: None,
            is_healthy: false,
            paths: None,
        }
    }

    /// Assign ports and version, deriving url and image tag.
    pub fn assign(&mut self, version: u32, app_port: u16, db_port: u16) {
        self.version = version;
        self.app_port = app_port;
        self.db_port = db_port;
        self.url = format!("http://localhost:{app_port}");
        self.image_tag = format!("{}:{}", self.name.to_lowercase(), version);
    }

    /// Ports held by this record, if any were assigned
    pub fn ports(&self) -> Option<(u16, u16)> {
        (self.app_port != 0 && self.db_port != 0).then_some((self.app_port, self.db_port))
    }

    pub fn is_running(&self) -> bool {
        self.status == ServiceStatus::Running
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assign_derives_url_and_tag() {
        let mut record = ServiceRecord::new("InvoiceService", "Invoice");
        assert_eq!(record.status, ServiceStatus::Initializing);
        assert!(record.ports().is_none());

        record.assign(1, 5100, 5432);
        assert_eq!(record.url, "http://localhost:5100");
        assert_eq!(record.image_tag, "invoiceservice:1");
        assert_eq!(record.ports(), Some((5100, 5432)));
    }

    #[test]
    fn test_paths_are_derived_from_root() {
        let paths = ServicePaths::new("/srv/generated/InvoiceService");
        assert_eq!(
            paths.domain(),
            PathBuf::from("/srv/generated/InvoiceService/InvoiceService.Domain")
        );
        assert_eq!(
            paths.api(),
            PathBuf::from("/srv/generated/InvoiceService/InvoiceService.Api")
        );
        assert_eq!(paths.project_name(Layer::Infrastructure), "InvoiceService.Infrastructure");
        assert_eq!(
            paths.compose_file(),
            PathBuf::from("/srv/generated/InvoiceService/docker-compose.yml")
        );
    }

    #[test]
    fn test_status_failure_states() {
        assert!(ServiceStatus::BuildFailed.is_failure());
        assert!(ServiceStatus::Error.is_failure());
        assert!(!ServiceStatus::Running.is_failure());
        assert!(!ServiceStatus::Building.is_failure());
        assert_eq!(ServiceStatus::DockerBuilding.to_string(), "DockerBuilding");
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let mut record = ServiceRecord::new("InvoiceService", "Invoice");
        record.assign(2, 5101, 5433);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["entityName"], "Invoice");
        assert_eq!(json["imageTag"], "invoiceservice:2");
        assert_eq!(json["status"], "Initializing");

        let back: ServiceRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }
}
