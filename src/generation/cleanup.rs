//! Removal of a previously generated service
//!
//! Not a pipeline step. Each action is attempted regardless of whether the
//! previous one succeeded; failures are logged and reported.

use std::sync::Arc;
use tokio::fs;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::infrastructure::ContainerToolchain;
use crate::registry::{ServiceRecord, ServiceRegistry};

/// What a removal did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub registered: bool,
    pub containers_stopped: bool,
    pub image_removed: bool,
    pub files_removed: bool,
    pub failures: Vec<String>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct ServiceCleanup {
    registry: Arc<ServiceRegistry>,
    container: Arc<dyn ContainerToolchain>,
}

impl ServiceCleanup {
    pub fn new(registry: Arc<ServiceRegistry>, container: Arc<dyn ContainerToolchain>) -> Self {
        Self {
            registry,
            container,
        }
    }

    /// Stop, delete and unregister the service called `name`.
    pub async fn remove_service(
        &self,
        name: &str,
        keep_image: bool,
        cancel: &CancellationToken,
    ) -> CleanupReport {
        let mut report = CleanupReport::default();
        let Some(record) = self.registry.get(name) else {
            info!(service = %name, "Service is not registered");
            return report;
        };
        report.registered = true;
        info!(service = %record.name, version = record.version, "Removing service");

        self.stop_containers(&record, cancel, &mut report).await;
        if !keep_image {
            self.remove_image(&record, cancel, &mut report).await;
        }
        remove_files(&record, &mut report).await;

        self.registry.remove(&record.name);
        // Running and failed records already gave their ports back; another run may hold them now.
        let in_flight = !record.is_running() && !record.status.is_failure();
        if let Some((app_port, db_port)) = record.ports().filter(|_| in_flight) {
            self.registry.release_ports(app_port, db_port);
        }
        info!(
            service = %record.name,
            failures = report.failures.len(),
            "Service removed"
        );
        report
    }

    async fn stop_containers(
        &self,
        record: &ServiceRecord,
        cancel: &CancellationToken,
        report: &mut CleanupReport,
    ) {
        let Some(paths) = &record.paths else {
            return;
        };
        if !fs::try_exists(paths.compose_file()).await.unwrap_or(false) {
            return;
        }
        let result = self.container.compose_down(paths.root(), cancel).await;
        if result.ok {
            report.containers_stopped = true;
        } else {
            warn!(service = %record.name, error = %result.message(), "Failed to stop containers");
            report
                .failures
                .push(format!("compose down: {}", result.message()));
        }
    }

    async fn remove_image(
        &self,
        record: &ServiceRecord,
        cancel: &CancellationToken,
        report: &mut CleanupReport,
    ) {
        if record.image_tag.is_empty() {
            return;
        }
        let result = self.container.remove_image(&record.image_tag, cancel).await;
        if result.ok {
            report.image_removed = true;
        } else {
            warn!(
                service = %record.name,
                image_tag = %record.image_tag,
                error = %result.message(),
                "Failed to remove image"
            );
            report
                .failures
                .push(format!("remove image: {}", result.message()));
        }
    }
}

async fn remove_files(record: &ServiceRecord, report: &mut CleanupReport) {
    let Some(paths) = &record.paths else {
        return;
    };
    match fs::remove_dir_all(paths.root()).await {
        Ok(()) => report.files_removed = true,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            warn!(service = %record.name, path = %paths.root().display(), error = %e, "Failed to delete service directory");
            report.failures.push(format!("delete files: {e}"));
        }
    }
}
