//! In-memory service registry with a durable mirror
//!
//! The in-memory map is the read path for everything in the process. Writes to
//! the durable store are dispatched as background tasks whose failures are only
//! logged, so a slow or broken store never blocks generation.
//!
//! Lock order is `reserved` then `services`; no code path takes them the other
//! way round.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::registry::ports::claim_available_port;
use crate::registry::{PortRange, RegistryStore, ServiceRecord};

/// Authoritative registry of generated services and in-flight port reservations.
pub struct ServiceRegistry {
    services: RwLock<HashMap<String, ServiceRecord>>,
    reserved: Mutex<HashSet<u16>>,
    store: Arc<dyn RegistryStore>,
    writes: TaskTracker,
}

fn key(name: &str) -> String {
    name.to_lowercase()
}

impl ServiceRegistry {
    /// Build a registry seeded from `store`.
    ///
    /// A store that cannot be read leaves the registry empty and memory-only
    /// until the store recovers.
    pub async fn load(store: Arc<dyn RegistryStore>) -> Self {
        let mut services = HashMap::new();
        match store.load_all().await {
            Ok(records) => {
                for record in records {
                    services.insert(key(&record.name), record);
                }
                info!(count = services.len(), "Loaded service registry");
            }
            Err(e) => warn!(error = %e, "Registry store unavailable, starting empty"),
        }

        Self {
            services: RwLock::new(services),
            reserved: Mutex::new(HashSet::new()),
            store,
            writes: TaskTracker::new(),
        }
    }

    /// Insert or replace the entry for `record.name`, then persist it in the background.
    pub fn upsert(&self, record: &ServiceRecord) {
        {
            let mut services = self.services.write().unwrap_or_else(PoisonError::into_inner);
            services.insert(key(&record.name), record.clone());
        }
        debug!(service = %record.name, status = %record.status, "Registry upsert");

        let store = Arc::clone(&self.store);
        let record = record.clone();
        self.writes.spawn(async move {
            if let Err(e) = store.save(&record).await {
                warn!(service = %record.name, error = %e, "Failed to persist registry entry");
            }
        });
    }

    /// Remove a service. Returns whether it was registered.
    pub fn remove(&self, name: &str) -> bool {
        let removed = {
            let mut services = self.services.write().unwrap_or_else(PoisonError::into_inner);
            services.remove(&key(name)).is_some()
        };

        let store = Arc::clone(&self.store);
        let name = name.to_string();
        self.writes.spawn(async move {
            if let Err(e) = store.delete(&name).await {
                warn!(service = %name, error = %e, "Failed to delete registry entry");
            }
        });
        removed
    }

    pub fn get(&self, name: &str) -> Option<ServiceRecord> {
        let services = self.services.read().unwrap_or_else(PoisonError::into_inner);
        services.get(&key(name)).cloned()
    }

    /// All services ordered by name.
    pub fn get_all(&self) -> Vec<ServiceRecord> {
        let services = self.services.read().unwrap_or_else(PoisonError::into_inner);
        let mut all: Vec<_> = services.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    pub fn get_by_entity(&self, entity_name: &str) -> Vec<ServiceRecord> {
        self.get_all()
            .into_iter()
            .filter(|r| r.entity_name.eq_ignore_ascii_case(entity_name))
            .collect()
    }

    /// `existing.version + 1`, or 1 for an unseen name.
    pub fn next_version(&self, name: &str) -> u32 {
        self.get(name).map_or(1, |r| r.version + 1)
    }

    /// Ports of running services plus every reserved port.
    pub fn used_ports(&self) -> HashSet<u16> {
        let reserved = self.reserved.lock().unwrap_or_else(PoisonError::into_inner);
        self.used_ports_locked(&reserved)
    }

    fn used_ports_locked(&self, reserved: &HashSet<u16>) -> HashSet<u16> {
        let services = self.services.read().unwrap_or_else(PoisonError::into_inner);
        let mut used: HashSet<u16> = services
            .values()
            .filter(|r| r.is_running())
            .flat_map(|r| [r.app_port, r.db_port])
            .collect();
        used.extend(reserved.iter().copied());
        used
    }

    pub fn reserved_ports(&self) -> HashSet<u16> {
        self.reserved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn reserve_ports(&self, app_port: u16, db_port: u16) {
        let mut reserved = self.reserved.lock().unwrap_or_else(PoisonError::into_inner);
        reserved.insert(app_port);
        reserved.insert(db_port);
    }

    pub fn release_ports(&self, app_port: u16, db_port: u16) {
        let mut reserved = self.reserved.lock().unwrap_or_else(PoisonError::into_inner);
        reserved.remove(&app_port);
        reserved.remove(&db_port);
    }

    /// Pick and reserve an application port and a database port.
    ///
    /// Scanning and reservation happen under the reservation lock, and each
    /// probe socket stays bound until both ports are recorded. The database
    /// scan excludes the chosen application port since the ranges may overlap.
    pub fn allocate_ports(&self, app_range: PortRange, db_range: PortRange) -> (u16, u16) {
        let mut reserved = self.reserved.lock().unwrap_or_else(PoisonError::into_inner);
        let mut excluded = self.used_ports_locked(&reserved);

        let (app_port, _app_probe) = claim_available_port(app_range, &excluded);
        excluded.insert(app_port);
        let (db_port, _db_probe) = claim_available_port(db_range, &excluded);

        reserved.insert(app_port);
        reserved.insert(db_port);
        debug!(app_port, db_port, "Reserved ports");
        (app_port, db_port)
    }

    /// Wait for background store writes issued so far.
    pub async fn flush(&self) {
        self.writes.close();
        self.writes.wait().await;
        self.writes.reopen();
    }
}
