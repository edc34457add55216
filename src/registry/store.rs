//! Durable mirror of the service registry
//!
//! One row per service, keyed by `service:<name>` (case-insensitive), holding
//! the JSON-serialized [`ServiceRecord`]. There are no secondary indices:
//! filtering happens in memory after [`RegistryStore::load_all`].

use async_trait::async_trait;
use chrono::Utc;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{OptionalExtension, params};
use rusqlite_migration::{M, Migrations};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::debug;

use crate::registry::ServiceRecord;

const KEY_PREFIX: &str = "service:";

const MIGRATION_SLICE: &[M<'_>] = &[M::up(
    "CREATE TABLE registry_entries (
        key TEXT PRIMARY KEY COLLATE NOCASE,
        payload TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );",
)];
const MIGRATIONS: Migrations<'_> = Migrations::from_slice(MIGRATION_SLICE);

/// Durable store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database operation failed: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Schema migration failed: {0}")]
    Migration(#[from] rusqlite_migration::Error),

    #[error("Failed to serialize record: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Task execution failed: {0}")]
    Join(String),
}

/// Storage port for registry entries.
#[async_trait]
pub trait RegistryStore: Send + Sync {
    async fn load_all(&self) -> Result<Vec<ServiceRecord>, StoreError>;

    /// Insert or overwrite the entry for `record.name`.
    async fn save(&self, record: &ServiceRecord) -> Result<(), StoreError>;

    /// Returns whether an entry existed.
    async fn delete(&self, name: &str) -> Result<bool, StoreError>;
}

pub fn entry_key(name: &str) -> String {
    format!("{KEY_PREFIX}{name}")
}

/// SQLite-backed registry store.
pub struct SqliteRegistryStore {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteRegistryStore {
    /// Open (creating if needed) the database at `path` and migrate it.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            // In-memory databases reject WAL, which is fine
            conn.pragma_update(None, "journal_mode", "WAL").ok();
            conn.pragma_update(None, "synchronous", "NORMAL")?;
            conn.busy_timeout(Duration::from_secs(5))
        });
        let pool = Pool::builder()
            .max_size(4)
            .connection_timeout(Duration::from_secs(30))
            .build(manager)?;

        let store = Self { pool };
        store
            .with_connection(|conn| {
                MIGRATIONS.to_latest(conn)?;
                Ok(())
            })
            .await?;
        debug!(path = %path.display(), "Opened registry store");
        Ok(store)
    }

    /// Run `f` with a pooled connection on the blocking thread pool
    async fn with_connection<F, R>(&self, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&mut rusqlite::Connection) -> Result<R, StoreError> + Send + 'static,
        R: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
    }

    /// Entry for a single service.
    pub async fn load(&self, name: &str) -> Result<Option<ServiceRecord>, StoreError> {
        let key = entry_key(name);
        self.with_connection(move |conn| {
            let payload: Option<String> = conn
                .query_row(
                    "SELECT payload FROM registry_entries WHERE key = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(payload
                .map(|p| serde_json::from_str::<ServiceRecord>(&p))
                .transpose()?)
        })
        .await
    }
}

#[async_trait]
impl RegistryStore for SqliteRegistryStore {
    async fn load_all(&self) -> Result<Vec<ServiceRecord>, StoreError> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT payload FROM registry_entries WHERE key LIKE 'service:%' ORDER BY key",
            )?;
            let payloads = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;

            let mut records = Vec::with_capacity(payloads.len());
            for payload in payloads {
                match serde_json::from_str::<ServiceRecord>(&payload) {
                    Ok(record) => records.push(record),
                    Err(e) => tracing::warn!(error = %e, "Skipping unreadable registry entry"),
                }
            }
            Ok(records)
        })
        .await
    }

    async fn save(&self, record: &ServiceRecord) -> Result<(), StoreError> {
        let key = entry_key(&record.name);
        let payload = serde_json::to_string(record)?;
        self.with_connection(move |conn| {
            conn.execute(
                "INSERT INTO registry_entries (key, payload, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET
                    key = excluded.key,
                    payload = excluded.payload,
                    updated_at = excluded.updated_at",
                params![key, payload, Utc::now().to_rfc3339()],
            )?;
            Ok(())
        })
        .await
    }

    async fn delete(&self, name: &str) -> Result<bool, StoreError> {
        let key = entry_key(name);
        self.with_connection(move |conn| {
            let removed = conn.execute("DELETE FROM registry_entries WHERE key = ?1", params![key])?;
            Ok(removed > 0)
        })
        .await
    }
}

/// Process-local store, for tests and runs that should leave nothing behind.
#[derive(Default)]
pub struct MemoryRegistryStore {
    entries: Mutex<BTreeMap<String, ServiceRecord>>,
}

impl MemoryRegistryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RegistryStore for MemoryRegistryStore {
    async fn load_all(&self) -> Result<Vec<ServiceRecord>, StoreError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.values().cloned().collect())
    }

    async fn save(&self, record: &ServiceRecord) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(entry_key(&record.name).to_lowercase(), record.clone());
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<bool, StoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.remove(&entry_key(name).to_lowercase()).is_some())
    }
}
