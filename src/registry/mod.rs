//! Service registry, port allocation and the durable registry store

pub mod ports;
pub mod record;
pub mod service_registry;
pub mod store;

pub use ports::{PortRange, find_available_port, is_port_free};
pub use record::{Layer, ServicePaths, ServiceRecord, ServiceStatus};
pub use service_registry::ServiceRegistry;
pub use store::{MemoryRegistryStore, RegistryStore, SqliteRegistryStore, StoreError};
