//! Application layer - the service facade and the composition root

pub mod bootstrap;
pub mod service_manager;

pub use bootstrap::{RegistryBackend, build};
pub use service_manager::ServiceManager;
