//! servicegen - generate, build, containerize, launch and register backend
//! services from declarative entity definitions.
#![deny(unsafe_code)]

pub mod application;
pub mod core;
pub mod entity;
pub mod generation;
pub mod infrastructure;
pub mod registry;

pub use application::{RegistryBackend, ServiceManager};
pub use core::{Config, Error, Result};
