//! Core building blocks shared across servicegen: errors, configuration and naming helpers.

pub mod config;
pub mod error;
pub mod utils;

pub use config::{Config, ConfigError};
pub use error::{Error, Result};
