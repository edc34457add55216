//! Infrastructure layer - concrete implementations of the pipeline's ports

pub mod errors;
pub mod shell;
pub mod smoke;
pub mod templates;
pub mod toolchain;

pub use errors::{TemplateError, ToolchainError};
pub use shell::*;
pub use smoke::*;
pub use templates::*;
pub use toolchain::*;
