//! External toolchain adapters

pub mod build;
pub mod container;

pub use build::{BuildOutput, BuildToolchain, DotnetToolchain, PLACEHOLDER_FILES, find_project_file};
pub use container::{CommandOutput, ContainerToolchain, DockerToolchain};
