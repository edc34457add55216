//! Source templates for generated services

pub mod engine;

pub use engine::{EMBEDDED_TEMPLATES, TemplateEngine, TeraTemplateEngine};
