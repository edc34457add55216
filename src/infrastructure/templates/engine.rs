//! Tera-based template engine
//!
//! Built-in templates live under `templates/` at the crate root and are
//! compiled into the binary. An override directory may replace any of them:
//! `<dir>/<id>.tera` takes the place of the embedded template `<id>`.

use serde_json::Value;
use std::path::Path;
use tera::{Context, Tera};
use tracing::{debug, info};

use crate::infrastructure::TemplateError;
use crate::infrastructure::errors::describe_tera_error;

macro_rules! embedded_templates {
    ($($id:literal),* $(,)?) => {
        &[$(($id, include_str!(concat!("../../../templates/", $id, ".tera")))),*]
    };
}

/// `(template id, source)` for every built-in template
pub const EMBEDDED_TEMPLATES: &[(&str, &str)] = embedded_templates![
    "domain/aggregate.g",
    "domain/aggregate",
    "domain/value_object",
    "domain/filter",
    "domain/repository_interface",
    "application/create_dto",
    "application/update_dto",
    "application/show_dto",
    "application/filter_dto",
    "application/paged_result",
    "application/mapper",
    "application/command.g",
    "application/command",
    "application/get_by_id",
    "application/get_by_unique",
    "application/search",
    "application/get_all",
    "infrastructure/connection_factory_interface",
    "infrastructure/connection_factory",
    "infrastructure/repository",
    "infrastructure/create_table",
    "infrastructure/create_indexes",
    "infrastructure/db_initializer",
    "api/controller",
    "api/correlation_middleware",
    "api/database_initializer",
    "api/program",
    "api/dockerfile",
    "api/appsettings",
    "api/compose",
];

/// Renders a template id against a JSON model.
pub trait TemplateEngine: Send + Sync {
    fn render(&self, template_id: &str, model: &Value) -> Result<String, TemplateError>;

    fn has_template(&self, template_id: &str) -> bool;
}

/// Tera-backed [`TemplateEngine`]
pub struct TeraTemplateEngine {
    tera: Tera,
}

impl TeraTemplateEngine {
    /// Engine with the built-in templates.
    pub fn embedded() -> Result<Self, TemplateError> {
        Self::from_sources(EMBEDDED_TEMPLATES.iter().copied())
    }

    /// Engine with an arbitrary set of `(id, source)` templates.
    pub fn from_sources<'a, I>(sources: I) -> Result<Self, TemplateError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut tera = Tera::default();
        tera.autoescape_on(vec![]);
        for (id, source) in sources {
            tera.add_raw_template(id, source)
                .map_err(|e| TemplateError::Parse {
                    id: id.to_string(),
                    message: describe_tera_error(&e),
                })?;
        }
        Ok(Self { tera })
    }

    /// Replace templates with `<dir>/<id>.tera` where such a file exists.
    pub fn with_overrides(mut self, dir: &Path) -> Result<Self, TemplateError> {
        let ids: Vec<String> = self.tera.get_template_names().map(str::to_string).collect();
        let mut replaced = 0;
        for id in ids {
            let candidate = dir.join(format!("{id}.tera"));
            if !candidate.is_file() {
                continue;
            }
            let source = std::fs::read_to_string(&candidate)?;
            self.tera
                .add_raw_template(&id, &source)
                .map_err(|e| TemplateError::Parse {
                    id: id.clone(),
                    message: describe_tera_error(&e),
                })?;
            debug!(template = %id, path = %candidate.display(), "Template overridden");
            replaced += 1;
        }
        info!(dir = %dir.display(), replaced, "Applied template overrides");
        Ok(self)
    }
}

impl TemplateEngine for TeraTemplateEngine {
    fn render(&self, template_id: &str, model: &Value) -> Result<String, TemplateError> {
        if !self.has_template(template_id) {
            return Err(TemplateError::not_found(template_id));
        }
        let context = Context::from_value(model.clone()).map_err(|e| TemplateError::Render {
            id: template_id.to_string(),
            message: describe_tera_error(&e),
        })?;
        self.tera
            .render(template_id, &context)
            .map_err(|e| TemplateError::Render {
                id: template_id.to_string(),
                message: describe_tera_error(&e),
            })
    }

    fn has_template(&self, template_id: &str) -> bool {
        self.tera.get_template_names().any(|name| name == template_id)
    }
}
