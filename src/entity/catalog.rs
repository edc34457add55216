//! File-backed entity catalog
//!
//! Entity documents are JSON or YAML files. Field types are referenced by id
//! and resolved through a [`TypeCatalog`]:
//!
//! ```yaml
//! name: Invoice
//! fields:
//!   - name: Amount
//!     type: decimal
//!     required: true
//!   - name: PaidAt
//!     type: datetime
//! ```

use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

use crate::entity::{EntityDefinition, FieldDefinition, TypeCatalog};

/// Entity catalog errors.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse entity document {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Field '{field}' references unknown type '{type_id}'")]
    UnknownType { field: String, type_id: String },

    #[error("Invalid entity: {0}")]
    InvalidEntity(String),

    #[error("Entity not found: {0}")]
    NotFound(String),
}

/// Read-only source of entity definitions.
#[async_trait]
pub trait EntityCatalog: Send + Sync {
    async fn get(&self, name: &str) -> Result<EntityDefinition, CatalogError>;

    /// All valid definitions, ordered by name.
    async fn list(&self) -> Result<Vec<EntityDefinition>, CatalogError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EntityDocument {
    name: String,
    #[serde(default)]
    plural_name: Option<String>,
    #[serde(default)]
    fields: Vec<FieldDocument>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FieldDocument {
    name: String,
    #[serde(rename = "type")]
    type_id: String,
    #[serde(default)]
    required: bool,
    #[serde(default)]
    unique: bool,
    #[serde(default)]
    searchable: bool,
}

impl EntityDocument {
    fn resolve(self, types: &TypeCatalog) -> Result<EntityDefinition, CatalogError> {
        let mut fields = Vec::with_capacity(self.fields.len());
        for field in self.fields {
            let field_type =
                types
                    .resolve(&field.type_id)
                    .ok_or_else(|| CatalogError::UnknownType {
                        field: field.name.clone(),
                        type_id: field.type_id.clone(),
                    })?;
            fields.push(FieldDefinition {
                name: field.name,
                field_type,
                is_required: field.required,
                is_unique: field.unique,
                is_searchable: field.searchable,
            });
        }

        let entity = EntityDefinition {
            name: self.name,
            plural_name: self.plural_name,
            fields,
        };
        entity.validate()?;
        Ok(entity)
    }
}

fn is_entity_document(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("json" | "yaml" | "yml")
    )
}

/// Load and validate a single entity document.
pub async fn load_entity_file(
    path: &Path,
    types: &TypeCatalog,
) -> Result<EntityDefinition, CatalogError> {
    let content = fs::read_to_string(path)
        .await
        .map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;

    let parse_error = |message: String| CatalogError::Parse {
        path: path.to_path_buf(),
        message,
    };
    let document: EntityDocument = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(&content).map_err(|e| parse_error(e.to_string()))?,
        _ => serde_yaml::from_str(&content).map_err(|e| parse_error(e.to_string()))?,
    };

    document.resolve(types)
}

/// Entity documents stored in one directory.
pub struct FileEntityCatalog {
    dir: PathBuf,
    types: TypeCatalog,
}

impl FileEntityCatalog {
    pub fn new(dir: impl Into<PathBuf>, types: TypeCatalog) -> Self {
        Self {
            dir: dir.into(),
            types,
        }
    }

    async fn document_paths(&self) -> Result<Vec<PathBuf>, CatalogError> {
        let io_error = |source| CatalogError::Io {
            path: self.dir.clone(),
            source,
        };
        let mut entries = fs::read_dir(&self.dir).await.map_err(io_error)?;
        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(io_error)? {
            let path = entry.path();
            if path.is_file() && is_entity_document(&path) {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }
}

#[async_trait]
impl EntityCatalog for FileEntityCatalog {
    async fn get(&self, name: &str) -> Result<EntityDefinition, CatalogError> {
        self.list()
            .await?
            .into_iter()
            .find(|entity| entity.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| CatalogError::NotFound(name.to_string()))
    }

    async fn list(&self) -> Result<Vec<EntityDefinition>, CatalogError> {
        let mut entities = Vec::new();
        for path in self.document_paths().await? {
            match load_entity_file(&path, &self.types).await {
                Ok(entity) => {
                    debug!(entity = %entity.name, path = %path.display(), "Loaded entity");
                    entities.push(entity);
                }
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping entity document"),
            }
        }
        entities.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entities)
    }
}
