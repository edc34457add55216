//! Entity definitions and the catalogs that supply them

pub mod catalog;
pub mod model;
pub mod types;

pub use catalog::{CatalogError, EntityCatalog, FileEntityCatalog, load_entity_file};
pub use model::{EntityDefinition, FieldDefinition, TypeDefinition};
pub use types::TypeCatalog;
