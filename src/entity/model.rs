//! Entity definitions consumed by the generation pipeline

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::core::utils::plural_name;
use crate::entity::CatalogError;

static PASCAL_CASE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z][A-Za-z0-9]*$").expect("static regex"));

/// A field type known to the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeDefinition {
    /// Stable identifier referenced from entity documents (`decimal`, `email`, ...)
    pub id: String,
    pub display_name: String,
    /// Type used in generated source code
    pub base_type: String,
    /// Column type used in generated schema
    pub db_column_type: String,
    #[serde(default)]
    pub is_nullable: bool,
    #[serde(default)]
    pub max_length: Option<u32>,
    /// Generated as a dedicated value object with validation
    #[serde(default)]
    pub is_value_object: bool,
    #[serde(default)]
    pub validation_pattern: Option<String>,
    #[serde(default)]
    pub validation_error_message: Option<String>,
}

/// One field of an entity, with its type resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    pub name: String,
    pub field_type: TypeDefinition,
    #[serde(default)]
    pub is_required: bool,
    #[serde(default)]
    pub is_unique: bool,
    #[serde(default)]
    pub is_searchable: bool,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, field_type: TypeDefinition) -> Self {
        Self {
            name: name.into(),
            field_type,
            is_required: false,
            is_unique: false,
            is_searchable: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.is_required = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.is_unique = true;
        self
    }

    pub fn searchable(mut self) -> Self {
        self.is_searchable = true;
        self
    }
}

/// Declarative description of the entity a service is generated for.
///
/// Immutable for the duration of a generation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityDefinition {
    pub name: String,
    #[serde(default)]
    pub plural_name: Option<String>,
    pub fields: Vec<FieldDefinition>,
}

impl EntityDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            plural_name: None,
            fields: Vec::new(),
        }
    }

    pub fn with_plural(mut self, plural: impl Into<String>) -> Self {
        self.plural_name = Some(plural.into());
        self
    }

    pub fn with_field(mut self, field: FieldDefinition) -> Self {
        self.fields.push(field);
        self
    }

    /// `<Name>Service`
    pub fn service_name(&self) -> String {
        format!("{}Service", self.name)
    }

    pub fn plural(&self) -> String {
        plural_name(&self.name, self.plural_name.as_deref())
    }

    pub fn has_searchable_fields(&self) -> bool {
        self.fields.iter().any(|f| f.is_searchable)
    }

    pub fn unique_fields(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.fields.iter().filter(|f| f.is_unique)
    }

    pub fn value_object_fields(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.fields.iter().filter(|f| f.field_type.is_value_object)
    }

    /// Check the definition can be turned into a service.
    pub fn validate(&self) -> Result<(), CatalogError> {
        if !PASCAL_CASE.is_match(&self.name) {
            return Err(CatalogError::InvalidEntity(format!(
                "entity name '{}' must be PascalCase",
                self.name
            )));
        }
        if self.fields.is_empty() {
            return Err(CatalogError::InvalidEntity(format!(
                "entity '{}' has no fields",
                self.name
            )));
        }

        let mut seen = HashSet::new();
        for field in &self.fields {
            if !PASCAL_CASE.is_match(&field.name) && !is_camel_identifier(&field.name) {
                return Err(CatalogError::InvalidEntity(format!(
                    "field name '{}' is not a valid identifier",
                    field.name
                )));
            }
            if !seen.insert(field.name.to_lowercase()) {
                return Err(CatalogError::InvalidEntity(format!(
                    "field '{}' is declared twice",
                    field.name
                )));
            }
        }
        Ok(())
    }
}

fn is_camel_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_lowercase())
        && chars.all(|c| c.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::TypeCatalog;

    fn invoice() -> EntityDefinition {
        let types = TypeCatalog::builtin();
        EntityDefinition::new("Invoice")
            .with_field(FieldDefinition::new("Amount", types.resolve("decimal").unwrap()).required())
            .with_field(FieldDefinition::new("PaidAt", types.resolve("datetime").unwrap()))
    }

    #[test]
    fn test_service_name_and_plural() {
        let entity = invoice();
        assert_eq!(entity.service_name(), "InvoiceService");
        assert_eq!(entity.plural(), "Invoices");
        assert_eq!(entity.clone().with_plural("Bills").plural(), "Bills");
    }

    #[test]
    fn test_field_queries() {
        let types = TypeCatalog::builtin();
        let entity = invoice()
            .with_field(
                FieldDefinition::new("Number", types.resolve("string").unwrap())
                    .unique()
                    .searchable(),
            )
            .with_field(FieldDefinition::new("Contact", types.resolve("email").unwrap()));

        assert!(entity.has_searchable_fields());
        assert_eq!(
            entity.unique_fields().map(|f| f.name.as_str()).collect::<Vec<_>>(),
            vec!["Number"]
        );
        assert_eq!(
            entity
                .value_object_fields()
                .map(|f| f.name.as_str())
                .collect::<Vec<_>>(),
            vec!["Contact"]
        );
        assert!(!invoice().has_searchable_fields());
    }

    #[test]
    fn test_validate() {
        assert!(invoice().validate().is_ok());

        let lower = EntityDefinition {
            name: "invoice".to_string(),
            ..invoice()
        };
        assert!(lower.validate().is_err());

        let empty = EntityDefinition::new("Invoice");
        assert!(empty.validate().is_err());

        let types = TypeCatalog::builtin();
        let duplicate = invoice()
            .with_field(FieldDefinition::new("amount", types.resolve("int").unwrap()));
        assert!(matches!(
            duplicate.validate(),
            Err(CatalogError::InvalidEntity(msg)) if msg.contains("declared twice")
        ));
    }
}
