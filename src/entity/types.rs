//! Built-in field types

use std::collections::BTreeMap;

use crate::entity::TypeDefinition;

/// Lookup table of the field types entity documents may reference.
#[derive(Debug, Clone, Default)]
pub struct TypeCatalog {
    types: BTreeMap<String, TypeDefinition>,
}

impl TypeCatalog {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The types every installation ships with.
    pub fn builtin() -> Self {
        let mut catalog = Self::empty();
        catalog.register(scalar("string", "String", "string", "VARCHAR(255)").with_max_length(255));
        catalog.register(scalar("text", "Text", "string", "TEXT"));
        catalog.register(scalar("int", "Integer", "int", "INTEGER"));
        catalog.register(scalar("long", "Long", "long", "BIGINT"));
        catalog.register(scalar("decimal", "Decimal", "decimal", "NUMERIC(18,2)"));
        catalog.register(scalar("bool", "Boolean", "bool", "BOOLEAN"));
        catalog.register(scalar("datetime", "Date and time", "DateTime", "TIMESTAMPTZ"));
        catalog.register(scalar("guid", "Identifier", "Guid", "UUID"));
        catalog.register(scalar("money", "Money", "decimal", "NUMERIC(19,4)"));
        catalog.register(
            scalar("email", "Email", "string", "VARCHAR(320)")
                .with_max_length(320)
                .value_object(
                    r"^[^@\s]+@[^@\s]+\.[^@\s]+$",
                    "Email address is not valid",
                ),
        );
        catalog.register(
            scalar("phone", "Phone", "string", "VARCHAR(32)")
                .with_max_length(32)
                .value_object(r"^\+?[0-9 ()-]{7,20}$", "Phone number is not valid"),
        );
        catalog
    }

    /// Add or replace a type.
    pub fn register(&mut self, definition: TypeDefinition) {
        self.types.insert(definition.id.to_lowercase(), definition);
    }

    /// Case-insensitive lookup by id.
    pub fn resolve(&self, id: &str) -> Option<TypeDefinition> {
        self.types.get(&id.to_lowercase()).cloned()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }
}

fn scalar(id: &str, display: &str, base: &str, column: &str) -> TypeDefinition {
    TypeDefinition {
        id: id.to_string(),
        display_name: display.to_string(),
        base_type: base.to_string(),
        db_column_type: column.to_string(),
        is_nullable: false,
        max_length: None,
        is_value_object: false,
        validation_pattern: None,
        validation_error_message: None,
    }
}

impl TypeDefinition {
    fn with_max_length(mut self, max: u32) -> Self {
        self.max_length = Some(max);
        self
    }

    fn value_object(mut self, pattern: &str, message: &str) -> Self {
        self.is_value_object = true;
        self.validation_pattern = Some(pattern.to_string());
        self.validation_error_message = Some(message.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    #[test]
    fn test_builtin_types() {
        let catalog = TypeCatalog::builtin();
        let ids: Vec<_> = catalog.ids().collect();
        for id in [
            "string", "text", "int", "long", "decimal", "bool", "datetime", "guid", "email",
            "phone", "money",
        ] {
            assert!(ids.contains(&id), "missing builtin type {id}");
        }

        let decimal = catalog.resolve("Decimal").unwrap();
        assert_eq!(decimal.base_type, "decimal");
        assert!(!decimal.is_value_object);
        assert!(catalog.resolve("uuid").is_none());
    }

    #[test]
    fn test_value_object_patterns_compile_and_match() {
        let catalog = TypeCatalog::builtin();

        let email = catalog.resolve("email").unwrap();
        assert!(email.is_value_object);
        let pattern = Regex::new(email.validation_pattern.as_deref().unwrap()).unwrap();
        assert!(pattern.is_match("billing@example.com"));
        assert!(!pattern.is_match("not-an-email"));

        let phone = catalog.resolve("phone").unwrap();
        let pattern = Regex::new(phone.validation_pattern.as_deref().unwrap()).unwrap();
        assert!(pattern.is_match("+1234567890"));
        assert!(!pattern.is_match("call me"));
    }

    #[test]
    fn test_register_overrides() {
        let mut catalog = TypeCatalog::builtin();
        let mut money = catalog.resolve("money").unwrap();
        money.db_column_type = "MONEY".to_string();
        catalog.register(money);
        assert_eq!(catalog.resolve("money").unwrap().db_column_type, "MONEY");
    }
}
