//! Template model for a generated service

use serde_json::{Map, Value, json};

use crate::core::utils::{database_name, to_camel_case, to_kebab_case, to_snake_case};
use crate::entity::{EntityDefinition, FieldDefinition};
use crate::registry::ServiceRecord;

/// Attributes every template of a run renders against.
///
/// Per-artifact variables (the current field, the use-case action) are layered
/// on top with [`RenderModel::with`].
#[derive(Debug, Clone, PartialEq)]
pub struct RenderModel {
    value: Value,
}

fn field_value(field: &FieldDefinition) -> Value {
    let base = &field.field_type.base_type;
    let cs_type = if field.is_required {
        base.clone()
    } else {
        format!("{base}?")
    };
    json!({
        "name": field.name,
        "camel": to_camel_case(&field.name),
        "column": to_snake_case(&field.name),
        "type_id": field.field_type.id,
        "base_type": base,
        "cs_type": cs_type,
        "db_type": field.field_type.db_column_type,
        "is_required": field.is_required,
        "is_unique": field.is_unique,
        "is_searchable": field.is_searchable,
        "is_string": base == "string",
        "is_value_object": field.field_type.is_value_object,
        "max_length": field.field_type.max_length,
        "validation_pattern": field.field_type.validation_pattern,
        "validation_message": field.field_type.validation_error_message,
    })
}

impl RenderModel {
    pub fn new(entity: &EntityDefinition, record: &ServiceRecord, target_framework: &str) -> Self {
        let plural = entity.plural();
        let fields: Vec<Value> = entity.fields.iter().map(field_value).collect();
        let filtered = |keep: fn(&FieldDefinition) -> bool| -> Vec<Value> {
            entity
                .fields
                .iter()
                .filter(|f| keep(f))
                .map(field_value)
                .collect()
        };

        let value = json!({
            "service_name": record.name,
            "namespace": record.name,
            "lower_name": record.name.to_lowercase(),
            "version": record.version,
            "app_port": record.app_port,
            "db_port": record.db_port,
            "image_tag": record.image_tag,
            "db_name": database_name(&record.name),
            "target_framework": target_framework,
            "dotnet_version": target_framework.trim_start_matches("net"),
            "entity": {
                "name": entity.name,
                "camel": to_camel_case(&entity.name),
                "plural": plural,
                "camel_plural": to_camel_case(&plural),
                "route": to_kebab_case(&plural),
                "table": to_snake_case(&plural),
                "has_searchable": entity.has_searchable_fields(),
                "fields": fields,
                "unique_fields": filtered(|f| f.is_unique),
                "searchable_fields": filtered(|f| f.is_searchable),
                "value_object_fields": filtered(|f| f.field_type.is_value_object),
            },
        });
        Self { value }
    }

    /// The model with one extra top-level variable.
    pub fn with(&self, key: &str, extra: Value) -> Value {
        let mut value = self.value.clone();
        if let Value::Object(map) = &mut value {
            map.insert(key.to_string(), extra);
        }
        value
    }

    /// Serialized field attributes of `field`.
    pub fn field(field: &FieldDefinition) -> Value {
        field_value(field)
    }

    pub fn as_value(&self) -> &Value {
        &self.value
    }

    /// Top-level object, for callers that need to inspect attributes.
    pub fn attributes(&self) -> Option<&Map<String, Value>> {
        self.value.as_object()
    }
}
