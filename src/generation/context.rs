//! Per-run generation context

use crate::entity::EntityDefinition;
use crate::generation::StepError;
use crate::registry::{ServicePaths, ServiceRecord};

/// One entity definition and the record its run is building.
///
/// Created fresh for every run and never shared between runs.
#[derive(Debug, Clone)]
pub struct GenerationContext {
    pub entity: EntityDefinition,
    pub record: ServiceRecord,
}

impl GenerationContext {
    pub fn new(entity: EntityDefinition) -> Self {
        let record = ServiceRecord::new(entity.service_name(), &entity.name);
        Self { entity, record }
    }

    /// Paths set by initialization; every later step requires them.
    pub fn paths(&self) -> Result<&ServicePaths, StepError> {
        self.record.paths.as_ref().ok_or_else(StepError::paths_missing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{FieldDefinition, TypeCatalog};
    use crate::registry::ServiceStatus;

    #[test]
    fn test_new_context_starts_initializing() {
        let types = TypeCatalog::builtin();
        let entity = EntityDefinition::new("Invoice")
            .with_field(FieldDefinition::new("Amount", types.resolve("decimal").unwrap()));
        let context = GenerationContext::new(entity);

        assert_eq!(context.record.name, "InvoiceService");
        assert_eq!(context.record.entity_name, "Invoice");
        assert_eq!(context.record.status, ServiceStatus::Initializing);
        assert!(matches!(context.paths(), Err(StepError::Precondition(_))));
    }
}
