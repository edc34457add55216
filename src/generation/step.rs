//! Step contract and guarded execution
//!
//! A step body returns `Result<(), StepError>`. [`execute_step`] and
//! [`rollback_step`] are the only ways the orchestrator invokes a step: they
//! catch errors and panics so that a misbehaving step can neither crash the
//! orchestrator nor stop the rollback sequence.

use async_trait::async_trait;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::generation::{GenerationContext, StepError};
use crate::registry::ServiceStatus;

/// One ordered, rollback-capable unit of the pipeline.
#[async_trait]
pub trait GenerationStep: Send + Sync {
    /// Display label
    fn name(&self) -> &str;

    /// Position in the pipeline; ties keep registration order.
    fn order(&self) -> u32;

    /// Status recorded when this step fails.
    fn failure_status(&self) -> ServiceStatus {
        ServiceStatus::Error
    }

    async fn run(
        &self,
        context: &mut GenerationContext,
        cancel: &CancellationToken,
    ) -> Result<(), StepError>;

    /// Undo this step's side effects. Must be safe to call when the step
    /// only partially ran.
    async fn rollback(&self, _context: &mut GenerationContext) -> Result<(), StepError> {
        Ok(())
    }
}

/// Result of one guarded step execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Success,
    Failure(String),
}

impl StepOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Run a step, converting errors and panics into [`StepOutcome::Failure`].
pub async fn execute_step(
    step: &dyn GenerationStep,
    context: &mut GenerationContext,
    cancel: &CancellationToken,
) -> StepOutcome {
    match AssertUnwindSafe(step.run(context, cancel))
        .catch_unwind()
        .await
    {
        Ok(Ok(())) => StepOutcome::Success,
        Ok(Err(e)) => {
            error!(step = step.name(), service = %context.record.name, error = %e, "Step failed");
            StepOutcome::Failure(e.to_string())
        }
        Err(payload) => {
            let message = panic_message(payload);
            error!(step = step.name(), service = %context.record.name, panic = %message, "Step panicked");
            StepOutcome::Failure(format!("panicked: {message}"))
        }
    }
}

/// Roll a step back, logging and swallowing any error or panic.
pub async fn rollback_step(step: &dyn GenerationStep, context: &mut GenerationContext) {
    match AssertUnwindSafe(step.rollback(context))
        .catch_unwind()
        .await
    {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            warn!(step = step.name(), service = %context.record.name, error = %e, "Rollback failed");
        }
        Err(payload) => {
            warn!(
                step = step.name(),
                service = %context.record.name,
                panic = %panic_message(payload),
                "Rollback panicked"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{EntityDefinition, FieldDefinition, TypeCatalog};
    use tracing_test::traced_test;

    enum Behaviour {
        Succeed,
        Fail,
        Panic,
    }

    struct ScriptedStep(Behaviour);

    #[async_trait]
    impl GenerationStep for ScriptedStep {
        fn name(&self) -> &str {
            "Scripted"
        }

        fn order(&self) -> u32 {
            1
        }

        async fn run(
            &self,
            _context: &mut GenerationContext,
            _cancel: &CancellationToken,
        ) -> Result<(), StepError> {
            match self.0 {
                Behaviour::Succeed => Ok(()),
                Behaviour::Fail => Err(StepError::Other("boom".to_string())),
                Behaviour::Panic => panic!("step exploded"),
            }
        }

        async fn rollback(&self, _context: &mut GenerationContext) -> Result<(), StepError> {
            match self.0 {
                Behaviour::Succeed => Ok(()),
                Behaviour::Fail => Err(StepError::Other("undo failed".to_string())),
                Behaviour::Panic => panic!("rollback exploded"),
            }
        }
    }

    fn context() -> GenerationContext {
        let types = TypeCatalog::builtin();
        GenerationContext::new(
            EntityDefinition::new("Invoice")
                .with_field(FieldDefinition::new("Amount", types.resolve("decimal").unwrap())),
        )
    }

    #[tokio::test]
    async fn test_success_and_error_outcomes() {
        let mut context = context();
        let cancel = CancellationToken::new();

        let ok = execute_step(&ScriptedStep(Behaviour::Succeed), &mut context, &cancel).await;
        assert!(ok.is_success());

        let failed = execute_step(&ScriptedStep(Behaviour::Fail), &mut context, &cancel).await;
        assert_eq!(failed, StepOutcome::Failure("boom".to_string()));
    }

    #[tokio::test]
    async fn test_panic_becomes_failure() {
        let mut context = context();
        let outcome = execute_step(
            &ScriptedStep(Behaviour::Panic),
            &mut context,
            &CancellationToken::new(),
        )
        .await;
        assert_eq!(
            outcome,
            StepOutcome::Failure("panicked: step exploded".to_string())
        );
    }

    #[tokio::test]
    #[traced_test]
    async fn test_rollback_swallows_errors_and_panics() {
        let mut context = context();
        rollback_step(&ScriptedStep(Behaviour::Fail), &mut context).await;
        rollback_step(&ScriptedStep(Behaviour::Panic), &mut context).await;

        assert!(logs_contain("Rollback failed"));
        assert!(logs_contain("Rollback panicked"));
    }

    #[test]
    fn test_default_failure_status() {
        assert_eq!(
            ScriptedStep(Behaviour::Succeed).failure_status(),
            ServiceStatus::Error
        );
    }
}
