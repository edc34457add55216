//! Generation orchestration - drives the step pipeline for one entity
//!
//! Runs are admitted through a semaphore with a fixed number of slots. Within
//! a run, steps execute strictly in ascending order. When a step fails or the
//! run is cancelled, the failed step is rolled back first and then every
//! completed step in reverse completion order.

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::entity::EntityDefinition;
use crate::generation::step::{GenerationStep, StepOutcome, execute_step, rollback_step};
use crate::generation::GenerationContext;
use crate::registry::{ServiceRecord, ServiceRegistry, ServiceStatus};

/// Owns the step sequence and the admission slots.
pub struct GenerationOrchestrator {
    steps: Vec<Arc<dyn GenerationStep>>,
    slots: Arc<Semaphore>,
    registry: Arc<ServiceRegistry>,
}

impl GenerationOrchestrator {
    /// Create an orchestrator over `steps`, sorted by order with ties kept in
    /// registration order.
    pub fn new(
        mut steps: Vec<Arc<dyn GenerationStep>>,
        max_concurrent: usize,
        registry: Arc<ServiceRegistry>,
    ) -> Self {
        steps.sort_by_key(|step| step.order());
        Self {
            steps,
            slots: Arc::new(Semaphore::new(max_concurrent.max(1))),
            registry,
        }
    }

    /// Step names in execution order
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|step| step.name()).collect()
    }

    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }

    /// Run the pipeline for `entity`.
    ///
    /// Always returns the run's record; its status tells where the run stopped.
    pub async fn execute(
        &self,
        entity: EntityDefinition,
        cancel: &CancellationToken,
    ) -> ServiceRecord {
        let mut context = GenerationContext::new(entity);

        let _permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!(service = %context.record.name, "Cancelled while waiting for a generation slot");
                context.record.status = ServiceStatus::Error;
                return context.record;
            }
            permit = Arc::clone(&self.slots).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => {
                    error!(service = %context.record.name, "Generation slots are closed");
                    context.record.status = ServiceStatus::Error;
                    return context.record;
                }
            },
        };
        debug!(
            service = %context.record.name,
            available = self.slots.available_permits(),
            "Acquired generation slot"
        );

        let started = Instant::now();
        let mut executed: Vec<&Arc<dyn GenerationStep>> = Vec::with_capacity(self.steps.len());

        for step in &self.steps {
            if cancel.is_cancelled() {
                warn!(service = %context.record.name, step = step.name(), "Generation cancelled");
                context.record.status = ServiceStatus::Error;
                self.rollback(&mut context, None, &executed).await;
                // Before initialization the record has no version and would replace the stored entry.
                if !executed.is_empty() {
                    self.registry.upsert(&context.record);
                }
                return context.record;
            }

            info!(service = %context.record.name, step = step.name(), order = step.order(), "Starting step");
            let step_started = Instant::now();
            let outcome = execute_step(step.as_ref(), &mut context, cancel).await;
            let elapsed_s = step_started.elapsed().as_secs_f64();

            match outcome {
                StepOutcome::Success => {
                    info!(service = %context.record.name, step = step.name(), elapsed_s, "Step finished");
                    executed.push(step);
                }
                StepOutcome::Failure(reason) => {
                    context.record.status = if cancel.is_cancelled() {
                        ServiceStatus::Error
                    } else {
                        step.failure_status()
                    };
                    error!(
                        service = %context.record.name,
                        step = step.name(),
                        status = %context.record.status,
                        reason = %reason,
                        elapsed_s,
                        "Step failed, rolling back"
                    );
                    self.rollback(&mut context, Some(step), &executed).await;
                    self.registry.upsert(&context.record);
                    return context.record;
                }
            }
        }

        info!(
            service = %context.record.name,
            status = %context.record.status,
            elapsed_s = started.elapsed().as_secs_f64(),
            "Generation finished"
        );
        context.record
    }

    async fn rollback(
        &self,
        context: &mut GenerationContext,
        failed: Option<&Arc<dyn GenerationStep>>,
        executed: &[&Arc<dyn GenerationStep>],
    ) {
        let count = executed.len() + usize::from(failed.is_some());
        info!(service = %context.record.name, steps = count, "Rolling back");

        if let Some(step) = failed {
            rollback_step(step.as_ref(), context).await;
        }
        for step in executed.iter().rev() {
            debug!(service = %context.record.name, step = step.name(), "Rolling back step");
            rollback_step(step.as_ref(), context).await;
        }
    }
}
