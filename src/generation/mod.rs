//! Generation pipeline - the step contract, the orchestrator that drives the
//! twelve steps with saga rollback, and the pieces the steps share
//! (artifact plans, render model, backoff polling, cleanup).

pub mod artifacts;
pub mod cleanup;
pub mod context;
pub mod errors;
pub mod model;
pub mod orchestrator;
pub mod retry;
pub mod step;
pub mod steps;

pub use artifacts::{Artifact, WritePolicy, WriteSummary, write_artifacts};
pub use cleanup::{CleanupReport, ServiceCleanup};
pub use context::GenerationContext;
pub use errors::StepError;
pub use model::RenderModel;
pub use orchestrator::GenerationOrchestrator;
pub use retry::{BackoffPolicy, PollOutcome, Sleeper, TokioSleeper, poll_with_backoff};
pub use step::{GenerationStep, StepOutcome, execute_step, rollback_step};
pub use steps::{StepDependencies, default_pipeline};
