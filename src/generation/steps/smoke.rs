//! Step 11: probe the running service over HTTP

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::core::Config;
use crate::generation::retry::Sleeper;
use crate::generation::steps::StepDependencies;
use crate::generation::{GenerationContext, GenerationStep, StepError};
use crate::infrastructure::SmokeTester;
use crate::registry::ServiceStatus;

pub struct SmokeTestStep {
    smoke: Arc<dyn SmokeTester>,
    sleeper: Arc<dyn Sleeper>,
    config: Arc<Config>,
}

impl SmokeTestStep {
    pub fn new(deps: &StepDependencies) -> Self {
        Self {
            smoke: Arc::clone(&deps.smoke),
            sleeper: Arc::clone(&deps.sleeper),
            config: Arc::clone(&deps.config),
        }
    }
}

#[async_trait]
impl GenerationStep for SmokeTestStep {
    fn name(&self) -> &str {
        "Smoke Test"
    }

    fn order(&self) -> u32 {
        11
    }

    fn failure_status(&self) -> ServiceStatus {
        ServiceStatus::TestFailed
    }

    async fn run(
        &self,
        context: &mut GenerationContext,
        cancel: &CancellationToken,
    ) -> Result<(), StepError> {
        let health = &self.config.health;
        let warmup = health.warmup();
        if !warmup.is_zero() {
            info!(service = %context.record.name, warmup_ms = health.warmup_ms, "Waiting for service warm-up");
            if !self.sleeper.sleep(warmup, cancel).await {
                return Err(StepError::Cancelled);
            }
        }

        let health_url = format!("{}/health", context.record.url);
        let healthy = self
            .smoke
            .check_health(&health_url, health.service_max_attempts, cancel)
            .await;
        context.record.last_health_check = Some(Utc::now());
        context.record.is_healthy = healthy;

        if cancel.is_cancelled() {
            return Err(StepError::Cancelled);
        }
        if !healthy {
            error!(service = %context.record.name, url = %health_url, "Service is not healthy");
            return Err(StepError::DependencyNotReady {
                dependency: "service".to_string(),
                attempts: health.service_max_attempts,
            });
        }
        info!(service = %context.record.name, url = %health_url, "Service is healthy");

        if !health.crud_checks {
            return Ok(());
        }
        let report = self
            .smoke
            .run_crud_checks(&context.record.url, &context.entity, cancel)
            .await;
        for warning in &report.warnings {
            warn!(service = %context.record.name, warning = %warning, "CRUD check warning");
        }
        if !report.passed() {
            return Err(StepError::Other(format!(
                "CRUD checks failed: {}",
                report.errors.join("; ")
            )));
        }
        info!(service = %context.record.name, "CRUD checks passed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::steps::test_support::{ScriptedSmoke, harness, initialized_context};
    use crate::infrastructure::CrudReport;
    use crate::infrastructure::shell::command_executor::MockCommandExecutor;
    use std::sync::Mutex;

    #[tokio::test]
    async fn test_healthy_service_records_check() {
        let harness = harness(MockCommandExecutor::new(), true).await;
        let step = SmokeTestStep::new(&harness.deps);
        let mut context = initialized_context(&harness);

        step.run(&mut context, &CancellationToken::new()).await.unwrap();

        assert!(context.record.is_healthy);
        assert!(context.record.last_health_check.is_some());
        assert_eq!(
            *harness.smoke.urls.lock().unwrap(),
            vec!["http://localhost:5100/health"]
        );
        assert!(harness.sleeper.delays.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unhealthy_service_fails_step() {
        let harness = harness(MockCommandExecutor::new(), false).await;
        let step = SmokeTestStep::new(&harness.deps);
        let mut context = initialized_context(&harness);

        let error = step
            .run(&mut context, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(error.to_string(), "service not ready after 5 attempts");
        assert!(!context.record.is_healthy);
        assert!(context.record.last_health_check.is_some());
        assert_eq!(step.failure_status(), ServiceStatus::TestFailed);
    }

    #[tokio::test]
    async fn test_crud_errors_fail_step_when_enabled() {
        let harness = harness(MockCommandExecutor::new(), true).await;
        let mut deps = harness.deps.clone();
        let mut config = (*deps.config).clone();
        config.health.crud_checks = true;
        config.health.warmup_ms = 25;
        deps.config = Arc::new(config);
        deps.smoke = Arc::new(ScriptedSmoke {
            healthy: true,
            report: CrudReport {
                errors: vec!["POST returned 500".to_string()],
                warnings: vec![],
            },
            urls: Mutex::new(Vec::new()),
        });
        let step = SmokeTestStep::new(&deps);
        let mut context = initialized_context(&harness);

        let error = step
            .run(&mut context, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(error.to_string(), "CRUD checks failed: POST returned 500");
        assert_eq!(
            *harness.sleeper.delays.lock().unwrap(),
            vec![std::time::Duration::from_millis(25)]
        );
    }
}
