//! HTTP smoke tester for generated services

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use url::Url;

use crate::core::utils::to_kebab_case;
use crate::entity::EntityDefinition;
use crate::generation::retry::{BackoffPolicy, Sleeper, TokioSleeper, poll_with_backoff};

/// Longest response body kept in a report message
const BODY_PREVIEW_LEN: usize = 2000;

/// Findings of a CRUD round trip against a running service
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrudReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl CrudReport {
    pub fn passed(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Verifies that a started service answers.
#[async_trait]
pub trait SmokeTester: Send + Sync {
    /// Poll `url` with backoff until it returns a success status.
    async fn check_health(&self, url: &str, max_attempts: u32, cancel: &CancellationToken) -> bool;

    /// Create, list, fetch and delete one record through the generated API.
    async fn run_crud_checks(
        &self,
        base_url: &str,
        entity: &EntityDefinition,
        cancel: &CancellationToken,
    ) -> CrudReport;
}

/// [`SmokeTester`] over `reqwest`
pub struct HttpSmokeTester {
    client: Client,
    base_delay: Duration,
    sleeper: Arc<dyn Sleeper>,
}

impl HttpSmokeTester {
    pub fn new(request_timeout: Duration, base_delay: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(request_timeout)
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .build()?;
        Ok(Self {
            client,
            base_delay,
            sleeper: Arc::new(TokioSleeper),
        })
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    async fn probe(&self, url: &str, attempt: u32, max_attempts: u32) -> bool {
        info!(url, attempt = attempt + 1, max_attempts, "Health check");
        match self.client.get(url).send().await {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                warn!(url, status = %response.status(), attempt = attempt + 1, "Health check returned failure status");
                false
            }
            Err(e) => {
                warn!(url, error = %e, attempt = attempt + 1, "Health check request failed");
                false
            }
        }
    }
}

/// A request body with a plausible value for every field.
pub fn sample_payload(entity: &EntityDefinition) -> Value {
    let mut payload = Map::new();
    for field in &entity.fields {
        let value = match field.field_type.id.to_lowercase().as_str() {
            "int" | "long" => json!(1),
            "decimal" => json!(1.23),
            "bool" => json!(true),
            "datetime" => json!(Utc::now().to_rfc3339()),
            "guid" => json!(uuid::Uuid::new_v4().to_string()),
            "email" => json!(format!("test-{}@example.com", uuid::Uuid::new_v4().simple())),
            "phone" => json!("+1234567890"),
            "money" => json!(999.99),
            _ => json!(field.name),
        };
        payload.insert(field.name.clone(), value);
    }
    Value::Object(payload)
}

fn created_id(body: &Value) -> Option<String> {
    let id = body.get("id").or_else(|| body.get("Id"))?;
    match id {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn preview(text: &str) -> String {
    if text.chars().count() <= BODY_PREVIEW_LEN {
        text.to_string()
    } else {
        let cut: String = text.chars().take(BODY_PREVIEW_LEN).collect();
        format!("{cut}...")
    }
}

#[async_trait]
impl SmokeTester for HttpSmokeTester {
    async fn check_health(&self, url: &str, max_attempts: u32, cancel: &CancellationToken) -> bool {
        let policy = BackoffPolicy::new(max_attempts, self.base_delay);
        let outcome = poll_with_backoff(policy, self.sleeper.as_ref(), cancel, move |attempt| {
            self.probe(url, attempt, max_attempts)
        })
        .await;
        if !outcome.is_ready() {
            error!(url, ?outcome, "Health check did not pass");
        }
        outcome.is_ready()
    }

    async fn run_crud_checks(
        &self,
        base_url: &str,
        entity: &EntityDefinition,
        cancel: &CancellationToken,
    ) -> CrudReport {
        let mut report = CrudReport::default();
        let api_url = match Url::parse(base_url)
            .and_then(|base| base.join(&format!("api/{}", to_kebab_case(&entity.plural()))))
        {
            Ok(url) => url.to_string(),
            Err(e) => {
                report.errors.push(format!("Invalid base url {base_url}: {e}"));
                return report;
            }
        };
        info!(url = %api_url, "Running CRUD checks");

        let payload = sample_payload(entity);
        let created = tokio::select! {
            _ = cancel.cancelled() => {
                report.errors.push("CRUD checks cancelled".to_string());
                return report;
            }
            response = self.client.post(&api_url).json(&payload).send() => response,
        };
        let created = match created {
            Ok(response) => response,
            Err(e) => {
                report.errors.push(format!("POST {api_url} failed: {e}"));
                return report;
            }
        };

        let status = created.status();
        let body = created.text().await.unwrap_or_default();
        let id = if status.is_success() {
            info!(%status, "CRUD POST passed");
            serde_json::from_str::<Value>(&body)
                .ok()
                .as_ref()
                .and_then(created_id)
        } else {
            let message = format!("POST {api_url} failed: {status}. Body: {}", preview(&body));
            error!(%message, "CRUD POST failed");
            report.errors.push(message);
            if status == StatusCode::BAD_REQUEST || status == StatusCode::INTERNAL_SERVER_ERROR {
                return report;
            }
            None
        };

        if cancel.is_cancelled() {
            report.warnings.push("CRUD checks cancelled after POST".to_string());
            return report;
        }

        match self.client.get(&api_url).send().await {
            Ok(response) if response.status().is_success() => info!("CRUD GET list passed"),
            Ok(response) => report
                .warnings
                .push(format!("GET {api_url} failed: {}", response.status())),
            Err(e) => report.warnings.push(format!("GET {api_url} failed: {e}")),
        }

        if !status.is_success() {
            return report;
        }
        let Some(id) = id else {
            report
                .warnings
                .push("Could not get ID from POST response".to_string());
            return report;
        };

        let by_id = format!("{api_url}/by-id/{id}");
        match self.client.get(&by_id).send().await {
            Ok(response) if response.status().is_success() => info!("CRUD GET by id passed"),
            Ok(response) => report
                .warnings
                .push(format!("GET {by_id} failed: {}", response.status())),
            Err(e) => report.warnings.push(format!("GET {by_id} failed: {e}")),
        }

        let delete = format!("{api_url}/{id}");
        match self.client.delete(&delete).send().await {
            Ok(response) if response.status().is_success() => info!("CRUD DELETE passed"),
            Ok(response) => report
                .warnings
                .push(format!("DELETE {delete} failed: {}", response.status())),
            Err(e) => report.warnings.push(format!("DELETE {delete} failed: {e}")),
        }

        for warning in &report.warnings {
            warn!(warning = %warning, "CRUD check warning");
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{FieldDefinition, TypeCatalog};
    use crate::generation::retry::RecordingSleeper;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn tester(sleeper: Arc<RecordingSleeper>) -> HttpSmokeTester {
        HttpSmokeTester::new(Duration::from_secs(2), Duration::from_millis(50))
            .unwrap()
            .with_sleeper(sleeper)
    }

    fn invoice() -> EntityDefinition {
        let types = TypeCatalog::builtin();
        EntityDefinition::new("Invoice")
            .with_field(FieldDefinition::new("Amount", types.resolve("decimal").unwrap()).required())
            .with_field(FieldDefinition::new("Contact", types.resolve("email").unwrap()))
    }

    #[tokio::test]
    async fn test_check_health_retries_until_success() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock_server)
            .await;

        let sleeper = Arc::new(RecordingSleeper::default());
        let tester = tester(sleeper.clone());
        let url = format!("{}/health", mock_server.uri());

        assert!(tester.check_health(&url, 5, &CancellationToken::new()).await);
        assert_eq!(
            *sleeper.delays.lock().unwrap(),
            vec![Duration::from_millis(50), Duration::from_millis(100)]
        );
    }

    #[tokio::test]
    async fn test_check_health_gives_up() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&mock_server)
            .await;

        let sleeper = Arc::new(RecordingSleeper::default());
        let tester = tester(sleeper.clone());
        let url = format!("{}/health", mock_server.uri());

        assert!(!tester.check_health(&url, 3, &CancellationToken::new()).await);
        assert_eq!(sleeper.delays.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_crud_round_trip() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/invoices"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": "42" })))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/invoices"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/invoices/by-id/42"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock_server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/api/invoices/42"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let tester = tester(Arc::new(RecordingSleeper::default()));
        let report = tester
            .run_crud_checks(&mock_server.uri(), &invoice(), &CancellationToken::new())
            .await;

        assert!(report.passed(), "{report:?}");
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].starts_with("DELETE"));
    }

    #[tokio::test]
    async fn test_crud_post_rejection_is_an_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/invoices"))
            .respond_with(ResponseTemplate::new(400).set_body_string("Amount is required"))
            .mount(&mock_server)
            .await;

        let tester = tester(Arc::new(RecordingSleeper::default()));
        let report = tester
            .run_crud_checks(&mock_server.uri(), &invoice(), &CancellationToken::new())
            .await;

        assert!(!report.passed());
        assert!(report.errors[0].contains("Amount is required"));
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_sample_payload_values() {
        let payload = sample_payload(&invoice());
        assert_eq!(payload["Amount"], json!(1.23));
        let contact = payload["Contact"].as_str().unwrap();
        assert!(contact.starts_with("test-") && contact.ends_with("@example.com"));
    }
}
