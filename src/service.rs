use crate::constants::REGISTRATIONS_ENDPOINT;
use crate::error::{RegistrationError, Result};
use crate::types::{RegistrationService, SubmissionPayload, SubmissionReceipt};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// In-memory registration service for development/testing. Records every
/// accepted submission and issues uuid-backed receipts.
///
/// Retries are at-least-once: the wizard generates no idempotency key, so a
/// retried submission lands here twice. `submission_count` makes that
/// visible to tests.
pub struct InMemoryRegistrationService {
    registrations: Arc<Mutex<HashMap<Uuid, SubmissionPayload>>>,
}

impl Default for InMemoryRegistrationService {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRegistrationService {
    pub fn new() -> Self {
        Self {
            registrations: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// How many submissions have been accepted so far.
    pub fn submission_count(&self) -> usize {
        self.registrations.lock().unwrap().len()
    }

    /// Accepted submissions for one event, in no particular order.
    pub fn submissions_for_event(&self, event_id: &str) -> Vec<SubmissionPayload> {
        let registrations = self.registrations.lock().unwrap();
        registrations
            .values()
            .filter(|p| p.event_id == event_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl RegistrationService for InMemoryRegistrationService {
    async fn submit(&self, payload: &SubmissionPayload) -> Result<SubmissionReceipt> {
        let id = Uuid::new_v4();
        let mut registrations = self.registrations.lock().unwrap();
        registrations.insert(id, payload.clone());
        debug!(
            event = %payload.event_id,
            amount = payload.amount,
            registration_id = %id,
            "registration stored"
        );
        Ok(SubmissionReceipt {
            registration_id: id.to_string(),
        })
    }
}

/// What the fest backend answers with on a successful submission.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitResponse {
    registration_id: String,
}

/// Error body shape shared by the backend's rejection responses.
#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// Registration service backed by the fest backend's REST API
/// (`POST {base}/api/registrations`).
pub struct HttpRegistrationService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRegistrationService {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn submit_url(&self) -> String {
        format!(
            "{}{}",
            self.base_url.trim_end_matches('/'),
            REGISTRATIONS_ENDPOINT
        )
    }

    async fn error_message(response: reqwest::Response, fallback: &str) -> String {
        let status = response.status();
        let body: ApiErrorBody = response.json().await.unwrap_or_default();
        body.message
            .unwrap_or_else(|| format!("{} (status {})", fallback, status))
    }
}

#[async_trait]
impl RegistrationService for HttpRegistrationService {
    #[instrument(skip(self, payload), fields(event = %payload.event_id))]
    async fn submit(&self, payload: &SubmissionPayload) -> Result<SubmissionReceipt> {
        let url = self.submit_url();
        let response = self.client.post(&url).json(payload).send().await?;

        let status = response.status();
        match status {
            s if s.is_success() => {
                let body: SubmitResponse = response.json().await?;
                debug!(registration_id = %body.registration_id, "submission accepted");
                Ok(SubmissionReceipt {
                    registration_id: body.registration_id,
                })
            }
            StatusCode::BAD_REQUEST => {
                let message = Self::error_message(response, "registration rejected").await;
                warn!(%message, "server re-validation failed");
                Err(RegistrationError::ValidationRejected(message))
            }
            StatusCode::PAYMENT_REQUIRED | StatusCode::UNPROCESSABLE_ENTITY => {
                let message = Self::error_message(response, "transaction not recognized").await;
                warn!(%message, "payment verification failed");
                Err(RegistrationError::PaymentNotVerified(message))
            }
            s => {
                let message = Self::error_message(response, "service error").await;
                warn!(status = %s, %message, "registration service unavailable");
                Err(RegistrationError::ServiceUnavailable(message))
            }
        }
    }
}
