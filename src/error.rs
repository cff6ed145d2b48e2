use crate::types::PaymentStatus;
use crate::wizard::Stage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistrationError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("no event supplied to the registration wizard")]
    MissingEvent,

    #[error("event not found: {0}")]
    EventNotFound(String),

    #[error("registration window is closed for event: {0}")]
    RegistrationClosed(String),

    #[error("invalid event descriptor: {0}")]
    InvalidEvent(String),

    #[error("registration form is invalid: {} field(s) need attention", .0.len())]
    FormInvalid(crate::validate::ErrorMap),

    #[error("a transaction id is required to confirm payment")]
    MissingTransactionId,

    #[error("cannot {action} from the {from} stage")]
    InvalidTransition { from: Stage, action: &'static str },

    #[error("cannot navigate back while payment is {0}")]
    PaymentLocked(PaymentStatus),

    #[error("registration rejected by server: {0}")]
    ValidationRejected(String),

    #[error("payment not verified: {0}")]
    PaymentNotVerified(String),

    #[error("registration service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("payment confirmation timed out after {0} ms")]
    ConfirmTimeout(u64),
}

impl RegistrationError {
    /// Whether the caller may retry the same confirm call without changing the draft.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RegistrationError::ServiceUnavailable(_)
                | RegistrationError::ConfirmTimeout(_)
                | RegistrationError::Http(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, RegistrationError>;
