use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Input kind of an event-defined custom field. `Select` carries its own
/// option list; everything else is a plain text-ish input distinguished only
/// for rendering and shape checks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Number,
    Tel,
    Email,
    TextArea,
    Select { options: Vec<String> },
}

/// One event-defined registration form field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomField {
    pub name: String,
    pub label: String,
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
}

fn default_max_team_size() -> u32 {
    1
}

fn default_registration_open() -> bool {
    true
}

/// Read-only event metadata that parameterizes registration validation.
/// Supplied by the external catalog; never mutated by the wizard.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDescriptor {
    pub id: String,
    pub name: String,
    pub department: String,
    /// Registration fee in whole currency units, charged per head.
    pub fee: u32,
    #[serde(default)]
    pub is_team_event: bool,
    #[serde(default = "default_max_team_size")]
    pub max_team_size: u32,
    #[serde(default)]
    pub custom_fields: Vec<CustomField>,
    #[serde(default)]
    pub rules: Vec<String>,
    #[serde(default = "default_registration_open")]
    pub registration_open: bool,
}

impl EventDescriptor {
    /// Total head count the event admits per registration, primary included.
    /// Individual events always admit exactly one, whatever the raw data said.
    pub fn team_capacity(&self) -> u32 {
        if self.is_team_event {
            self.max_team_size.max(1)
        } else {
            1
        }
    }

    /// How many team members may be added beyond the primary participant.
    pub fn max_additional_members(&self) -> usize {
        (self.team_capacity() - 1) as usize
    }
}

/// The primary registrant's details, plus values for the event's custom
/// fields keyed by `CustomField::name`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantInfo {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub department: String,
    pub year: String,
    pub roll_number: String,
    #[serde(flatten)]
    pub custom: BTreeMap<String, String>,
}

/// A teammate on a team-event registration. Only name and email are
/// mandatory; department and year are nice-to-haves.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMember {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub year: Option<String>,
}

/// Payment progress on a draft. Moves Pending -> Processing -> Completed,
/// with Processing -> Pending the only reversal (external failure).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Completed,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "pending"),
            PaymentStatus::Processing => write!(f, "processing"),
            PaymentStatus::Completed => write!(f, "completed"),
        }
    }
}

/// The in-progress registration, owned exclusively by one wizard instance.
///
/// Invariant: `transaction_id` is non-empty exactly when `payment_status`
/// is Processing or Completed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationDraft {
    pub participant: ParticipantInfo,
    pub team_members: Vec<TeamMember>,
    pub event: EventDescriptor,
    pub payment_status: PaymentStatus,
    pub transaction_id: String,
}

impl RegistrationDraft {
    pub fn new(event: EventDescriptor) -> Self {
        Self {
            participant: ParticipantInfo::default(),
            team_members: Vec::new(),
            event,
            payment_status: PaymentStatus::Pending,
            transaction_id: String::new(),
        }
    }
}

/// What the wizard hands to the external registration service on confirm.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionPayload {
    pub event_id: String,
    pub participant: ParticipantInfo,
    pub team_members: Vec<TeamMember>,
    pub transaction_id: String,
    pub amount: u32,
    pub timestamp: DateTime<Utc>,
}

/// The service's acknowledgement of a submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReceipt {
    pub registration_id: String,
}

/// The sealed registration record produced once the confirm handshake
/// succeeds. Immutable thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizedRegistration {
    pub registration_id: String,
    pub event_id: String,
    pub participant: ParticipantInfo,
    pub team_members: Vec<TeamMember>,
    pub transaction_id: String,
    pub total_amount: u32,
    pub submitted_at: DateTime<Utc>,
}

/// External source of event metadata. The wizard is never instantiated
/// without a descriptor resolved through this.
#[async_trait]
pub trait EventCatalog: Send + Sync {
    /// Look up one event; `EventNotFound` if the id is unknown.
    async fn get_event(&self, event_id: &str) -> Result<EventDescriptor>;

    /// All events currently in the catalog.
    async fn list_events(&self) -> Result<Vec<EventDescriptor>>;
}

/// External sink for finished registrations. Failure modes are mapped onto
/// `ValidationRejected`, `PaymentNotVerified` and `ServiceUnavailable`.
#[async_trait]
pub trait RegistrationService: Send + Sync {
    async fn submit(&self, payload: &SubmissionPayload) -> Result<SubmissionReceipt>;
}
