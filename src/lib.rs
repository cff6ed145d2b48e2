pub mod catalog;
pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod payment;
pub mod service;
pub mod types;
pub mod validate;
pub mod wizard;

pub use catalog::InMemoryCatalog;
pub use config::Config;
pub use error::{RegistrationError, Result};
pub use service::{HttpRegistrationService, InMemoryRegistrationService};
pub use types::{
    CustomField, EventCatalog, EventDescriptor, FieldKind, FinalizedRegistration,
    ParticipantInfo, PaymentStatus, RegistrationDraft, RegistrationService, SubmissionPayload,
    SubmissionReceipt, TeamMember,
};
pub use validate::{validate, ErrorMap};
pub use wizard::{RegistrationWizard, Stage};
