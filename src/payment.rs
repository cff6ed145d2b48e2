use crate::types::{EventDescriptor, ParticipantInfo, SubmissionPayload, TeamMember};
use chrono::Utc;
use rand::Rng;

/// Payable total for a registration: the event fee charged once per head,
/// primary participant included. Per-head pricing is the confirmed business
/// rule for team events.
pub fn compute_total(event: &EventDescriptor, team_members: &[TeamMember]) -> u32 {
    event.fee * (1 + team_members.len() as u32)
}

/// Client-side registration id used for display until (or unless) the
/// service receipt supplies one. Not globally unique; the service is the
/// source of truth.
pub fn placeholder_registration_id(event_id: &str) -> String {
    let suffix: u16 = rand::thread_rng().gen_range(0..10_000);
    format!("REG-{}-{}-{:04}", event_id, Utc::now().timestamp_millis(), suffix)
}

/// Assemble the payload handed to the registration service on confirm.
pub fn build_payload(
    event: &EventDescriptor,
    participant: &ParticipantInfo,
    team_members: &[TeamMember],
    transaction_id: &str,
) -> SubmissionPayload {
    SubmissionPayload {
        event_id: event.id.clone(),
        participant: participant.clone(),
        team_members: team_members.to_vec(),
        transaction_id: transaction_id.to_string(),
        amount: compute_total(event, team_members),
        timestamp: Utc::now(),
    }
}
