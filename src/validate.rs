use crate::constants::TEAM_MEMBERS_KEY;
use crate::types::{EventDescriptor, ParticipantInfo, TeamMember};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

/// Field-keyed validation messages. Empty map means the form is valid.
/// Ordered so error listings render deterministically.
pub type ErrorMap = BTreeMap<String, String>;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex"));
static PHONE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]{10}$").expect("phone regex"));

/// Validate a registration form against the event's rules.
///
/// Pure and synchronous: no I/O, no hidden state, identical inputs always
/// produce identical maps. Keys are the wire-facing camelCase field names.
pub fn validate(
    participant: &ParticipantInfo,
    team_members: &[TeamMember],
    event: &EventDescriptor,
) -> ErrorMap {
    let mut errors = ErrorMap::new();

    require(&mut errors, "name", &participant.name, "Name is required");
    require(&mut errors, "email", &participant.email, "Email is required");
    require(&mut errors, "phone", &participant.phone, "Phone number is required");
    require(
        &mut errors,
        "department",
        &participant.department,
        "Department is required",
    );
    require(&mut errors, "year", &participant.year, "Year is required");
    require(
        &mut errors,
        "rollNumber",
        &participant.roll_number,
        "Roll number is required",
    );

    // Shape checks only apply once the field is non-empty, so they never
    // shadow a missing-field message.
    let email = participant.email.trim();
    if !email.is_empty() && !EMAIL_RE.is_match(email) {
        errors.insert("email".into(), "Enter a valid email address".into());
    }
    let phone = participant.phone.trim();
    if !phone.is_empty() && !PHONE_RE.is_match(phone) {
        errors.insert("phone".into(), "Enter a valid 10-digit phone number".into());
    }

    for field in &event.custom_fields {
        if !field.required {
            continue;
        }
        let value = participant
            .custom
            .get(&field.name)
            .map(String::as_str)
            .unwrap_or_default();
        if value.trim().is_empty() {
            errors.insert(field.name.clone(), format!("{} is required", field.label));
        }
    }

    if event.is_team_event {
        if team_members.is_empty() {
            errors.insert(
                TEAM_MEMBERS_KEY.into(),
                "At least one team member is required".into(),
            );
        }
        for (i, member) in team_members.iter().enumerate() {
            if member.name.trim().is_empty() {
                errors.insert(
                    format!("teamMember{i}Name"),
                    format!("Team member {} name is required", i + 1),
                );
            }
            if member.email.trim().is_empty() {
                errors.insert(
                    format!("teamMember{i}Email"),
                    format!("Team member {} email is required", i + 1),
                );
            }
        }
    }

    errors
}

fn require(errors: &mut ErrorMap, key: &str, value: &str, message: &str) {
    if value.trim().is_empty() {
        errors.insert(key.to_string(), message.to_string());
    }
}
