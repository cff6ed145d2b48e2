use crate::constants::DEFAULT_CONFIRM_TIMEOUT_MS;
use crate::error::{RegistrationError, Result};
use crate::payment;
use crate::types::{
    EventCatalog, EventDescriptor, FinalizedRegistration, ParticipantInfo, PaymentStatus,
    RegistrationDraft, RegistrationService, TeamMember,
};
use crate::validate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Where the user is in the registration flow. Abandonment is not a stage;
/// it is simply dropping the wizard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Details,
    RegistrationForm,
    Payment,
    Completed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Details => write!(f, "details"),
            Stage::RegistrationForm => write!(f, "registration form"),
            Stage::Payment => write!(f, "payment"),
            Stage::Completed => write!(f, "completed"),
        }
    }
}

/// Three-stage registration flow: event details, registration form, payment.
///
/// The wizard exclusively owns its draft; all mutation goes through wizard
/// methods so the stage guards cannot be bypassed. `confirm` borrows the
/// wizard mutably for the whole handshake, so a dropped wizard can never be
/// mutated by a late service response.
#[derive(Debug)]
pub struct RegistrationWizard {
    draft: RegistrationDraft,
    stage: Stage,
    confirm_timeout: Duration,
    last_error: Option<String>,
    finalized: Option<FinalizedRegistration>,
}

impl RegistrationWizard {
    /// Build a wizard for a resolved event. The surrounding page is expected
    /// to redirect to the catalog on `MissingEvent` / `RegistrationClosed`
    /// rather than rendering the wizard at all.
    pub fn new(event: Option<EventDescriptor>) -> Result<Self> {
        let mut event = event.ok_or(RegistrationError::MissingEvent)?;
        if !event.registration_open {
            return Err(RegistrationError::RegistrationClosed(event.id));
        }
        // A team event with no room for teammates could never pass the
        // validator, so refuse it up front like a closed window.
        if event.is_team_event && event.max_team_size < 2 {
            return Err(RegistrationError::InvalidEvent(format!(
                "team event '{}' admits no team members (max team size {})",
                event.id, event.max_team_size
            )));
        }
        // Individual events admit exactly one head regardless of raw data.
        if !event.is_team_event {
            event.max_team_size = 1;
        }
        info!(event = %event.id, team = event.is_team_event, "registration wizard opened");
        Ok(Self {
            draft: RegistrationDraft::new(event),
            stage: Stage::Details,
            confirm_timeout: Duration::from_millis(DEFAULT_CONFIRM_TIMEOUT_MS),
            last_error: None,
            finalized: None,
        })
    }

    /// Resolve the event through the catalog, then build the wizard.
    pub async fn for_event(catalog: &dyn EventCatalog, event_id: &str) -> Result<Self> {
        let event = catalog.get_event(event_id).await?;
        Self::new(Some(event))
    }

    /// Cap the external confirm call. Transient by default; see `Config`.
    pub fn with_confirm_timeout(mut self, timeout: Duration) -> Self {
        self.confirm_timeout = timeout;
        self
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn draft(&self) -> &RegistrationDraft {
        &self.draft
    }

    pub fn event(&self) -> &EventDescriptor {
        &self.draft.event
    }

    pub fn payment_status(&self) -> PaymentStatus {
        self.draft.payment_status
    }

    /// Message from the most recent failed confirm, if any. Cleared on
    /// success and on restart.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// The sealed record, present only once the wizard has completed.
    pub fn finalized(&self) -> Option<&FinalizedRegistration> {
        self.finalized.as_ref()
    }

    /// Payable total for the draft as it stands.
    pub fn total_amount(&self) -> u32 {
        payment::compute_total(&self.draft.event, &self.draft.team_members)
    }

    /// Replace the participant details. Only allowed before the payment
    /// stage; afterwards the form is behind the validation gate.
    pub fn set_participant(&mut self, participant: ParticipantInfo) -> Result<()> {
        self.ensure_editable("edit participant details")?;
        self.draft.participant = participant;
        Ok(())
    }

    /// Set one custom-field value on the participant.
    pub fn set_custom_field(&mut self, name: &str, value: &str) -> Result<()> {
        self.ensure_editable("edit custom fields")?;
        self.draft
            .participant
            .custom
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    /// Add a team member. Returns `Ok(false)` without changing the draft if
    /// the event is individual or the team cap is already reached; the UI
    /// disables the control rather than surfacing a validation error.
    pub fn add_team_member(&mut self, member: TeamMember) -> Result<bool> {
        self.ensure_editable("add a team member")?;
        let event = &self.draft.event;
        if !event.is_team_event {
            warn!(event = %event.id, "ignoring team member on an individual event");
            return Ok(false);
        }
        if self.draft.team_members.len() >= event.max_additional_members() {
            debug!(
                event = %event.id,
                cap = event.max_additional_members(),
                "team member cap reached"
            );
            return Ok(false);
        }
        self.draft.team_members.push(member);
        Ok(true)
    }

    /// Remove the team member at `index`; out-of-range is a no-op.
    pub fn remove_team_member(&mut self, index: usize) -> Result<()> {
        self.ensure_editable("remove a team member")?;
        if index < self.draft.team_members.len() {
            self.draft.team_members.remove(index);
        }
        Ok(())
    }

    /// Details -> RegistrationForm. Unconditional.
    pub fn start(&mut self) -> Result<()> {
        match self.stage {
            Stage::Details => {
                self.stage = Stage::RegistrationForm;
                Ok(())
            }
            from => Err(RegistrationError::InvalidTransition { from, action: "start" }),
        }
    }

    /// RegistrationForm -> Payment, gated on the validator. On failure the
    /// stage is unchanged and the field errors ride in `FormInvalid`.
    pub fn continue_to_payment(&mut self) -> Result<()> {
        if self.stage != Stage::RegistrationForm {
            return Err(RegistrationError::InvalidTransition {
                from: self.stage,
                action: "continue",
            });
        }
        let errors = validate::validate(
            &self.draft.participant,
            &self.draft.team_members,
            &self.draft.event,
        );
        if !errors.is_empty() {
            debug!(fields = errors.len(), "registration form failed validation");
            return Err(RegistrationError::FormInvalid(errors));
        }
        self.stage = Stage::Payment;
        info!(event = %self.draft.event.id, amount = self.total_amount(), "form accepted");
        Ok(())
    }

    /// Step back one stage. Blocked from the payment stage once the payment
    /// is processing or completed, so a submission cannot be edited out from
    /// under an in-flight confirm.
    pub fn previous(&mut self) -> Result<()> {
        match self.stage {
            Stage::RegistrationForm => {
                self.stage = Stage::Details;
                Ok(())
            }
            Stage::Payment => match self.draft.payment_status {
                PaymentStatus::Pending => {
                    self.stage = Stage::RegistrationForm;
                    Ok(())
                }
                status => Err(RegistrationError::PaymentLocked(status)),
            },
            from => Err(RegistrationError::InvalidTransition { from, action: "go back" }),
        }
    }

    /// Clear the draft back to a fresh Details stage for the same event.
    /// Unavailable while a confirm is in flight and after completion; a
    /// completed wizard is replaced, not reused.
    pub fn restart(&mut self) -> Result<()> {
        match self.draft.payment_status {
            PaymentStatus::Processing => {
                return Err(RegistrationError::PaymentLocked(PaymentStatus::Processing))
            }
            PaymentStatus::Completed => {
                return Err(RegistrationError::InvalidTransition {
                    from: self.stage,
                    action: "restart",
                })
            }
            PaymentStatus::Pending => {}
        }
        let event = self.draft.event.clone();
        self.draft = RegistrationDraft::new(event);
        self.stage = Stage::Details;
        self.last_error = None;
        Ok(())
    }

    /// Confirm payment and submit the registration.
    ///
    /// Moves the payment to Processing, awaits the service under the
    /// configured timeout, and either seals the draft into a
    /// `FinalizedRegistration` (stage Completed) or reverts to Pending with
    /// the failure recorded in `last_error`. Reverted confirms are safely
    /// retryable: the draft, the total and the event identity are untouched.
    #[instrument(skip(self, service), fields(event = %self.draft.event.id))]
    pub async fn confirm(
        &mut self,
        transaction_id: &str,
        service: &dyn RegistrationService,
    ) -> Result<FinalizedRegistration> {
        if self.stage != Stage::Payment {
            return Err(RegistrationError::InvalidTransition {
                from: self.stage,
                action: "confirm payment",
            });
        }
        if self.draft.payment_status == PaymentStatus::Completed {
            return Err(RegistrationError::InvalidTransition {
                from: self.stage,
                action: "confirm payment again",
            });
        }
        let transaction_id = transaction_id.trim();
        if transaction_id.is_empty() {
            // Purely local check; no network call is attempted.
            return Err(RegistrationError::MissingTransactionId);
        }

        // A Processing status here means a previous confirm future was
        // dropped mid-await; treat this call as its retry.
        self.draft.transaction_id = transaction_id.to_string();
        self.draft.payment_status = PaymentStatus::Processing;

        let payload = payment::build_payload(
            &self.draft.event,
            &self.draft.participant,
            &self.draft.team_members,
            transaction_id,
        );
        info!(amount = payload.amount, "submitting registration");

        let timeout_ms = self.confirm_timeout.as_millis() as u64;
        let outcome = tokio::time::timeout(self.confirm_timeout, service.submit(&payload)).await;
        let receipt = match outcome {
            Ok(Ok(receipt)) => receipt,
            Ok(Err(err)) => {
                warn!(error = %err, "registration service refused the submission");
                self.revert_to_pending(&err);
                return Err(err);
            }
            Err(_) => {
                let err = RegistrationError::ConfirmTimeout(timeout_ms);
                warn!(timeout_ms, "registration service did not answer in time");
                self.revert_to_pending(&err);
                return Err(err);
            }
        };

        let registration_id = if receipt.registration_id.trim().is_empty() {
            payment::placeholder_registration_id(&payload.event_id)
        } else {
            receipt.registration_id
        };

        self.draft.payment_status = PaymentStatus::Completed;
        self.stage = Stage::Completed;
        self.last_error = None;
        let finalized = FinalizedRegistration {
            registration_id,
            event_id: payload.event_id,
            participant: payload.participant,
            team_members: payload.team_members,
            transaction_id: payload.transaction_id,
            total_amount: payload.amount,
            submitted_at: payload.timestamp,
        };
        info!(registration_id = %finalized.registration_id, "registration completed");
        self.finalized = Some(finalized.clone());
        Ok(finalized)
    }

    fn revert_to_pending(&mut self, err: &RegistrationError) {
        // Invariant: a pending draft carries no transaction id.
        self.draft.payment_status = PaymentStatus::Pending;
        self.draft.transaction_id.clear();
        self.last_error = Some(err.to_string());
    }

    fn ensure_editable(&self, action: &'static str) -> Result<()> {
        match self.stage {
            Stage::Details | Stage::RegistrationForm => Ok(()),
            from => Err(RegistrationError::InvalidTransition { from, action }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SubmissionPayload, SubmissionReceipt};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn team_event() -> EventDescriptor {
        EventDescriptor {
            id: "robo-wars".into(),
            name: "Robo Wars".into(),
            department: "ECE".into(),
            fee: 50,
            is_team_event: true,
            max_team_size: 3,
            custom_fields: vec![],
            rules: vec![],
            registration_open: true,
        }
    }

    fn individual_event() -> EventDescriptor {
        EventDescriptor {
            is_team_event: false,
            max_team_size: 1,
            id: "code-sprint".into(),
            name: "Code Sprint".into(),
            department: "CSE".into(),
            fee: 100,
            custom_fields: vec![],
            rules: vec![],
            registration_open: true,
        }
    }

    fn participant() -> ParticipantInfo {
        ParticipantInfo {
            name: "Asha Rao".into(),
            email: "asha@example.com".into(),
            phone: "9876543210".into(),
            department: "CSE".into(),
            year: "3".into(),
            roll_number: "21CS042".into(),
            custom: Default::default(),
        }
    }

    fn member(name: &str) -> TeamMember {
        TeamMember {
            name: name.into(),
            email: format!("{}@example.com", name.to_lowercase()),
            ..Default::default()
        }
    }

    /// Succeeds every time, counting submissions.
    struct OkService {
        submissions: AtomicU32,
    }

    impl OkService {
        fn new() -> Self {
            Self { submissions: AtomicU32::new(0) }
        }
    }

    #[async_trait]
    impl RegistrationService for OkService {
        async fn submit(&self, payload: &SubmissionPayload) -> crate::error::Result<SubmissionReceipt> {
            let n = self.submissions.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(SubmissionReceipt {
                registration_id: format!("SRV-{}-{}", payload.event_id, n),
            })
        }
    }

    /// Fails with `ServiceUnavailable` for the first `failures` calls.
    struct FlakyService {
        failures: AtomicU32,
        submissions: AtomicU32,
    }

    impl FlakyService {
        fn failing(failures: u32) -> Self {
            Self {
                failures: AtomicU32::new(failures),
                submissions: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl RegistrationService for FlakyService {
        async fn submit(&self, payload: &SubmissionPayload) -> crate::error::Result<SubmissionReceipt> {
            self.submissions.fetch_add(1, Ordering::SeqCst);
            if self.failures.load(Ordering::SeqCst) > 0 {
                self.failures.fetch_sub(1, Ordering::SeqCst);
                return Err(RegistrationError::ServiceUnavailable("try later".into()));
            }
            Ok(SubmissionReceipt {
                registration_id: format!("SRV-{}", payload.event_id),
            })
        }
    }

    /// Never answers; used to observe the Processing window.
    struct HangingService;

    #[async_trait]
    impl RegistrationService for HangingService {
        async fn submit(&self, _payload: &SubmissionPayload) -> crate::error::Result<SubmissionReceipt> {
            std::future::pending::<()>().await;
            unreachable!()
        }
    }

    fn wizard_at_payment(event: EventDescriptor, members: &[&str]) -> RegistrationWizard {
        let mut wizard = RegistrationWizard::new(Some(event)).unwrap();
        wizard.start().unwrap();
        wizard.set_participant(participant()).unwrap();
        for name in members {
            assert!(wizard.add_team_member(member(name)).unwrap());
        }
        wizard.continue_to_payment().unwrap();
        wizard
    }

    #[test]
    fn wizard_requires_an_event() {
        match RegistrationWizard::new(None) {
            Err(RegistrationError::MissingEvent) => {}
            other => panic!("expected MissingEvent, got {other:?}"),
        }
    }

    #[test]
    fn team_event_with_no_member_room_refuses_construction() {
        let mut event = team_event();
        event.max_team_size = 1;
        match RegistrationWizard::new(Some(event)) {
            Err(RegistrationError::InvalidEvent(msg)) => {
                assert!(msg.contains("robo-wars"), "unexpected message: {msg}");
            }
            other => panic!("expected InvalidEvent, got {other:?}"),
        }
    }

    #[test]
    fn wizard_debug_output_names_its_stage() {
        // Test assertions format wizards with {:?}; keep that printable.
        let wizard = RegistrationWizard::new(Some(individual_event())).unwrap();
        let rendered = format!("{wizard:?}");
        assert!(rendered.contains("stage"), "unexpected debug output: {rendered}");
        assert!(rendered.contains("Details"));
    }

    #[test]
    fn closed_registration_window_refuses_construction() {
        let mut event = individual_event();
        event.registration_open = false;
        match RegistrationWizard::new(Some(event)) {
            Err(RegistrationError::RegistrationClosed(id)) => assert_eq!(id, "code-sprint"),
            other => panic!("expected RegistrationClosed, got {other:?}"),
        }
    }

    #[test]
    fn continue_with_empty_form_keeps_stage_and_reports_fields() {
        let mut wizard = RegistrationWizard::new(Some(individual_event())).unwrap();
        wizard.start().unwrap();
        match wizard.continue_to_payment() {
            Err(RegistrationError::FormInvalid(errors)) => {
                assert!(!errors.is_empty());
                assert!(errors.contains_key("name"));
            }
            other => panic!("expected FormInvalid, got {other:?}"),
        }
        assert_eq!(wizard.stage(), Stage::RegistrationForm);
    }

    #[test]
    fn team_event_without_members_cannot_reach_payment() {
        let mut wizard = RegistrationWizard::new(Some(team_event())).unwrap();
        wizard.start().unwrap();
        wizard.set_participant(participant()).unwrap();
        match wizard.continue_to_payment() {
            Err(RegistrationError::FormInvalid(errors)) => {
                assert!(errors.contains_key("teamMembers"));
            }
            other => panic!("expected FormInvalid, got {other:?}"),
        }
        assert_eq!(wizard.stage(), Stage::RegistrationForm);
    }

    #[test]
    fn add_member_beyond_cap_is_a_no_op() {
        // max_team_size 3 leaves room for two members beyond the primary.
        let mut wizard = RegistrationWizard::new(Some(team_event())).unwrap();
        wizard.start().unwrap();
        assert!(wizard.add_team_member(member("Ravi")).unwrap());
        assert!(wizard.add_team_member(member("Meera")).unwrap());
        assert!(!wizard.add_team_member(member("Kiran")).unwrap());
        assert_eq!(wizard.draft().team_members.len(), 2);
    }

    #[test]
    fn individual_event_ignores_team_members() {
        let mut wizard = RegistrationWizard::new(Some(individual_event())).unwrap();
        wizard.start().unwrap();
        assert!(!wizard.add_team_member(member("Ravi")).unwrap());
        assert!(wizard.draft().team_members.is_empty());
    }

    #[test]
    fn previous_walks_back_through_the_form() {
        let mut wizard = wizard_at_payment(individual_event(), &[]);
        assert_eq!(wizard.stage(), Stage::Payment);
        wizard.previous().unwrap();
        assert_eq!(wizard.stage(), Stage::RegistrationForm);
        wizard.previous().unwrap();
        assert_eq!(wizard.stage(), Stage::Details);
        assert!(matches!(
            wizard.previous(),
            Err(RegistrationError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn editing_is_blocked_at_the_payment_stage() {
        let mut wizard = wizard_at_payment(individual_event(), &[]);
        assert!(matches!(
            wizard.set_participant(participant()),
            Err(RegistrationError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn individual_happy_path_finalizes() {
        let mut wizard = wizard_at_payment(individual_event(), &[]);
        let service = OkService::new();
        let finalized = wizard.confirm("TXN123", &service).await.unwrap();
        assert_eq!(finalized.total_amount, 100);
        assert!(!finalized.registration_id.is_empty());
        assert_eq!(finalized.transaction_id, "TXN123");
        assert_eq!(wizard.stage(), Stage::Completed);
        assert_eq!(wizard.payment_status(), PaymentStatus::Completed);
        assert!(wizard.finalized().is_some());
    }

    #[tokio::test]
    async fn empty_transaction_id_is_rejected_locally() {
        let mut wizard = wizard_at_payment(individual_event(), &[]);
        let service = OkService::new();
        match wizard.confirm("   ", &service).await {
            Err(RegistrationError::MissingTransactionId) => {}
            other => panic!("expected MissingTransactionId, got {other:?}"),
        }
        // No network call was attempted and the draft is untouched.
        assert_eq!(service.submissions.load(Ordering::SeqCst), 0);
        assert_eq!(wizard.payment_status(), PaymentStatus::Pending);
        assert!(wizard.draft().transaction_id.is_empty());
    }

    #[tokio::test]
    async fn transient_failure_reverts_to_pending_and_allows_retry() {
        let mut wizard = wizard_at_payment(team_event(), &["Ravi"]);
        let service = FlakyService::failing(1);

        let err = wizard.confirm("TXN9", &service).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(wizard.stage(), Stage::Payment);
        assert_eq!(wizard.payment_status(), PaymentStatus::Pending);
        assert!(wizard.draft().transaction_id.is_empty());
        assert_eq!(wizard.last_error(), Some("registration service unavailable: try later"));

        // Same transaction id, same draft; second attempt succeeds.
        let finalized = wizard.confirm("TXN9", &service).await.unwrap();
        assert_eq!(finalized.total_amount, 100);
        assert_eq!(service.submissions.load(Ordering::SeqCst), 2);
        assert!(wizard.last_error().is_none());
    }

    #[tokio::test]
    async fn confirm_times_out_and_stays_retryable() {
        let mut wizard = wizard_at_payment(individual_event(), &[])
            .with_confirm_timeout(Duration::from_millis(20));
        let err = wizard.confirm("TXN1", &HangingService).await.unwrap_err();
        assert!(matches!(err, RegistrationError::ConfirmTimeout(20)));
        assert_eq!(wizard.payment_status(), PaymentStatus::Pending);
        assert_eq!(wizard.stage(), Stage::Payment);
    }

    #[tokio::test]
    async fn back_navigation_is_blocked_while_processing() {
        let mut wizard = wizard_at_payment(individual_event(), &[]);
        {
            // Drop the confirm future at its await point, leaving the draft
            // mid-processing, the same observable window a UI would see.
            let outcome =
                tokio::time::timeout(Duration::ZERO, wizard.confirm("TXN5", &HangingService)).await;
            assert!(outcome.is_err());
        }
        assert_eq!(wizard.payment_status(), PaymentStatus::Processing);
        assert!(matches!(
            wizard.previous(),
            Err(RegistrationError::PaymentLocked(PaymentStatus::Processing))
        ));

        // A later confirm treats the stale Processing status as a retry.
        let service = OkService::new();
        let finalized = wizard.confirm("TXN5", &service).await.unwrap();
        assert_eq!(finalized.transaction_id, "TXN5");
    }

    #[tokio::test]
    async fn completed_wizard_refuses_further_transitions() {
        let mut wizard = wizard_at_payment(individual_event(), &[]);
        wizard.confirm("TXN2", &OkService::new()).await.unwrap();

        assert!(matches!(
            wizard.previous(),
            Err(RegistrationError::InvalidTransition { .. })
        ));
        assert!(matches!(
            wizard.confirm("TXN2", &OkService::new()).await,
            Err(RegistrationError::InvalidTransition { .. })
        ));
        assert!(matches!(
            wizard.restart(),
            Err(RegistrationError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn restart_clears_the_draft_back_to_details() {
        let mut wizard = RegistrationWizard::new(Some(team_event())).unwrap();
        wizard.start().unwrap();
        wizard.set_participant(participant()).unwrap();
        wizard.add_team_member(member("Ravi")).unwrap();

        wizard.restart().unwrap();
        assert_eq!(wizard.stage(), Stage::Details);
        assert!(wizard.draft().participant.name.is_empty());
        assert!(wizard.draft().team_members.is_empty());
        assert_eq!(wizard.payment_status(), PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn payment_status_never_skips_processing() {
        // Observable contract: a successful confirm lands on Completed, a
        // failed one back on Pending; the interstitial Processing status is
        // what blocks back-navigation above. Completed never regresses.
        let mut wizard = wizard_at_payment(individual_event(), &[]);
        assert_eq!(wizard.payment_status(), PaymentStatus::Pending);
        wizard.confirm("TXN3", &OkService::new()).await.unwrap();
        assert_eq!(wizard.payment_status(), PaymentStatus::Completed);
        wizard.confirm("TXN4", &OkService::new()).await.unwrap_err();
        assert_eq!(wizard.payment_status(), PaymentStatus::Completed);
    }
}
