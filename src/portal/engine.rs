//! # Portal Automation Engine
//!
//! Drives one remote session through
//! `Disconnected → Authenticated → ContextSelected → FormReady → Submitted → {Confirmed | Rejected}`
//! for a single record, once. Every call to [`PortalAutomationEngine::submit`]
//! opens a fresh session and runs a single-use [`SubmissionAttempt`] on it; no
//! session state survives from one attempt to the next.
//!
//! The engine never retries. Failures are classified so the caller can decide:
//!
//! | Failing step | Error |
//! |---|---|
//! | opening the session | `AutomationStep` (retryable) |
//! | authenticate | `Authentication` (aborts the run) |
//! | any later step | `AutomationStep` (retryable) |
//! | no confirmation in time | `Timeout` (retryable) |
//! | explicit rejection | `AutomationStep` to `rejected` (retryable) |
//!
//! Before any error is returned a diagnostic artifact is captured, tagged with the
//! record id and the failing transition, and the session is always closed.

use super::driver::{Confirmation, DiagnosticArtifact, DriverError, RemoteSessionDriver, SessionFactory};
use super::form::GuestForm;
use crate::config::PortalConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::logging::log_portal_step;
use crate::models::{GuestRecord, RecordId};
use crate::state_machine::{SessionEvent, SessionState};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Successful submission of one record
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionReceipt {
    pub record_id: RecordId,
    pub attempt: u32,
    pub confirmation_reference: Option<String>,
    pub attachment_submitted: bool,
    pub confirmed_at: DateTime<Utc>,
}

/// Why a bounded driver call did not succeed
#[derive(Debug)]
enum StepFailure {
    Driver(DriverError),
    TimedOut(Duration),
}

impl std::fmt::Display for StepFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Driver(error) => write!(f, "{error}"),
            Self::TimedOut(timeout) => write!(f, "no response within {timeout:?}"),
        }
    }
}

async fn bounded<T>(
    timeout: Duration,
    call: impl Future<Output = Result<T, DriverError>>,
) -> Result<T, StepFailure> {
    match tokio::time::timeout(timeout, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(error)) => Err(StepFailure::Driver(error)),
        Err(_) => Err(StepFailure::TimedOut(timeout)),
    }
}

pub struct PortalAutomationEngine {
    sessions: Arc<dyn SessionFactory>,
    config: PortalConfig,
}

impl std::fmt::Debug for PortalAutomationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortalAutomationEngine")
            .field("config", &self.config)
            .finish()
    }
}

impl PortalAutomationEngine {
    pub fn new(sessions: Arc<dyn SessionFactory>, config: PortalConfig) -> Self {
        Self { sessions, config }
    }

    pub fn config(&self) -> &PortalConfig {
        &self.config
    }

    /// Run one complete submission attempt for `record` on a new session.
    pub async fn submit(
        &self,
        record: &GuestRecord,
        attachment: Option<&Path>,
        attempt: u32,
    ) -> PipelineResult<SubmissionReceipt> {
        let driver = bounded(self.config.step_timeout(), self.sessions.open_session())
            .await
            .map_err(|failure| PipelineError::AutomationStep {
                record_id: record.id.to_string(),
                from: SessionState::Disconnected,
                to: SessionState::Authenticated,
                reason: format!("could not open session: {failure}"),
            })?;

        debug!(record_id = %record.id, attempt = attempt, "Remote session opened");

        let mut submission = SubmissionAttempt::new(record.id.clone(), attempt, driver, &self.config);
        let result = submission.drive(record, attachment).await;
        let diagnostics = submission.finish().await;

        match &result {
            Ok(receipt) => info!(
                record_id = %record.id,
                attempt = attempt,
                reference = ?receipt.confirmation_reference,
                "✅ Portal confirmed guest submission"
            ),
            Err(error) => warn!(
                record_id = %record.id,
                attempt = attempt,
                error = %error,
                diagnostics = diagnostics.len(),
                "❌ Portal submission attempt failed"
            ),
        }
        result
    }
}

/// State of one record on one session, for one try
pub struct SubmissionAttempt {
    record_id: RecordId,
    attempt: u32,
    state: SessionState,
    driver: Box<dyn RemoteSessionDriver>,
    diagnostics: Vec<DiagnosticArtifact>,
    context_id: String,
    credentials: crate::config::PortalCredentials,
    step_timeout: Duration,
    confirmation_timeout: Duration,
}

impl SubmissionAttempt {
    pub fn new(
        record_id: RecordId,
        attempt: u32,
        driver: Box<dyn RemoteSessionDriver>,
        config: &PortalConfig,
    ) -> Self {
        Self {
            record_id,
            attempt,
            state: SessionState::Disconnected,
            driver,
            diagnostics: Vec::new(),
            context_id: config.context_id.clone(),
            credentials: config.credentials.clone(),
            step_timeout: config.step_timeout(),
            confirmation_timeout: config.confirmation_timeout(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn diagnostics(&self) -> &[DiagnosticArtifact] {
        &self.diagnostics
    }

    /// Walk the session from `Disconnected` to a terminal state.
    pub async fn drive(
        &mut self,
        record: &GuestRecord,
        attachment: Option<&Path>,
    ) -> PipelineResult<SubmissionReceipt> {
        let outcome = bounded(self.step_timeout, self.driver.authenticate(&self.credentials)).await;
        self.advance(SessionEvent::Authenticate, outcome).await?;

        let outcome = bounded(self.step_timeout, self.driver.select_context(&self.context_id)).await;
        self.advance(SessionEvent::SelectContext, outcome).await?;

        let outcome = bounded(self.step_timeout, self.driver.navigate_to_submission_surface()).await;
        self.advance(SessionEvent::OpenForm, outcome).await?;

        let attachment_submitted = self.fill_and_submit(record, attachment).await?;

        self.await_confirmation(attachment_submitted).await
    }

    async fn fill_and_submit(
        &mut self,
        record: &GuestRecord,
        attachment: Option<&Path>,
    ) -> PipelineResult<bool> {
        let form = GuestForm::from_record(record);
        for entry in form.entries() {
            if !entry.required && entry.value.is_empty() {
                continue;
            }
            let outcome = bounded(self.step_timeout, self.driver.set_field(entry.field, &entry.value)).await;
            match outcome {
                Ok(()) => {}
                Err(failure) if entry.required => {
                    return Err(self
                        .fail(SessionState::Submitted, format!("field {}: {failure}", entry.field))
                        .await);
                }
                Err(failure) => warn!(
                    record_id = %self.record_id,
                    field = %entry.field,
                    error = %failure,
                    "Optional field not set, continuing"
                ),
            }
        }

        let attachment_submitted = match attachment {
            Some(path) => self.attach(path).await,
            None => false,
        };

        let outcome = bounded(self.step_timeout, self.driver.submit()).await;
        self.advance(SessionEvent::Submit, outcome).await?;
        Ok(attachment_submitted)
    }

    /// Attachment problems never fail the attempt; the form goes without it.
    async fn attach(&mut self, path: &Path) -> bool {
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            warn!(record_id = %self.record_id, path = %path.display(), "Staged attachment missing, submitting without it");
            return false;
        }
        match bounded(self.step_timeout, self.driver.attach_file(path)).await {
            Ok(()) => true,
            Err(failure) => {
                warn!(
                    record_id = %self.record_id,
                    path = %path.display(),
                    error = %failure,
                    "⚠️ Attachment upload failed, submitting without it"
                );
                false
            }
        }
    }

    async fn await_confirmation(&mut self, attachment_submitted: bool) -> PipelineResult<SubmissionReceipt> {
        let outcome = bounded(
            self.confirmation_timeout,
            self.driver.await_confirmation(self.confirmation_timeout),
        )
        .await;

        match outcome {
            Ok(Confirmation::Confirmed { reference }) => {
                self.advance(SessionEvent::Confirm, Ok(())).await?;
                Ok(SubmissionReceipt {
                    record_id: self.record_id.clone(),
                    attempt: self.attempt,
                    confirmation_reference: reference,
                    attachment_submitted,
                    confirmed_at: Utc::now(),
                })
            }
            Ok(Confirmation::Rejected { reason }) => {
                Err(self.fail(SessionState::Rejected, format!("portal rejected submission: {reason}")).await)
            }
            Err(StepFailure::TimedOut(timeout)) | Err(StepFailure::Driver(DriverError::Timeout(timeout))) => {
                self.capture(SessionState::Rejected).await;
                self.state = SessionState::Rejected;
                Err(PipelineError::Timeout {
                    operation: format!("portal confirmation for record {}", self.record_id),
                    timeout,
                })
            }
            Err(failure) => Err(self.fail(SessionState::Confirmed, failure.to_string()).await),
        }
    }

    /// Move to the state `event` leads to, or fail the attempt on that transition.
    async fn advance(
        &mut self,
        event: SessionEvent,
        outcome: Result<(), StepFailure>,
    ) -> PipelineResult<()> {
        let target = self.state.apply(event).map_err(|e| PipelineError::AutomationStep {
            record_id: self.record_id.to_string(),
            from: self.state,
            to: self.state,
            reason: e.to_string(),
        })?;

        match outcome {
            Ok(()) => {
                log_portal_step(self.record_id.as_str(), self.state.as_str(), target.as_str(), self.attempt);
                self.state = target;
                Ok(())
            }
            Err(failure) => Err(self.fail(target, failure.to_string()).await),
        }
    }

    /// Capture diagnostics for the failed `current → to` transition and classify it.
    async fn fail(&mut self, to: SessionState, reason: String) -> PipelineError {
        let from = self.state;
        self.capture(to).await;
        if to.is_terminal() {
            self.state = SessionState::Rejected;
        }

        if from == SessionState::Disconnected {
            PipelineError::Authentication { reason }
        } else {
            PipelineError::AutomationStep {
                record_id: self.record_id.to_string(),
                from,
                to,
                reason,
            }
        }
    }

    async fn capture(&mut self, to: SessionState) {
        let tag = format!("{}-{}-{}", self.record_id, self.state, to);
        match bounded(self.step_timeout, self.driver.capture_diagnostic(&tag)).await {
            Ok(artifact) => {
                debug!(record_id = %self.record_id, tag = %tag, location = ?artifact.location, "Diagnostic captured");
                self.diagnostics.push(artifact);
            }
            Err(failure) => warn!(
                record_id = %self.record_id,
                tag = %tag,
                error = %failure,
                "Could not capture diagnostic"
            ),
        }
    }

    /// Close the session and hand back any diagnostics gathered.
    pub async fn finish(mut self) -> Vec<DiagnosticArtifact> {
        if let Err(failure) = bounded(self.step_timeout, self.driver.close()).await {
            warn!(record_id = %self.record_id, error = %failure, "Session did not close cleanly");
        }
        self.diagnostics
    }
}
