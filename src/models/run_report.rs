//! # Run Report
//!
//! Summary of one orchestrator invocation. A report is accumulated through a
//! [`RunReportBuilder`] owned by the running orchestrator and frozen into an
//! immutable [`RunReport`] when the run ends.

use super::guest_record::RecordId;
use crate::error::{ErrorKind, PipelineError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Result of pushing one record through the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordOutcome {
    pub record_id: RecordId,
    pub guest_name: String,
    pub success: bool,
    pub message: String,
    /// Submission attempts made, zero when the record failed before submission
    pub attempts: u32,
}

/// A failure that ended the run rather than a single record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunFailure {
    pub kind: ErrorKind,
    pub message: String,
    pub record_id: Option<RecordId>,
}

impl RunFailure {
    pub fn from_error(error: &PipelineError, record_id: Option<RecordId>) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
            record_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    processed_count: usize,
    success_count: usize,
    failure_count: usize,
    outcomes: Vec<RecordOutcome>,
    run_failure: Option<RunFailure>,
    persistence_errors: usize,
    cancelled: bool,
}

impl RunReport {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> DateTime<Utc> {
        self.finished_at
    }

    pub fn processed_count(&self) -> usize {
        self.processed_count
    }

    pub fn success_count(&self) -> usize {
        self.success_count
    }

    pub fn failure_count(&self) -> usize {
        self.failure_count
    }

    pub fn outcomes(&self) -> &[RecordOutcome] {
        &self.outcomes
    }

    pub fn outcome_for(&self, record_id: &RecordId) -> Option<&RecordOutcome> {
        self.outcomes.iter().find(|o| &o.record_id == record_id)
    }

    pub fn run_failure(&self) -> Option<&RunFailure> {
        self.run_failure.as_ref()
    }

    pub fn persistence_errors(&self) -> usize {
        self.persistence_errors
    }

    pub fn was_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn is_clean(&self) -> bool {
        self.failure_count == 0 && self.run_failure.is_none() && !self.cancelled
    }
}

/// Accumulator for a [`RunReport`] while the run is in flight.
#[derive(Debug)]
pub struct RunReportBuilder {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    outcomes: Vec<RecordOutcome>,
    run_failure: Option<RunFailure>,
    persistence_errors: usize,
    cancelled: bool,
}

impl RunReportBuilder {
    pub fn start() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            outcomes: Vec::new(),
            run_failure: None,
            persistence_errors: 0,
            cancelled: false,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn record_outcome(&mut self, outcome: RecordOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn record_persistence_error(&mut self) {
        self.persistence_errors += 1;
    }

    pub fn abort(&mut self, failure: RunFailure) {
        self.run_failure = Some(failure);
    }

    pub fn mark_cancelled(&mut self) {
        self.cancelled = true;
    }

    /// Freeze the accumulated outcomes. Counts are derived from the outcome list so
    /// `processed == success + failure` holds by construction.
    pub fn finish(self) -> RunReport {
        let success_count = self.outcomes.iter().filter(|o| o.success).count();
        let processed_count = self.outcomes.len();
        RunReport {
            run_id: self.run_id,
            started_at: self.started_at,
            finished_at: Utc::now(),
            processed_count,
            success_count,
            failure_count: processed_count - success_count,
            outcomes: self.outcomes,
            run_failure: self.run_failure,
            persistence_errors: self.persistence_errors,
            cancelled: self.cancelled,
        }
    }
}
