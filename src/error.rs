//! Error types for the guest submission pipeline.
//!
//! Every failure the pipeline can observe is expressed as a [`PipelineError`].
//! The orchestrator never inspects error messages; it only looks at
//! [`PipelineError::kind`] and [`PipelineError::is_retryable`] to decide whether a
//! record is retried, failed, or whether the whole run must be aborted.

use crate::config::ConfigurationError;
use crate::state_machine::SessionState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    #[error("Validation error for record {record_id}: missing required fields {missing_fields:?}")]
    Validation {
        record_id: String,
        missing_fields: Vec<String>,
    },
    #[error("Attachment fetch failed for {reference}: {reason}")]
    AttachmentFetch { reference: String, reason: String },
    #[error("Authentication rejected by portal: {reason}")]
    Authentication { reason: String },
    #[error("Automation step {from} -> {to} failed for record {record_id}: {reason}")]
    AutomationStep {
        record_id: String,
        from: SessionState,
        to: SessionState,
        reason: String,
    },
    #[error("Timed out after {timeout:?} waiting for {operation}")]
    Timeout {
        operation: String,
        timeout: Duration,
    },
    #[error("Persistence error during {operation}: {reason}")]
    Persistence { operation: String, reason: String },
    #[error("Record store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("A run is already in progress (held by {holder} since {since})")]
    RunInProgress {
        holder: String,
        since: DateTime<Utc>,
    },
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("I/O error: {0}")]
    Io(String),
}

/// Coarse classification of a [`PipelineError`], stable across message changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    AttachmentFetch,
    Authentication,
    AutomationStep,
    Timeout,
    Persistence,
    StoreUnavailable,
    RunInProgress,
    Configuration,
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Validation => "validation",
            Self::AttachmentFetch => "attachment_fetch",
            Self::Authentication => "authentication",
            Self::AutomationStep => "automation_step",
            Self::Timeout => "timeout",
            Self::Persistence => "persistence",
            Self::StoreUnavailable => "store_unavailable",
            Self::RunInProgress => "run_in_progress",
            Self::Configuration => "configuration",
            Self::Io => "io",
        };
        f.write_str(label)
    }
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::AttachmentFetch { .. } => ErrorKind::AttachmentFetch,
            Self::Authentication { .. } => ErrorKind::Authentication,
            Self::AutomationStep { .. } => ErrorKind::AutomationStep,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Persistence { .. } => ErrorKind::Persistence,
            Self::StoreUnavailable(_) => ErrorKind::StoreUnavailable,
            Self::RunInProgress { .. } => ErrorKind::RunInProgress,
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Io(_) => ErrorKind::Io,
        }
    }

    /// Whether another attempt of the same operation may succeed.
    ///
    /// Authentication failures are deliberately excluded: a rejected credential
    /// fails every subsequent attempt identically.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::AutomationStep | ErrorKind::Timeout | ErrorKind::AttachmentFetch | ErrorKind::Io
        )
    }

    /// Only authentication failures escalate from a record to the whole run.
    pub fn aborts_run(&self) -> bool {
        self.kind() == ErrorKind::Authentication
    }

    pub fn persistence(operation: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::Persistence {
            operation: operation.into(),
            reason: reason.to_string(),
        }
    }

    pub fn attachment_fetch(reference: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::AttachmentFetch {
            reference: reference.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(error: std::io::Error) -> Self {
        PipelineError::Io(error.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(error: serde_json::Error) -> Self {
        PipelineError::Io(format!("JSON serialization error: {error}"))
    }
}

impl From<ConfigurationError> for PipelineError {
    fn from(error: ConfigurationError) -> Self {
        PipelineError::Configuration(error.to_string())
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
