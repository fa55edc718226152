//! # Remote Session Driver
//!
//! The capability the automation engine consumes to talk to the portal. A driver
//! performs exactly one interaction per call; how it addresses the remote
//! surface (CSS selectors, accessibility ids, an HTTP API) is its own business
//! and can change per portal version without touching the engine.

use super::form::PortalField;
use crate::config::PortalCredentials;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DriverError {
    #[error("Credentials rejected: {0}")]
    CredentialsRejected(String),
    #[error("Element not found: {0}")]
    ElementNotFound(String),
    #[error("Navigation failed: {0}")]
    Navigation(String),
    #[error("Timed out after {0:?}")]
    Timeout(Duration),
    #[error("Session is closed")]
    SessionClosed,
    #[error("Driver error: {0}")]
    Other(String),
}

pub type DriverResult<T> = Result<T, DriverError>;

/// The portal's answer to a submitted form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Confirmation {
    Confirmed { reference: Option<String> },
    Rejected { reason: String },
}

/// Snapshot of remote session state captured when a step fails
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticArtifact {
    pub tag: String,
    pub captured_at: DateTime<Utc>,
    /// Where the driver stored the snapshot, e.g. a screenshot file
    pub location: Option<PathBuf>,
    pub detail: Option<String>,
}

impl DiagnosticArtifact {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            captured_at: Utc::now(),
            location: None,
            detail: None,
        }
    }

    pub fn with_location(mut self, location: impl Into<PathBuf>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// One live, exclusive session against the portal
#[async_trait]
pub trait RemoteSessionDriver: Send {
    async fn authenticate(&mut self, credentials: &PortalCredentials) -> DriverResult<()>;

    /// Select the operational context (managed property) to register guests under
    async fn select_context(&mut self, context_id: &str) -> DriverResult<()>;

    async fn navigate_to_submission_surface(&mut self) -> DriverResult<()>;

    async fn set_field(&mut self, field: PortalField, value: &str) -> DriverResult<()>;

    async fn attach_file(&mut self, path: &Path) -> DriverResult<()>;

    async fn submit(&mut self) -> DriverResult<()>;

    /// Wait up to `timeout` for the portal to accept or reject the submission
    async fn await_confirmation(&mut self, timeout: Duration) -> DriverResult<Confirmation>;

    async fn capture_diagnostic(&mut self, tag: &str) -> DriverResult<DiagnosticArtifact>;

    async fn close(&mut self) -> DriverResult<()>;
}

/// Creates a fresh session for every submission attempt
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open_session(&self) -> DriverResult<Box<dyn RemoteSessionDriver>>;
}
