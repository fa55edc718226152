//! # Portal Automation
//!
//! Submission of guest records to the remote registration portal. The
//! [`PortalAutomationEngine`] owns the step sequence and failure classification;
//! a [`RemoteSessionDriver`] performs the individual interactions.

pub mod driver;
pub mod engine;
pub mod form;

pub use driver::{
    Confirmation, DiagnosticArtifact, DriverError, DriverResult, RemoteSessionDriver,
    SessionFactory,
};
pub use engine::{PortalAutomationEngine, SubmissionAttempt, SubmissionReceipt};
pub use form::{format_portal_date, FormEntry, GuestForm, PortalField};
