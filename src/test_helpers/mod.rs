//! # Test Helpers
//!
//! Scripted collaborators for exercising the pipeline without a live portal,
//! network or spreadsheet. Shared by unit tests and the `tests/` integration
//! suite.

pub mod flaky_table;
pub mod scripted_driver;
pub mod scripted_fetcher;

pub use flaky_table::FlakyTable;
pub use scripted_driver::{
    AttemptPlan, DriverCall, ScriptStep, ScriptedDriver, ScriptedSessionFactory,
};
pub use scripted_fetcher::ScriptedFetcher;

use crate::config::{PipelineConfig, PortalCredentials};
use crate::record_store::InMemoryTable;
use std::path::Path;
use std::sync::Arc;

/// Header row used by [`GuestTableBuilder`]
pub const GUEST_HEADERS: [&str; 12] = [
    "Timestamp",
    "First Name",
    "Last Name",
    "Nationality",
    "Passport Number",
    "Passport Files",
    "Check-in Date",
    "Check-out Date",
    "Status",
    "Processing Notes",
    "Last Processed",
    "Portal Synced",
];

/// Builds an intake sheet, one guest per row starting at sheet row 2
#[derive(Debug, Default)]
pub struct GuestTableBuilder {
    rows: Vec<Vec<String>>,
}

pub fn guest_table() -> GuestTableBuilder {
    GuestTableBuilder::default()
}

impl GuestTableBuilder {
    pub fn guest(self, first: &str, last: &str, passport: &str, submitted_at: &str) -> Self {
        self.row(first, last, passport, submitted_at, "", "New")
    }

    pub fn guest_with_attachment(
        self,
        first: &str,
        last: &str,
        passport: &str,
        submitted_at: &str,
        attachment: &str,
    ) -> Self {
        self.row(first, last, passport, submitted_at, attachment, "New")
    }

    pub fn row(
        mut self,
        first: &str,
        last: &str,
        passport: &str,
        submitted_at: &str,
        attachment: &str,
        status: &str,
    ) -> Self {
        self.rows.push(
            [
                submitted_at,
                first,
                last,
                "United States",
                passport,
                attachment,
                "2025-06-01",
                "2025-06-04",
                status,
                "",
                "",
                "",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        );
        self
    }

    pub fn build(self) -> Arc<InMemoryTable> {
        let mut rows = Vec::with_capacity(self.rows.len() + 1);
        rows.push(GUEST_HEADERS.iter().map(|h| h.to_string()).collect());
        rows.extend(self.rows);
        Arc::new(InMemoryTable::new(rows))
    }
}

/// Complete configuration rooted under `workdir`, with portal credentials set
pub fn test_config(workdir: &Path) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.staging.directory = workdir.join("attachments");
    config.staging.fetch_retry_delay_ms = 10;
    config.reports.directory = workdir.join("reports");
    config.portal.credentials = PortalCredentials::new("frontdesk", "s3cret");
    config
}
