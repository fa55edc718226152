//! # Record Store
//!
//! Adapters over the external system of record that holds guest submissions.
//! The orchestrator only sees the [`RecordStore`] trait: it lists pending records
//! and writes status changes back. Two adapters are provided:
//!
//! - [`TabularRecordStore`]: a header row plus data rows behind a [`TableClient`]
//!   (a spreadsheet API, or [`InMemoryTable`] for tests and dry runs)
//! - [`DirectoryRecordStore`]: one `guest_*/guest_info.json` document per guest
//!
//! Both adapters only return `New` records that pass required-field validation,
//! oldest submission first.

pub mod columns;
pub mod directory;
pub mod memory;
pub mod tabular;

use crate::config::RecordStoreConfig;
use crate::error::PipelineResult;
use crate::models::{resolve_nationality_code, GuestRecord, RecordId};
use crate::state_machine::GuestStatus;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use columns::{column_letter, ColumnMap, LogicalColumn};
pub use directory::DirectoryRecordStore;
pub use memory::InMemoryTable;
pub use tabular::{CellUpdate, TableClient, TabularRecordStore};

/// Status write-back for one record
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub status: GuestStatus,
    pub notes: Option<String>,
    pub processed_at: DateTime<Utc>,
}

impl StatusUpdate {
    pub fn new(status: GuestStatus, notes: Option<String>) -> Self {
        Self {
            status,
            notes,
            processed_at: Utc::now(),
        }
    }
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Valid `New` records, oldest submission first.
    ///
    /// A failure here means the store is unreachable and the run cannot proceed.
    async fn list_pending(&self) -> PipelineResult<Vec<GuestRecord>>;

    /// Best-effort status write; failures surface as `PipelineError::Persistence`.
    async fn update_status(&self, id: &RecordId, update: StatusUpdate) -> PipelineResult<()>;
}

/// Keep only valid pending records, ordered oldest submission first.
///
/// Records without a submission timestamp sort after every timestamped record and
/// otherwise keep their store order.
pub(crate) fn select_pending(records: Vec<GuestRecord>) -> Vec<GuestRecord> {
    let mut pending: Vec<GuestRecord> = records
        .into_iter()
        .filter(|record| record.status.is_pending())
        .filter(|record| match record.validate() {
            Ok(()) => true,
            Err(error) => {
                tracing::warn!(
                    record_id = %record.id,
                    error = %error,
                    "Skipping incomplete guest record"
                );
                false
            }
        })
        .collect();

    pending.sort_by_key(|record| (record.submitted_at.is_none(), record.submitted_at));
    pending
}

/// Fill intake defaults the forms leave blank.
pub(crate) fn apply_defaults(record: &mut GuestRecord, settings: &RecordStoreConfig) {
    if record.check_in_time.trim().is_empty() {
        record.check_in_time = settings.default_check_in_time.clone();
    }
    if record.check_out_time.trim().is_empty() {
        record.check_out_time = settings.default_check_out_time.clone();
    }
    record.nationality_code = resolve_nationality_code(
        &record.nationality_code,
        &record.nationality,
        &settings.default_nationality_code,
    );
}

/// Parse a count cell, falling back to `default` for blanks and junk
pub(crate) fn parse_count(raw: &str, default: u32) -> u32 {
    raw.trim().parse().unwrap_or(default)
}
