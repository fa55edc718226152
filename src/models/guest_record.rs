//! # Guest Record
//!
//! One guest's registration as read from the record store. Records are plain
//! data: the store adapter builds them, the orchestrator reads them, and only the
//! store adapter writes status changes back.

use crate::error::{PipelineError, PipelineResult};
use crate::state_machine::GuestStatus;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identity of a record within its store.
///
/// Tabular stores use `row_<n>` (1-based sheet row); directory stores use the
/// record's directory name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn for_row(row_number: usize) -> Self {
        Self(format!("row_{row_number}"))
    }

    /// Row number encoded in a `row_<n>` id.
    pub fn row_number(&self) -> Option<usize> {
        self.0.strip_prefix("row_")?.parse().ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reference to a supporting document: a remote URL or a local path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttachmentRef(String);

impl AttachmentRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// Split a comma-separated cell into references, dropping blanks.
    pub fn parse_list(cell: &str) -> Vec<AttachmentRef> {
        cell.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(AttachmentRef::new)
            .collect()
    }

    pub fn is_remote(&self) -> bool {
        let lower = self.0.to_ascii_lowercase();
        lower.starts_with("http://") || lower.starts_with("https://")
    }

    /// Local filesystem path for non-remote references (`file://` stripped).
    pub fn local_path(&self) -> Option<&str> {
        if self.is_remote() {
            return None;
        }
        Some(self.0.strip_prefix("file://").unwrap_or(&self.0))
    }

    /// Last path segment, without query string or fragment.
    pub fn file_name_hint(&self) -> Option<&str> {
        let without_query = self.0.split(['?', '#']).next().unwrap_or("");
        without_query
            .rsplit(['/', '\\'])
            .next()
            .filter(|segment| !segment.is_empty() && !segment.contains(':'))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AttachmentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuestRecord {
    pub id: RecordId,
    pub submitted_at: Option<DateTime<Utc>>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub nationality: String,
    pub nationality_code: String,
    pub passport_number: String,
    pub passport_expiry: String,
    pub attachment_refs: Vec<AttachmentRef>,
    pub check_in_date: String,
    pub check_in_time: String,
    pub check_out_date: String,
    pub check_out_time: String,
    pub total_guests: u32,
    pub children: u32,
    pub status: GuestStatus,
    pub processing_notes: Option<String>,
    pub last_processed_at: Option<DateTime<Utc>>,
    /// Downstream sync flag, when the store carries one
    pub portal_synced: Option<bool>,
}

impl GuestRecord {
    /// A record with only identity and the required fields set.
    pub fn new(
        id: RecordId,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        passport_number: impl Into<String>,
    ) -> Self {
        Self {
            id,
            submitted_at: None,
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: String::new(),
            phone: String::new(),
            nationality: String::new(),
            nationality_code: String::new(),
            passport_number: passport_number.into(),
            passport_expiry: String::new(),
            attachment_refs: Vec::new(),
            check_in_date: String::new(),
            check_in_time: String::new(),
            check_out_date: String::new(),
            check_out_time: String::new(),
            total_guests: 1,
            children: 0,
            status: GuestStatus::New,
            processing_notes: None,
            last_processed_at: None,
            portal_synced: None,
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    pub fn missing_required_fields(&self) -> Vec<String> {
        [
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
            ("passport_number", &self.passport_number),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name.to_string())
        .collect()
    }

    /// A record missing any of first name, last name or passport number never
    /// enters the pending set.
    pub fn validate(&self) -> PipelineResult<()> {
        let missing_fields = self.missing_required_fields();
        if missing_fields.is_empty() {
            Ok(())
        } else {
            Err(PipelineError::Validation {
                record_id: self.id.to_string(),
                missing_fields,
            })
        }
    }

    /// The document submitted alongside the record.
    pub fn primary_attachment(&self) -> Option<&AttachmentRef> {
        self.attachment_refs.first()
    }
}

/// Parse a submission timestamp in any of the formats the intake forms produce.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    const DATETIME_FORMATS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%m/%d/%Y %H:%M:%S",
        "%d/%m/%Y %H:%M:%S",
    ];
    for format in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(parsed.and_utc());
        }
    }
    for format in ["%Y-%m-%d", "%m/%d/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
        }
    }
    None
}
