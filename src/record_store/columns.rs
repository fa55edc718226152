//! # Column Aliases
//!
//! The intake sheet is filled by form tools that spell the same column several
//! ways (`First Name`, `firstName`, `first_name`). Each logical column carries an
//! ordered alias list; the first alias present in the header row wins, so the
//! display name takes precedence over camelCase, which takes precedence over
//! snake_case. Matching ignores ASCII case.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalColumn {
    Timestamp,
    FirstName,
    LastName,
    Email,
    Phone,
    Nationality,
    NationalityCode,
    PassportNumber,
    PassportExpiry,
    AttachmentReferences,
    CheckInDate,
    CheckInTime,
    CheckOutDate,
    CheckOutTime,
    TotalGuests,
    Children,
    Status,
    ProcessingNotes,
    LastProcessed,
    PortalSynced,
}

impl LogicalColumn {
    pub const ALL: [LogicalColumn; 20] = [
        Self::Timestamp,
        Self::FirstName,
        Self::LastName,
        Self::Email,
        Self::Phone,
        Self::Nationality,
        Self::NationalityCode,
        Self::PassportNumber,
        Self::PassportExpiry,
        Self::AttachmentReferences,
        Self::CheckInDate,
        Self::CheckInTime,
        Self::CheckOutDate,
        Self::CheckOutTime,
        Self::TotalGuests,
        Self::Children,
        Self::Status,
        Self::ProcessingNotes,
        Self::LastProcessed,
        Self::PortalSynced,
    ];

    /// Header spellings in precedence order
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            Self::Timestamp => &["Timestamp", "submittedAt", "submitted_at"],
            Self::FirstName => &["First Name", "firstName", "first_name"],
            Self::LastName => &["Last Name", "lastName", "last_name"],
            Self::Email => &["Email", "emailAddress", "email_address"],
            Self::Phone => &["Phone", "Phone Number", "phoneNumber", "phone_number"],
            Self::Nationality => &["Nationality", "nationality"],
            Self::NationalityCode => &["Nationality Code", "nationalityCode", "nationality_code"],
            Self::PassportNumber => &["Passport Number", "passportNumber", "passport_number"],
            Self::PassportExpiry => &["Passport Expiry", "passportExpiry", "passport_expiry"],
            Self::AttachmentReferences => &[
                "Attachment References",
                "Passport Files",
                "attachmentReferences",
                "passportFiles",
                "attachment_references",
                "passport_files",
            ],
            Self::CheckInDate => &["Check-in Date", "checkInDate", "checkin_date"],
            Self::CheckInTime => &["Check-in Time", "checkInTime", "checkin_time"],
            Self::CheckOutDate => &["Check-out Date", "checkOutDate", "checkout_date"],
            Self::CheckOutTime => &["Check-out Time", "checkOutTime", "checkout_time"],
            Self::TotalGuests => &["Total Guests", "totalGuests", "total_guests"],
            Self::Children => &["Children", "childrenCount", "children_count"],
            Self::Status => &["Status", "recordStatus", "record_status"],
            Self::ProcessingNotes => &["Processing Notes", "processingNotes", "processing_notes"],
            Self::LastProcessed => &["Last Processed", "lastProcessed", "last_processed"],
            Self::PortalSynced => &["Portal Synced", "portalSynced", "portal_synced"],
        }
    }
}

/// Header row resolved to column indices
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    headers: Vec<String>,
    indices: HashMap<LogicalColumn, usize>,
}

impl ColumnMap {
    pub fn resolve(headers: &[String]) -> Self {
        let mut indices = HashMap::new();
        for column in LogicalColumn::ALL {
            let found = column.aliases().iter().find_map(|alias| {
                headers
                    .iter()
                    .position(|header| header.trim().eq_ignore_ascii_case(alias))
            });
            if let Some(index) = found {
                indices.insert(column, index);
            }
        }
        Self {
            headers: headers.to_vec(),
            indices,
        }
    }

    /// Whether this map was resolved from exactly `headers`
    pub fn matches(&self, headers: &[String]) -> bool {
        self.headers == headers
    }

    pub fn index_of(&self, column: LogicalColumn) -> Option<usize> {
        self.indices.get(&column).copied()
    }

    pub fn has(&self, column: LogicalColumn) -> bool {
        self.indices.contains_key(&column)
    }

    /// Trimmed cell value, empty when the column or cell is absent
    pub fn cell<'a>(&self, row: &'a [String], column: LogicalColumn) -> &'a str {
        self.index_of(column)
            .and_then(|index| row.get(index))
            .map(|value| value.trim())
            .unwrap_or("")
    }
}

/// Spreadsheet column letter for a 0-based index (0 -> A, 26 -> AA)
pub fn column_letter(index: usize) -> String {
    let mut letters = Vec::new();
    let mut n = index + 1;
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(char::from(b'A' + rem as u8));
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}
