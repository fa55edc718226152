//! Guest record to portal form mapping.

use crate::models::{parse_timestamp, GuestRecord};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fields of the portal's guest registration form, in entry order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortalField {
    FirstName,
    LastName,
    Nationality,
    PassportNumber,
    PassportExpiry,
    TotalGuests,
    Children,
    CheckInDate,
    CheckInTime,
    CheckOutDate,
    CheckOutTime,
}

impl PortalField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FirstName => "FirstName",
            Self::LastName => "LastName",
            Self::Nationality => "Nationality",
            Self::PassportNumber => "PassportNumber",
            Self::PassportExpiry => "PassportExpiry",
            Self::TotalGuests => "TotalGuests",
            Self::Children => "Children",
            Self::CheckInDate => "CheckInDate",
            Self::CheckInTime => "CheckInTime",
            Self::CheckOutDate => "CheckOutDate",
            Self::CheckOutTime => "CheckOutTime",
        }
    }
}

impl fmt::Display for PortalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormEntry {
    pub field: PortalField,
    pub value: String,
    /// A failed write of a required field fails the attempt; optional fields are best effort
    pub required: bool,
}

/// Values to enter on the registration form for one guest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestForm {
    entries: Vec<FormEntry>,
}

impl GuestForm {
    pub fn from_record(record: &GuestRecord) -> Self {
        let required = |field, value: String| FormEntry {
            field,
            value,
            required: true,
        };
        let optional = |field, value: &str| FormEntry {
            field,
            value: value.trim().to_string(),
            required: false,
        };

        let entries = vec![
            required(PortalField::FirstName, record.first_name.trim().to_string()),
            required(PortalField::LastName, record.last_name.trim().to_string()),
            required(PortalField::Nationality, record.nationality_code.trim().to_string()),
            required(PortalField::PassportNumber, record.passport_number.trim().to_string()),
            required(PortalField::PassportExpiry, format_portal_date(&record.passport_expiry)),
            required(PortalField::TotalGuests, record.total_guests.to_string()),
            required(PortalField::Children, record.children.to_string()),
            required(PortalField::CheckInDate, format_portal_date(&record.check_in_date)),
            optional(PortalField::CheckInTime, &record.check_in_time),
            required(PortalField::CheckOutDate, format_portal_date(&record.check_out_date)),
            optional(PortalField::CheckOutTime, &record.check_out_time),
        ];
        Self { entries }
    }

    pub fn entries(&self) -> &[FormEntry] {
        &self.entries
    }

    pub fn value_of(&self, field: PortalField) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.field == field)
            .map(|entry| entry.value.as_str())
    }
}

/// Dates go to the portal as `YYYY-MM-DD`; unparseable input is passed through unchanged.
pub fn format_portal_date(raw: &str) -> String {
    let raw = raw.trim();
    match parse_timestamp(raw) {
        Some(parsed) => parsed.date_naive().format("%Y-%m-%d").to_string(),
        None => raw.to_string(),
    }
}
