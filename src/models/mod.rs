pub mod guest_record;
pub mod nationality;
pub mod run_report;

pub use guest_record::{parse_timestamp, AttachmentRef, GuestRecord, RecordId};
pub use nationality::{nationality_code, resolve_nationality_code};
pub use run_report::{RecordOutcome, RunFailure, RunReport, RunReportBuilder};
