use super::errors::{StateMachineError, StateMachineResult};
use super::events::RecordEvent;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Persisted lifecycle status of a guest record.
///
/// Stored in the record store's `Status` column using the capitalized spelling
/// (`New`, `Processing`, ...). Parsing is case-insensitive and also accepts
/// `pending` as a synonym for `New`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum GuestStatus {
    /// Submitted by the guest, not yet picked up by a run
    #[default]
    New,
    /// A run has claimed the record and is submitting it
    Processing,
    /// The portal acknowledged the submission
    Completed,
    /// Submission was abandoned after exhausting retries or an aborting error
    Failed,
    /// Exported to downstream bookkeeping
    Batched,
}

impl GuestStatus {
    /// Only `New` records are eligible for a run.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::New)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "New",
            Self::Processing => "Processing",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
            Self::Batched => "Batched",
        }
    }

    /// Resolve the status a record moves to when `event` is applied.
    pub fn apply(self, event: &RecordEvent) -> StateMachineResult<GuestStatus> {
        let target = match (self, event) {
            (Self::New, RecordEvent::StartProcessing) => Self::Processing,
            (Self::Processing, RecordEvent::Complete) => Self::Completed,
            (Self::Processing, RecordEvent::Fail(_)) => Self::Failed,
            (Self::Completed, RecordEvent::Batch) => Self::Batched,
            (from, event) => {
                return Err(StateMachineError::InvalidTransition {
                    from: from.to_string(),
                    event: event.event_type().to_string(),
                })
            }
        };
        Ok(target)
    }
}

impl fmt::Display for GuestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for GuestStatus {
    type Err = StateMachineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "new" | "pending" => Ok(Self::New),
            "processing" => Ok(Self::Processing),
            "completed" | "complete" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "batched" => Ok(Self::Batched),
            _ => Err(StateMachineError::UnknownState(s.to_string())),
        }
    }
}
