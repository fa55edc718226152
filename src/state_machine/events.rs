use serde::{Deserialize, Serialize};

/// Events that move a guest record through its persisted lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum RecordEvent {
    /// A run claimed the record
    StartProcessing,
    /// The portal confirmed the submission
    Complete,
    /// The submission was abandoned with a reason
    Fail(String),
    /// Downstream export picked the record up
    Batch,
}

impl RecordEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::StartProcessing => "start_processing",
            Self::Complete => "complete",
            Self::Fail(_) => "fail",
            Self::Batch => "batch",
        }
    }

    pub fn fail_with_error(error: impl Into<String>) -> Self {
        Self::Fail(error.into())
    }
}
