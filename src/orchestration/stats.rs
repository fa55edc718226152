use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Cumulative counters across every run of one orchestrator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorStats {
    pub total_processed: u64,
    pub total_succeeded: u64,
    pub total_failed: u64,
    pub runs_completed: u64,
    /// Runs ended early by an authentication failure or an unreachable store
    pub runs_aborted: u64,
    /// Invocations refused because another run held the lock
    pub runs_rejected: u64,
    pub persistence_errors: u64,
    pub last_run_id: Option<Uuid>,
    pub last_run_at: Option<DateTime<Utc>>,
    pub is_running: bool,
}

impl OrchestratorStats {
    pub fn success_rate(&self) -> f64 {
        if self.total_processed == 0 {
            return 0.0;
        }
        self.total_succeeded as f64 / self.total_processed as f64
    }
}
