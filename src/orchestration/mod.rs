//! # Orchestration
//!
//! Batch sequencing of guest submissions: the [`Orchestrator`] itself, the
//! single-flight [`RunLock`], the cooperative [`ShutdownSignal`] and the per-run
//! [`ReportWriter`].

pub mod orchestrator;
pub mod report_writer;
pub mod run_lock;
pub mod shutdown;
pub mod stats;

pub use orchestrator::Orchestrator;
pub use report_writer::ReportWriter;
pub use run_lock::{Lease, LeaseFile, RunGuard, RunLock};
pub use shutdown::ShutdownSignal;
pub use stats::OrchestratorStats;
