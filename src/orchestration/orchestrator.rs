//! # Orchestrator
//!
//! Pulls pending guest records and pushes each one through the pipeline:
//!
//! ```text
//! mark Processing → stage attachment → retry(engine.submit) → mark Completed | Failed
//! ```
//!
//! Records are processed one at a time, in the order the store returned them. A
//! failing or panicking record becomes a `Failed` outcome and the batch moves on;
//! only an authentication failure ends the run early, because every following
//! record would be rejected the same way.

use super::report_writer::ReportWriter;
use super::run_lock::RunLock;
use super::shutdown::ShutdownSignal;
use super::stats::OrchestratorStats;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::logging::{log_error, log_record_operation};
use crate::models::{GuestRecord, RecordId, RecordOutcome, RunFailure, RunReport, RunReportBuilder};
use crate::portal::{PortalAutomationEngine, SessionFactory, SubmissionReceipt};
use crate::record_store::{RecordStore, StatusUpdate};
use crate::resilience::RetryPolicy;
use crate::staging::{FileStager, StagedAttachment};
use crate::state_machine::{GuestStatus, RecordEvent};
use chrono::Utc;
use futures::FutureExt;
use parking_lot::Mutex;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Whether the batch continues after a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordFlow {
    Continue,
    Abort,
}

pub struct Orchestrator {
    store: Arc<dyn RecordStore>,
    stager: Arc<FileStager>,
    engine: Arc<PortalAutomationEngine>,
    retry: RetryPolicy,
    lock: Arc<RunLock>,
    shutdown: ShutdownSignal,
    reports: Option<ReportWriter>,
    stats: Mutex<OrchestratorStats>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("retry", &self.retry)
            .field("lock", &self.lock)
            .field("reports", &self.reports)
            .finish()
    }
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn RecordStore>,
        stager: Arc<FileStager>,
        engine: Arc<PortalAutomationEngine>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            store,
            stager,
            engine,
            retry: config.retry.policy(),
            lock: Arc::new(RunLock::from_config(&config.run_lock)),
            shutdown: ShutdownSignal::new(),
            reports: ReportWriter::from_config(&config.reports),
            stats: Mutex::new(OrchestratorStats::default()),
        }
    }

    /// Production wiring: HTTP attachment downloads and the given portal sessions
    pub fn from_config(
        store: Arc<dyn RecordStore>,
        sessions: Arc<dyn SessionFactory>,
        config: &PipelineConfig,
    ) -> PipelineResult<Self> {
        let stager = Arc::new(FileStager::from_config(&config.staging)?);
        let engine = Arc::new(PortalAutomationEngine::new(sessions, config.portal.clone()));
        Ok(Self::new(store, stager, engine, config))
    }

    pub fn with_run_lock(mut self, lock: Arc<RunLock>) -> Self {
        self.lock = lock;
        self
    }

    pub fn with_shutdown_signal(mut self, shutdown: ShutdownSignal) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Request a cooperative stop; the record in flight is finished first
    pub fn stop(&self) {
        info!("🛑 Orchestrator stop requested");
        self.shutdown.trigger();
    }

    pub fn is_running(&self) -> bool {
        self.lock.is_held()
    }

    pub fn stats(&self) -> OrchestratorStats {
        let mut stats = self.stats.lock().clone();
        stats.is_running = self.is_running();
        stats
    }

    /// Process every pending record once.
    ///
    /// Fails with `RunInProgress` when another run holds the lock, and with
    /// `StoreUnavailable` when the pending set cannot be read. Everything that
    /// happens to individual records is reported in the returned [`RunReport`].
    pub async fn run_once(&self) -> PipelineResult<RunReport> {
        let mut report = RunReportBuilder::start();
        let run_id = report.run_id();

        let guard = match self.lock.acquire(run_id).await {
            Ok(guard) => guard,
            Err(error) => {
                warn!(run_id = %run_id, error = %error, "⏭️ Run rejected, another run is in progress");
                self.stats.lock().runs_rejected += 1;
                return Err(error);
            }
        };

        info!(run_id = %run_id, "🚀 Starting guest submission run");

        let pending = match self.store.list_pending().await {
            Ok(records) => records,
            Err(error) => {
                log_error("orchestrator", "list_pending", &error.to_string(), Some(&run_id.to_string()));
                let mut stats = self.stats.lock();
                stats.runs_aborted += 1;
                stats.last_run_id = Some(run_id);
                stats.last_run_at = Some(Utc::now());
                return Err(error);
            }
        };

        info!(run_id = %run_id, pending = pending.len(), "📋 Pending guest records loaded");

        for record in &pending {
            if self.shutdown.is_triggered() {
                info!(run_id = %run_id, record_id = %record.id, "🛑 Stop requested, leaving remaining records for the next run");
                report.mark_cancelled();
                break;
            }

            match guard.renew().await {
                Ok(true) => {}
                Ok(false) => {
                    warn!(run_id = %run_id, record_id = %record.id, "🛑 Run lease lost to another process, stopping");
                    report.mark_cancelled();
                    break;
                }
                Err(error) => {
                    warn!(run_id = %run_id, error = %error, "🛑 Could not renew run lease, stopping");
                    report.mark_cancelled();
                    break;
                }
            }

            if self.process_record(record, &mut report).await == RecordFlow::Abort {
                break;
            }
        }

        let report = report.finish();
        self.persist_report(&report).await;
        self.record_stats(&report);

        info!(
            run_id = %run_id,
            processed = report.processed_count(),
            succeeded = report.success_count(),
            failed = report.failure_count(),
            persistence_errors = report.persistence_errors(),
            aborted = report.run_failure().is_some(),
            cancelled = report.was_cancelled(),
            "🏁 Guest submission run finished"
        );

        Ok(report)
    }

    /// Re-run [`Self::run_once`] every `interval` until stopped, returning the
    /// number of cycles started.
    pub async fn run_periodic(&self, interval: Duration, initial_delay: Duration) -> u64 {
        info!(
            interval_secs = interval.as_secs(),
            initial_delay_secs = initial_delay.as_secs(),
            "⏰ Periodic submission runs scheduled"
        );

        tokio::select! {
            _ = tokio::time::sleep(initial_delay) => {},
            _ = self.shutdown.cancelled() => {
                info!("🛑 Stopped before the first periodic run");
                return 0;
            }
        }

        let mut cycles = 0;
        while !self.shutdown.is_triggered() {
            cycles += 1;
            match self.run_once().await {
                Ok(report) => debug!(cycle = cycles, run_id = %report.run_id(), "Periodic run complete"),
                Err(PipelineError::RunInProgress { .. }) => {
                    debug!(cycle = cycles, "Periodic run skipped, previous run still active");
                }
                Err(error) => error!(cycle = cycles, error = %error, "❌ Periodic run failed"),
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {},
                _ = self.shutdown.cancelled() => break,
            }
        }

        info!(cycles = cycles, "🛑 Periodic submission runs stopped");
        cycles
    }

    /// Everything after selection runs under `catch_unwind`: a panic in the store,
    /// the stager or the portal becomes a `Failed` outcome for this record only.
    async fn process_record(&self, record: &GuestRecord, report: &mut RunReportBuilder) -> RecordFlow {
        let last_attempt = AtomicU32::new(0);
        let settled = AtomicBool::new(false);

        let result = AssertUnwindSafe(self.submit_record(record, report, &last_attempt, &settled))
            .catch_unwind()
            .await;
        let panic = match result {
            Ok(flow) => return flow,
            Err(panic) => panic_message(panic.as_ref()),
        };

        error!(record_id = %record.id, panic = %panic, "💥 Record processing panicked");
        if settled.load(Ordering::SeqCst) {
            // Outcome already recorded; only the attachment cleanup was lost
            return RecordFlow::Continue;
        }

        let note = format!("Unexpected failure: {panic}");
        let write = AssertUnwindSafe(self.fail(record, note.clone(), report))
            .catch_unwind()
            .await;
        if write.is_err() {
            error!(record_id = %record.id, "💥 Status write panicked while recording failure");
            report.record_persistence_error();
        }
        report.record_outcome(outcome(record, false, note, last_attempt.load(Ordering::SeqCst)));
        RecordFlow::Continue
    }

    async fn submit_record(
        &self,
        record: &GuestRecord,
        report: &mut RunReportBuilder,
        last_attempt: &AtomicU32,
        settled: &AtomicBool,
    ) -> RecordFlow {
        let processing = record.status.apply(&RecordEvent::StartProcessing).unwrap_or(GuestStatus::Processing);
        self.write_status(&record.id, processing, Some("Submitting to portal".to_string()), report)
            .await;

        let staged = self.stager.stage(&record.id, record.primary_attachment()).await;
        let attachment = staged.as_ref().map(|s| s.path.as_path());

        let outcome_of_retries = self
            .retry
            .execute("portal_submission", |attempt| {
                last_attempt.store(attempt, Ordering::SeqCst);
                self.engine.submit(record, attachment, attempt)
            })
            .await;
        let attempts = outcome_of_retries.attempts;

        match outcome_of_retries.result {
            Ok(receipt) => {
                self.complete(record, receipt, staged, attempts, report, settled).await;
                RecordFlow::Continue
            }
            Err(error) if error.aborts_run() => {
                error!(
                    record_id = %record.id,
                    error = %error,
                    "🚫 Portal rejected credentials, aborting the remaining records"
                );
                let note = format!("Run aborted: {error}");
                self.fail(record, note, report).await;
                report.abort(RunFailure::from_error(&error, Some(record.id.clone())));
                settled.store(true, Ordering::SeqCst);
                RecordFlow::Abort
            }
            Err(error) => {
                let note = format!("Failed after {attempts} attempt(s): {error}");
                self.fail(record, note.clone(), report).await;
                report.record_outcome(outcome(record, false, note, attempts));
                settled.store(true, Ordering::SeqCst);
                RecordFlow::Continue
            }
        }
    }

    async fn complete(
        &self,
        record: &GuestRecord,
        receipt: SubmissionReceipt,
        staged: Option<StagedAttachment>,
        attempts: u32,
        report: &mut RunReportBuilder,
        settled: &AtomicBool,
    ) {
        let note = match &receipt.confirmation_reference {
            Some(reference) => format!("Submitted to portal (confirmation {reference})"),
            None => "Submitted to portal".to_string(),
        };
        let status = GuestStatus::Processing
            .apply(&RecordEvent::Complete)
            .unwrap_or(GuestStatus::Completed);
        self.write_status(&record.id, status, Some(note.clone()), report).await;
        report.record_outcome(outcome(record, true, note, attempts));
        settled.store(true, Ordering::SeqCst);

        if let Some(staged) = staged {
            if let Err(error) = self.stager.release(&staged).await {
                warn!(record_id = %record.id, error = %error, "Could not release staged attachment");
            }
        }
    }

    /// The staged attachment is left in place for diagnosis.
    async fn fail(&self, record: &GuestRecord, note: String, report: &mut RunReportBuilder) {
        let status = GuestStatus::Processing
            .apply(&RecordEvent::fail_with_error(note.clone()))
            .unwrap_or(GuestStatus::Failed);
        self.write_status(&record.id, status, Some(note), report).await;
    }

    async fn write_status(
        &self,
        id: &RecordId,
        status: GuestStatus,
        notes: Option<String>,
        report: &mut RunReportBuilder,
    ) {
        let details = notes.clone();
        match self.store.update_status(id, StatusUpdate::new(status, notes)).await {
            Ok(()) => log_record_operation("update_status", id.as_str(), status.as_str(), details.as_deref()),
            Err(error) => {
                warn!(
                    record_id = %id,
                    status = %status,
                    error = %error,
                    "⚠️ Status write-back failed, store may show a stale status"
                );
                report.record_persistence_error();
            }
        }
    }

    async fn persist_report(&self, report: &RunReport) {
        let Some(writer) = &self.reports else {
            return;
        };
        match writer.write(report).await {
            Ok(path) => info!(run_id = %report.run_id(), path = %path.display(), "📝 Run report saved"),
            Err(error) => warn!(run_id = %report.run_id(), error = %error, "⚠️ Could not save run report"),
        }
    }

    fn record_stats(&self, report: &RunReport) {
        let mut stats = self.stats.lock();
        stats.total_processed += report.processed_count() as u64;
        stats.total_succeeded += report.success_count() as u64;
        stats.total_failed += report.failure_count() as u64;
        stats.persistence_errors += report.persistence_errors() as u64;
        if report.run_failure().is_some() {
            stats.runs_aborted += 1;
        } else {
            stats.runs_completed += 1;
        }
        stats.last_run_id = Some(report.run_id());
        stats.last_run_at = Some(report.finished_at());
    }
}

fn outcome(record: &GuestRecord, success: bool, message: String, attempts: u32) -> RecordOutcome {
    RecordOutcome {
        record_id: record.id.clone(),
        guest_name: record.full_name(),
        success,
        message,
        attempts,
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
