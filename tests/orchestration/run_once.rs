use crate::common::{files_in, PipelineBuilder};
use async_trait::async_trait;
use guestflow_core::error::{ErrorKind, PipelineResult};
use guestflow_core::models::{AttachmentRef, GuestRecord, RecordId, RunReport};
use guestflow_core::portal::DriverError;
use guestflow_core::record_store::{InMemoryTable, RecordStore, StatusUpdate, TabularRecordStore};
use guestflow_core::staging::AttachmentFetcher;
use guestflow_core::state_machine::GuestStatus;
use guestflow_core::test_helpers::{
    guest_table, AttemptPlan, DriverCall, FlakyTable, ScriptStep, ScriptedFetcher,
};
use std::path::Path;
use std::sync::Arc;

/// Fetcher that panics instead of returning an error
struct PanickingFetcher;

#[async_trait]
impl AttachmentFetcher for PanickingFetcher {
    async fn fetch(&self, reference: &AttachmentRef, _destination: &Path) -> PipelineResult<u64> {
        panic!("fetcher blew up on {reference}");
    }
}

/// Store that panics when asked to mark one record `Completed`
struct PanicOnComplete {
    inner: TabularRecordStore,
    victim: RecordId,
}

#[async_trait]
impl RecordStore for PanicOnComplete {
    async fn list_pending(&self) -> PipelineResult<Vec<GuestRecord>> {
        self.inner.list_pending().await
    }

    async fn update_status(&self, id: &RecordId, update: StatusUpdate) -> PipelineResult<()> {
        if *id == self.victim && update.status == GuestStatus::Completed {
            panic!("store blew up writing {id}");
        }
        self.inner.update_status(id, update).await
    }
}

#[tokio::test]
async fn test_invalid_record_is_never_submitted() {
    let table = guest_table()
        .guest("Ana", "Silva", "P1", "2025-03-01 10:00:00")
        .guest("", "Lee", "P2", "2025-03-01 09:00:00")
        .build();
    let pipeline = PipelineBuilder::new().with_table(table.clone()).build();

    let store = TabularRecordStore::new(table.clone(), pipeline.config.record_store.clone());
    let pending = store.list_pending().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, RecordId::for_row(2));

    let report = pipeline.orchestrator.run_once().await.unwrap();

    assert_eq!(report.processed_count(), 1);
    assert_eq!(report.success_count(), 1);
    assert_eq!(table.cell(2, "Status").as_deref(), Some("Completed"));
    assert_eq!(table.cell(3, "Status").as_deref(), Some("New"));
    assert_eq!(pipeline.sessions.submitted_first_names(), vec!["Ana"]);
}

#[tokio::test]
async fn test_second_run_processes_nothing() {
    let table = guest_table()
        .guest("Ana", "Silva", "P1", "2025-03-01 10:00:00")
        .guest("Ben", "Okafor", "P2", "2025-03-01 11:00:00")
        .build();
    let pipeline = PipelineBuilder::new().with_table(table.clone()).build();

    let first = pipeline.orchestrator.run_once().await.unwrap();
    assert_eq!(first.processed_count(), 2);

    let second = pipeline.orchestrator.run_once().await.unwrap();
    assert_eq!(second.processed_count(), 0);
    assert!(second.is_clean());
    assert_eq!(pipeline.sessions.sessions_opened(), 2);

    let stats = pipeline.orchestrator.stats();
    assert_eq!(stats.runs_completed, 2);
    assert_eq!(stats.total_processed, 2);
    assert_eq!(stats.last_run_id, Some(second.run_id()));
}

#[tokio::test]
async fn test_non_new_statuses_are_skipped() {
    let table = guest_table()
        .row("Ana", "Silva", "P1", "2025-03-01 10:00:00", "", "Completed")
        .row("Ben", "Okafor", "P2", "2025-03-01 10:00:00", "", "Failed")
        .row("Cy", "Park", "P3", "2025-03-01 10:00:00", "", "Batched")
        .row("Di", "Rossi", "P4", "2025-03-01 10:00:00", "", "pending")
        .build();
    let pipeline = PipelineBuilder::new().with_table(table.clone()).build();

    let report = pipeline.orchestrator.run_once().await.unwrap();

    assert_eq!(report.processed_count(), 1);
    assert_eq!(pipeline.sessions.submitted_first_names(), vec!["Di"]);
    assert_eq!(table.cell(3, "Status").as_deref(), Some("Failed"));
}

#[tokio::test]
async fn test_counts_are_conserved_with_mixed_outcomes() {
    let table = guest_table()
        .guest("Ana", "Silva", "P1", "2025-03-01 09:00:00")
        .guest("Ben", "Okafor", "P2", "2025-03-01 10:00:00")
        .guest("Cy", "Park", "P3", "2025-03-01 11:00:00")
        .build();
    let pipeline = PipelineBuilder::new()
        .with_table(table.clone())
        .configure(|config| {
            config.retry.max_attempts = 2;
            config.retry.base_delay_ms = 1;
        })
        .build();
    pipeline.sessions.push_plan(AttemptPlan::succeed());
    pipeline.sessions.push_plan(AttemptPlan::reject("duplicate passport"));
    pipeline.sessions.push_plan(AttemptPlan::reject("duplicate passport"));

    let report = pipeline.orchestrator.run_once().await.unwrap();

    assert_eq!(report.processed_count(), 3);
    assert_eq!(report.success_count(), 2);
    assert_eq!(report.failure_count(), 1);
    assert_eq!(
        report.processed_count(),
        report.success_count() + report.failure_count()
    );

    let rejected = report.outcome_for(&RecordId::for_row(3)).unwrap();
    assert!(!rejected.success);
    assert_eq!(rejected.attempts, 2);
    assert!(rejected.message.contains("duplicate passport"));
    assert_eq!(table.cell(3, "Status").as_deref(), Some("Failed"));
    assert!(table
        .cell(3, "Processing Notes")
        .unwrap()
        .contains("duplicate passport"));
    assert_eq!(table.cell(4, "Status").as_deref(), Some("Completed"));
}

#[tokio::test]
async fn test_attachment_released_on_success_and_kept_on_failure() {
    let table = guest_table()
        .guest_with_attachment("Ana", "Silva", "P1", "2025-03-01 09:00:00", "https://files.example.com/a/passport.jpg")
        .guest_with_attachment("Ben", "Okafor", "P2", "2025-03-01 10:00:00", "https://files.example.com/b/scan.pdf")
        .build();
    let pipeline = PipelineBuilder::new()
        .with_table(table.clone())
        .configure(|config| {
            config.retry.max_attempts = 2;
            config.retry.base_delay_ms = 1;
        })
        .build();
    let submit_failure = DriverError::ElementNotFound("submit button".to_string());
    pipeline.sessions.push_plan(AttemptPlan::succeed());
    pipeline.sessions.push_plan(AttemptPlan::fail_at(ScriptStep::Submit, submit_failure.clone()));
    pipeline.sessions.push_plan(AttemptPlan::fail_at(ScriptStep::Submit, submit_failure));

    let report = pipeline.orchestrator.run_once().await.unwrap();

    assert_eq!(report.success_count(), 1);
    assert_eq!(report.failure_count(), 1);
    assert!(files_in(&pipeline.staging_dir().join("row_2")).is_empty());
    assert!(!pipeline.staging_dir().join("row_2").exists());
    assert_eq!(files_in(&pipeline.staging_dir().join("row_3")), vec!["scan.pdf"]);
    assert_eq!(pipeline.fetcher.calls(), 2);
}

#[tokio::test]
async fn test_unavailable_attachment_does_not_block_submission() {
    let table = guest_table()
        .guest_with_attachment("Ana", "Silva", "P1", "2025-03-01 09:00:00", "https://files.example.com/gone.jpg")
        .build();
    let pipeline = PipelineBuilder::new()
        .with_table(table.clone())
        .with_fetcher(ScriptedFetcher::failing("HTTP 404 Not Found"))
        .build();

    let report = pipeline.orchestrator.run_once().await.unwrap();

    assert_eq!(report.success_count(), 1);
    assert_eq!(table.cell(2, "Status").as_deref(), Some("Completed"));
    assert_eq!(
        pipeline
            .sessions
            .count(|call| matches!(call, DriverCall::AttachFile(_))),
        0
    );
}

#[tokio::test]
async fn test_persistence_failure_does_not_change_outcome() {
    let table = guest_table()
        .guest("Ana", "Silva", "P1", "2025-03-01 09:00:00")
        .build();
    let flaky = Arc::new(FlakyTable::new(table.clone()));
    flaky.set_fail_writes(true);

    let pipeline = PipelineBuilder::new()
        .with_store(Arc::new(TabularRecordStore::new(
            flaky.clone(),
            Default::default(),
        )))
        .build();

    let report = pipeline.orchestrator.run_once().await.unwrap();

    assert_eq!(report.success_count(), 1);
    assert!(report.outcome_for(&RecordId::for_row(2)).unwrap().success);
    // Processing and Completed writes both failed
    assert_eq!(report.persistence_errors(), 2);
    assert_eq!(flaky.rejected_writes(), 2);
    assert_eq!(table.cell(2, "Status").as_deref(), Some("New"));
}

#[tokio::test]
async fn test_unreachable_store_fails_run_and_releases_lock() {
    let table = guest_table()
        .guest("Ana", "Silva", "P1", "2025-03-01 09:00:00")
        .build();
    let flaky = Arc::new(FlakyTable::new(table.clone()));
    flaky.set_fail_reads(true);

    let pipeline = PipelineBuilder::new()
        .with_store(Arc::new(TabularRecordStore::new(
            flaky.clone(),
            Default::default(),
        )))
        .build();

    let err = pipeline.orchestrator.run_once().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StoreUnavailable);
    assert!(!pipeline.orchestrator.is_running());
    assert_eq!(pipeline.orchestrator.stats().runs_aborted, 1);

    flaky.set_fail_reads(false);
    let report = pipeline.orchestrator.run_once().await.unwrap();
    assert_eq!(report.success_count(), 1);
}

#[tokio::test]
async fn test_panicking_record_becomes_failed_outcome() {
    let table = guest_table()
        .guest("Ana", "Silva", "P1", "2025-03-01 09:00:00")
        .guest("Ben", "Okafor", "P2", "2025-03-01 10:00:00")
        .guest("Cy", "Park", "P3", "2025-03-01 11:00:00")
        .build();
    let pipeline = PipelineBuilder::new().with_table(table.clone()).build();
    pipeline.sessions.push_plan(AttemptPlan::succeed());
    pipeline.sessions.push_plan(AttemptPlan::panic_at(ScriptStep::SelectContext));

    let report = pipeline.orchestrator.run_once().await.unwrap();

    assert_eq!(report.processed_count(), 3);
    assert_eq!(report.success_count(), 2);
    assert!(!report.outcome_for(&RecordId::for_row(3)).unwrap().success);
    assert_eq!(table.cell(3, "Status").as_deref(), Some("Failed"));
    assert_eq!(table.cell(4, "Status").as_deref(), Some("Completed"));
}

#[tokio::test]
async fn test_run_report_is_persisted_per_run() {
    let table = guest_table()
        .guest("Ana", "Silva", "P1", "2025-03-01 09:00:00")
        .build();
    let pipeline = PipelineBuilder::new().with_table(table).build();

    let first = pipeline.orchestrator.run_once().await.unwrap();
    let second = pipeline.orchestrator.run_once().await.unwrap();

    let reports = files_in(pipeline.reports_dir());
    assert_eq!(reports.len(), 2);
    assert!(reports.iter().all(|name| name.starts_with("run-report-")));

    let stored: Vec<RunReport> = reports
        .iter()
        .map(|name| {
            let body = std::fs::read(pipeline.reports_dir().join(name)).unwrap();
            serde_json::from_slice(&body).unwrap()
        })
        .collect();
    assert!(stored.contains(&first));
    assert!(stored.contains(&second));
}

#[tokio::test]
async fn test_disabled_reports_write_nothing() {
    let table = guest_table()
        .guest("Ana", "Silva", "P1", "2025-03-01 09:00:00")
        .build();
    let pipeline = PipelineBuilder::new()
        .with_table(table)
        .configure(|config| config.reports.enabled = false)
        .build();

    pipeline.orchestrator.run_once().await.unwrap();
    assert!(files_in(pipeline.reports_dir()).is_empty());
}

#[tokio::test]
async fn test_missing_status_column_counts_persistence_errors() {
    let table = Arc::new(InMemoryTable::with_rows(
        &["First Name", "Last Name", "Passport Number"],
        vec![vec!["Ana", "Silva", "P1"]],
    ));
    let pipeline = PipelineBuilder::new().with_table(table).build();

    let report = pipeline.orchestrator.run_once().await.unwrap();

    assert_eq!(report.success_count(), 1);
    assert_eq!(report.persistence_errors(), 2);
    assert_eq!(pipeline.orchestrator.stats().persistence_errors, 2);
}

#[tokio::test]
async fn test_panicking_fetcher_fails_only_its_record() {
    let table = guest_table()
        .guest_with_attachment("Ana", "Silva", "P1", "2025-03-01 09:00:00", "https://files.example.com/a/passport.jpg")
        .guest("Ben", "Okafor", "P2", "2025-03-01 10:00:00")
        .build();
    let pipeline = PipelineBuilder::new()
        .with_table(table.clone())
        .with_attachment_fetcher(Arc::new(PanickingFetcher))
        .build();
    let orchestrator = Arc::new(pipeline.orchestrator);

    // Spawned so an escaping panic would surface as a JoinError
    let report = tokio::spawn({
        let orchestrator = Arc::clone(&orchestrator);
        async move { orchestrator.run_once().await }
    })
    .await
    .unwrap()
    .unwrap();

    assert_eq!(report.processed_count(), 2);
    assert_eq!(report.failure_count(), 1);
    let failed = report.outcome_for(&RecordId::for_row(2)).unwrap();
    assert!(!failed.success);
    assert!(failed.message.starts_with("Unexpected failure"));
    assert_eq!(table.cell(2, "Status").as_deref(), Some("Failed"));
    assert!(table
        .cell(2, "Processing Notes")
        .unwrap()
        .contains("fetcher blew up"));
    assert_eq!(table.cell(3, "Status").as_deref(), Some("Completed"));
    assert_eq!(pipeline.sessions.submitted_first_names(), vec!["Ben"]);
    assert!(!orchestrator.is_running());
}

#[tokio::test]
async fn test_panicking_status_write_fails_only_its_record() {
    let table = guest_table()
        .guest("Ana", "Silva", "P1", "2025-03-01 09:00:00")
        .guest("Ben", "Okafor", "P2", "2025-03-01 10:00:00")
        .build();
    let store = PanicOnComplete {
        inner: TabularRecordStore::new(table.clone(), Default::default()),
        victim: RecordId::for_row(2),
    };
    let pipeline = PipelineBuilder::new().with_store(Arc::new(store)).build();

    let report = pipeline.orchestrator.run_once().await.unwrap();

    assert_eq!(report.processed_count(), 2);
    assert_eq!(report.success_count(), 1);
    assert_eq!(report.failure_count(), 1);
    assert_eq!(table.cell(2, "Status").as_deref(), Some("Failed"));
    assert!(table
        .cell(2, "Processing Notes")
        .unwrap()
        .starts_with("Unexpected failure: store blew up"));
    assert_eq!(table.cell(3, "Status").as_deref(), Some("Completed"));
}
