use crate::common::PipelineBuilder;
use guestflow_core::error::ErrorKind;
use guestflow_core::models::RecordId;
use guestflow_core::portal::DriverError;
use guestflow_core::test_helpers::{guest_table, AttemptPlan, DriverCall, ScriptStep};

fn rejected_credentials() -> AttemptPlan {
    AttemptPlan::fail_at(
        ScriptStep::Authenticate,
        DriverError::CredentialsRejected("invalid username or password".to_string()),
    )
}

#[tokio::test]
async fn test_auth_failure_on_first_record_aborts_run() {
    let table = guest_table()
        .guest("Ana", "Silva", "P1", "2025-03-01 09:00:00")
        .guest("Ben", "Okafor", "P2", "2025-03-01 10:00:00")
        .guest("Cy", "Park", "P3", "2025-03-01 11:00:00")
        .build();
    let pipeline = PipelineBuilder::new().with_table(table.clone()).build();
    pipeline.sessions.push_plan(rejected_credentials());

    let report = pipeline.orchestrator.run_once().await.unwrap();

    let failure = report.run_failure().expect("run-level failure");
    assert_eq!(failure.kind, ErrorKind::Authentication);
    assert_eq!(failure.record_id, Some(RecordId::for_row(2)));
    assert_eq!(report.processed_count(), 0);
    assert!(report.outcome_for(&RecordId::for_row(3)).is_none());
    assert!(report.outcome_for(&RecordId::for_row(4)).is_none());

    // One session, never retried, nothing typed into the form
    assert_eq!(pipeline.sessions.sessions_opened(), 1);
    assert_eq!(pipeline.sessions.sessions_closed(), 1);
    assert_eq!(
        pipeline
            .sessions
            .count(|call| matches!(call, DriverCall::SetField(..))),
        0
    );

    assert_eq!(table.cell(2, "Status").as_deref(), Some("Failed"));
    assert!(table
        .cell(2, "Processing Notes")
        .unwrap()
        .starts_with("Run aborted"));
    assert_eq!(table.cell(3, "Status").as_deref(), Some("New"));
    assert_eq!(table.cell(4, "Status").as_deref(), Some("New"));

    assert_eq!(pipeline.orchestrator.stats().runs_aborted, 1);
    assert!(!pipeline.orchestrator.is_running());
}

#[tokio::test]
async fn test_auth_failure_mid_batch_keeps_earlier_outcomes() {
    let table = guest_table()
        .guest("Ana", "Silva", "P1", "2025-03-01 09:00:00")
        .guest("Ben", "Okafor", "P2", "2025-03-01 10:00:00")
        .guest("Cy", "Park", "P3", "2025-03-01 11:00:00")
        .build();
    let pipeline = PipelineBuilder::new().with_table(table.clone()).build();
    pipeline.sessions.push_plan(AttemptPlan::succeed());
    pipeline.sessions.push_plan(rejected_credentials());

    let report = pipeline.orchestrator.run_once().await.unwrap();

    assert_eq!(report.processed_count(), 1);
    assert_eq!(report.success_count(), 1);
    assert_eq!(
        report.run_failure().and_then(|f| f.record_id.clone()),
        Some(RecordId::for_row(3))
    );
    assert_eq!(table.cell(2, "Status").as_deref(), Some("Completed"));
    assert_eq!(table.cell(3, "Status").as_deref(), Some("Failed"));
    assert_eq!(table.cell(4, "Status").as_deref(), Some("New"));
    assert_eq!(pipeline.sessions.sessions_opened(), 2);
}

#[tokio::test]
async fn test_next_run_resumes_after_credentials_fixed() {
    let table = guest_table()
        .guest("Ana", "Silva", "P1", "2025-03-01 09:00:00")
        .guest("Ben", "Okafor", "P2", "2025-03-01 10:00:00")
        .build();
    let pipeline = PipelineBuilder::new().with_table(table.clone()).build();
    pipeline.sessions.push_plan(rejected_credentials());

    let aborted = pipeline.orchestrator.run_once().await.unwrap();
    assert!(aborted.run_failure().is_some());

    let resumed = pipeline.orchestrator.run_once().await.unwrap();
    assert!(resumed.run_failure().is_none());
    assert_eq!(resumed.processed_count(), 1);
    assert_eq!(table.cell(3, "Status").as_deref(), Some("Completed"));
    // The aborted record is Failed and stays out of later runs
    assert_eq!(table.cell(2, "Status").as_deref(), Some("Failed"));
}
