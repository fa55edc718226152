use crate::common::{files_in, PipelineBuilder};
use guestflow_core::record_store::DirectoryRecordStore;
use guestflow_core::test_helpers::DriverCall;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;

fn write_guest(root: &Path, name: &str, doc: Value) {
    let dir = root.join(name);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("guest_info.json"), serde_json::to_vec_pretty(&doc).unwrap()).unwrap();
}

fn read_guest(root: &Path, name: &str) -> Value {
    serde_json::from_slice(&std::fs::read(root.join(name).join("guest_info.json")).unwrap()).unwrap()
}

#[tokio::test]
async fn test_directory_guests_are_submitted_with_local_documents() {
    let root = tempfile::tempdir().unwrap();
    let scan = root.path().join("guest_ana").join("passport_scan.png");
    write_guest(
        root.path(),
        "guest_ana",
        json!({
            "firstName": "Ana",
            "lastName": "Silva",
            "passportNumber": "P1",
            "nationality": "Spain",
            "submissionTime": "2025-03-01T09:00:00Z",
            "passportFiles": [scan.display().to_string()],
            "status": "pending",
            "roomPreference": "quiet"
        }),
    );
    std::fs::write(&scan, b"png bytes").unwrap();
    write_guest(
        root.path(),
        "guest_lee",
        json!({ "firstName": "", "lastName": "Lee", "passportNumber": "P2", "status": "pending" }),
    );

    let store = Arc::new(DirectoryRecordStore::new(root.path(), Default::default()));
    let pipeline = PipelineBuilder::new().with_store(store).build();

    let report = pipeline.orchestrator.run_once().await.unwrap();

    assert_eq!(report.processed_count(), 1);
    assert_eq!(report.success_count(), 1);

    let ana = read_guest(root.path(), "guest_ana");
    assert_eq!(ana["status"], "completed");
    assert_eq!(ana["roomPreference"], "quiet");
    assert!(ana["portalSubmittedAt"].is_string());
    assert!(ana["processingNotes"]
        .as_str()
        .unwrap()
        .starts_with("Submitted to portal"));

    let lee = read_guest(root.path(), "guest_lee");
    assert_eq!(lee["status"], "pending");

    // Spain resolves to its portal code; the copy was uploaded then released
    let calls = pipeline.sessions.calls();
    assert!(calls.contains(&DriverCall::SetField(
        guestflow_core::portal::PortalField::Nationality,
        "197".to_string()
    )));
    assert_eq!(
        pipeline
            .sessions
            .count(|call| matches!(call, DriverCall::AttachFile(_))),
        1
    );
    assert!(files_in(&pipeline.staging_dir().join("guest_ana")).is_empty());
    assert!(scan.exists());
    assert_eq!(pipeline.fetcher.calls(), 0);
}

#[tokio::test]
async fn test_missing_directory_root_fails_the_run() {
    let root = tempfile::tempdir().unwrap();
    let store = Arc::new(DirectoryRecordStore::new(root.path().join("absent"), Default::default()));
    let pipeline = PipelineBuilder::new().with_store(store).build();

    let err = pipeline.orchestrator.run_once().await.unwrap_err();
    assert_eq!(err.kind(), guestflow_core::ErrorKind::StoreUnavailable);
    assert_eq!(pipeline.sessions.sessions_opened(), 0);
}
