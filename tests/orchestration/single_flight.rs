use crate::common::PipelineBuilder;
use async_trait::async_trait;
use guestflow_core::config::PipelineConfig;
use guestflow_core::models::{GuestRecord, RecordId};
use guestflow_core::orchestration::{Lease, Orchestrator, ShutdownSignal};
use guestflow_core::portal::{DriverResult, PortalAutomationEngine, RemoteSessionDriver, SessionFactory};
use guestflow_core::record_store::{InMemoryTable, RecordStore, StatusUpdate, TabularRecordStore};
use guestflow_core::staging::FileStager;
use guestflow_core::test_helpers::{guest_table, test_config, ScriptedFetcher, ScriptedSessionFactory};
use guestflow_core::{PipelineError, PipelineResult};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Store whose `list_pending` blocks until the test opens the gate
struct GatedStore {
    inner: TabularRecordStore,
    entered: Notify,
    gate: Notify,
}

impl GatedStore {
    fn new(table: Arc<InMemoryTable>) -> Self {
        Self {
            inner: TabularRecordStore::new(table, Default::default()),
            entered: Notify::new(),
            gate: Notify::new(),
        }
    }
}

#[async_trait]
impl RecordStore for GatedStore {
    async fn list_pending(&self) -> PipelineResult<Vec<GuestRecord>> {
        self.entered.notify_one();
        self.gate.notified().await;
        self.inner.list_pending().await
    }

    async fn update_status(&self, id: &RecordId, update: StatusUpdate) -> PipelineResult<()> {
        self.inner.update_status(id, update).await
    }
}

/// Session factory that requests a stop as soon as the first session opens
struct StopOnOpen {
    inner: ScriptedSessionFactory,
    signal: ShutdownSignal,
}

#[async_trait]
impl SessionFactory for StopOnOpen {
    async fn open_session(&self) -> DriverResult<Box<dyn RemoteSessionDriver>> {
        self.signal.trigger();
        self.inner.open_session().await
    }
}

/// Session factory that hands the run lease to another process on first open
struct StealLeaseOnOpen {
    inner: ScriptedSessionFactory,
    lease_path: PathBuf,
}

#[async_trait]
impl SessionFactory for StealLeaseOnOpen {
    async fn open_session(&self) -> DriverResult<Box<dyn RemoteSessionDriver>> {
        let usurper = Lease {
            owner: "guestflow-other-host".to_string(),
            run_id: uuid::Uuid::new_v4(),
            acquired_at: chrono::Utc::now(),
            expires_at: chrono::Utc::now() + chrono::Duration::hours(1),
        };
        tokio::fs::write(&self.lease_path, serde_json::to_vec(&usurper).unwrap())
            .await
            .unwrap();
        self.inner.open_session().await
    }
}

fn orchestrator_over(store: Arc<dyn RecordStore>, config: &PipelineConfig) -> Orchestrator {
    let stager = Arc::new(FileStager::new(
        config.staging.directory.clone(),
        Arc::new(ScriptedFetcher::succeeding(Vec::new())),
        config.staging.fetch_policy(),
    ));
    let engine = Arc::new(PortalAutomationEngine::new(
        Arc::new(ScriptedSessionFactory::new()),
        config.portal.clone(),
    ));
    Orchestrator::new(store, stager, engine, config)
}

#[tokio::test]
async fn test_concurrent_run_is_rejected_immediately() {
    let table = guest_table()
        .guest("Ana", "Silva", "P1", "2025-03-01 09:00:00")
        .build();
    let store = Arc::new(GatedStore::new(table.clone()));
    let pipeline = PipelineBuilder::new().with_store(store.clone()).build();
    let orchestrator = Arc::new(pipeline.orchestrator);

    let first = tokio::spawn({
        let orchestrator = Arc::clone(&orchestrator);
        async move { orchestrator.run_once().await }
    });
    store.entered.notified().await;
    assert!(orchestrator.is_running());

    let rejected = orchestrator.run_once().await;
    assert!(matches!(rejected, Err(PipelineError::RunInProgress { .. })));

    store.gate.notify_one();
    let report = first.await.unwrap().unwrap();
    assert_eq!(report.processed_count(), 1);
    assert_eq!(pipeline.sessions.sessions_opened(), 1);
    assert_eq!(table.cell(2, "Status").as_deref(), Some("Completed"));

    let stats = orchestrator.stats();
    assert_eq!(stats.runs_rejected, 1);
    assert_eq!(stats.runs_completed, 1);
    assert!(!stats.is_running);
}

#[tokio::test]
async fn test_lease_file_excludes_second_orchestrator() {
    let workdir = tempfile::tempdir().unwrap();
    let mut config = test_config(workdir.path());
    config.run_lock.lease_file = Some(workdir.path().join("run.lease"));

    let table = guest_table()
        .guest("Ana", "Silva", "P1", "2025-03-01 09:00:00")
        .build();
    let gated = Arc::new(GatedStore::new(table.clone()));
    let holder = Arc::new(orchestrator_over(gated.clone(), &config));
    let other = orchestrator_over(
        Arc::new(TabularRecordStore::new(table.clone(), Default::default())),
        &config,
    );

    let running = tokio::spawn({
        let holder = Arc::clone(&holder);
        async move { holder.run_once().await }
    });
    gated.entered.notified().await;
    assert!(workdir.path().join("run.lease").exists());

    let err = other.run_once().await.unwrap_err();
    assert!(matches!(err, PipelineError::RunInProgress { .. }));

    gated.gate.notify_one();
    running.await.unwrap().unwrap();
    assert!(!workdir.path().join("run.lease").exists());

    let report = other.run_once().await.unwrap();
    assert_eq!(report.processed_count(), 0);
}

#[tokio::test]
async fn test_stop_mid_run_finishes_current_record_only() {
    let workdir = tempfile::tempdir().unwrap();
    let config = test_config(workdir.path());
    let table = guest_table()
        .guest("Ana", "Silva", "P1", "2025-03-01 09:00:00")
        .guest("Ben", "Okafor", "P2", "2025-03-01 10:00:00")
        .guest("Cy", "Park", "P3", "2025-03-01 11:00:00")
        .build();

    let signal = ShutdownSignal::new();
    let sessions = ScriptedSessionFactory::new();
    let engine = Arc::new(PortalAutomationEngine::new(
        Arc::new(StopOnOpen {
            inner: sessions.clone(),
            signal: signal.clone(),
        }),
        config.portal.clone(),
    ));
    let stager = Arc::new(FileStager::new(
        config.staging.directory.clone(),
        Arc::new(ScriptedFetcher::succeeding(Vec::new())),
        config.staging.fetch_policy(),
    ));
    let store = Arc::new(TabularRecordStore::new(table.clone(), config.record_store.clone()));
    let orchestrator = Orchestrator::new(store, stager, engine, &config).with_shutdown_signal(signal);

    let report = orchestrator.run_once().await.unwrap();

    assert!(report.was_cancelled());
    assert_eq!(report.processed_count(), 1);
    assert_eq!(report.success_count(), 1);
    assert_eq!(sessions.sessions_opened(), 1);
    assert_eq!(table.cell(2, "Status").as_deref(), Some("Completed"));
    assert_eq!(table.cell(3, "Status").as_deref(), Some("New"));
    assert_eq!(table.cell(4, "Status").as_deref(), Some("New"));
}

#[tokio::test(start_paused = true)]
async fn test_periodic_runs_until_stopped() {
    let table = guest_table()
        .guest("Ana", "Silva", "P1", "2025-03-01 09:00:00")
        .build();
    let pipeline = PipelineBuilder::new()
        .with_table(table.clone())
        .configure(|config| config.reports.enabled = false)
        .build();
    let sessions = pipeline.sessions.clone();
    let orchestrator = Arc::new(pipeline.orchestrator);

    let periodic = tokio::spawn({
        let orchestrator = Arc::clone(&orchestrator);
        async move {
            orchestrator
                .run_periodic(Duration::from_secs(60), Duration::from_secs(5))
                .await
        }
    });

    tokio::time::sleep(Duration::from_secs(150)).await;
    orchestrator.stop();
    let cycles = periodic.await.unwrap();

    assert!(cycles >= 2, "expected at least two cycles, got {cycles}");
    let stats = orchestrator.stats();
    assert_eq!(stats.runs_completed, cycles);
    // The only guest is submitted once; later cycles find nothing pending
    assert_eq!(stats.total_processed, 1);
    assert_eq!(sessions.sessions_opened(), 1);
    assert_eq!(table.cell(2, "Status").as_deref(), Some("Completed"));
}

#[tokio::test(start_paused = true)]
async fn test_periodic_stop_before_first_cycle() {
    let table = guest_table()
        .guest("Ana", "Silva", "P1", "2025-03-01 09:00:00")
        .build();
    let pipeline = PipelineBuilder::new().with_table(table.clone()).build();
    pipeline.orchestrator.stop();

    let cycles = pipeline
        .orchestrator
        .run_periodic(Duration::from_secs(60), Duration::from_secs(5))
        .await;

    assert_eq!(cycles, 0);
    assert_eq!(pipeline.sessions.sessions_opened(), 0);
    assert_eq!(table.cell(2, "Status").as_deref(), Some("New"));
}

#[tokio::test]
async fn test_run_stops_when_lease_is_lost() {
    let workdir = tempfile::tempdir().unwrap();
    let lease_path = workdir.path().join("run.lease");
    let mut config = test_config(workdir.path());
    config.run_lock.lease_file = Some(lease_path.clone());
    let table = guest_table()
        .guest("Ana", "Silva", "P1", "2025-03-01 09:00:00")
        .guest("Ben", "Okafor", "P2", "2025-03-01 10:00:00")
        .build();

    let sessions = ScriptedSessionFactory::new();
    let engine = Arc::new(PortalAutomationEngine::new(
        Arc::new(StealLeaseOnOpen {
            inner: sessions.clone(),
            lease_path: lease_path.clone(),
        }),
        config.portal.clone(),
    ));
    let stager = Arc::new(FileStager::new(
        config.staging.directory.clone(),
        Arc::new(ScriptedFetcher::succeeding(Vec::new())),
        config.staging.fetch_policy(),
    ));
    let store = Arc::new(TabularRecordStore::new(table.clone(), config.record_store.clone()));
    let orchestrator = Orchestrator::new(store, stager, engine, &config);

    let report = orchestrator.run_once().await.unwrap();

    assert!(report.was_cancelled());
    assert_eq!(report.processed_count(), 1);
    assert_eq!(sessions.sessions_opened(), 1);
    assert_eq!(table.cell(2, "Status").as_deref(), Some("Completed"));
    assert_eq!(table.cell(3, "Status").as_deref(), Some("New"));
    // The other owner's lease is left alone on release
    let lease: Lease = serde_json::from_slice(&std::fs::read(&lease_path).unwrap()).unwrap();
    assert_eq!(lease.owner, "guestflow-other-host");
}
