//! # Run Lock
//!
//! Single-flight guard for orchestrator runs. A run acquires the lock before it
//! reads the store and holds a [`RunGuard`] until it returns; the guard releases
//! on drop, so an early return or a panic can never leave the lock held.
//!
//! With a lease file configured the lock is also visible to other processes. The
//! lease carries an expiry so a process that died mid-run blocks others for at
//! most the lease TTL; an expired lease is taken over with a warning. A live run
//! renews its lease through [`RunGuard::renew`] so long batches keep it.
//!
//! Lease file IO is blocking and runs on tokio's blocking pool from the async
//! entry points ([`RunLock::acquire`], [`RunGuard::renew`]).

use crate::config::RunLockConfig;
use crate::error::{PipelineError, PipelineResult};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{ErrorKind as IoErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

/// Contents of a persisted lease
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    pub owner: String,
    pub run_id: Uuid,
    pub acquired_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Lease {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[derive(Debug, Clone)]
pub struct LeaseFile {
    path: PathBuf,
    ttl: Duration,
}

impl LeaseFile {
    pub fn new(path: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            path: path.into(),
            ttl,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `Ok(None)` when no lease exists; an unreadable lease is reported as stale
    pub fn read(&self) -> PipelineResult<Option<Result<Lease, String>>> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(
                serde_json::from_str(&contents).map_err(|e| e.to_string()),
            )),
            Err(e) if e.kind() == IoErrorKind::NotFound => Ok(None),
            Err(e) => Err(PipelineError::persistence("read_lease", e)),
        }
    }

    fn ttl(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.ttl).unwrap_or_else(|_| chrono::Duration::hours(1))
    }

    fn new_lease(&self, owner: &str, run_id: Uuid) -> Lease {
        let acquired_at = Utc::now();
        Lease {
            owner: owner.to_string(),
            run_id,
            acquired_at,
            expires_at: acquired_at + self.ttl(),
        }
    }

    /// Push the expiry of `run_id`'s lease one TTL past now.
    ///
    /// `Ok(false)` when the file no longer carries `run_id`.
    fn renew(&self, run_id: Uuid) -> PipelineResult<bool> {
        match self.read()? {
            Some(Ok(mut lease)) if lease.run_id == run_id => {
                lease.expires_at = Utc::now() + self.ttl();
                self.write(&lease, false)
            }
            Some(Ok(lease)) => {
                warn!(
                    path = %self.path.display(),
                    run_id = %run_id,
                    current_owner = %lease.owner,
                    current_run_id = %lease.run_id,
                    "⚠️ Run lease now held by another run"
                );
                Ok(false)
            }
            Some(Err(reason)) => {
                warn!(path = %self.path.display(), reason = %reason, "⚠️ Run lease unreadable on renew");
                Ok(false)
            }
            None => {
                warn!(path = %self.path.display(), run_id = %run_id, "⚠️ Run lease disappeared mid-run");
                Ok(false)
            }
        }
    }

    /// Write `lease`; with `exclusive` the write fails if another lease appeared.
    fn write(&self, lease: &Lease, exclusive: bool) -> PipelineResult<bool> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| PipelineError::persistence("write_lease", e))?;
            }
        }
        let mut options = OpenOptions::new();
        options.write(true);
        if exclusive {
            options.create_new(true);
        } else {
            options.create(true).truncate(true);
        }
        let mut file = match options.open(&self.path) {
            Ok(file) => file,
            Err(e) if exclusive && e.kind() == IoErrorKind::AlreadyExists => return Ok(false),
            Err(e) => return Err(PipelineError::persistence("write_lease", e)),
        };
        let body = serde_json::to_vec_pretty(lease)?;
        file.write_all(&body)
            .map_err(|e| PipelineError::persistence("write_lease", e))?;
        Ok(true)
    }

    fn remove_if_owned(&self, run_id: Uuid) {
        match self.read() {
            Ok(Some(Ok(lease))) if lease.run_id == run_id => {
                if let Err(error) = std::fs::remove_file(&self.path) {
                    warn!(path = %self.path.display(), error = %error, "Could not remove run lease");
                }
            }
            Ok(_) => debug!(path = %self.path.display(), "Run lease no longer ours, leaving it"),
            Err(error) => warn!(path = %self.path.display(), error = %error, "Could not read run lease on release"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct ActiveRun {
    run_id: Uuid,
    since: DateTime<Utc>,
}

#[derive(Debug)]
pub struct RunLock {
    owner: String,
    active: Mutex<Option<ActiveRun>>,
    lease: Option<LeaseFile>,
}

impl Default for RunLock {
    fn default() -> Self {
        Self::new()
    }
}

impl RunLock {
    /// Process-local lock
    pub fn new() -> Self {
        Self {
            owner: format!("guestflow-{}", std::process::id()),
            active: Mutex::new(None),
            lease: None,
        }
    }

    pub fn with_lease(lease: LeaseFile) -> Self {
        Self {
            lease: Some(lease),
            ..Self::new()
        }
    }

    pub fn from_config(config: &RunLockConfig) -> Self {
        match &config.lease_file {
            Some(path) => Self::with_lease(LeaseFile::new(path, config.lease_ttl())),
            None => Self::new(),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn is_held(&self) -> bool {
        self.active.lock().is_some()
    }

    /// Run currently holding the lock in this process
    pub fn holder(&self) -> Option<(Uuid, DateTime<Utc>)> {
        let active = *self.active.lock();
        active.map(|run| (run.run_id, run.since))
    }

    /// [`Self::try_acquire`] with the lease file IO moved onto the blocking pool.
    pub async fn acquire(self: &Arc<Self>, run_id: Uuid) -> PipelineResult<RunGuard> {
        if self.lease.is_none() {
            return self.try_acquire(run_id);
        }
        let lock = Arc::clone(self);
        tokio::task::spawn_blocking(move || lock.try_acquire(run_id))
            .await
            .map_err(|e| PipelineError::persistence("acquire_run_lease", e))?
    }

    /// Acquire for `run_id` or fail immediately with `RunInProgress`; never waits.
    pub fn try_acquire(self: &Arc<Self>, run_id: Uuid) -> PipelineResult<RunGuard> {
        let mut active = self.active.lock();
        if let Some(current) = *active {
            return Err(PipelineError::RunInProgress {
                holder: format!("{} run {}", self.owner, current.run_id),
                since: current.since,
            });
        }

        if let Some(lease) = &self.lease {
            self.acquire_lease(lease, run_id)?;
        }

        *active = Some(ActiveRun {
            run_id,
            since: Utc::now(),
        });
        debug!(run_id = %run_id, owner = %self.owner, "🔒 Run lock acquired");

        Ok(RunGuard {
            lock: Arc::clone(self),
            run_id,
        })
    }

    fn acquire_lease(&self, lease_file: &LeaseFile, run_id: Uuid) -> PipelineResult<()> {
        let lease = lease_file.new_lease(&self.owner, run_id);
        match lease_file.read()? {
            None => {
                if lease_file.write(&lease, true)? {
                    return Ok(());
                }
                // Another process created the lease between our read and write
                let holder = match lease_file.read()? {
                    Some(Ok(existing)) => return Err(in_progress(&existing)),
                    _ => "unknown".to_string(),
                };
                Err(PipelineError::RunInProgress {
                    holder,
                    since: Utc::now(),
                })
            }
            Some(Ok(existing)) if !existing.is_expired(Utc::now()) => Err(in_progress(&existing)),
            Some(Ok(existing)) => {
                warn!(
                    path = %lease_file.path().display(),
                    previous_owner = %existing.owner,
                    expired_at = %existing.expires_at,
                    "⚠️ Taking over expired run lease"
                );
                lease_file.write(&lease, false).map(|_| ())
            }
            Some(Err(reason)) => {
                warn!(
                    path = %lease_file.path().display(),
                    reason = %reason,
                    "⚠️ Run lease unreadable, taking it over"
                );
                lease_file.write(&lease, false).map(|_| ())
            }
        }
    }

    fn renew_lease(&self, run_id: Uuid) -> PipelineResult<bool> {
        let active = *self.active.lock();
        if active.map(|run| run.run_id) != Some(run_id) {
            return Ok(false);
        }
        match &self.lease {
            Some(lease) => lease.renew(run_id),
            None => Ok(true),
        }
    }

    fn release(&self, run_id: Uuid) {
        let mut active = self.active.lock();
        if active.as_ref().map(|run| run.run_id) == Some(run_id) {
            *active = None;
            if let Some(lease) = &self.lease {
                // Blocking remove: Drop has no runtime to hand it to
                lease.remove_if_owned(run_id);
            }
            debug!(run_id = %run_id, "🔓 Run lock released");
        }
    }
}

fn in_progress(lease: &Lease) -> PipelineError {
    PipelineError::RunInProgress {
        holder: format!("{} run {}", lease.owner, lease.run_id),
        since: lease.acquired_at,
    }
}

/// Held for the duration of one run; releases the lock when dropped
#[derive(Debug)]
pub struct RunGuard {
    lock: Arc<RunLock>,
    run_id: Uuid,
}

impl RunGuard {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Extend the lease before more work starts. Without a lease file this
    /// always succeeds.
    ///
    /// `Ok(false)` means another process owns the lease now and the run must stop.
    pub async fn renew(&self) -> PipelineResult<bool> {
        if self.lock.lease.is_none() {
            return Ok(true);
        }
        let lock = Arc::clone(&self.lock);
        let run_id = self.run_id;
        tokio::task::spawn_blocking(move || lock.renew_lease(run_id))
            .await
            .map_err(|e| PipelineError::persistence("renew_run_lease", e))?
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.lock.release(self.run_id);
    }
}
