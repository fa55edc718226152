#![allow(clippy::doc_markdown)] // Allow technical terms like TOML, JSON in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Guestflow Core
//!
//! Orchestration pipeline that takes guest registrations from a system of record
//! and submits them, one at a time, to a remote registration portal.
//!
//! ## Overview
//!
//! A run pulls the pending guests from a [`record_store::RecordStore`], stages each
//! guest's passport document locally, drives a fresh portal session through the
//! registration form under a bounded [`resilience::RetryPolicy`], and writes the
//! resulting status back. The portal is a flaky, externally owned UI, so the
//! pipeline is built around three guarantees:
//!
//! - a guest is never submitted twice: only `New` records are selected and every
//!   processed record ends `Completed` or `Failed`
//! - no two portal sessions run at once: records are sequential and runs are
//!   single-flight behind a [`orchestration::RunLock`]
//! - one bad record never sinks the batch, except rejected credentials, which
//!   abort the run
//!
//! ## Module Organization
//!
//! - [`record_store`] - Record store adapters with the column alias table
//! - [`staging`] - Per-record attachment staging
//! - [`portal`] - Portal automation engine and the remote session driver seam
//! - [`resilience`] - Linear-backoff retry policy
//! - [`orchestration`] - Run sequencing, run lock, stop signal and run reports
//! - [`state_machine`] - Record status and portal session state machines
//! - [`models`] - Guest records and run reports
//! - [`config`] - TOML configuration with environment substitution
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured `tracing` setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use guestflow_core::config::ConfigLoader;
//! use guestflow_core::orchestration::Orchestrator;
//! use guestflow_core::portal::SessionFactory;
//! use guestflow_core::record_store::{InMemoryTable, TabularRecordStore};
//! use std::sync::Arc;
//!
//! # async fn example(sessions: Arc<dyn SessionFactory>) -> Result<(), Box<dyn std::error::Error>> {
//! guestflow_core::logging::init_tracing();
//! let config = ConfigLoader::load_from_env()?;
//!
//! let table = Arc::new(InMemoryTable::default());
//! let store = Arc::new(TabularRecordStore::new(table, config.record_store.clone()));
//! let orchestrator = Orchestrator::from_config(store, sessions, &config)?;
//!
//! let report = orchestrator.run_once().await?;
//! println!("{} of {} guests submitted", report.success_count(), report.processed_count());
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! [`test_helpers`] provides a scripted portal session, attachment fetcher and a
//! table that can be made to fail, so the whole pipeline runs without a portal:
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # Unit and integration tests
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod portal;
pub mod record_store;
pub mod resilience;
pub mod staging;
pub mod state_machine;
pub mod test_helpers;

pub use config::{ConfigLoader, PipelineConfig};
pub use error::{ErrorKind, PipelineError, PipelineResult};
pub use models::{GuestRecord, RecordId, RunReport};
pub use orchestration::Orchestrator;
pub use state_machine::{GuestStatus, SessionState};
