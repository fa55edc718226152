//! # Resilience Module
//!
//! Bounded retry with linear backoff for operations against flaky external systems
//! (the remote portal and attachment hosts).
//!
//! ## Usage
//!
//! ```rust,no_run
//! use guestflow_core::resilience::RetryPolicy;
//! use guestflow_core::error::PipelineError;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), PipelineError> {
//! let policy = RetryPolicy::new(3, Duration::from_secs(2));
//!
//! let value = policy
//!     .run("portal_submit", |attempt| async move {
//!         // Remote operation here
//!         Ok::<u32, PipelineError>(attempt)
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod retry_policy;

pub use retry_policy::{RetryOutcome, RetryPolicy};
