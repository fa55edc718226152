//! # Pipeline Configuration
//!
//! Typed configuration for the guest submission pipeline. Every section has
//! defaults, so an empty TOML file is a valid configuration apart from the
//! portal credentials, which must always be supplied (usually through
//! `${VAR}` substitution from the environment).
//!
//! ## Usage
//!
//! ```rust,no_run
//! use guestflow_core::config::ConfigLoader;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigLoader::load_from_env()?;
//! let policy = config.retry.policy();
//! println!("retrying up to {} times", policy.max_attempts);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use crate::resilience::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigLoader;

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub record_store: RecordStoreConfig,
    pub staging: StagingConfig,
    pub retry: RetryConfig,
    pub portal: PortalConfig,
    pub scheduler: SchedulerConfig,
    pub reports: ReportConfig,
    pub run_lock: RunLockConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RecordStoreConfig {
    /// Sheet (tab) holding the guest rows
    pub sheet_name: String,
    /// Code used when the nationality name is not in the lookup table
    pub default_nationality_code: String,
    pub default_check_in_time: String,
    pub default_check_out_time: String,
}

impl Default for RecordStoreConfig {
    fn default() -> Self {
        Self {
            sheet_name: "Guests".to_string(),
            default_nationality_code: "226".to_string(),
            default_check_in_time: "3:00PM".to_string(),
            default_check_out_time: "11:00AM".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StagingConfig {
    pub directory: PathBuf,
    pub fetch_attempts: u32,
    pub fetch_retry_delay_ms: u64,
    pub fetch_timeout_ms: u64,
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./downloads/attachments"),
            fetch_attempts: 2,
            fetch_retry_delay_ms: 500,
            fetch_timeout_ms: 30_000,
        }
    }
}

impl StagingConfig {
    pub fn fetch_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.fetch_attempts,
            Duration::from_millis(self.fetch_retry_delay_ms),
        )
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 2_000,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.base_delay_ms))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PortalConfig {
    /// Operational context (managed property) guests are registered under
    pub context_id: String,
    pub step_timeout_ms: u64,
    pub confirmation_timeout_ms: u64,
    pub credentials: PortalCredentials,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            context_id: "3005".to_string(),
            step_timeout_ms: 30_000,
            confirmation_timeout_ms: 30_000,
            credentials: PortalCredentials::default(),
        }
    }
}

impl PortalConfig {
    pub fn step_timeout(&self) -> Duration {
        Duration::from_millis(self.step_timeout_ms)
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_millis(self.confirmation_timeout_ms)
    }
}

#[derive(Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PortalCredentials {
    pub username: String,
    pub password: String,
}

impl PortalCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.username.trim().is_empty() && !self.password.is_empty()
    }
}

impl fmt::Debug for PortalCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortalCredentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub interval_seconds: u64,
    pub initial_delay_seconds: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 300,
            initial_delay_seconds: 5,
        }
    }
}

impl SchedulerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_secs(self.initial_delay_seconds)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ReportConfig {
    pub enabled: bool,
    pub directory: PathBuf,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: PathBuf::from("./logs"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RunLockConfig {
    /// When set, the run lock is also persisted here so a second process observes it
    pub lease_file: Option<PathBuf>,
    pub lease_ttl_seconds: u64,
}

impl Default for RunLockConfig {
    fn default() -> Self {
        Self {
            lease_file: None,
            lease_ttl_seconds: 3_600,
        }
    }
}

impl RunLockConfig {
    pub fn lease_ttl(&self) -> Duration {
        Duration::from_secs(self.lease_ttl_seconds)
    }
}

impl PipelineConfig {
    /// Check every rule and report all violations at once.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.retry.max_attempts == 0 {
            errors.push("retry.max_attempts must be at least 1".to_string());
        }
        if self.staging.fetch_attempts == 0 {
            errors.push("staging.fetch_attempts must be at least 1".to_string());
        }
        if self.staging.fetch_timeout_ms == 0 {
            errors.push("staging.fetch_timeout_ms must be greater than 0".to_string());
        }
        if self.portal.step_timeout_ms == 0 {
            errors.push("portal.step_timeout_ms must be greater than 0".to_string());
        }
        if self.portal.confirmation_timeout_ms == 0 {
            errors.push("portal.confirmation_timeout_ms must be greater than 0".to_string());
        }
        if self.portal.context_id.trim().is_empty() {
            errors.push("portal.context_id must not be empty".to_string());
        }
        if !self.portal.credentials.is_complete() {
            errors.push("portal.credentials.username and password are required".to_string());
        }
        if self.scheduler.interval_seconds == 0 {
            errors.push("scheduler.interval_seconds must be greater than 0".to_string());
        }
        if self.run_lock.lease_file.is_some() && self.run_lock.lease_ttl_seconds == 0 {
            errors.push("run_lock.lease_ttl_seconds must be greater than 0".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Configuration safe to log: credentials are masked.
    pub fn sanitized(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or(serde_json::Value::Null);
        if let Some(password) = value.pointer_mut("/portal/credentials/password") {
            *password = serde_json::Value::String("[REDACTED]".to_string());
        }
        value
    }
}
