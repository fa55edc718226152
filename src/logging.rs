//! # Tracing Module
//!
//! Environment-aware console logging using the tracing ecosystem. Logs go to
//! stdout so the pipeline behaves well under a process supervisor or container.
//!
//! - Environment-based log level (`GUESTFLOW_ENV`, overridable with `LOG_LEVEL` / `RUST_LOG`)
//! - TTY-aware ANSI color output
//! - JSON lines when `GUESTFLOW_LOG_FORMAT=json`
//! - Domain-specific structured logging macros for records and portal steps
//!
//! Every record-level log line carries `record_id` as its first field so a single
//! guest can be followed from listing through staging, submission and status write.

use chrono::Utc;
use std::io::IsTerminal;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static TRACING_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Output format for the console layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    fn from_env() -> Self {
        match std::env::var("GUESTFLOW_LOG_FORMAT") {
            Ok(value) if value.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

/// Initialize console tracing. Safe to call more than once; only the first call
/// installs a subscriber, and an already-installed global subscriber is kept.
pub fn init_tracing() {
    TRACING_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let log_level = get_log_level(&environment);
        let format = LogFormat::from_env();
        let use_ansi = IsTerminal::is_terminal(&std::io::stdout());

        let console_layer = match format {
            LogFormat::Json => fmt::layer()
                .json()
                .with_target(true)
                .with_current_span(true)
                .with_filter(EnvFilter::new(&log_level))
                .boxed(),
            LogFormat::Pretty => fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(use_ansi)
                .with_filter(EnvFilter::new(&log_level))
                .boxed(),
        };

        let subscriber = tracing_subscriber::registry().with(console_layer);

        if subscriber.try_init().is_err() {
            tracing::debug!(
                "Global tracing subscriber already initialized - continuing with existing subscriber"
            );
        } else {
            tracing::info!(
                environment = %environment,
                log_level = %log_level,
                json = format == LogFormat::Json,
                ansi_colors = use_ansi,
                "🔭 Console logging initialized"
            );
        }
    });
}

fn get_environment() -> String {
    std::env::var("GUESTFLOW_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

fn get_log_level(environment: &str) -> String {
    let explicit = std::env::var("LOG_LEVEL")
        .or_else(|_| std::env::var("RUST_LOG"))
        .ok();
    log_level_for(environment, explicit.as_deref())
}

fn log_level_for(environment: &str, explicit: Option<&str>) -> String {
    if let Some(level) = explicit {
        return level.to_lowercase();
    }

    match environment {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

/// Log record lifecycle operations, keyed by record id
#[macro_export]
macro_rules! log_record {
    ($level:ident, $operation:expr, record_id: $record_id:expr, $($key:ident: $value:expr),* $(,)?) => {
        tracing::$level!(
            record_id = %$record_id,
            operation = %$operation,
            $($key = ?$value,)*
            timestamp = %chrono::Utc::now().to_rfc3339(),
            "{}", $operation
        );
    };
    ($level:ident, $operation:expr $(,)?) => {
        tracing::$level!(
            operation = %$operation,
            timestamp = %chrono::Utc::now().to_rfc3339(),
            "{}", $operation
        );
    };
    ($level:ident, $operation:expr, $($key:ident: $value:expr),+ $(,)?) => {
        tracing::$level!(
            operation = %$operation,
            $($key = ?$value,)*
            timestamp = %chrono::Utc::now().to_rfc3339(),
            "{}", $operation
        );
    };
}

/// Log portal automation steps
#[macro_export]
macro_rules! log_portal {
    ($level:ident, $operation:expr, record_id: $record_id:expr, $($key:ident: $value:expr),* $(,)?) => {
        tracing::$level!(
            record_id = %$record_id,
            operation = %$operation,
            $($key = ?$value,)*
            timestamp = %chrono::Utc::now().to_rfc3339(),
            "PORTAL_{}", $operation
        );
    };
    ($level:ident, $operation:expr $(,)?) => {
        tracing::$level!(
            operation = %$operation,
            timestamp = %chrono::Utc::now().to_rfc3339(),
            "PORTAL_{}", $operation
        );
    };
}

pub fn log_record_operation(operation: &str, record_id: &str, status: &str, details: Option<&str>) {
    log_record!(info, operation,
        record_id: record_id,
        status: status,
        details: details
    );
}

pub fn log_portal_step(record_id: &str, from: &str, to: &str, attempt: u32) {
    log_portal!(debug, "STEP",
        record_id: record_id,
        from: from,
        to: to,
        attempt: attempt
    );
}

pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        timestamp = %Utc::now().to_rfc3339(),
        "ERROR: {} failed in {}: {}", operation, component, error
    );
}
