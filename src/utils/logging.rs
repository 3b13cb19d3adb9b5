//! Logging configuration and setup
//! 
//! This module provides logging initialization and structured logging utilities
//! for the Felicity engine.

use tracing::{info, warn, debug};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};
use crate::config::LoggingSettings;
use crate::utils::errors::{FelicityError, Result};

/// Initialize logging based on configuration
///
/// The returned guard flushes the file writer on drop and must be held by
/// the caller for the lifetime of the process.
pub fn init_logging(config: &LoggingSettings) -> Result<Option<WorkerGuard>> {
    let filter = tracing_subscriber::EnvFilter::try_new(&config.level)
        .map_err(|e| FelicityError::Config(format!("Invalid log filter: {}", e)))?;

    let stdout = if config.json {
        tracing_subscriber::fmt::layer().json().with_writer(std::io::stdout).boxed()
    } else {
        tracing_subscriber::fmt::layer().with_writer(std::io::stdout).boxed()
    };

    let (file, guard) = match config.directory {
        Some(ref directory) => {
            let file_appender = tracing_appender::rolling::daily(directory, "felicity.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout)
        .with(file)
        .try_init()
        .map_err(|e| FelicityError::Config(format!("Logging already initialized: {}", e)))?;

    info!("Logging initialized with level: {}", config.level);
    Ok(guard)
}

/// Log event management actions
pub fn log_event_action(event_id: i64, action: &str, user_id: i64, details: Option<&str>) {
    info!(
        event_id = event_id,
        action = action,
        user_id = user_id,
        details = details,
        "Event action performed"
    );
}

/// Log ledger writes
pub fn log_registration(registration_id: i64, event_id: i64, participant_id: i64, kind: &str) {
    info!(
        registration_id = registration_id,
        event_id = event_id,
        participant_id = participant_id,
        kind = kind,
        "Registration recorded"
    );
}

/// Log manual attendance corrections
pub fn log_attendance_override(registration_id: i64, actor_id: i64, attended: bool, reason: &str) {
    warn!(
        registration_id = registration_id,
        actor_id = actor_id,
        attended = attended,
        reason = reason,
        "Attendance manually overridden"
    );
}

/// Log a side effect that failed after its commit
pub fn log_notification_failure(channel: &str, target: &str, error: &str) {
    warn!(
        channel = channel,
        target = target,
        error = error,
        "Notification delivery failed"
    );
}

/// Log a side effect skipped for lack of configuration
pub fn log_notification_skipped(channel: &str, target: &str) {
    debug!(
        channel = channel,
        target = target,
        "Notification skipped"
    );
}
