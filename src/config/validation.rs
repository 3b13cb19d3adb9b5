//! Configuration validation module
//! 
//! This module provides validation functions for application configuration
//! to ensure all required settings are properly configured.

use crate::utils::errors::{FelicityError, Result};
use super::Settings;

/// Validate all configuration settings
pub fn validate_settings(settings: &Settings) -> Result<()> {
    validate_database_config(&settings.database)?;
    validate_logging_config(&settings.logging)?;
    validate_notification_config(&settings.notifications)?;
    validate_scheduler_config(&settings.scheduler)?;

    Ok(())
}

/// Validate database configuration
fn validate_database_config(config: &super::DatabaseSettings) -> Result<()> {
    if config.url.is_empty() {
        return Err(FelicityError::Config(
            "Database URL is required".to_string()
        ));
    }
    
    if config.max_connections == 0 {
        return Err(FelicityError::Config(
            "Max connections must be greater than 0".to_string()
        ));
    }
    
    if config.min_connections > config.max_connections {
        return Err(FelicityError::Config(
            "Min connections cannot be greater than max connections".to_string()
        ));
    }
    
    Ok(())
}

/// Validate logging configuration
fn validate_logging_config(config: &super::LoggingSettings) -> Result<()> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.level.as_str()) {
        return Err(FelicityError::Config(
            format!("Invalid log level: {}. Valid levels: {:?}", config.level, valid_levels)
        ));
    }
    
    Ok(())
}

/// Validate notification configuration
fn validate_notification_config(config: &super::NotificationSettings) -> Result<()> {
    if config.webhook_timeout_seconds == 0 {
        return Err(FelicityError::Config(
            "Webhook timeout must be greater than 0".to_string()
        ));
    }

    if let Some(ref relay) = config.mail_relay_url {
        let parsed = url::Url::parse(relay)?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(FelicityError::Config(
                format!("Mail relay must be an http(s) URL: {}", relay)
            ));
        }
    }

    Ok(())
}

/// Validate scheduler configuration
fn validate_scheduler_config(config: &super::SchedulerSettings) -> Result<()> {
    if config.stale_order_sweep_seconds == 0 {
        return Err(FelicityError::Config(
            "Stale order sweep interval must be greater than 0".to_string()
        ));
    }

    Ok(())
}
