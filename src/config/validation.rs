//! Configuration validation module
//!
//! This module provides validation functions for application configuration
//! to ensure all required settings are properly configured.

use crate::utils::errors::{MedGuardError, Result};
use super::Settings;

/// Validate all configuration settings
pub fn validate_settings(settings: &Settings) -> Result<()> {
    validate_bot_config(&settings.bot)?;
    validate_database_config(&settings.database)?;
    validate_redis_config(&settings.redis)?;
    validate_adjudicator_config(&settings.adjudicator)?;
    validate_verification_config(&settings.verification)?;
    validate_logging_config(&settings.logging)?;

    Ok(())
}

/// Validate bot configuration
fn validate_bot_config(config: &super::BotConfig) -> Result<()> {
    if config.token.is_empty() {
        return Err(MedGuardError::Config(
            "Bot token is required".to_string()
        ));
    }

    if config.admin_ids.is_empty() {
        return Err(MedGuardError::Config(
            "At least one admin ID must be configured".to_string()
        ));
    }

    Ok(())
}

/// Validate database configuration
fn validate_database_config(config: &super::DatabaseConfig) -> Result<()> {
    if config.url.is_empty() {
        return Err(MedGuardError::Config(
            "Database URL is required".to_string()
        ));
    }

    if config.max_connections == 0 {
        return Err(MedGuardError::Config(
            "Max connections must be greater than 0".to_string()
        ));
    }

    if config.min_connections > config.max_connections {
        return Err(MedGuardError::Config(
            "Min connections cannot be greater than max connections".to_string()
        ));
    }

    Ok(())
}

/// Validate Redis configuration
fn validate_redis_config(config: &super::RedisConfig) -> Result<()> {
    if config.url.is_empty() {
        return Err(MedGuardError::Config(
            "Redis URL is required".to_string()
        ));
    }

    Ok(())
}

/// Validate adjudicator configuration
fn validate_adjudicator_config(config: &super::AdjudicatorConfig) -> Result<()> {
    if config.api_url.is_empty() {
        return Err(MedGuardError::Config(
            "Adjudicator API URL is required".to_string()
        ));
    }

    if config.api_key.is_empty() {
        return Err(MedGuardError::Config(
            "Adjudicator API key is required".to_string()
        ));
    }

    if config.timeout_seconds == 0 {
        return Err(MedGuardError::Config(
            "Adjudicator timeout must be greater than 0".to_string()
        ));
    }

    Ok(())
}

/// Validate verification workflow configuration
fn validate_verification_config(config: &super::VerificationConfig) -> Result<()> {
    if config.max_attempts <= 0 {
        return Err(MedGuardError::Config(
            "Max verification attempts must be greater than 0".to_string()
        ));
    }

    if config.spam_message_threshold <= 0 {
        return Err(MedGuardError::Config(
            "Spam message threshold must be greater than 0".to_string()
        ));
    }

    if config.allowed_file_types.is_empty() {
        return Err(MedGuardError::Config(
            "At least one allowed file type is required".to_string()
        ));
    }

    Ok(())
}

/// Validate logging configuration
fn validate_logging_config(config: &super::LoggingConfig) -> Result<()> {
    if config.level.is_empty() {
        return Err(MedGuardError::Config(
            "Log level is required".to_string()
        ));
    }

    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.level.as_str()) {
        return Err(MedGuardError::Config(
            format!("Invalid log level: {}. Valid levels: {:?}", config.level, valid_levels)
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> Settings {
        let mut settings = Settings::default();
        settings.bot.token = "123:abc".to_string();
        settings.bot.admin_ids = vec![1];
        settings.adjudicator.api_key = "sk-test".to_string();
        settings
    }

    #[test]
    fn test_valid_settings_pass() {
        assert!(validate_settings(&configured()).is_ok());
    }

    #[test]
    fn test_missing_token_rejected() {
        let mut settings = configured();
        settings.bot.token = String::new();
        assert!(validate_settings(&settings).is_err());
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let mut settings = configured();
        settings.verification.max_attempts = 0;
        assert!(validate_settings(&settings).is_err());
    }

    #[test]
    fn test_bad_log_level_rejected() {
        let mut settings = configured();
        settings.logging.level = "verbose".to_string();
        assert!(validate_settings(&settings).is_err());
    }
}
