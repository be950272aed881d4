//! Error handling for MedGuard
//!
//! This module defines the main error types used throughout the application
//! and provides a unified error handling strategy.

use thiserror::Error;

/// Main error type for MedGuard application
#[derive(Error, Debug)]
pub enum MedGuardError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Telegram API error: {0}")]
    Telegram(#[from] teloxide::RequestError),

    #[error("File download error: {0}")]
    Download(#[from] teloxide::DownloadError),

    #[error("Adjudicator error: {0}")]
    Adjudicator(#[from] AdjudicatorError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Group not found: {group_id}")]
    GroupNotFound { group_id: i64 },

    #[error("No verification record for user {user_id} in group {group_id}")]
    VerificationNotFound { user_id: i64, group_id: i64 },

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

/// Adjudicator API specific errors
#[derive(Error, Debug)]
pub enum AdjudicatorError {
    #[error("Adjudicator request failed: {0}")]
    RequestFailed(String),

    #[error("Adjudicator request timed out")]
    Timeout,

    #[error("Invalid adjudicator response: {0}")]
    InvalidResponse(String),

    #[error("Adjudicator service unavailable")]
    ServiceUnavailable,
}

/// Result type alias for MedGuard operations
pub type Result<T> = std::result::Result<T, MedGuardError>;

impl MedGuardError {
    /// Check if the error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            MedGuardError::Database(_) => false,
            MedGuardError::Migration(_) => false,
            MedGuardError::Telegram(_) => true,
            MedGuardError::Download(_) => true,
            MedGuardError::Adjudicator(_) => true,
            MedGuardError::Config(_) => false,
            MedGuardError::PermissionDenied(_) => false,
            MedGuardError::GroupNotFound { .. } => false,
            MedGuardError::VerificationNotFound { .. } => false,
            MedGuardError::InvalidStateTransition { .. } => false,
            MedGuardError::Redis(_) => true,
            MedGuardError::Http(_) => true,
            MedGuardError::Serialization(_) => false,
            MedGuardError::Io(_) => true,
            MedGuardError::UrlParse(_) => false,
            MedGuardError::InvalidInput(_) => false,
            MedGuardError::ServiceUnavailable(_) => true,
        }
    }
}
