//! Application settings management
//!
//! This module defines the configuration structure and provides methods
//! for loading settings from TOML files and environment variables.

use serde::{Deserialize, Serialize};

/// Main application configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    pub bot: BotConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub adjudicator: AdjudicatorConfig,
    pub verification: VerificationConfig,
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
    pub features: FeaturesConfig,
}

/// Telegram bot configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BotConfig {
    pub token: String,
    pub admin_ids: Vec<i64>,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

/// Redis configuration for conversation session storage
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RedisConfig {
    pub url: String,
    pub prefix: String,
    pub ttl_seconds: u64,
}

/// Evidence adjudicator API configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AdjudicatorConfig {
    pub api_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout_seconds: u64,
}

/// Verification workflow configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VerificationConfig {
    /// Attempts budget per (user, group)
    pub max_attempts: i32,
    /// Hours a new member has to start verification before removal
    pub start_timeout_hours: u64,
    /// Deleted messages before a spam ban is considered
    pub spam_message_threshold: i32,
    pub max_file_size_mb: u32,
    pub allowed_file_types: Vec<String>,
}

impl VerificationConfig {
    pub fn max_file_size_bytes(&self) -> u32 {
        self.max_file_size_mb * 1024 * 1024
    }
}

/// Decision cache configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    pub ttl_seconds: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file_path: String,
}

/// Feature flags configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FeaturesConfig {
    /// Remove members who never start verification before the deadline
    pub auto_delete_unverified: bool,
    /// Ban after repeated deleted messages
    pub spam_protection: bool,
}

impl Settings {
    /// Load settings from configuration file and environment variables
    pub fn new() -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::with_prefix("MEDGUARD"))
            .build()?;

        settings.try_deserialize()
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), crate::utils::errors::MedGuardError> {
        super::validation::validate_settings(self)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bot: BotConfig {
                token: String::new(),
                admin_ids: vec![],
            },
            database: DatabaseConfig {
                url: "postgresql://localhost/medguard".to_string(),
                max_connections: 10,
                min_connections: 1,
            },
            redis: RedisConfig {
                url: "redis://localhost:6379".to_string(),
                prefix: "medguard:".to_string(),
                ttl_seconds: 3600,
            },
            adjudicator: AdjudicatorConfig {
                api_url: "https://api.openai.com/v1".to_string(),
                api_key: String::new(),
                model: "gpt-4o".to_string(),
                timeout_seconds: 120,
            },
            verification: VerificationConfig {
                max_attempts: 3,
                start_timeout_hours: 12,
                spam_message_threshold: 3,
                max_file_size_mb: 20,
                allowed_file_types: vec![
                    "image/jpeg".to_string(),
                    "image/png".to_string(),
                    "application/pdf".to_string(),
                ],
            },
            cache: CacheConfig { ttl_seconds: 300 },
            logging: LoggingConfig {
                level: "info".to_string(),
                file_path: "/var/log/medguard".to_string(),
            },
            features: FeaturesConfig {
                auto_delete_unverified: true,
                spam_protection: false,
            },
        }
    }
}
