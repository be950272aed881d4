//! Logging configuration and setup
//!
//! This module provides logging initialization and structured logging utilities
//! for the MedGuard application.

use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use crate::config::LoggingConfig;
use crate::utils::errors::Result;

/// Initialize logging based on configuration
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let file_appender = tracing_appender::rolling::daily(&config.file_path, "medguard.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.level))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stdout))
        .with(tracing_subscriber::fmt::layer().with_writer(non_blocking))
        .init();

    info!("Logging initialized with level: {}", config.level);
    Ok(())
}

/// Log membership events with structured data
pub fn log_membership_event(group_id: i64, user_id: i64, event: &str, details: Option<&str>) {
    info!(
        group_id = group_id,
        user_id = user_id,
        event = event,
        details = details,
        "Membership event"
    );
}

/// Log gate decisions for blocked messages
pub fn log_gate_block(group_id: i64, user_id: i64, reason: &str, offense_count: i32) {
    info!(
        group_id = group_id,
        user_id = user_id,
        reason = reason,
        offense_count = offense_count,
        "Message blocked by gate"
    );
}

/// Log admin actions
pub fn log_admin_action(admin_id: i64, action: &str, target: Option<&str>, details: Option<&str>) {
    warn!(
        admin_id = admin_id,
        action = action,
        target = target,
        details = details,
        "Admin action performed"
    );
}
