//! Services module
//!
//! This module contains business logic services

pub mod adjudicator;
pub mod cache;
pub mod gate;
pub mod notification;
pub mod scheduler;
pub mod verification;
pub mod whitelist;

// Re-export commonly used services
pub use adjudicator::AdjudicatorService;
pub use cache::DecisionCache;
pub use gate::{GateDecision, BlockReason};
pub use notification::NotificationService;
pub use scheduler::RemovalScheduler;
pub use verification::{VerificationService, VerificationOutcome, BeginOutcome, Verdict};
pub use whitelist::{WhitelistService, WhitelistIdentifier};

use std::sync::Arc;
use std::time::Duration;
use teloxide::Bot;

use crate::config::settings::Settings;
use crate::database::DatabaseService;
use crate::state::storage::SessionStorage;
use crate::utils::errors::Result;

/// Service factory for creating and managing all services
#[derive(Clone)]
pub struct ServiceFactory {
    pub verification_service: VerificationService,
    pub whitelist_service: WhitelistService,
    pub notification_service: NotificationService,
    pub adjudicator_service: AdjudicatorService,
    pub scheduler: RemovalScheduler,
    pub cache: Arc<DecisionCache>,
    pub sessions: SessionStorage,
    database: DatabaseService,
}

impl ServiceFactory {
    /// Create a new ServiceFactory with all services initialized
    pub fn new(
        bot: Bot,
        settings: Settings,
        database: DatabaseService,
        sessions: SessionStorage,
    ) -> Result<Self> {
        let cache = Arc::new(DecisionCache::new(Duration::from_secs(
            settings.cache.ttl_seconds,
        )));
        let adjudicator_service = AdjudicatorService::new(settings.clone())?;
        let notification_service = NotificationService::new(bot, settings.clone());
        let whitelist_service = WhitelistService::new(database.clone(), cache.clone());
        let verification_service = VerificationService::new(
            database.clone(),
            adjudicator_service.clone(),
            sessions.clone(),
            cache.clone(),
            settings.clone(),
        );
        let scheduler =
            RemovalScheduler::new(database.clone(), notification_service.clone(), settings);

        Ok(Self {
            verification_service,
            whitelist_service,
            notification_service,
            adjudicator_service,
            scheduler,
            cache,
            sessions,
            database,
        })
    }

    /// Access the underlying repository bundle
    pub fn database(&self) -> &DatabaseService {
        &self.database
    }
}

impl std::fmt::Debug for ServiceFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceFactory").finish_non_exhaustive()
    }
}
