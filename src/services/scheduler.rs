//! Removal scheduler implementation
//!
//! Every user placed under `requires_verification` gets one deferred check
//! after the configured start deadline. The timer index is keyed by
//! (user, group): scheduling again for the same pair aborts the previous
//! timer, so duplicate join events cannot stack removals. The fired task
//! re-reads the verification record — a closure-captured status would go
//! stale while the user completes verification during the wait.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn, debug, error};

use crate::config::settings::Settings;
use crate::database::DatabaseService;
use crate::models::verification::{VerificationRecord, VerificationState};
use crate::services::notification::NotificationService;

/// Scheduler for time-boxed removal of members who never start verification
#[derive(Clone)]
pub struct RemovalScheduler {
    database: DatabaseService,
    notifications: NotificationService,
    settings: Settings,
    timers: Arc<Mutex<HashMap<(i64, i64), JoinHandle<()>>>>,
}

/// Fire-time decision: remove unless the user verified or at least opened the
/// conversation. A purged record still removes — the user was banned anyway.
pub fn removal_due(record: Option<&VerificationRecord>) -> bool {
    match record {
        Some(record) => !record.verified && !record.has_started_verification(),
        None => true,
    }
}

impl RemovalScheduler {
    pub fn new(
        database: DatabaseService,
        notifications: NotificationService,
        settings: Settings,
    ) -> Self {
        Self {
            database,
            notifications,
            settings,
            timers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Schedule the start-deadline check for (user, group), replacing any
    /// previously scheduled timer for the same pair.
    pub fn schedule_removal(&self, user_id: i64, group_id: i64) {
        let delay = Duration::from_secs(self.settings.verification.start_timeout_hours * 3600);
        self.schedule_removal_after(user_id, group_id, delay);
    }

    /// Same as [`schedule_removal`], with an explicit delay
    pub fn schedule_removal_after(&self, user_id: i64, group_id: i64, delay: Duration) {
        let scheduler = self.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            scheduler.fire(user_id, group_id).await;
        });

        let mut timers = self.timers.lock().expect("scheduler timer index poisoned");
        if let Some(previous) = timers.insert((user_id, group_id), handle) {
            previous.abort();
            debug!(user_id = user_id, group_id = group_id, "Replaced pending removal timer");
        }

        info!(user_id = user_id, group_id = group_id, delay_secs = delay.as_secs(),
              "Scheduled verification start deadline");
    }

    /// Cancel the pending timer for (user, group), if any
    pub fn cancel(&self, user_id: i64, group_id: i64) {
        let mut timers = self.timers.lock().expect("scheduler timer index poisoned");
        if let Some(handle) = timers.remove(&(user_id, group_id)) {
            handle.abort();
            debug!(user_id = user_id, group_id = group_id, "Cancelled pending removal timer");
        }
    }

    /// Whether a timer is currently pending for (user, group)
    pub fn is_scheduled(&self, user_id: i64, group_id: i64) -> bool {
        let timers = self.timers.lock().expect("scheduler timer index poisoned");
        timers.contains_key(&(user_id, group_id))
    }

    async fn fire(&self, user_id: i64, group_id: i64) {
        self.timers
            .lock()
            .expect("scheduler timer index poisoned")
            .remove(&(user_id, group_id));

        if !self.settings.features.auto_delete_unverified {
            info!(user_id = user_id, group_id = group_id,
                  "Auto-removal disabled, skipping deadline check");
            return;
        }

        // Fresh read: the user may have verified or started during the wait
        let record = match self.database.verifications.find(user_id, group_id).await {
            Ok(record) => record,
            Err(e) => {
                error!(user_id = user_id, group_id = group_id, error = %e,
                       "Failed to re-read verification record at deadline");
                return;
            }
        };

        if !removal_due(record.as_ref()) {
            info!(user_id = user_id, group_id = group_id,
                  "User verified or started verification, removal cancelled");
            return;
        }

        match self.notifications.kick_member(group_id, user_id).await {
            Ok(()) => {
                info!(user_id = user_id, group_id = group_id,
                      "Removed member for not starting verification in time");

                if let Err(e) = self
                    .database
                    .verifications
                    .update_state(user_id, group_id, Some(VerificationState::VerificationTimeout))
                    .await
                {
                    error!(user_id = user_id, group_id = group_id, error = %e,
                           "Failed to mark verification timeout");
                }

                self.notifications.send_removal_notice(user_id).await;
            }
            Err(e) => {
                warn!(user_id = user_id, group_id = group_id, error = %e,
                      "Failed to remove member at deadline");
            }
        }
    }
}

impl std::fmt::Debug for RemovalScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemovalScheduler").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(verified: bool, state: Option<&str>) -> VerificationRecord {
        VerificationRecord {
            id: 1,
            user_id: 10,
            group_id: -100,
            verified,
            requires_verification: !verified,
            verification_type: None,
            state: state.map(|s| s.to_string()),
            attempts_count: 0,
            verified_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_removal_due_for_idle_waiting_user() {
        assert!(removal_due(Some(&record(false, Some("waiting_for_start")))));
        assert!(removal_due(Some(&record(false, None))));
    }

    #[test]
    fn test_removal_cancelled_once_verified() {
        assert!(!removal_due(Some(&record(true, None))));
    }

    #[test]
    fn test_removal_cancelled_once_conversation_started() {
        assert!(!removal_due(Some(&record(false, Some("entering_full_name")))));
        assert!(!removal_due(Some(&record(false, Some("processing_verification")))));
    }
}
