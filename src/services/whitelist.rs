//! Whitelist service implementation
//!
//! Administrator-curated overrides: presence on a group's whitelist grants
//! automatic verification without ever entering the conversation engine.

use std::sync::Arc;
use tracing::{info, warn, debug};

use crate::database::DatabaseService;
use crate::models::verification::{VerificationRecord, VerificationType};
use crate::models::whitelist::{WhitelistEntry, CreateWhitelistRequest};
use crate::services::cache::DecisionCache;
use crate::utils::errors::{MedGuardError, Result};

/// A whitelist target: numeric Telegram id or a bare username
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WhitelistIdentifier {
    UserId(i64),
    Username(String),
}

impl WhitelistIdentifier {
    /// Parse an admin-supplied identifier: `123456789` or `@username`
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if let Some(username) = trimmed.strip_prefix('@') {
            if username.is_empty() {
                return Err(MedGuardError::InvalidInput(
                    "Username must not be empty".to_string(),
                ));
            }
            return Ok(WhitelistIdentifier::Username(username.to_string()));
        }

        trimmed
            .parse::<i64>()
            .map(WhitelistIdentifier::UserId)
            .map_err(|_| {
                MedGuardError::InvalidInput(format!(
                    "Expected a numeric user id or @username, got '{}'",
                    trimmed
                ))
            })
    }
}

/// Whitelist service for override management and auto-verification
#[derive(Clone)]
#[derive(Debug)]
pub struct WhitelistService {
    database: DatabaseService,
    cache: Arc<DecisionCache>,
}

impl WhitelistService {
    /// Create a new WhitelistService instance
    pub fn new(database: DatabaseService, cache: Arc<DecisionCache>) -> Self {
        Self { database, cache }
    }

    /// Check whitelist membership by id or username, cache-first
    pub async fn is_whitelisted(
        &self,
        user_id: i64,
        username: Option<&str>,
        group_id: i64,
    ) -> Result<bool> {
        if self.cache.is_whitelisted(user_id) {
            return Ok(true);
        }

        let listed = self
            .database
            .whitelist
            .is_whitelisted(user_id, username, group_id)
            .await?;

        if listed {
            self.cache.mark_whitelisted(user_id);
        }

        Ok(listed)
    }

    /// Mark a whitelisted user verified for a group without the conversation
    /// engine. Idempotent: an already verified record is left alone.
    pub async fn auto_verify(&self, user_id: i64, group_id: i64) -> Result<VerificationRecord> {
        let record = self
            .database
            .verifications
            .create_for_existing_member(user_id, group_id)
            .await?;

        let record = if record.verified {
            record
        } else {
            let record = self
                .database
                .verifications
                .mark_verified(user_id, group_id, VerificationType::Whitelist)
                .await?;
            info!(user_id = user_id, group_id = group_id,
                  "User auto-verified through whitelist");
            record
        };

        self.cache.mark_verified(user_id, group_id);
        Ok(record)
    }

    /// Add an identifier to a group's whitelist. An id-based addition
    /// immediately auto-completes any pending verification; a username entry
    /// takes effect on the user's next contact.
    pub async fn add(
        &self,
        group_id: i64,
        identifier: WhitelistIdentifier,
        added_by: i64,
        notes: Option<String>,
    ) -> Result<WhitelistEntry> {
        let (user_id, username) = match &identifier {
            WhitelistIdentifier::UserId(id) => (Some(*id), None),
            WhitelistIdentifier::Username(name) => (None, Some(name.clone())),
        };

        let entry = self
            .database
            .whitelist
            .add(CreateWhitelistRequest {
                group_id,
                user_id,
                username,
                added_by: Some(added_by),
                notes,
            })
            .await?;

        info!(group_id = group_id, added_by = added_by, identifier = ?identifier,
              "Whitelist entry added");

        if let WhitelistIdentifier::UserId(id) = identifier {
            self.cache.mark_whitelisted(id);
            if let Err(e) = self.complete_pending_verification(id, group_id).await {
                warn!(user_id = id, group_id = group_id, error = %e,
                      "Failed to auto-complete pending verification on whitelist add");
            }
        }

        Ok(entry)
    }

    /// Remove an identifier from a group's whitelist, returning whether
    /// anything was deleted
    pub async fn remove(&self, group_id: i64, identifier: WhitelistIdentifier) -> Result<bool> {
        let removed = match &identifier {
            WhitelistIdentifier::UserId(id) => {
                self.cache.invalidate_whitelisted(*id);
                self.database.whitelist.remove_by_user_id(group_id, *id).await?
            }
            WhitelistIdentifier::Username(name) => {
                self.database.whitelist.remove_by_username(group_id, name).await?
            }
        };

        if removed > 0 {
            info!(group_id = group_id, identifier = ?identifier, "Whitelist entry removed");
        }

        Ok(removed > 0)
    }

    /// List all whitelist entries for a group
    pub async fn list(&self, group_id: i64) -> Result<Vec<WhitelistEntry>> {
        self.database.whitelist.list_by_group(group_id).await
    }

    /// Complete any unfinished verification for a user just whitelisted by id
    async fn complete_pending_verification(&self, user_id: i64, group_id: i64) -> Result<()> {
        if let Some(record) = self.database.verifications.find(user_id, group_id).await? {
            if !record.verified {
                self.database
                    .verifications
                    .mark_verified(user_id, group_id, VerificationType::Whitelist)
                    .await?;
                self.cache.mark_verified(user_id, group_id);
                info!(user_id = user_id, group_id = group_id,
                      "Pending verification auto-completed by whitelist addition");
            }
        } else {
            debug!(user_id = user_id, group_id = group_id,
                   "No verification record to auto-complete");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_parses_numeric_id() {
        assert_eq!(
            WhitelistIdentifier::parse("123456789").unwrap(),
            WhitelistIdentifier::UserId(123456789)
        );
    }

    #[test]
    fn test_identifier_parses_username() {
        assert_eq!(
            WhitelistIdentifier::parse("@doc_ivanov").unwrap(),
            WhitelistIdentifier::Username("doc_ivanov".to_string())
        );
    }

    #[test]
    fn test_identifier_rejects_garbage() {
        assert!(WhitelistIdentifier::parse("not-a-user").is_err());
        assert!(WhitelistIdentifier::parse("@").is_err());
    }
}
