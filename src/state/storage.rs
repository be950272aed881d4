//! Session storage implementation
//!
//! This module persists verification sessions in Redis, including
//! serialization, TTL handling and cleanup.

use redis::AsyncCommands;
use tracing::{debug, error};
use crate::utils::errors::Result;
use crate::config::RedisConfig;
use super::session::VerificationSession;

/// Redis-based session storage
#[derive(Clone)]
pub struct SessionStorage {
    connection_manager: redis::aio::ConnectionManager,
    config: RedisConfig,
}

impl SessionStorage {
    /// Create a new session storage instance
    pub async fn new(config: RedisConfig) -> Result<Self> {
        let client = redis::Client::open(config.url.as_str())?;
        let connection_manager = redis::aio::ConnectionManager::new(client).await?;

        Ok(Self {
            connection_manager,
            config,
        })
    }

    /// Save a session, refreshing its TTL
    pub async fn save(&self, session: &VerificationSession) -> Result<()> {
        let key = self.session_key(session.user_id);
        debug!(user_id = session.user_id, key = %key, step = ?session.step, "Saving session");

        let serialized = match serde_json::to_string(session) {
            Ok(data) => data,
            Err(e) => {
                error!(user_id = session.user_id, error = %e, "Failed to serialize session");
                return Err(e.into());
            }
        };

        let mut conn = self.connection_manager.clone();
        match conn
            .set_ex::<_, _, ()>(&key, serialized, self.config.ttl_seconds)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) => {
                error!(user_id = session.user_id, error = %e, "Failed to save session to Redis");
                Err(e.into())
            }
        }
    }

    /// Load the active session for a user, if any
    pub async fn load(&self, user_id: i64) -> Result<Option<VerificationSession>> {
        let key = self.session_key(user_id);
        let mut conn = self.connection_manager.clone();

        let serialized: Option<String> = match conn.get::<&str, Option<String>>(&key).await {
            Ok(data) => data,
            Err(e) => {
                error!(user_id = user_id, error = %e, "Failed to load session from Redis");
                return Err(e.into());
            }
        };

        match serialized {
            Some(data) => match serde_json::from_str::<VerificationSession>(&data) {
                Ok(session) => {
                    debug!(user_id = user_id, step = ?session.step, group_id = session.group_id,
                           "Session loaded");
                    Ok(Some(session))
                }
                Err(e) => {
                    error!(user_id = user_id, error = %e, "Failed to deserialize session, dropping it");
                    self.delete(user_id).await?;
                    Ok(None)
                }
            },
            None => {
                debug!(user_id = user_id, "No session found");
                Ok(None)
            }
        }
    }

    /// Drop the session for a user
    pub async fn delete(&self, user_id: i64) -> Result<()> {
        let key = self.session_key(user_id);
        let mut conn = self.connection_manager.clone();

        let deleted: u32 = conn.del(&key).await?;
        if deleted > 0 {
            debug!(user_id = user_id, "Session deleted");
        }

        Ok(())
    }

    /// Whether a session exists for a user
    pub async fn exists(&self, user_id: i64) -> Result<bool> {
        let key = self.session_key(user_id);
        let mut conn = self.connection_manager.clone();

        let exists: bool = conn.exists(&key).await?;
        Ok(exists)
    }

    /// Test Redis connection
    pub async fn test_connection(&self) -> Result<()> {
        let mut conn = self.connection_manager.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    fn session_key(&self, user_id: i64) -> String {
        format!("{}session:{}", self.config.prefix, user_id)
    }
}

impl std::fmt::Debug for SessionStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStorage")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
