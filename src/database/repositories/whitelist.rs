//! Whitelist repository implementation

use sqlx::PgPool;
use chrono::Utc;
use crate::models::whitelist::{WhitelistEntry, CreateWhitelistRequest};
use crate::utils::errors::MedGuardError;

#[derive(Clone)]
#[derive(Debug)]
pub struct WhitelistRepository {
    pool: PgPool,
}

impl WhitelistRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Add an entry for a group, keyed by user id or username
    pub async fn add(&self, request: CreateWhitelistRequest) -> Result<WhitelistEntry, MedGuardError> {
        let entry = sqlx::query_as::<_, WhitelistEntry>(
            r#"
            INSERT INTO whitelist (group_id, user_id, username, added_by, notes, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, group_id, user_id, username, added_by, notes, created_at
            "#
        )
        .bind(request.group_id)
        .bind(request.user_id)
        .bind(request.username)
        .bind(request.added_by)
        .bind(request.notes)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(entry)
    }

    /// Check whether a user is whitelisted for a group by id or username
    pub async fn is_whitelisted(
        &self,
        user_id: i64,
        username: Option<&str>,
        group_id: i64,
    ) -> Result<bool, MedGuardError> {
        let count: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM whitelist
            WHERE group_id = $1
              AND (user_id = $2 OR ($3::text IS NOT NULL AND username = $3))
            "#,
        )
        .bind(group_id)
        .bind(user_id)
        .bind(username)
        .fetch_one(&self.pool)
        .await?;

        Ok(count.0 > 0)
    }

    /// Remove entries matching a user id in a group, returning how many went
    pub async fn remove_by_user_id(&self, group_id: i64, user_id: i64) -> Result<u64, MedGuardError> {
        let result = sqlx::query("DELETE FROM whitelist WHERE group_id = $1 AND user_id = $2")
            .bind(group_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Remove entries matching a username in a group
    pub async fn remove_by_username(&self, group_id: i64, username: &str) -> Result<u64, MedGuardError> {
        let result = sqlx::query("DELETE FROM whitelist WHERE group_id = $1 AND username = $2")
            .bind(group_id)
            .bind(username)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// List all entries for a group
    pub async fn list_by_group(&self, group_id: i64) -> Result<Vec<WhitelistEntry>, MedGuardError> {
        let entries = sqlx::query_as::<_, WhitelistEntry>(
            "SELECT id, group_id, user_id, username, added_by, notes, created_at FROM whitelist WHERE group_id = $1 ORDER BY created_at ASC"
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }
}
