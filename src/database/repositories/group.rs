//! Group repository implementation

use sqlx::PgPool;
use chrono::Utc;
use crate::models::group::{Group, GroupAdmin};
use crate::utils::errors::MedGuardError;

#[derive(Clone)]
#[derive(Debug)]
pub struct GroupRepository {
    pool: PgPool,
}

impl GroupRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find group by Telegram chat ID
    pub async fn find_by_id(&self, group_id: i64) -> Result<Option<Group>, MedGuardError> {
        let group = sqlx::query_as::<_, Group>(
            "SELECT group_id, group_name, is_active, checkin_mode, created_at, updated_at FROM groups WHERE group_id = $1"
        )
        .bind(group_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(group)
    }

    /// Register a group or reactivate it, refreshing the stored name
    pub async fn register(&self, group_id: i64, group_name: &str) -> Result<Group, MedGuardError> {
        let group = sqlx::query_as::<_, Group>(
            r#"
            INSERT INTO groups (group_id, group_name, is_active, created_at, updated_at)
            VALUES ($1, $2, TRUE, $3, $3)
            ON CONFLICT (group_id) DO UPDATE
                SET group_name = EXCLUDED.group_name,
                    is_active = TRUE,
                    updated_at = EXCLUDED.updated_at
            RETURNING group_id, group_name, is_active, checkin_mode, created_at, updated_at
            "#
        )
        .bind(group_id)
        .bind(group_name)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(group)
    }

    /// Mark a group inactive (bot lost admin rights or was removed)
    pub async fn deactivate(&self, group_id: i64) -> Result<(), MedGuardError> {
        sqlx::query("UPDATE groups SET is_active = FALSE, updated_at = $2 WHERE group_id = $1")
            .bind(group_id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Flip checkin mode, returning the new value
    pub async fn toggle_checkin_mode(&self, group_id: i64) -> Result<bool, MedGuardError> {
        let row: (bool,) = sqlx::query_as(
            r#"
            UPDATE groups
            SET checkin_mode = NOT checkin_mode, updated_at = $2
            WHERE group_id = $1
            RETURNING checkin_mode
            "#,
        )
        .bind(group_id)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0)
    }

    /// Get all active groups
    pub async fn get_active_groups(&self) -> Result<Vec<Group>, MedGuardError> {
        let groups = sqlx::query_as::<_, Group>(
            "SELECT group_id, group_name, is_active, checkin_mode, created_at, updated_at FROM groups WHERE is_active = true ORDER BY created_at DESC"
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(groups)
    }

    /// Replace the stored admin set for a group with a fresh snapshot
    pub async fn replace_admins(
        &self,
        group_id: i64,
        admins: &[(i64, Option<String>, bool)],
    ) -> Result<(), MedGuardError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM group_admins WHERE group_id = $1")
            .bind(group_id)
            .execute(&mut *tx)
            .await?;

        for (user_id, username, is_owner) in admins {
            sqlx::query(
                "INSERT INTO group_admins (group_id, user_id, username, is_owner, updated_at) VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(group_id)
            .bind(user_id)
            .bind(username)
            .bind(is_owner)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Get the stored admin set for a group
    pub async fn get_admins(&self, group_id: i64) -> Result<Vec<GroupAdmin>, MedGuardError> {
        let admins = sqlx::query_as::<_, GroupAdmin>(
            "SELECT group_id, user_id, username, is_owner, updated_at FROM group_admins WHERE group_id = $1 ORDER BY user_id ASC"
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(admins)
    }
}
