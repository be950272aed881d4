//! Message offense counter repository implementation
//!
//! Counts deleted messages per (user, group) since the last verification or
//! reset. The increment is a single upsert so concurrent handlers for rapid
//! repeated messages cannot lose updates.

use sqlx::PgPool;
use chrono::Utc;
use crate::utils::errors::MedGuardError;

#[derive(Clone)]
#[derive(Debug)]
pub struct OffenseRepository {
    pool: PgPool,
}

impl OffenseRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Atomically increment the offense counter, returning the new value
    pub async fn increment(&self, user_id: i64, group_id: i64) -> Result<i32, MedGuardError> {
        let row: (i32,) = sqlx::query_as(
            r#"
            INSERT INTO message_offenses (user_id, group_id, count, updated_at)
            VALUES ($1, $2, 1, $3)
            ON CONFLICT (user_id, group_id) DO UPDATE
                SET count = message_offenses.count + 1, updated_at = EXCLUDED.updated_at
            RETURNING count
            "#,
        )
        .bind(user_id)
        .bind(group_id)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0)
    }

    /// Current counter value, zero when absent
    pub async fn get(&self, user_id: i64, group_id: i64) -> Result<i32, MedGuardError> {
        let row: Option<(i32,)> = sqlx::query_as(
            "SELECT count FROM message_offenses WHERE user_id = $1 AND group_id = $2",
        )
        .bind(user_id)
        .bind(group_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.0).unwrap_or(0))
    }

    /// Reset the counter after verification or ban cleanup
    pub async fn reset(&self, user_id: i64, group_id: i64) -> Result<(), MedGuardError> {
        sqlx::query("DELETE FROM message_offenses WHERE user_id = $1 AND group_id = $2")
            .bind(user_id)
            .bind(group_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
