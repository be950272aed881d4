//! Verification record repository implementation
//!
//! Records are created idempotently (upsert keyed by user and group) so the
//! membership classifier and the message gate can race without producing
//! duplicates. Counter bumps are single atomic statements.

use sqlx::PgPool;
use chrono::Utc;
use crate::models::verification::{VerificationRecord, VerificationState, VerificationType};
use crate::utils::errors::MedGuardError;

const RECORD_COLUMNS: &str = "id, user_id, group_id, verified, requires_verification, \
     verification_type, state, attempts_count, verified_at, created_at, updated_at";

#[derive(Clone)]
#[derive(Debug)]
pub struct VerificationRepository {
    pool: PgPool,
}

impl VerificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find the record for a (user, group) pair
    pub async fn find(&self, user_id: i64, group_id: i64) -> Result<Option<VerificationRecord>, MedGuardError> {
        let record = sqlx::query_as::<_, VerificationRecord>(&format!(
            "SELECT {} FROM verifications WHERE user_id = $1 AND group_id = $2",
            RECORD_COLUMNS
        ))
        .bind(user_id)
        .bind(group_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    /// All records for a user across groups
    pub async fn find_for_user(&self, user_id: i64) -> Result<Vec<VerificationRecord>, MedGuardError> {
        let records = sqlx::query_as::<_, VerificationRecord>(&format!(
            "SELECT {} FROM verifications WHERE user_id = $1 ORDER BY created_at ASC",
            RECORD_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    /// Create or refresh the record for a newly observed joiner. Idempotent:
    /// a second delivery of the same join event updates in place, and a
    /// record that already reached `verified` is left untouched.
    pub async fn create_for_new_member(&self, user_id: i64, group_id: i64) -> Result<VerificationRecord, MedGuardError> {
        let record = sqlx::query_as::<_, VerificationRecord>(&format!(
            r#"
            INSERT INTO verifications (user_id, group_id, requires_verification, state, created_at, updated_at)
            VALUES ($1, $2, TRUE, $3, $4, $4)
            ON CONFLICT (user_id, group_id) DO UPDATE
                SET requires_verification = (NOT verifications.verified),
                    state = CASE WHEN verifications.verified THEN verifications.state ELSE EXCLUDED.state END,
                    updated_at = EXCLUDED.updated_at
            RETURNING {}
            "#,
            RECORD_COLUMNS
        ))
        .bind(user_id)
        .bind(group_id)
        .bind(VerificationState::WaitingForStart.as_str())
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(record)
    }

    /// Create the record for a pre-existing member whose first observed
    /// interaction is a message. No-op if a record already exists.
    pub async fn create_for_existing_member(&self, user_id: i64, group_id: i64) -> Result<VerificationRecord, MedGuardError> {
        let record = sqlx::query_as::<_, VerificationRecord>(&format!(
            r#"
            INSERT INTO verifications (user_id, group_id, requires_verification, created_at, updated_at)
            VALUES ($1, $2, FALSE, $3, $3)
            ON CONFLICT (user_id, group_id) DO UPDATE SET updated_at = verifications.updated_at
            RETURNING {}
            "#,
            RECORD_COLUMNS
        ))
        .bind(user_id)
        .bind(group_id)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(record)
    }

    /// Atomically increment the attempts counter, returning the new value
    pub async fn increment_attempts(&self, user_id: i64, group_id: i64) -> Result<i32, MedGuardError> {
        let row: (i32,) = sqlx::query_as(
            r#"
            UPDATE verifications
            SET attempts_count = attempts_count + 1, updated_at = $3
            WHERE user_id = $1 AND group_id = $2
            RETURNING attempts_count
            "#,
        )
        .bind(user_id)
        .bind(group_id)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0)
    }

    /// Set the conversation state marker, or clear it with `None`
    pub async fn update_state(
        &self,
        user_id: i64,
        group_id: i64,
        state: Option<VerificationState>,
    ) -> Result<(), MedGuardError> {
        sqlx::query(
            "UPDATE verifications SET state = $3, updated_at = $4 WHERE user_id = $1 AND group_id = $2",
        )
        .bind(user_id)
        .bind(group_id)
        .bind(state.map(|s| s.as_str()))
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Mark the record verified with the given provenance. Clears
    /// `requires_verification` and the conversation state in the same write,
    /// preserving the invariant that verified records never require a check.
    pub async fn mark_verified(
        &self,
        user_id: i64,
        group_id: i64,
        verification_type: VerificationType,
    ) -> Result<VerificationRecord, MedGuardError> {
        let record = sqlx::query_as::<_, VerificationRecord>(&format!(
            r#"
            UPDATE verifications
            SET verified = TRUE,
                requires_verification = FALSE,
                verification_type = $3,
                state = NULL,
                verified_at = $4,
                updated_at = $4
            WHERE user_id = $1 AND group_id = $2
            RETURNING {}
            "#,
            RECORD_COLUMNS
        ))
        .bind(user_id)
        .bind(group_id)
        .bind(verification_type.as_str())
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(record)
    }

    /// Flag or clear the new-member obligation on an existing record
    pub async fn update_requires_verification(
        &self,
        user_id: i64,
        group_id: i64,
        requires_verification: bool,
    ) -> Result<(), MedGuardError> {
        sqlx::query(
            "UPDATE verifications SET requires_verification = $3, updated_at = $4 WHERE user_id = $1 AND group_id = $2",
        )
        .bind(user_id)
        .bind(group_id)
        .bind(requires_verification)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Delete the record, part of post-ban cleanup
    pub async fn delete(&self, user_id: i64, group_id: i64) -> Result<(), MedGuardError> {
        sqlx::query("DELETE FROM verifications WHERE user_id = $1 AND group_id = $2")
            .bind(user_id)
            .bind(group_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
