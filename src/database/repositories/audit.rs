//! Verification audit log repository implementation

use sqlx::PgPool;
use chrono::Utc;
use crate::models::audit::{VerificationAuditLog, CreateAuditLogRequest};
use crate::utils::errors::MedGuardError;

#[derive(Clone)]
#[derive(Debug)]
pub struct AuditRepository {
    pool: PgPool,
}

impl AuditRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Append an audit entry for an adjudication
    pub async fn add(&self, request: CreateAuditLogRequest) -> Result<VerificationAuditLog, MedGuardError> {
        let log = sqlx::query_as::<_, VerificationAuditLog>(
            r#"
            INSERT INTO verification_logs
                (user_id, group_id, method, full_name, workplace, website_url, adjudicator_response, result, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id, user_id, group_id, method, full_name, workplace, website_url, adjudicator_response, result, created_at
            "#
        )
        .bind(request.user_id)
        .bind(request.group_id)
        .bind(request.method)
        .bind(request.full_name)
        .bind(request.workplace)
        .bind(request.website_url)
        .bind(request.adjudicator_response)
        .bind(request.result)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(log)
    }

    /// Update the outcome of the user's most recent audit entry
    pub async fn update_latest_result(&self, user_id: i64, result: &str) -> Result<(), MedGuardError> {
        sqlx::query(
            r#"
            UPDATE verification_logs SET result = $2
            WHERE id = (
                SELECT id FROM verification_logs
                WHERE user_id = $1
                ORDER BY created_at DESC, id DESC
                LIMIT 1
            )
            "#,
        )
        .bind(user_id)
        .bind(result)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Recent audit entries for a user
    pub async fn list_for_user(&self, user_id: i64, limit: i64) -> Result<Vec<VerificationAuditLog>, MedGuardError> {
        let logs = sqlx::query_as::<_, VerificationAuditLog>(
            r#"
            SELECT id, user_id, group_id, method, full_name, workplace, website_url, adjudicator_response, result, created_at
            FROM verification_logs
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(logs)
    }
}
