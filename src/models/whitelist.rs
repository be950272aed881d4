//! Whitelist entry model

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// An administrator-curated override granting automatic verification.
/// Exactly one of `user_id` and `username` identifies the member.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WhitelistEntry {
    pub id: i64,
    pub group_id: i64,
    pub user_id: Option<i64>,
    pub username: Option<String>,
    pub added_by: Option<i64>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateWhitelistRequest {
    pub group_id: i64,
    pub user_id: Option<i64>,
    pub username: Option<String>,
    pub added_by: Option<i64>,
    pub notes: Option<String>,
}
