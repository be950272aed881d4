//! Group model

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Group {
    pub group_id: i64,
    pub group_name: String,
    /// The bot currently holds admin rights here
    pub is_active: bool,
    /// When true, pre-existing members are also subject to message gating
    pub checkin_mode: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct GroupAdmin {
    pub group_id: i64,
    pub user_id: i64,
    pub username: Option<String>,
    pub is_owner: bool,
    pub updated_at: DateTime<Utc>,
}
