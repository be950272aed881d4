//! Verification audit log model
//!
//! Every adjudication is durably recorded with the full adjudicator payload
//! (or the error text in its place) so decisions can be audited later.

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct VerificationAuditLog {
    pub id: i64,
    pub user_id: i64,
    pub group_id: Option<i64>,
    pub method: Option<String>,
    pub full_name: Option<String>,
    pub workplace: Option<String>,
    pub website_url: Option<String>,
    pub adjudicator_response: Option<String>,
    pub result: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAuditLogRequest {
    pub user_id: i64,
    pub group_id: Option<i64>,
    pub method: Option<String>,
    pub full_name: Option<String>,
    pub workplace: Option<String>,
    pub website_url: Option<String>,
    pub adjudicator_response: Option<String>,
    pub result: String,
}

/// Terminal outcomes recorded in the audit log
pub mod outcome {
    pub const PROCESSING: &str = "processing";
    pub const SUCCESS: &str = "success";
    pub const FAILED: &str = "failed";
    pub const ERROR: &str = "error";
}
