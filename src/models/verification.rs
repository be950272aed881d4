//! Verification record model
//!
//! One record per (user, group) pair tracks whether the user has proven a
//! professional identity claim for that group, how many evidence attempts
//! were spent and where the conversation currently stands.

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct VerificationRecord {
    pub id: i64,
    pub user_id: i64,
    pub group_id: i64,
    pub verified: bool,
    /// True only for users observed joining after bot activation; pre-existing
    /// members stay false until checkin mode forces a check.
    pub requires_verification: bool,
    pub verification_type: Option<String>,
    pub state: Option<String>,
    pub attempts_count: i32,
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VerificationRecord {
    /// Whether the user moved past the waiting state, i.e. opened the
    /// conversation. A pending removal must be cancelled once this is true.
    pub fn has_started_verification(&self) -> bool {
        match self.state.as_deref() {
            None => false,
            Some(s) => s != VerificationState::WaitingForStart.as_str(),
        }
    }

    /// Whether the attempts budget is exhausted without a successful outcome.
    pub fn attempts_exhausted(&self, max_attempts: i32) -> bool {
        !self.verified && self.attempts_count >= max_attempts
    }
}

/// Provenance of a positive verification verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerificationType {
    Manual,
    Whitelist,
    Auto,
}

impl VerificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationType::Manual => "manual",
            VerificationType::Whitelist => "whitelist",
            VerificationType::Auto => "auto",
        }
    }
}

/// Conversation states persisted on the verification record.
///
/// `WaitingForStart`, `VerificationTimeout` and `LeftGroup` are markers set
/// outside the conversation itself; the rest mirror the live session steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerificationState {
    WaitingForStart,
    EnteringFullName,
    EnteringWorkplace,
    ChoosingVerificationMethod,
    EnteringWebsiteUrl,
    UploadingDocument,
    ProcessingVerification,
    VerificationTimeout,
    LeftGroup,
}

impl VerificationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationState::WaitingForStart => "waiting_for_start",
            VerificationState::EnteringFullName => "entering_full_name",
            VerificationState::EnteringWorkplace => "entering_workplace",
            VerificationState::ChoosingVerificationMethod => "choosing_verification_method",
            VerificationState::EnteringWebsiteUrl => "entering_website_url",
            VerificationState::UploadingDocument => "uploading_document",
            VerificationState::ProcessingVerification => "processing_verification",
            VerificationState::VerificationTimeout => "verification_timeout",
            VerificationState::LeftGroup => "left_group",
        }
    }
}

impl std::fmt::Display for VerificationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Evidence submission method chosen by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationMethod {
    Website,
    Document,
}

impl VerificationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationMethod::Website => "website",
            VerificationMethod::Document => "document",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(state: Option<&str>, verified: bool) -> VerificationRecord {
        VerificationRecord {
            id: 1,
            user_id: 10,
            group_id: -100,
            verified,
            requires_verification: !verified,
            verification_type: None,
            state: state.map(|s| s.to_string()),
            attempts_count: 0,
            verified_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_has_started_verification() {
        assert!(!record(None, false).has_started_verification());
        assert!(!record(Some("waiting_for_start"), false).has_started_verification());
        assert!(record(Some("entering_full_name"), false).has_started_verification());
        assert!(record(Some("processing_verification"), false).has_started_verification());
    }

    #[test]
    fn test_attempts_exhausted() {
        let mut r = record(None, false);
        r.attempts_count = 3;
        assert!(r.attempts_exhausted(3));
        assert!(!r.attempts_exhausted(4));

        r.verified = true;
        assert!(!r.attempts_exhausted(3));
    }
}
