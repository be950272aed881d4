//! Verification session state
//!
//! One session per user, global across groups: a user runs at most one
//! verification at a time. The target `group_id` is captured once when the
//! flow starts and never re-derived mid-flow, so a challenge from a second
//! group cannot cross-contaminate the claims being collected.

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

use crate::models::verification::VerificationMethod;
use crate::utils::errors::{MedGuardError, Result};

/// Steps of the live verification conversation, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStep {
    EnteringFullName,
    EnteringWorkplace,
    ChoosingVerificationMethod,
    EnteringWebsiteUrl,
    UploadingDocument,
    ProcessingVerification,
}

/// Kind of evidence attached to a document upload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentEvidence {
    pub file_id: String,
    /// Declared MIME type; photos arrive without one and are treated as JPEG
    pub mime_type: Option<String>,
}

/// Per-user verification session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationSession {
    pub user_id: i64,
    /// Authoritative target group for this run, immutable after creation
    pub group_id: i64,
    pub step: SessionStep,
    pub full_name: Option<String>,
    pub workplace: Option<String>,
    pub method: Option<VerificationMethod>,
    pub website_url: Option<String>,
    pub document: Option<DocumentEvidence>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VerificationSession {
    /// Start a session for a user targeting a specific group
    pub fn new(user_id: i64, group_id: i64) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            group_id,
            step: SessionStep::EnteringFullName,
            full_name: None,
            workplace: None,
            method: None,
            website_url: None,
            document: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Advance to the next step
    pub fn advance(&mut self, step: SessionStep) {
        self.step = step;
        self.updated_at = Utc::now();
    }

    pub fn set_full_name(&mut self, full_name: String) {
        self.full_name = Some(full_name);
        self.updated_at = Utc::now();
    }

    pub fn set_workplace(&mut self, workplace: String) {
        self.workplace = Some(workplace);
        self.updated_at = Utc::now();
    }

    pub fn set_method(&mut self, method: VerificationMethod) {
        self.method = Some(method);
        self.updated_at = Utc::now();
    }

    pub fn set_website_url(&mut self, url: String) {
        self.website_url = Some(url);
        self.updated_at = Utc::now();
    }

    pub fn set_document(&mut self, document: DocumentEvidence) {
        self.document = Some(document);
        self.updated_at = Utc::now();
    }

    /// The accumulated claim, available once the collection steps are done
    pub fn claim(&self) -> Result<(&str, &str)> {
        let full_name = self.full_name.as_deref().ok_or_else(|| {
            MedGuardError::InvalidInput("Session is missing the full name".to_string())
        })?;
        let workplace = self.workplace.as_deref().ok_or_else(|| {
            MedGuardError::InvalidInput("Session is missing the workplace".to_string())
        })?;
        Ok((full_name, workplace))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_starts_at_full_name() {
        let session = VerificationSession::new(1, -100);
        assert_eq!(session.step, SessionStep::EnteringFullName);
        assert_eq!(session.group_id, -100);
        assert!(session.full_name.is_none());
    }

    #[test]
    fn test_group_id_survives_the_whole_run() {
        let mut session = VerificationSession::new(1, -100);
        session.set_full_name("Ivanov Ivan Ivanovich".to_string());
        session.advance(SessionStep::EnteringWorkplace);
        session.set_workplace("City Hospital".to_string());
        session.advance(SessionStep::ChoosingVerificationMethod);
        assert_eq!(session.group_id, -100);
    }

    #[test]
    fn test_claim_requires_collected_fields() {
        let mut session = VerificationSession::new(1, -100);
        assert!(session.claim().is_err());

        session.set_full_name("Ivanov Ivan".to_string());
        assert!(session.claim().is_err());

        session.set_workplace("City Hospital".to_string());
        let (name, workplace) = session.claim().unwrap();
        assert_eq!(name, "Ivanov Ivan");
        assert_eq!(workplace, "City Hospital");
    }

    #[test]
    fn test_session_round_trips_through_json() {
        let mut session = VerificationSession::new(7, -42);
        session.set_method(crate::models::verification::VerificationMethod::Website);
        let json = serde_json::to_string(&session).unwrap();
        let restored: VerificationSession = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.user_id, 7);
        assert_eq!(restored.group_id, -42);
        assert_eq!(restored.step, SessionStep::EnteringFullName);
    }
}
