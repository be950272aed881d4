//! Verification service implementation
//!
//! The conversation engine behind the multi-step verification flow: it owns
//! the flow-entry checks, step transitions, the adjudication call and the
//! final verdict, and it keeps the persisted record, the session store, the
//! decision cache and the audit log consistent with each other.

use std::sync::{Arc, OnceLock};
use regex::Regex;
use tracing::{info, warn, error};

use crate::config::settings::Settings;
use crate::database::DatabaseService;
use crate::models::audit::{outcome, CreateAuditLogRequest};
use crate::models::judgment::{Confidence, Judgment};
use crate::models::verification::{VerificationMethod, VerificationState, VerificationType};
use crate::services::adjudicator::AdjudicatorService;
use crate::services::cache::DecisionCache;
use crate::state::session::{DocumentEvidence, SessionStep, VerificationSession};
use crate::state::storage::SessionStorage;
use crate::utils::errors::{MedGuardError, Result};

/// Outcome of attempting to enter the verification flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeginOutcome {
    /// Flow entered; the attempt was consumed
    Started { remaining_attempts: i32 },
    AlreadyVerified,
    AttemptsExhausted,
    GroupUnavailable,
}

/// Outcome of a processed evidence submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationOutcome {
    Approved,
    Rejected { remaining_attempts: i32 },
    /// The adjudicator failed or returned garbage; still consumes the attempt
    Errored { remaining_attempts: i32 },
}

/// Verdict of the pure adjudication decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Approved,
    Rejected(RejectionReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionReason {
    NotMedicalDocument,
    NoMedicalIndicators,
    NameMismatch,
    LowConfidence,
    NotFound,
}

/// Normalize a full name for comparison: trim, collapse whitespace,
/// lowercase, strip dots.
pub fn normalize_full_name(name: &str) -> String {
    static WHITESPACE: OnceLock<Regex> = OnceLock::new();
    let whitespace = WHITESPACE.get_or_init(|| Regex::new(r"\s+").expect("valid regex"));

    whitespace
        .replace_all(name.trim(), " ")
        .to_lowercase()
        .replace('.', "")
}

/// Strict full-name equality after normalization. Empty names never match.
pub fn names_match(claimed: &str, found: &str) -> bool {
    if claimed.trim().is_empty() || found.trim().is_empty() {
        return false;
    }
    normalize_full_name(claimed) == normalize_full_name(found)
}

/// The adjudication decision policy, a pure function of the judgment payload
/// and the claimed name. Evaluated in order: document authenticity gates
/// first, then strict name equality, then found + confidence.
pub fn evaluate_judgment(judgment: &Judgment, claimed_full_name: &str) -> Verdict {
    if let Judgment::Document(doc) = judgment {
        if !doc.is_medical_document {
            return Verdict::Rejected(RejectionReason::NotMedicalDocument);
        }
        if doc.medical_indicators.is_empty() {
            return Verdict::Rejected(RejectionReason::NoMedicalIndicators);
        }
    }

    if judgment.found() && !judgment.found_name().is_empty()
        && !names_match(claimed_full_name, judgment.found_name())
    {
        return Verdict::Rejected(RejectionReason::NameMismatch);
    }

    if judgment.found() {
        match judgment.confidence() {
            Confidence::High | Confidence::Medium => Verdict::Approved,
            Confidence::Low => Verdict::Rejected(RejectionReason::LowConfidence),
        }
    } else {
        Verdict::Rejected(RejectionReason::NotFound)
    }
}

/// Verification service driving the conversation engine
#[derive(Clone)]
pub struct VerificationService {
    database: DatabaseService,
    adjudicator: AdjudicatorService,
    sessions: SessionStorage,
    cache: Arc<DecisionCache>,
    settings: Settings,
}

impl VerificationService {
    /// Create a new VerificationService instance
    pub fn new(
        database: DatabaseService,
        adjudicator: AdjudicatorService,
        sessions: SessionStorage,
        cache: Arc<DecisionCache>,
        settings: Settings,
    ) -> Self {
        Self {
            database,
            adjudicator,
            sessions,
            cache,
            settings,
        }
    }

    pub fn sessions(&self) -> &SessionStorage {
        &self.sessions
    }

    pub fn max_attempts(&self) -> i32 {
        self.settings.verification.max_attempts
    }

    pub fn max_file_size_bytes(&self) -> u32 {
        self.settings.verification.max_file_size_bytes()
    }

    pub fn max_file_size_mb(&self) -> u32 {
        self.settings.verification.max_file_size_mb
    }

    pub fn allowed_file_types(&self) -> &[String] {
        &self.settings.verification.allowed_file_types
    }

    /// Enter the verification flow for (user, group). The target group is
    /// captured into the session here and stays authoritative for the run.
    pub async fn begin(&self, user_id: i64, group_id: i64) -> Result<BeginOutcome> {
        let group = self.database.groups.find_by_id(group_id).await?;
        let group_active = group.map(|g| g.is_active).unwrap_or(false);
        if !group_active {
            warn!(user_id = user_id, group_id = group_id,
                  "Verification requested for unknown or inactive group");
            return Ok(BeginOutcome::GroupUnavailable);
        }

        let record = match self.database.verifications.find(user_id, group_id).await? {
            Some(record) => record,
            None => {
                self.database
                    .verifications
                    .create_for_existing_member(user_id, group_id)
                    .await?
            }
        };

        if record.verified {
            return Ok(BeginOutcome::AlreadyVerified);
        }

        if record.attempts_exhausted(self.settings.verification.max_attempts) {
            return Ok(BeginOutcome::AttemptsExhausted);
        }

        let attempts = self
            .database
            .verifications
            .increment_attempts(user_id, group_id)
            .await?;
        self.database
            .verifications
            .update_state(user_id, group_id, Some(VerificationState::EnteringFullName))
            .await?;

        let session = VerificationSession::new(user_id, group_id);
        self.sessions.save(&session).await?;

        info!(user_id = user_id, group_id = group_id, attempt = attempts,
              "Verification flow started");

        Ok(BeginOutcome::Started {
            remaining_attempts: (self.settings.verification.max_attempts - attempts).max(0),
        })
    }

    /// Accept the validated full name and move to the workplace step
    pub async fn submit_full_name(
        &self,
        session: &mut VerificationSession,
        full_name: String,
    ) -> Result<()> {
        session.set_full_name(full_name);
        session.advance(SessionStep::EnteringWorkplace);
        self.sessions.save(session).await?;
        self.database
            .verifications
            .update_state(
                session.user_id,
                session.group_id,
                Some(VerificationState::EnteringWorkplace),
            )
            .await?;
        Ok(())
    }

    /// Accept the validated workplace and move to method selection
    pub async fn submit_workplace(
        &self,
        session: &mut VerificationSession,
        workplace: String,
    ) -> Result<()> {
        session.set_workplace(workplace);
        session.advance(SessionStep::ChoosingVerificationMethod);
        self.sessions.save(session).await?;
        self.database
            .verifications
            .update_state(
                session.user_id,
                session.group_id,
                Some(VerificationState::ChoosingVerificationMethod),
            )
            .await?;
        Ok(())
    }

    /// Record the chosen evidence channel and move to its collection step
    pub async fn choose_method(
        &self,
        session: &mut VerificationSession,
        method: VerificationMethod,
    ) -> Result<()> {
        session.set_method(method);
        let (step, state) = match method {
            VerificationMethod::Website => (
                SessionStep::EnteringWebsiteUrl,
                VerificationState::EnteringWebsiteUrl,
            ),
            VerificationMethod::Document => (
                SessionStep::UploadingDocument,
                VerificationState::UploadingDocument,
            ),
        };
        session.advance(step);
        self.sessions.save(session).await?;
        self.database
            .verifications
            .update_state(session.user_id, session.group_id, Some(state))
            .await?;
        Ok(())
    }

    /// Attach the normalized website URL and move to processing
    pub async fn submit_website_url(
        &self,
        session: &mut VerificationSession,
        url: String,
    ) -> Result<()> {
        session.set_website_url(url);
        self.enter_processing(session).await
    }

    /// Attach the uploaded document reference and move to processing
    pub async fn submit_document(
        &self,
        session: &mut VerificationSession,
        document: DocumentEvidence,
    ) -> Result<()> {
        session.set_document(document);
        self.enter_processing(session).await
    }

    async fn enter_processing(&self, session: &mut VerificationSession) -> Result<()> {
        session.advance(SessionStep::ProcessingVerification);
        self.sessions.save(session).await?;
        self.database
            .verifications
            .update_state(
                session.user_id,
                session.group_id,
                Some(VerificationState::ProcessingVerification),
            )
            .await?;
        Ok(())
    }

    /// Run the adjudication for an accumulated claim and settle the record.
    /// Document submissions pass the downloaded bytes; website submissions
    /// pass `None`. Every path clears the session — a run ends here.
    pub async fn process(
        &self,
        session: &VerificationSession,
        document_bytes: Option<Vec<u8>>,
    ) -> Result<VerificationOutcome> {
        let user_id = session.user_id;
        let group_id = session.group_id;
        let (full_name, workplace) = session.claim()?;

        let method = session.method.ok_or_else(|| {
            MedGuardError::InvalidInput("Session is missing the verification method".to_string())
        })?;

        let adjudication = match method {
            VerificationMethod::Website => {
                let url = session.website_url.as_deref().ok_or_else(|| {
                    MedGuardError::InvalidInput("Session is missing the website URL".to_string())
                })?;
                self.adjudicator
                    .verify_by_website(full_name, workplace, url)
                    .await
            }
            VerificationMethod::Document => {
                let bytes = document_bytes.ok_or_else(|| {
                    MedGuardError::InvalidInput("Document bytes were not provided".to_string())
                })?;
                let mime_type = session
                    .document
                    .as_ref()
                    .and_then(|d| d.mime_type.clone())
                    .unwrap_or_else(|| "image/jpeg".to_string());
                self.adjudicator
                    .verify_by_document(full_name, workplace, &bytes, &mime_type)
                    .await
            }
        };

        match adjudication {
            Ok((judgment, raw_payload)) => {
                self.audit(session, method, Some(raw_payload), outcome::PROCESSING)
                    .await;

                let verdict = evaluate_judgment(&judgment, full_name);
                info!(user_id = user_id, group_id = group_id, verdict = ?verdict,
                      explanation = judgment.explanation(), "Adjudication decision");

                match verdict {
                    Verdict::Approved => {
                        self.settle_success(session).await?;
                        Ok(VerificationOutcome::Approved)
                    }
                    Verdict::Rejected(reason) => {
                        info!(user_id = user_id, group_id = group_id, reason = ?reason,
                              "Verification rejected");
                        let remaining = self.settle_failure(session, outcome::FAILED).await?;
                        Ok(VerificationOutcome::Rejected {
                            remaining_attempts: remaining,
                        })
                    }
                }
            }
            Err(e) => {
                error!(user_id = user_id, group_id = group_id, error = %e,
                       "Adjudicator call failed");
                self.audit(session, method, Some(format!("error: {}", e)), outcome::ERROR)
                    .await;
                let remaining = self.settle_failure(session, outcome::ERROR).await?;
                Ok(VerificationOutcome::Errored {
                    remaining_attempts: remaining,
                })
            }
        }
    }

    async fn settle_success(&self, session: &VerificationSession) -> Result<()> {
        let user_id = session.user_id;
        let group_id = session.group_id;

        self.database
            .verifications
            .mark_verified(user_id, group_id, VerificationType::Manual)
            .await?;
        self.database.offenses.reset(user_id, group_id).await?;
        self.database
            .audit
            .update_latest_result(user_id, outcome::SUCCESS)
            .await?;

        // Refresh the gate's view so the next message is not stale-blocked
        self.cache.invalidate_verified(user_id, group_id);
        self.cache.mark_verified(user_id, group_id);

        self.sessions.delete(user_id).await?;

        info!(user_id = user_id, group_id = group_id, "Verification completed successfully");
        Ok(())
    }

    async fn settle_failure(&self, session: &VerificationSession, result: &str) -> Result<i32> {
        let user_id = session.user_id;
        let group_id = session.group_id;

        if result != outcome::ERROR {
            self.database.audit.update_latest_result(user_id, result).await?;
        }
        self.database
            .verifications
            .update_state(user_id, group_id, None)
            .await?;
        self.sessions.delete(user_id).await?;

        let attempts = self
            .database
            .verifications
            .find(user_id, group_id)
            .await?
            .map(|r| r.attempts_count)
            .unwrap_or(self.settings.verification.max_attempts);
        let remaining = (self.settings.verification.max_attempts - attempts).max(0);

        info!(user_id = user_id, group_id = group_id, remaining_attempts = remaining,
              "Verification attempt failed");
        Ok(remaining)
    }

    async fn audit(
        &self,
        session: &VerificationSession,
        method: VerificationMethod,
        payload: Option<String>,
        result: &str,
    ) {
        let request = CreateAuditLogRequest {
            user_id: session.user_id,
            group_id: Some(session.group_id),
            method: Some(method.as_str().to_string()),
            full_name: session.full_name.clone(),
            workplace: session.workplace.clone(),
            website_url: session.website_url.clone(),
            adjudicator_response: payload,
            result: result.to_string(),
        };

        if let Err(e) = self.database.audit.add(request).await {
            error!(user_id = session.user_id, error = %e, "Failed to write audit log entry");
        }
    }

    /// Abort any active session for a user, resetting the persisted state.
    /// Used when an invariant is violated mid-flow.
    pub async fn abort_session(&self, session: &VerificationSession) -> Result<()> {
        self.database
            .verifications
            .update_state(session.user_id, session.group_id, None)
            .await?;
        self.sessions.delete(session.user_id).await?;
        Ok(())
    }
}

impl std::fmt::Debug for VerificationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerificationService").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::judgment::{DocumentJudgment, WebsiteJudgment};

    fn website_judgment(found: bool, confidence: Confidence, found_name: &str) -> Judgment {
        Judgment::Website(WebsiteJudgment {
            found,
            confidence,
            explanation: String::new(),
            sources: vec![],
            found_name: found_name.to_string(),
        })
    }

    fn document_judgment(
        found: bool,
        confidence: Confidence,
        found_name: &str,
        is_medical: bool,
        indicators: Vec<String>,
    ) -> Judgment {
        Judgment::Document(DocumentJudgment {
            found,
            confidence,
            explanation: String::new(),
            document_type: "diploma".to_string(),
            found_name: found_name.to_string(),
            is_medical_document: is_medical,
            medical_indicators: indicators,
            issuing_organization: String::new(),
        })
    }

    #[test]
    fn test_normalize_full_name() {
        assert_eq!(
            normalize_full_name("  Ivanov   Ivan Ivanovich "),
            "ivanov ivan ivanovich"
        );
        assert_eq!(normalize_full_name("Ivanov I. I."), "ivanov i i");
    }

    #[test]
    fn test_names_match_is_strict() {
        assert!(names_match("Ivanov Ivan Ivanovich", "ivanov  ivan ivanovich"));
        assert!(!names_match("Ivanov Ivan Ivanovich", "Ivanov Petr Ivanovich"));
        assert!(!names_match("Ivanov Ivan Ivanovich", "Petrov Ivan Ivanovich"));
        assert!(!names_match("Ivanov Ivan Ivanovich", "Ivanov Ivan Sergeevich"));
        assert!(!names_match("", "Ivanov Ivan"));
    }

    #[test]
    fn test_exact_match_high_confidence_approves() {
        let judgment = website_judgment(true, Confidence::High, "Ivanov Ivan Ivanovich");
        assert_eq!(
            evaluate_judgment(&judgment, "Ivanov Ivan Ivanovich"),
            Verdict::Approved
        );
    }

    #[test]
    fn test_medium_confidence_approves() {
        let judgment = website_judgment(true, Confidence::Medium, "Ivanov Ivan Ivanovich");
        assert_eq!(
            evaluate_judgment(&judgment, "Ivanov Ivan Ivanovich"),
            Verdict::Approved
        );
    }

    #[test]
    fn test_partial_name_difference_rejects() {
        let judgment = website_judgment(true, Confidence::High, "Ivanov Petr Ivanovich");
        assert_eq!(
            evaluate_judgment(&judgment, "Ivanov Ivan Ivanovich"),
            Verdict::Rejected(RejectionReason::NameMismatch)
        );
    }

    #[test]
    fn test_low_confidence_rejects_even_with_matching_name() {
        let judgment = website_judgment(true, Confidence::Low, "Ivanov Ivan Ivanovich");
        assert_eq!(
            evaluate_judgment(&judgment, "Ivanov Ivan Ivanovich"),
            Verdict::Rejected(RejectionReason::LowConfidence)
        );
    }

    #[test]
    fn test_not_found_rejects() {
        let judgment = website_judgment(false, Confidence::High, "");
        assert_eq!(
            evaluate_judgment(&judgment, "Ivanov Ivan Ivanovich"),
            Verdict::Rejected(RejectionReason::NotFound)
        );
    }

    #[test]
    fn test_non_medical_document_rejects_despite_name_match() {
        let judgment = document_judgment(
            true,
            Confidence::High,
            "Ivanov Ivan Ivanovich",
            false,
            vec!["stamp".to_string()],
        );
        assert_eq!(
            evaluate_judgment(&judgment, "Ivanov Ivan Ivanovich"),
            Verdict::Rejected(RejectionReason::NotMedicalDocument)
        );
    }

    #[test]
    fn test_document_without_indicators_rejects() {
        let judgment = document_judgment(
            true,
            Confidence::High,
            "Ivanov Ivan Ivanovich",
            true,
            vec![],
        );
        assert_eq!(
            evaluate_judgment(&judgment, "Ivanov Ivan Ivanovich"),
            Verdict::Rejected(RejectionReason::NoMedicalIndicators)
        );
    }

    #[test]
    fn test_genuine_document_with_match_approves() {
        let judgment = document_judgment(
            true,
            Confidence::High,
            "Ivanov Ivan Ivanovich",
            true,
            vec!["medical university seal".to_string()],
        );
        assert_eq!(
            evaluate_judgment(&judgment, "Ivanov Ivan Ivanovich"),
            Verdict::Approved
        );
    }
}
