//! End-to-end tests for the verification decision logic
//!
//! These exercise the pure decision surfaces through the public API: the
//! message-gate policy, the adjudication verdict, transition classification,
//! the decision cache and the removal check.

use std::time::Duration;

use assert_matches::assert_matches;
use chrono::Utc;

use MedGuard::handlers::members::{classify_transition, MemberStatus, MembershipChange};
use MedGuard::models::judgment::{Confidence, DocumentJudgment, Judgment, WebsiteJudgment};
use MedGuard::models::verification::VerificationRecord;
use MedGuard::services::cache::DecisionCache;
use MedGuard::services::gate::{self, BlockReason, GateDecision};
use MedGuard::services::scheduler::removal_due;
use MedGuard::services::verification::{evaluate_judgment, RejectionReason, Verdict};
use MedGuard::state::session::{SessionStep, VerificationSession};

fn record(verified: bool, requires_verification: bool, state: Option<&str>) -> VerificationRecord {
    VerificationRecord {
        id: 1,
        user_id: 10,
        group_id: -100,
        verified,
        requires_verification,
        verification_type: None,
        state: state.map(|s| s.to_string()),
        attempts_count: 0,
        verified_at: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn website(found: bool, confidence: Confidence, found_name: &str) -> Judgment {
    Judgment::Website(WebsiteJudgment {
        found,
        confidence,
        explanation: String::new(),
        sources: vec![],
        found_name: found_name.to_string(),
    })
}

#[test]
fn verified_user_passes_the_gate_in_every_mode() {
    let record = record(true, false, None);
    assert_eq!(gate::evaluate(&record, false), GateDecision::Allow);
    assert_eq!(gate::evaluate(&record, true), GateDecision::Allow);
}

#[test]
fn unverified_new_member_is_always_blocked() {
    let record = record(false, true, Some("waiting_for_start"));
    assert_matches!(gate::evaluate(&record, false), GateDecision::Block(BlockReason::NewMember));
    assert_matches!(
        gate::evaluate(&record, true),
        GateDecision::Block(BlockReason::CheckinNewMember)
    );
}

#[test]
fn pre_existing_member_is_blocked_only_under_checkin() {
    let record = record(false, false, None);
    assert_eq!(gate::evaluate(&record, false), GateDecision::Allow);
    assert_matches!(
        gate::evaluate(&record, true),
        GateDecision::Block(BlockReason::CheckinExistingMember)
    );
}

#[test]
fn exact_name_and_high_confidence_accepts() {
    let judgment = website(true, Confidence::High, "Ivanov Ivan Ivanovich");
    assert_eq!(evaluate_judgment(&judgment, "Ivanov Ivan Ivanovich"), Verdict::Approved);
}

#[test]
fn surname_preserving_given_name_difference_still_rejects() {
    let judgment = website(true, Confidence::High, "Ivanov Petr Ivanovich");
    assert_eq!(
        evaluate_judgment(&judgment, "Ivanov Ivan Ivanovich"),
        Verdict::Rejected(RejectionReason::NameMismatch)
    );
}

#[test]
fn low_confidence_rejects_a_perfect_match() {
    let judgment = website(true, Confidence::Low, "Ivanov Ivan Ivanovich");
    assert_eq!(
        evaluate_judgment(&judgment, "Ivanov Ivan Ivanovich"),
        Verdict::Rejected(RejectionReason::LowConfidence)
    );
}

#[test]
fn non_medical_document_rejects_regardless_of_match() {
    let judgment = Judgment::Document(DocumentJudgment {
        found: true,
        confidence: Confidence::High,
        explanation: String::new(),
        document_type: "drivers_license".to_string(),
        found_name: "Ivanov Ivan Ivanovich".to_string(),
        is_medical_document: false,
        medical_indicators: vec!["photo".to_string()],
        issuing_organization: String::new(),
    });
    assert_eq!(
        evaluate_judgment(&judgment, "Ivanov Ivan Ivanovich"),
        Verdict::Rejected(RejectionReason::NotMedicalDocument)
    );
}

#[test]
fn spam_ban_fires_only_with_protection_enabled() {
    // third blocked message with protection on: ban
    assert!(gate::spam_ban_due(3, 3, true));
    // protection off: still blocked upstream, never banned, counter keeps going
    assert!(!gate::spam_ban_due(3, 3, false));
    assert!(!gate::spam_ban_due(7, 3, false));
}

#[test]
fn duplicate_join_classification_is_a_no_op() {
    assert_eq!(
        classify_transition(MemberStatus::Member, MemberStatus::Member),
        MembershipChange::NoChange
    );
}

#[test]
fn join_paths_all_classify_as_joined() {
    assert_eq!(
        classify_transition(MemberStatus::Left, MemberStatus::Member),
        MembershipChange::Joined
    );
    assert_eq!(
        classify_transition(MemberStatus::Banned, MemberStatus::Member),
        MembershipChange::Joined
    );
}

#[test]
fn removal_skipped_once_conversation_started() {
    assert!(!removal_due(Some(&record(false, true, Some("entering_full_name")))));
    assert!(!removal_due(Some(&record(true, false, None))));
    assert!(removal_due(Some(&record(false, true, Some("waiting_for_start")))));
}

#[test]
fn session_group_binding_survives_every_step() {
    let mut session = VerificationSession::new(10, -100);
    session.set_full_name("Ivanov Ivan Ivanovich".to_string());
    session.advance(SessionStep::EnteringWorkplace);
    session.set_workplace("City Hospital".to_string());
    session.advance(SessionStep::ChoosingVerificationMethod);
    session.advance(SessionStep::EnteringWebsiteUrl);
    session.set_website_url("https://hospital1.ru".to_string());
    session.advance(SessionStep::ProcessingVerification);

    // a challenge from group B mid-flow must not re-target the run
    assert_eq!(session.group_id, -100);
}

#[test]
fn cache_never_holds_negative_results() {
    let cache = DecisionCache::new(Duration::from_secs(300));

    // a miss does not populate anything
    assert!(!cache.is_verified(10, -100));
    assert!(!cache.is_verified(10, -100));

    // completion inserts, invalidation removes
    cache.mark_verified(10, -100);
    assert!(cache.is_verified(10, -100));
    cache.invalidate_verified(10, -100);
    assert!(!cache.is_verified(10, -100));
}
