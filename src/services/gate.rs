//! Message gate decision logic
//!
//! The per-message policy, kept pure so the handler layer only performs the
//! side effects. New members (`requires_verification = true`) are always
//! gated; pre-existing members are gated only while the group's checkin mode
//! is on.

use crate::models::verification::VerificationRecord;

/// Outcome of evaluating a message against the verification policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    Block(BlockReason),
}

/// Why a message is being blocked; differences matter for logging only
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockReason {
    NewMember,
    CheckinNewMember,
    CheckinExistingMember,
}

impl BlockReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockReason::NewMember => "new_member_unverified",
            BlockReason::CheckinNewMember => "checkin_new_member",
            BlockReason::CheckinExistingMember => "checkin_existing_member",
        }
    }
}

/// Decide whether a non-exempt sender's message passes the gate.
///
/// Exemptions (bots, commands, admins, whitelist) are resolved by the caller
/// before this point; so is record creation for pre-existing members.
pub fn evaluate(record: &VerificationRecord, checkin_mode: bool) -> GateDecision {
    if record.verified {
        return GateDecision::Allow;
    }

    if checkin_mode {
        if record.requires_verification {
            GateDecision::Block(BlockReason::CheckinNewMember)
        } else {
            GateDecision::Block(BlockReason::CheckinExistingMember)
        }
    } else if record.requires_verification {
        GateDecision::Block(BlockReason::NewMember)
    } else {
        GateDecision::Allow
    }
}

/// Whether the post-increment offense count triggers a spam ban
pub fn spam_ban_due(offense_count: i32, threshold: i32, spam_protection: bool) -> bool {
    spam_protection && offense_count >= threshold
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(verified: bool, requires_verification: bool) -> VerificationRecord {
        VerificationRecord {
            id: 1,
            user_id: 10,
            group_id: -100,
            verified,
            requires_verification,
            verification_type: None,
            state: None,
            attempts_count: 0,
            verified_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_verified_always_allowed() {
        assert_eq!(evaluate(&record(true, false), false), GateDecision::Allow);
        assert_eq!(evaluate(&record(true, false), true), GateDecision::Allow);
    }

    #[test]
    fn test_new_member_blocked_regardless_of_checkin() {
        assert_eq!(
            evaluate(&record(false, true), false),
            GateDecision::Block(BlockReason::NewMember)
        );
        assert_eq!(
            evaluate(&record(false, true), true),
            GateDecision::Block(BlockReason::CheckinNewMember)
        );
    }

    #[test]
    fn test_existing_member_gated_only_in_checkin_mode() {
        assert_eq!(evaluate(&record(false, false), false), GateDecision::Allow);
        assert_eq!(
            evaluate(&record(false, false), true),
            GateDecision::Block(BlockReason::CheckinExistingMember)
        );
    }

    #[test]
    fn test_spam_ban_threshold() {
        assert!(!spam_ban_due(2, 3, true));
        assert!(spam_ban_due(3, 3, true));
        assert!(spam_ban_due(4, 3, true));
        // protection off: threshold reached but no ban
        assert!(!spam_ban_due(3, 3, false));
        assert!(!spam_ban_due(10, 3, false));
    }
}
