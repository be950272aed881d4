//! Membership event handlers
//!
//! Classifies raw chat-member transitions (join, leave, promotion) and runs
//! the join workflow: whitelist short-circuit, verification record creation,
//! challenge delivery and the start-deadline timer.

use teloxide::{Bot, prelude::*, types::{ChatMemberKind, ChatMemberUpdated}};
use tracing::{info, debug, warn, error};

use crate::config::settings::Settings;
use crate::models::verification::VerificationState;
use crate::services::ServiceFactory;
use crate::utils::errors::Result;
use crate::utils::logging::log_membership_event;

/// Simplified member presence used for transition classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberStatus {
    Admin,
    Member,
    Left,
    Banned,
}

impl MemberStatus {
    pub fn is_present(&self) -> bool {
        matches!(self, MemberStatus::Admin | MemberStatus::Member)
    }
}

/// Collapse the platform's member kind into a [`MemberStatus`]. A restricted
/// member still in the chat counts as present.
pub fn member_status(kind: &ChatMemberKind) -> MemberStatus {
    if kind.is_privileged() {
        MemberStatus::Admin
    } else if kind.is_present() {
        MemberStatus::Member
    } else if kind.is_banned() {
        MemberStatus::Banned
    } else {
        MemberStatus::Left
    }
}

/// A real membership transition, or the lack of one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipChange {
    Joined,
    Left,
    Promoted,
    Demoted,
    NoChange,
}

/// Classify an (old, new) status pair. Join covers the invite-link, search
/// and admin-add (restricted/kicked to member) paths alike; transitions with
/// no effective change classify as [`MembershipChange::NoChange`].
pub fn classify_transition(old: MemberStatus, new: MemberStatus) -> MembershipChange {
    if old == new {
        return MembershipChange::NoChange;
    }

    match (old.is_present(), new.is_present()) {
        (false, true) => MembershipChange::Joined,
        (true, false) => MembershipChange::Left,
        (true, true) => match (old, new) {
            (MemberStatus::Admin, _) => MembershipChange::Demoted,
            (_, MemberStatus::Admin) => MembershipChange::Promoted,
            _ => MembershipChange::NoChange,
        },
        // left <-> banned carries no membership meaning
        (false, false) => MembershipChange::NoChange,
    }
}

/// Handle a chat-member update for an ordinary user
pub async fn handle_chat_member_update(
    bot: Bot,
    update: ChatMemberUpdated,
    services: ServiceFactory,
    settings: Settings,
) -> Result<()> {
    let user = &update.new_chat_member.user;
    if user.is_bot {
        debug!(user_id = user.id.0, "Skipping membership event for bot account");
        return Ok(());
    }

    let group_id = update.chat.id.0;
    let user_id = user.id.0 as i64;
    let old = member_status(&update.old_chat_member.kind);
    let new = member_status(&update.new_chat_member.kind);

    match classify_transition(old, new) {
        MembershipChange::Joined => {
            log_membership_event(group_id, user_id, "joined", user.username.as_deref());
            handle_new_member(&bot, &update, &services, &settings).await?;
        }
        MembershipChange::Left => {
            log_membership_event(group_id, user_id, "left", user.username.as_deref());
            services.scheduler.cancel(user_id, group_id);

            // The record stays so rejoin spam remains visible via the
            // attempts counter; only the state marker changes.
            if let Some(record) = services_record(&services, user_id, group_id).await {
                if !record.verified {
                    if let Err(e) = services
                        .database()
                        .verifications
                        .update_state(user_id, group_id, Some(VerificationState::LeftGroup))
                        .await
                    {
                        error!(user_id = user_id, group_id = group_id, error = %e,
                               "Failed to mark record after leave");
                    }
                }
            }
        }
        MembershipChange::Promoted | MembershipChange::Demoted => {
            info!(user_id = user_id, group_id = group_id, "Admin set changed, resynchronizing");
            resync_group_admins(&bot, &services, group_id).await;
        }
        MembershipChange::NoChange => {
            debug!(user_id = user_id, group_id = group_id, old = ?old, new = ?new,
                   "Membership event without a real transition");
        }
    }

    Ok(())
}

async fn services_record(
    services: &ServiceFactory,
    user_id: i64,
    group_id: i64,
) -> Option<crate::models::verification::VerificationRecord> {
    match services.database().verifications.find(user_id, group_id).await {
        Ok(record) => record,
        Err(e) => {
            error!(user_id = user_id, group_id = group_id, error = %e,
                   "Failed to read verification record");
            None
        }
    }
}

async fn handle_new_member(
    bot: &Bot,
    update: &ChatMemberUpdated,
    services: &ServiceFactory,
    settings: &Settings,
) -> Result<()> {
    let user = &update.new_chat_member.user;
    let user_id = user.id.0 as i64;
    let group_id = update.chat.id.0;

    let group = match services.database().groups.find_by_id(group_id).await? {
        Some(group) if group.is_active => group,
        _ => {
            debug!(group_id = group_id, "Join event in a group the bot does not moderate");
            return Ok(());
        }
    };

    // Platform admins and global admins are exempt from verification
    if settings.bot.admin_ids.contains(&user_id) {
        debug!(user_id = user_id, "Global admin joined, no verification required");
        return Ok(());
    }
    match bot.get_chat_member(update.chat.id, user.id).await {
        Ok(member) if member.kind.is_privileged() => {
            info!(user_id = user_id, group_id = group_id,
                  "Administrator joined, no verification required");
            return Ok(());
        }
        Ok(_) => {}
        Err(e) => {
            warn!(user_id = user_id, error = %e, "Failed to check admin status for joiner");
        }
    }

    // Idempotent re-join: a verified record means nothing to do
    if let Some(record) = services_record(services, user_id, group_id).await {
        if record.verified {
            info!(user_id = user_id, group_id = group_id,
                  "Rejoining member is already verified");
            return Ok(());
        }
    }

    let username = user.username.as_deref();
    if services
        .whitelist_service
        .is_whitelisted(user_id, username, group_id)
        .await?
    {
        services.whitelist_service.auto_verify(user_id, group_id).await?;
        info!(user_id = user_id, group_id = group_id,
              "Whitelisted joiner auto-verified");
        return Ok(());
    }

    services
        .database()
        .verifications
        .create_for_new_member(user_id, group_id)
        .await?;
    info!(user_id = user_id, group_id = group_id,
          "Verification record created for new member");

    let display_name = user
        .username
        .as_ref()
        .map(|u| format!("@{}", u))
        .unwrap_or_else(|| user.first_name.clone());

    if let Err(e) = services
        .notification_service
        .send_join_challenge(group_id, user_id, &display_name, &group.group_name)
        .await
    {
        error!(user_id = user_id, group_id = group_id, error = %e,
               "Failed to deliver join challenge");
    }

    services.scheduler.schedule_removal(user_id, group_id);

    Ok(())
}

/// Refresh the stored admin set from the platform
async fn resync_group_admins(bot: &Bot, services: &ServiceFactory, group_id: i64) {
    match bot.get_chat_administrators(teloxide::types::ChatId(group_id)).await {
        Ok(admins) => {
            let snapshot: Vec<(i64, Option<String>, bool)> = admins
                .iter()
                .map(|m| {
                    (
                        m.user.id.0 as i64,
                        m.user.username.clone(),
                        m.kind.is_owner(),
                    )
                })
                .collect();

            if let Err(e) = services
                .database()
                .groups
                .replace_admins(group_id, &snapshot)
                .await
            {
                error!(group_id = group_id, error = %e, "Failed to store admin snapshot");
            }
        }
        Err(e) => {
            error!(group_id = group_id, error = %e, "Failed to fetch group administrators");
        }
    }
}

/// Handle the bot's own membership changes: register the group when admin
/// rights are granted, deactivate it when they are lost.
pub async fn handle_bot_membership_update(
    update: ChatMemberUpdated,
    services: ServiceFactory,
) -> Result<()> {
    let group_id = update.chat.id.0;
    let kind = &update.new_chat_member.kind;

    if kind.is_privileged() {
        let title = update.chat.title().unwrap_or("Unnamed group").to_string();
        services.database().groups.register(group_id, &title).await?;
        info!(group_id = group_id, group_name = %title, "Group registered as active");
    } else {
        services.database().groups.deactivate(group_id).await?;
        info!(group_id = group_id, "Group deactivated, bot lost admin rights");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_transitions() {
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
    fn test_leave_transitions() {
        assert_eq!(
            classify_transition(MemberStatus::Member, MemberStatus::Left),
            MembershipChange::Left
        );
        assert_eq!(
            classify_transition(MemberStatus::Admin, MemberStatus::Banned),
            MembershipChange::Left
        );
    }

    #[test]
    fn test_admin_transitions() {
        assert_eq!(
            classify_transition(MemberStatus::Member, MemberStatus::Admin),
            MembershipChange::Promoted
        );
        assert_eq!(
            classify_transition(MemberStatus::Admin, MemberStatus::Member),
            MembershipChange::Demoted
        );
    }

    #[test]
    fn test_no_change_transitions() {
        assert_eq!(
            classify_transition(MemberStatus::Member, MemberStatus::Member),
            MembershipChange::NoChange
        );
        assert_eq!(
            classify_transition(MemberStatus::Left, MemberStatus::Banned),
            MembershipChange::NoChange
        );
        assert_eq!(
            classify_transition(MemberStatus::Banned, MemberStatus::Left),
            MembershipChange::NoChange
        );
    }
}
