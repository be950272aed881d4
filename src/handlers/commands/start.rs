//! Start command handler
//!
//! Entry point into the verification flow from a private chat. A deep-link
//! payload (`verify_<group_id>`) routes straight to that group's challenge;
//! without one, the user's unverified groups are listed for selection.

use teloxide::{Bot, prelude::*, types::{Message, ParseMode}};
use tracing::{info, debug, warn};

use crate::config::settings::Settings;
use crate::models::group::Group;
use crate::models::verification::VerificationRecord;
use crate::services::{NotificationService, ServiceFactory};
use crate::utils::errors::Result;

/// Handle /start command
pub async fn handle_start(
    bot: Bot,
    msg: Message,
    param: String,
    services: ServiceFactory,
    settings: Settings,
) -> Result<()> {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };
    let user_id = user.id.0 as i64;

    // /start in a group is noise; verification lives in private chat
    if !msg.chat.id.is_user() {
        return Ok(());
    }

    if settings.bot.admin_ids.contains(&user_id) {
        bot.send_message(
            msg.chat.id,
            "👑 <b>You are a bot administrator</b>\n\n\
             Use the group admin commands (/checkin, /whitelist_add) inside \
             the groups you moderate.",
        )
        .parse_mode(ParseMode::Html)
        .await?;
        return Ok(());
    }

    let param = param.trim();
    if let Some(group_id) = parse_deep_link(param) {
        debug!(user_id = user_id, group_id = group_id, "Deep-link verification start");
        return show_group_challenge(&bot, &msg, user_id, group_id, &services, &settings).await;
    }
    if !param.is_empty() {
        warn!(user_id = user_id, param = %param, "Unrecognized start parameter");
    }

    show_pending_verifications(&bot, &msg, user_id, &services, &settings).await
}

/// Extract the group id from a `verify_<group_id>` deep-link payload
fn parse_deep_link(param: &str) -> Option<i64> {
    param.strip_prefix("verify_")?.parse::<i64>().ok()
}

/// Show the challenge card for one specific group
async fn show_group_challenge(
    bot: &Bot,
    msg: &Message,
    user_id: i64,
    group_id: i64,
    services: &ServiceFactory,
    settings: &Settings,
) -> Result<()> {
    let group = match services.database().groups.find_by_id(group_id).await? {
        Some(group) if group.is_active => group,
        _ => {
            bot.send_message(
                msg.chat.id,
                "❌ <b>Group not found</b>\n\nThe group does not exist or is inactive.",
            )
            .parse_mode(ParseMode::Html)
            .await?;
            return Ok(());
        }
    };

    let Some(record) = services.database().verifications.find(user_id, group_id).await? else {
        bot.send_message(
            msg.chat.id,
            "❌ <b>Access restricted</b>\n\n\
             This bot works only with members of the medical group.\n\
             Join the group first, then start verification.",
        )
        .parse_mode(ParseMode::Html)
        .await?;
        return Ok(());
    };

    if record.verified {
        bot.send_message(
            msg.chat.id,
            format!(
                "✅ <b>You are already verified</b>\n\n\
                 Your status in \"{}\" is confirmed.",
                group.group_name
            ),
        )
        .parse_mode(ParseMode::Html)
        .await?;
        return Ok(());
    }

    if record.attempts_exhausted(settings.verification.max_attempts) {
        bot.send_message(
            msg.chat.id,
            format!(
                "❌ <b>Attempt limit reached</b>\n\n\
                 You have used all verification attempts for \"{}\".\n\
                 Contact an administrator.",
                group.group_name
            ),
        )
        .parse_mode(ParseMode::Html)
        .await?;
        return Ok(());
    }

    let remaining = settings.verification.max_attempts - record.attempts_count;
    bot.send_message(msg.chat.id, challenge_text(&group, remaining))
        .parse_mode(ParseMode::Html)
        .reply_markup(NotificationService::start_verification_keyboard(group_id))
        .await?;

    info!(user_id = user_id, group_id = group_id, "Challenge card shown");
    Ok(())
}

/// List all groups where the user can still verify
async fn show_pending_verifications(
    bot: &Bot,
    msg: &Message,
    user_id: i64,
    services: &ServiceFactory,
    settings: &Settings,
) -> Result<()> {
    let records = services.database().verifications.find_for_user(user_id).await?;

    if records.is_empty() {
        bot.send_message(
            msg.chat.id,
            "❌ <b>Access restricted</b>\n\n\
             This bot works only with members of the medical group.\n\
             Join the group first, then start verification.",
        )
        .parse_mode(ParseMode::Html)
        .await?;
        return Ok(());
    }

    let mut pending: Vec<(Group, VerificationRecord)> = Vec::new();
    for record in records {
        if record.verified || record.attempts_exhausted(settings.verification.max_attempts) {
            continue;
        }
        if let Some(group) = services.database().groups.find_by_id(record.group_id).await? {
            if group.is_active {
                pending.push((group, record));
            }
        }
    }

    match pending.len() {
        0 => {
            bot.send_message(
                msg.chat.id,
                "ℹ️ <b>No groups need verification</b>\n\n\
                 You are either verified everywhere or out of attempts.\n\
                 Contact an administrator if you need help.",
            )
            .parse_mode(ParseMode::Html)
            .await?;
        }
        1 => {
            let (group, record) = &pending[0];
            let remaining = settings.verification.max_attempts - record.attempts_count;
            bot.send_message(msg.chat.id, challenge_text(group, remaining))
                .parse_mode(ParseMode::Html)
                .reply_markup(NotificationService::start_verification_keyboard(group.group_id))
                .await?;
        }
        _ => {
            let buttons: Vec<Vec<teloxide::types::InlineKeyboardButton>> = pending
                .iter()
                .map(|(group, record)| {
                    let remaining = settings.verification.max_attempts - record.attempts_count;
                    vec![teloxide::types::InlineKeyboardButton::callback(
                        format!("🩺 {} ({} attempts left)", group.group_name, remaining),
                        format!("start_verification:{}", group.group_id),
                    )]
                })
                .collect();

            bot.send_message(
                msg.chat.id,
                "🏥 <b>Choose a group for verification</b>\n\n\
                 You have unfinished verification in these groups:",
            )
            .parse_mode(ParseMode::Html)
            .reply_markup(teloxide::types::InlineKeyboardMarkup::new(buttons))
            .await?;
        }
    }

    Ok(())
}

fn challenge_text(group: &Group, remaining_attempts: i32) -> String {
    format!(
        "🏥 <b>Verification for \"{}\"</b>\n\n\
         To participate in the group you must confirm your status as a \
         medical professional.\n\n\
         📋 <b>The process:</b>\n\
         1️⃣ Enter your full name\n\
         2️⃣ Enter your workplace\n\
         3️⃣ Choose a confirmation method:\n\
            • 🌐 Organization website\n\
            • 📄 Document (diploma/certificate)\n\
         4️⃣ Receive the verdict\n\n\
         ⚠️ <b>Attempts left:</b> {}\n\n\
         Ready to begin?",
        group.group_name, remaining_attempts
    )
}
