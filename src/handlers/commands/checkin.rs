//! Checkin command handler
//!
//! Toggles the per-group checkin mode that extends message gating to
//! pre-existing members. Admin-only, with support for the anonymous-admin
//! identity; the confirmation goes to the admin privately when possible and
//! the command traces are cleaned out of the group after a short delay.

use std::time::Duration;
use teloxide::{Bot, prelude::*, types::{ChatId, Message, ParseMode}};
use tracing::{info, debug, error};

use crate::config::settings::Settings;
use crate::services::ServiceFactory;
use crate::utils::errors::Result;
use crate::utils::logging::log_admin_action;

const ANONYMOUS_ADMIN_USERNAME: &str = "GroupAnonymousBot";

/// Handle /checkin command
pub async fn handle_checkin(
    bot: Bot,
    msg: Message,
    services: ServiceFactory,
    settings: Settings,
) -> Result<()> {
    let Some(user) = msg.from.clone() else {
        return Ok(());
    };

    if msg.chat.id.is_user() {
        bot.send_message(msg.chat.id, "This command works inside a group.")
            .await?;
        return Ok(());
    }

    let user_id = user.id.0 as i64;
    let group_id = msg.chat.id.0;

    let is_anonymous_admin =
        user.is_bot && user.username.as_deref() == Some(ANONYMOUS_ADMIN_USERNAME);
    let is_global_admin = settings.bot.admin_ids.contains(&user_id);

    let is_group_admin = if is_anonymous_admin || is_global_admin {
        true
    } else {
        match bot.get_chat_member(msg.chat.id, user.id).await {
            Ok(member) => member.kind.is_privileged(),
            Err(e) => {
                error!(user_id = user_id, group_id = group_id, error = %e,
                       "Failed to check admin rights for /checkin");
                false
            }
        }
    };

    if !is_group_admin {
        debug!(user_id = user_id, group_id = group_id,
               "Non-admin tried to toggle checkin mode");
        return Ok(());
    }

    let group = services.database().groups.find_by_id(group_id).await?;
    if !group.map(|g| g.is_active).unwrap_or(false) {
        reply_and_cleanup(
            &bot,
            &services,
            &msg,
            "❌ This group is not registered with the bot.".to_string(),
        )
        .await?;
        return Ok(());
    }

    let new_mode = services.database().groups.toggle_checkin_mode(group_id).await?;
    log_admin_action(user_id, "toggle_checkin", Some(&group_id.to_string()),
                     Some(if new_mode { "on" } else { "off" }));
    info!(group_id = group_id, admin_id = user_id, checkin_mode = new_mode,
          "Checkin mode toggled");

    let response = if new_mode {
        format!(
            "✅ <b>Checkin mode enabled</b>\n\n\
             Pre-existing members now get verification reminders when they post.\n\n\
             ❗️ Messages are DELETED until verification passes\n\
             ⚠️ After {}+ deleted messages an automatic ban may follow\n\n\
             🔄 Run /checkin again to disable",
            settings.verification.spam_message_threshold
        )
    } else {
        "🔴 <b>Checkin mode disabled</b>\n\n\
         Pre-existing members can post without restrictions.\n\
         New members still go through standard verification."
            .to_string()
    };

    // The anonymous admin has no reachable private chat
    if is_anonymous_admin {
        reply_and_cleanup(&bot, &services, &msg, response).await?;
        return Ok(());
    }

    match bot
        .send_message(ChatId(user_id), response.clone())
        .parse_mode(ParseMode::Html)
        .await
    {
        Ok(_) => {
            reply_and_cleanup(
                &bot,
                &services,
                &msg,
                "✅ Settings updated. Details sent in private messages.".to_string(),
            )
            .await?;
        }
        Err(e) => {
            debug!(user_id = user_id, error = %e,
                   "Private confirmation failed, replying in the group");
            reply_and_cleanup(&bot, &services, &msg, response).await?;
        }
    }

    Ok(())
}

/// Reply in the group and schedule both the command and the reply for
/// deletion shortly after
async fn reply_and_cleanup(
    bot: &Bot,
    services: &ServiceFactory,
    msg: &Message,
    text: String,
) -> Result<()> {
    let reply = bot
        .send_message(msg.chat.id, text)
        .parse_mode(ParseMode::Html)
        .await?;

    let delay = Duration::from_secs(5);
    services
        .notification_service
        .delete_after(msg.chat.id, reply.id, delay);
    services
        .notification_service
        .delete_after(msg.chat.id, msg.id, delay);

    Ok(())
}
