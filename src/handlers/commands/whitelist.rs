//! Whitelist command handlers
//!
//! Admin-only management of a group's whitelist: /whitelist_add,
//! /whitelist_remove and /whitelist. Adding a member by id immediately
//! auto-completes any pending verification for them.

use teloxide::{Bot, prelude::*, types::{Message, ParseMode}};
use tracing::{debug, error};

use crate::config::settings::Settings;
use crate::services::whitelist::WhitelistIdentifier;
use crate::services::ServiceFactory;
use crate::utils::errors::Result;
use crate::utils::logging::log_admin_action;

/// Handle /whitelist_add command
pub async fn handle_whitelist_add(
    bot: Bot,
    msg: Message,
    arg: String,
    services: ServiceFactory,
    settings: Settings,
) -> Result<()> {
    let Some(admin_id) = require_group_admin(&bot, &msg, &settings).await? else {
        return Ok(());
    };
    let group_id = msg.chat.id.0;

    let identifier = match WhitelistIdentifier::parse(&arg) {
        Ok(identifier) => identifier,
        Err(e) => {
            bot.send_message(
                msg.chat.id,
                format!("❌ {}\n\nUsage: /whitelist_add <user id or @username>", e),
            )
            .await?;
            return Ok(());
        }
    };

    match services
        .whitelist_service
        .add(group_id, identifier.clone(), admin_id, None)
        .await
    {
        Ok(_) => {
            log_admin_action(admin_id, "whitelist_add", Some(&format!("{:?}", identifier)),
                             Some(&group_id.to_string()));
            bot.send_message(
                msg.chat.id,
                "⭐ <b>Added to the whitelist</b>\n\n\
                 The member is now exempt from verification in this group.",
            )
            .parse_mode(ParseMode::Html)
            .await?;
        }
        Err(e) => {
            error!(group_id = group_id, error = %e, "Failed to add whitelist entry");
            bot.send_message(
                msg.chat.id,
                "❌ Could not add the entry. It may already exist.",
            )
            .await?;
        }
    }

    Ok(())
}

/// Handle /whitelist_remove command
pub async fn handle_whitelist_remove(
    bot: Bot,
    msg: Message,
    arg: String,
    services: ServiceFactory,
    settings: Settings,
) -> Result<()> {
    let Some(admin_id) = require_group_admin(&bot, &msg, &settings).await? else {
        return Ok(());
    };
    let group_id = msg.chat.id.0;

    let identifier = match WhitelistIdentifier::parse(&arg) {
        Ok(identifier) => identifier,
        Err(e) => {
            bot.send_message(
                msg.chat.id,
                format!("❌ {}\n\nUsage: /whitelist_remove <user id or @username>", e),
            )
            .await?;
            return Ok(());
        }
    };

    let removed = services
        .whitelist_service
        .remove(group_id, identifier.clone())
        .await?;

    if removed {
        log_admin_action(admin_id, "whitelist_remove", Some(&format!("{:?}", identifier)),
                         Some(&group_id.to_string()));
        bot.send_message(msg.chat.id, "🗑 Removed from the whitelist.")
            .await?;
    } else {
        bot.send_message(msg.chat.id, "ℹ️ No matching whitelist entry found.")
            .await?;
    }

    Ok(())
}

/// Handle /whitelist command
pub async fn handle_whitelist_list(
    bot: Bot,
    msg: Message,
    services: ServiceFactory,
    settings: Settings,
) -> Result<()> {
    if require_group_admin(&bot, &msg, &settings).await?.is_none() {
        return Ok(());
    }
    let group_id = msg.chat.id.0;

    let entries = services.whitelist_service.list(group_id).await?;
    if entries.is_empty() {
        bot.send_message(msg.chat.id, "ℹ️ The whitelist for this group is empty.")
            .await?;
        return Ok(());
    }

    let mut text = String::from("⭐ <b>Whitelist</b>\n\n");
    for entry in &entries {
        let identifier = match (&entry.user_id, &entry.username) {
            (Some(id), _) => id.to_string(),
            (None, Some(username)) => format!("@{}", username),
            (None, None) => "unknown".to_string(),
        };
        text.push_str(&format!("• {}\n", identifier));
    }

    bot.send_message(msg.chat.id, text)
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

/// Resolve the caller as a group admin (global admin counts), or answer with
/// nothing. Returns the admin's user id when authorized.
async fn require_group_admin(
    bot: &Bot,
    msg: &Message,
    settings: &Settings,
) -> Result<Option<i64>> {
    let Some(user) = msg.from.as_ref() else {
        return Ok(None);
    };
    let user_id = user.id.0 as i64;

    if msg.chat.id.is_user() {
        bot.send_message(msg.chat.id, "This command works inside a group.")
            .await?;
        return Ok(None);
    }

    if settings.bot.admin_ids.contains(&user_id) {
        return Ok(Some(user_id));
    }

    match bot.get_chat_member(msg.chat.id, user.id).await {
        Ok(member) if member.kind.is_privileged() => Ok(Some(user_id)),
        Ok(_) => {
            debug!(user_id = user_id, chat_id = ?msg.chat.id,
                   "Non-admin tried a whitelist command");
            Ok(None)
        }
        Err(e) => {
            debug!(user_id = user_id, error = %e, "Failed to check admin rights");
            Ok(None)
        }
    }
}
