//! Notification service implementation
//!
//! This service owns every user-facing message the moderation core sends:
//! join challenges, deletion reminders, removal notices. Private delivery is
//! attempted first; users who block private messages get a short-lived
//! in-group notice with a deep-link button instead. Failures on the platform
//! boundary are logged and never escalated into verification-state changes.

use std::time::Duration;
use teloxide::{
    Bot,
    prelude::*,
    types::{ChatId, InlineKeyboardButton, InlineKeyboardMarkup, MessageId, ParseMode, UserId},
};
use tracing::{info, warn, error, debug};

use crate::config::settings::Settings;
use crate::utils::errors::Result;

/// Notification service for verification messaging
#[derive(Clone)]
pub struct NotificationService {
    bot: Bot,
    settings: Settings,
}

impl NotificationService {
    /// Create a new NotificationService instance
    pub fn new(bot: Bot, settings: Settings) -> Self {
        Self { bot, settings }
    }

    /// Inline keyboard with a callback button starting verification for a group
    pub fn start_verification_keyboard(group_id: i64) -> InlineKeyboardMarkup {
        InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
            "🩺 Start verification",
            format!("start_verification:{}", group_id),
        )]])
    }

    /// Inline keyboard with a deep-link URL button, for contexts where a
    /// callback cannot reach the bot privately
    fn deep_link_keyboard(bot_username: &str, group_id: i64) -> Result<InlineKeyboardMarkup> {
        let url = url::Url::parse(&format!(
            "https://t.me/{}?start=verify_{}",
            bot_username, group_id
        ))?;
        Ok(InlineKeyboardMarkup::new(vec![vec![
            InlineKeyboardButton::url("🩺 Start verification", url),
        ]]))
    }

    /// Greet a new member in the group and challenge them privately.
    /// Both messages are best-effort; the group greeting cleans itself up.
    pub async fn send_join_challenge(
        &self,
        group_id: i64,
        user_id: i64,
        display_name: &str,
        group_name: &str,
    ) -> Result<()> {
        let hours = self.settings.verification.start_timeout_hours;

        match self.bot.get_me().await {
            Ok(me) => {
                let keyboard = Self::deep_link_keyboard(me.username(), group_id)?;
                let greeting = format!(
                    "👋 Welcome, {}!\n\n\
                     🩺 This group is for verified medical professionals. \
                     Check your private messages with the bot to begin verification.\n\n\
                     ⏰ You have {} hours to start, otherwise you will be removed from the group.",
                    display_name, hours
                );

                match self
                    .bot
                    .send_message(ChatId(group_id), greeting)
                    .reply_markup(keyboard)
                    .await
                {
                    Ok(message) => {
                        self.delete_after(ChatId(group_id), message.id, Duration::from_secs(120));
                    }
                    Err(e) => warn!(group_id = group_id, error = %e, "Failed to send group greeting"),
                }
            }
            Err(e) => warn!(error = %e, "Failed to resolve bot username for greeting"),
        }

        let challenge = format!(
            "👋 <b>Welcome!</b>\n\n\
             You joined \"{}\", a group for medical professionals. \
             To keep posting you need to verify your professional identity.\n\n\
             🔹 You have {} hours to start verification\n\
             🔹 After that you will be removed from the group automatically\n\n\
             Press the button below to begin:",
            group_name, hours
        );

        match self
            .bot
            .send_message(ChatId(user_id), challenge)
            .parse_mode(ParseMode::Html)
            .reply_markup(Self::start_verification_keyboard(group_id))
            .await
        {
            Ok(_) => {
                info!(user_id = user_id, group_id = group_id, "Join challenge delivered privately");
            }
            Err(e) => {
                // Private messages blocked: fall back to an in-group notice
                warn!(user_id = user_id, error = %e, "Private challenge failed, posting group fallback");
                self.send_group_fallback_notice(group_id, user_id, display_name).await?;
            }
        }

        Ok(())
    }

    /// Remind a user that their message was deleted and verification is
    /// pending. Private first, in-group ephemeral notice as fallback.
    pub async fn send_verification_reminder(
        &self,
        group_id: i64,
        user_id: i64,
        display_name: &str,
        group_name: &str,
    ) -> Result<()> {
        let reminder = format!(
            "🏥 <b>Verification required</b>\n\n\
             Your message in \"{}\" was removed.\n\n\
             To participate in the group you need to verify your status as a \
             medical professional.\n\n\
             Press the button below to begin:",
            group_name
        );

        match self
            .bot
            .send_message(ChatId(user_id), reminder)
            .parse_mode(ParseMode::Html)
            .reply_markup(Self::start_verification_keyboard(group_id))
            .await
        {
            Ok(_) => {
                debug!(user_id = user_id, group_id = group_id, "Verification reminder delivered privately");
                Ok(())
            }
            Err(e) => {
                warn!(user_id = user_id, error = %e, "Private reminder failed, posting group fallback");
                self.send_group_fallback_notice(group_id, user_id, display_name).await
            }
        }
    }

    /// Short-lived in-group notice with a deep-link button
    async fn send_group_fallback_notice(
        &self,
        group_id: i64,
        user_id: i64,
        display_name: &str,
    ) -> Result<()> {
        let me = self.bot.get_me().await?;
        let keyboard = Self::deep_link_keyboard(me.username(), group_id)?;

        let notice = format!(
            "⚠️ {}, you need to pass verification to participate in this group.\n\n\
             ⏰ You have {} hours, otherwise you will be removed.",
            display_name, self.settings.verification.start_timeout_hours
        );

        match self
            .bot
            .send_message(ChatId(group_id), notice)
            .reply_markup(keyboard)
            .await
        {
            Ok(message) => {
                info!(user_id = user_id, group_id = group_id, "Posted in-group verification notice");
                self.delete_after(ChatId(group_id), message.id, Duration::from_secs(60));
                Ok(())
            }
            Err(e) => {
                error!(user_id = user_id, group_id = group_id, error = %e,
                       "Failed to deliver verification notice on both paths");
                Ok(())
            }
        }
    }

    /// Tell a user they were removed for never starting verification
    pub async fn send_removal_notice(&self, user_id: i64) {
        let notice = format!(
            "⏰ <b>Verification deadline expired</b>\n\n\
             You did not start verification within {} hours and were removed \
             from the group.\n\n\
             You may rejoin and try again, or contact an administrator.",
            self.settings.verification.start_timeout_hours
        );

        if let Err(e) = self
            .bot
            .send_message(ChatId(user_id), notice)
            .parse_mode(ParseMode::Html)
            .await
        {
            debug!(user_id = user_id, error = %e, "Removal notice could not be delivered");
        }
    }

    /// Ban a member and immediately lift the ban so they can rejoin later
    pub async fn kick_member(&self, group_id: i64, user_id: i64) -> Result<()> {
        self.bot
            .ban_chat_member(ChatId(group_id), UserId(user_id as u64))
            .await?;
        self.bot
            .unban_chat_member(ChatId(group_id), UserId(user_id as u64))
            .await?;
        Ok(())
    }

    /// Schedule deletion of a message after a delay, best-effort
    pub fn delete_after(&self, chat_id: ChatId, message_id: MessageId, delay: Duration) {
        let bot = self.bot.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = bot.delete_message(chat_id, message_id).await {
                debug!(chat_id = ?chat_id, message_id = ?message_id, error = %e,
                       "Failed to auto-delete message");
            }
        });
    }
}

impl std::fmt::Debug for NotificationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationService").finish_non_exhaustive()
    }
}
