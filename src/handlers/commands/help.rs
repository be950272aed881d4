//! Help command handler

use teloxide::{Bot, types::Message, prelude::*};
use crate::utils::errors::Result;

/// Handle /help command
pub async fn handle_help(bot: Bot, msg: Message) -> Result<()> {
    let help_text = "🩺 MedGuard Help\n\n\
        /start - Start or continue verification\n\
        /help - Show this help message\n\n\
        Group admin commands:\n\
        /checkin - Toggle verification of pre-existing members\n\
        /whitelist_add <id or @username> - Whitelist a member\n\
        /whitelist_remove <id or @username> - Remove from the whitelist\n\
        /whitelist - Show the whitelist\n\n\
        For more information, contact the administrators.";

    bot.send_message(msg.chat.id, help_text).await?;
    Ok(())
}
