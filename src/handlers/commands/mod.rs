//! Command handlers module
//!
//! This module contains handlers for all bot commands like /start, /checkin,
//! and the whitelist administration commands.

pub mod start;
pub mod checkin;
pub mod whitelist;
pub mod help;

use teloxide::{Bot, types::Message, utils::command::BotCommands};
use crate::config::settings::Settings;
use crate::services::ServiceFactory;
use crate::utils::errors::Result;

/// All available bot commands
#[derive(BotCommands, Clone)]
#[command(rename_rule = "snake_case", description = "MedGuard commands:")]
pub enum Command {
    #[command(description = "Start or continue verification")]
    Start(String),
    #[command(description = "Show help information")]
    Help,
    #[command(description = "Toggle checkin mode for this group (admin only)")]
    Checkin,
    #[command(description = "Add a user to this group's whitelist (admin only)")]
    WhitelistAdd(String),
    #[command(description = "Remove a user from this group's whitelist (admin only)")]
    WhitelistRemove(String),
    #[command(description = "Show this group's whitelist (admin only)")]
    Whitelist,
}

/// Main command dispatcher
pub async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    services: ServiceFactory,
    settings: Settings,
) -> Result<()> {
    match cmd {
        Command::Start(param) => {
            start::handle_start(bot, msg, param, services, settings).await
        }
        Command::Help => help::handle_help(bot, msg).await,
        Command::Checkin => checkin::handle_checkin(bot, msg, services, settings).await,
        Command::WhitelistAdd(arg) => {
            whitelist::handle_whitelist_add(bot, msg, arg, services, settings).await
        }
        Command::WhitelistRemove(arg) => {
            whitelist::handle_whitelist_remove(bot, msg, arg, services, settings).await
        }
        Command::Whitelist => {
            whitelist::handle_whitelist_list(bot, msg, services, settings).await
        }
    }
}
