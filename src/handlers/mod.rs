//! Bot handlers module
//!
//! This module contains all Telegram bot handlers organized by type:
//! - Command handlers for bot commands
//! - Callback handlers for inline keyboard interactions
//! - Message handlers for the message gate and conversation input
//! - Membership handlers for chat-member transitions

pub mod commands;
pub mod callbacks;
pub mod messages;
pub mod members;

// Re-export commonly used handler functions
pub use commands::{Command, handle_command};
pub use callbacks::handle_callback_query;
pub use messages::handle_message;
pub use members::{handle_chat_member_update, handle_bot_membership_update};
