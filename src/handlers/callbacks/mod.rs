//! Callback query handlers module
//!
//! This module contains handlers for all inline keyboard button callbacks:
//! starting verification for a group and choosing the evidence method.

use teloxide::{Bot, prelude::*, types::{CallbackQuery, ChatId, ParseMode}};
use tracing::{info, debug, warn};

use crate::handlers::messages::send_method_prompt;
use crate::models::verification::VerificationMethod;
use crate::services::verification::BeginOutcome;
use crate::services::ServiceFactory;
use crate::state::session::SessionStep;
use crate::utils::errors::Result;

/// Main callback query dispatcher
pub async fn handle_callback_query(
    bot: Bot,
    query: CallbackQuery,
    services: ServiceFactory,
) -> Result<()> {
    let user_id = query.from.id.0 as i64;

    let Some(data) = query.data.clone() else {
        return Ok(());
    };

    debug!(user_id = user_id, callback_data = %data, "Processing callback query");

    // Answer first to remove the loading state on the button
    if let Err(e) = bot.answer_callback_query(query.id.clone()).await {
        warn!(error = %e, "Failed to answer callback query");
    }

    let parts: Vec<&str> = data.split(':').collect();
    match parts.as_slice() {
        ["start_verification", group_id] => {
            match group_id.parse::<i64>() {
                Ok(group_id) => {
                    handle_start_verification(bot, user_id, group_id, services).await
                }
                Err(_) => {
                    warn!(user_id = user_id, data = %data, "Malformed verification callback");
                    bot.send_message(
                        ChatId(user_id),
                        "❌ Error: the group for verification could not be determined.",
                    )
                    .await?;
                    Ok(())
                }
            }
        }
        ["method", method] => handle_method_selection(bot, user_id, method, services).await,
        _ => {
            warn!(user_id = user_id, data = %data, "Unknown callback data");
            Ok(())
        }
    }
}

/// Enter the verification flow from a "start verification" button
async fn handle_start_verification(
    bot: Bot,
    user_id: i64,
    group_id: i64,
    services: ServiceFactory,
) -> Result<()> {
    info!(user_id = user_id, group_id = group_id, "Verification start requested");

    match services.verification_service.begin(user_id, group_id).await? {
        BeginOutcome::Started { remaining_attempts } => {
            debug!(user_id = user_id, group_id = group_id,
                   remaining_attempts = remaining_attempts, "Flow entered");
            bot.send_message(
                ChatId(user_id),
                "👤 <b>Step 1/4: Enter your full name</b>\n\n\
                 Enter your complete name (surname, given name, patronymic).\n\
                 It must exactly match your documents.\n\n\
                 📝 <b>Example:</b> Ivanov Ivan Ivanovich",
            )
            .parse_mode(ParseMode::Html)
            .await?;
        }
        BeginOutcome::AlreadyVerified => {
            bot.send_message(
                ChatId(user_id),
                "✅ <b>You are already verified</b>\n\nYour status in this group is confirmed.",
            )
            .parse_mode(ParseMode::Html)
            .await?;
        }
        BeginOutcome::AttemptsExhausted => {
            bot.send_message(
                ChatId(user_id),
                "❌ <b>Attempt limit reached</b>\n\n\
                 You have used all verification attempts for this group.\n\
                 Contact an administrator.",
            )
            .parse_mode(ParseMode::Html)
            .await?;
        }
        BeginOutcome::GroupUnavailable => {
            bot.send_message(
                ChatId(user_id),
                "❌ <b>Group not found</b>\n\nThe group does not exist or is inactive.",
            )
            .parse_mode(ParseMode::Html)
            .await?;
        }
    }

    Ok(())
}

/// Record the chosen evidence method and prompt for the evidence itself
async fn handle_method_selection(
    bot: Bot,
    user_id: i64,
    method: &str,
    services: ServiceFactory,
) -> Result<()> {
    let Some(mut session) = services.sessions.load(user_id).await? else {
        debug!(user_id = user_id, "Method callback without an active session");
        bot.send_message(ChatId(user_id), "Use /start to begin verification.")
            .await?;
        return Ok(());
    };

    if session.step != SessionStep::ChoosingVerificationMethod {
        debug!(user_id = user_id, step = ?session.step,
               "Method callback out of order, ignoring");
        return Ok(());
    }

    let method = match method {
        "website" => VerificationMethod::Website,
        "document" => VerificationMethod::Document,
        other => {
            warn!(user_id = user_id, method = %other, "Unknown verification method");
            return Ok(());
        }
    };

    services
        .verification_service
        .choose_method(&mut session, method)
        .await?;

    send_method_prompt(&bot, ChatId(user_id), method).await
}
