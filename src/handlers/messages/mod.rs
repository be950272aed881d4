//! Message handlers module
//!
//! The unified message gate for moderated groups plus the private-chat input
//! routing for the verification conversation. Every exemption (bots,
//! commands, admins, whitelist) short-circuits before the record lookup; the
//! blocking predicate itself lives in `services::gate`.

use teloxide::{Bot, prelude::*, types::{ChatId, Message, ParseMode, UserId}, net::Download};
use tracing::{info, debug, warn, error};

use crate::config::settings::Settings;
use crate::models::verification::VerificationMethod;
use crate::services::gate::{self, GateDecision};
use crate::services::verification::VerificationOutcome;
use crate::services::ServiceFactory;
use crate::state::session::{DocumentEvidence, SessionStep, VerificationSession};
use crate::utils::errors::Result;
use crate::utils::logging::log_gate_block;
use crate::utils::validators;

/// Handle an incoming non-command message
pub async fn handle_message(
    bot: Bot,
    msg: Message,
    services: ServiceFactory,
    settings: Settings,
) -> Result<()> {
    let Some(user) = msg.from.clone() else {
        return Ok(());
    };

    if msg.chat.id.is_user() {
        handle_private_message(bot, msg, user.id.0 as i64, services).await
    } else {
        handle_group_message(bot, msg, user, services, settings).await
    }
}

/// The message gate: decide allow / delete / delete+warn / delete+ban for a
/// message in a moderated group. First match wins.
async fn handle_group_message(
    bot: Bot,
    msg: Message,
    user: teloxide::types::User,
    services: ServiceFactory,
    settings: Settings,
) -> Result<()> {
    // Service messages (joins, leaves, pins) are not user content
    if msg.new_chat_members().is_some()
        || msg.left_chat_member().is_some()
        || msg.pinned_message().is_some()
    {
        return Ok(());
    }

    let user_id = user.id.0 as i64;
    let group_id = msg.chat.id.0;

    let group = match services.database().groups.find_by_id(group_id).await? {
        Some(group) if group.is_active => group,
        _ => {
            debug!(group_id = group_id, "Message in a group the bot does not moderate");
            return Ok(());
        }
    };

    // Bots (including the anonymous-admin identity) are never gated
    if user.is_bot {
        return Ok(());
    }

    // Commands pass through to the command layer untouched
    if msg.text().map(|t| t.starts_with('/')).unwrap_or(false) {
        return Ok(());
    }

    if settings.bot.admin_ids.contains(&user_id) {
        debug!(user_id = user_id, "Global admin exempt from gating");
        return Ok(());
    }

    match bot.get_chat_member(msg.chat.id, user.id).await {
        Ok(member) if member.kind.is_privileged() => {
            debug!(user_id = user_id, "Group admin exempt from gating");
            return Ok(());
        }
        Ok(_) => {}
        Err(e) => {
            debug!(user_id = user_id, error = %e, "Could not check admin status, continuing");
        }
    }

    // Evidence must never be exposed to the group: input sent mid-flow into a
    // group chat is removed and the user is redirected to the private chat.
    if let Some(session) = services.sessions.load(user_id).await? {
        if let Err(e) = bot.delete_message(msg.chat.id, msg.id).await {
            warn!(user_id = user_id, error = %e, "Failed to delete mid-flow group message");
        }
        info!(user_id = user_id, group_id = group_id, step = ?session.step,
              "Deleted group message sent during an active verification");
        if let Err(e) = bot
            .send_message(
                ChatId(user_id),
                "⚠️ <b>Verification happens in private messages</b>\n\n\
                 Please continue here, in the private chat with the bot.",
            )
            .parse_mode(ParseMode::Html)
            .await
        {
            debug!(user_id = user_id, error = %e, "Failed to redirect user privately");
        }
        return Ok(());
    }

    let username = user.username.as_deref();
    if services
        .whitelist_service
        .is_whitelisted(user_id, username, group_id)
        .await?
    {
        services.whitelist_service.auto_verify(user_id, group_id).await?;
        debug!(user_id = user_id, group_id = group_id, "Whitelisted sender allowed");
        return Ok(());
    }

    if services.cache.is_verified(user_id, group_id) {
        return Ok(());
    }

    let record = match services.database().verifications.find(user_id, group_id).await? {
        Some(record) => record,
        None => {
            // First observed interaction is a message: this account predates
            // the bot, so it gets the lenient pre-existing policy.
            let record = services
                .database()
                .verifications
                .create_for_existing_member(user_id, group_id)
                .await?;
            debug!(user_id = user_id, group_id = group_id,
                   "Created record for pre-existing member");
            record
        }
    };

    if record.verified {
        services.cache.mark_verified(user_id, group_id);
        return Ok(());
    }

    match gate::evaluate(&record, group.checkin_mode) {
        GateDecision::Allow => Ok(()),
        GateDecision::Block(reason) => {
            if let Err(e) = bot.delete_message(msg.chat.id, msg.id).await {
                error!(user_id = user_id, group_id = group_id, error = %e,
                       "Failed to delete blocked message");
            }

            let offense_count = services.database().offenses.increment(user_id, group_id).await?;
            log_gate_block(group_id, user_id, reason.as_str(), offense_count);

            if gate::spam_ban_due(
                offense_count,
                settings.verification.spam_message_threshold,
                settings.features.spam_protection,
            ) {
                ban_and_purge(&bot, &services, user_id, group_id).await;
                return Ok(());
            }

            let display_name = user
                .username
                .as_ref()
                .map(|u| format!("@{}", u))
                .unwrap_or_else(|| user.first_name.clone());
            if let Err(e) = services
                .notification_service
                .send_verification_reminder(group_id, user_id, &display_name, &group.group_name)
                .await
            {
                error!(user_id = user_id, group_id = group_id, error = %e,
                       "Failed to send verification reminder");
            }

            Ok(())
        }
    }
}

/// Ban a spamming unverified user and purge their verification data
async fn ban_and_purge(bot: &Bot, services: &ServiceFactory, user_id: i64, group_id: i64) {
    match bot
        .ban_chat_member(ChatId(group_id), UserId(user_id as u64))
        .await
    {
        Ok(_) => {
            warn!(user_id = user_id, group_id = group_id,
                  "User banned for repeated unverified messages");

            if let Err(e) = services.database().verifications.delete(user_id, group_id).await {
                error!(user_id = user_id, group_id = group_id, error = %e,
                       "Failed to purge verification record after ban");
            }
            if let Err(e) = services.database().offenses.reset(user_id, group_id).await {
                error!(user_id = user_id, group_id = group_id, error = %e,
                       "Failed to reset offense counter after ban");
            }
            services.cache.invalidate_verified(user_id, group_id);
            services.scheduler.cancel(user_id, group_id);
        }
        Err(e) => {
            error!(user_id = user_id, group_id = group_id, error = %e, "Failed to ban user");
        }
    }
}

/// Route private messages into the verification conversation
async fn handle_private_message(
    bot: Bot,
    msg: Message,
    user_id: i64,
    services: ServiceFactory,
) -> Result<()> {
    let Some(mut session) = services.sessions.load(user_id).await? else {
        // No active conversation: point the user at /start
        if msg.text().map(|t| !t.starts_with('/')).unwrap_or(false) {
            bot.send_message(
                msg.chat.id,
                "Use /start to begin verification for your group.",
            )
            .await?;
        }
        return Ok(());
    };

    debug!(user_id = user_id, step = ?session.step, "Routing conversation input");

    match session.step {
        SessionStep::EnteringFullName => {
            handle_full_name_input(bot, msg, &mut session, services).await
        }
        SessionStep::EnteringWorkplace => {
            handle_workplace_input(bot, msg, &mut session, services).await
        }
        SessionStep::ChoosingVerificationMethod => {
            bot.send_message(
                msg.chat.id,
                "Please choose a verification method using the buttons above.",
            )
            .await?;
            Ok(())
        }
        SessionStep::EnteringWebsiteUrl => {
            handle_website_url_input(bot, msg, &mut session, services).await
        }
        SessionStep::UploadingDocument => {
            handle_document_input(bot, msg, &mut session, services).await
        }
        SessionStep::ProcessingVerification => {
            bot.send_message(
                msg.chat.id,
                "⏳ Your verification is being processed, please wait.",
            )
            .await?;
            Ok(())
        }
    }
}

async fn handle_full_name_input(
    bot: Bot,
    msg: Message,
    session: &mut VerificationSession,
    services: ServiceFactory,
) -> Result<()> {
    let Some(text) = msg.text() else {
        bot.send_message(msg.chat.id, "❌ Please enter your full name as text:")
            .await?;
        return Ok(());
    };

    let full_name = text.trim().to_string();
    if let Err(e) = validators::validate_full_name(&full_name) {
        bot.send_message(
            msg.chat.id,
            format!("❌ <b>Validation error:</b> {}\n\nTry again. Enter your full name:", e),
        )
        .parse_mode(ParseMode::Html)
        .await?;
        return Ok(());
    }

    services
        .verification_service
        .submit_full_name(session, full_name)
        .await?;

    bot.send_message(
        msg.chat.id,
        "🏥 <b>Step 2/4: Your workplace</b>\n\n\
         Enter the full name of the medical organization where you work.\n\n\
         📝 <b>Examples:</b>\n\
         • City Hospital No. 1\n\
         • Health Medical Center LLC\n\
         • Institute of Cardiology",
    )
    .parse_mode(ParseMode::Html)
    .await?;

    Ok(())
}

async fn handle_workplace_input(
    bot: Bot,
    msg: Message,
    session: &mut VerificationSession,
    services: ServiceFactory,
) -> Result<()> {
    let Some(text) = msg.text() else {
        bot.send_message(msg.chat.id, "❌ Please enter your workplace as text:")
            .await?;
        return Ok(());
    };

    let workplace = text.trim().to_string();
    if let Err(e) = validators::validate_workplace(&workplace) {
        bot.send_message(
            msg.chat.id,
            format!("❌ <b>Validation error:</b> {}\n\nTry again. Enter your workplace:", e),
        )
        .parse_mode(ParseMode::Html)
        .await?;
        return Ok(());
    }

    services
        .verification_service
        .submit_workplace(session, workplace)
        .await?;

    let keyboard = teloxide::types::InlineKeyboardMarkup::new(vec![
        vec![teloxide::types::InlineKeyboardButton::callback(
            "🌐 My organization has a website",
            "method:website",
        )],
        vec![teloxide::types::InlineKeyboardButton::callback(
            "📄 No website, upload a document",
            "method:document",
        )],
    ]);

    bot.send_message(
        msg.chat.id,
        "🔍 <b>Step 3/4: Choose a verification method</b>\n\n\
         🌐 <b>Website lookup</b> (recommended)\n\
         • Fast check, high accuracy\n\
         • Works if your organization has an official site\n\n\
         📄 <b>Document upload</b>\n\
         • Diploma, certificate or employment credential\n\
         • Works if the organization has no website",
    )
    .parse_mode(ParseMode::Html)
    .reply_markup(keyboard)
    .await?;

    Ok(())
}

async fn handle_website_url_input(
    bot: Bot,
    msg: Message,
    session: &mut VerificationSession,
    services: ServiceFactory,
) -> Result<()> {
    let Some(text) = msg.text() else {
        bot.send_message(msg.chat.id, "❌ Please enter the website URL as text:")
            .await?;
        return Ok(());
    };

    let normalized = match validators::validate_website_url(text) {
        Ok(url) => url,
        Err(e) => {
            bot.send_message(
                msg.chat.id,
                format!("❌ <b>URL validation error:</b> {}\n\nTry again. Enter the website URL:", e),
            )
            .parse_mode(ParseMode::Html)
            .await?;
            return Ok(());
        }
    };

    services
        .verification_service
        .submit_website_url(session, normalized)
        .await?;

    bot.send_message(
        msg.chat.id,
        "⏳ <b>Processing verification...</b>\n\nPlease wait, this can take 1-3 minutes.",
    )
    .parse_mode(ParseMode::Html)
    .await?;

    let outcome = services.verification_service.process(session, None).await?;
    report_outcome(&bot, msg.chat.id, outcome).await
}

async fn handle_document_input(
    bot: Bot,
    msg: Message,
    session: &mut VerificationSession,
    services: ServiceFactory,
) -> Result<()> {
    let max_bytes = services.verification_service.max_file_size_bytes();
    let max_mb = services.verification_service.max_file_size_mb();

    let evidence = if let Some(photos) = msg.photo() {
        // Largest photo size carries the readable rendition
        let Some(photo) = photos.last() else {
            return Ok(());
        };
        if let Err(e) = validators::validate_file_size(photo.file.size, max_bytes, max_mb) {
            bot.send_message(msg.chat.id, format!("❌ <b>{}</b>", e))
                .parse_mode(ParseMode::Html)
                .await?;
            return Ok(());
        }
        DocumentEvidence {
            file_id: photo.file.id.clone(),
            mime_type: None,
        }
    } else if let Some(document) = msg.document() {
        let mime_type = document
            .mime_type
            .as_ref()
            .map(|m| m.to_string())
            .unwrap_or_default();
        if let Err(e) = validators::validate_file_type(
            &mime_type,
            services.verification_service.allowed_file_types(),
        ) {
            bot.send_message(msg.chat.id, format!("❌ <b>{}</b>", e))
                .parse_mode(ParseMode::Html)
                .await?;
            return Ok(());
        }
        if let Err(e) =
            validators::validate_file_size(document.file.size, max_bytes, max_mb)
        {
            bot.send_message(msg.chat.id, format!("❌ <b>{}</b>", e))
                .parse_mode(ParseMode::Html)
                .await?;
            return Ok(());
        }
        DocumentEvidence {
            file_id: document.file.id.clone(),
            mime_type: Some(mime_type),
        }
    } else {
        bot.send_message(
            msg.chat.id,
            "❌ <b>Unsupported message type</b>\n\n\
             Please send the document as:\n\
             • a photo (JPEG, PNG)\n\
             • a file (PDF)\n\n\
             Text messages are not accepted at this step.",
        )
        .parse_mode(ParseMode::Html)
        .await?;
        return Ok(());
    };

    let file_id = evidence.file_id.clone();
    services
        .verification_service
        .submit_document(session, evidence)
        .await?;

    bot.send_message(
        msg.chat.id,
        "⏳ <b>Processing verification...</b>\n\nPlease wait, this can take 1-3 minutes.",
    )
    .parse_mode(ParseMode::Html)
    .await?;

    // Pull the evidence bytes down before handing them to the adjudicator
    let bytes = match download_document(&bot, file_id).await {
        Ok(bytes) => bytes,
        Err(e) => {
            error!(user_id = session.user_id, error = %e, "Failed to download evidence file");
            services.verification_service.abort_session(session).await?;
            bot.send_message(
                msg.chat.id,
                "❌ <b>Could not read the uploaded file</b>\n\n\
                 A technical error occurred. Use /start to try again.",
            )
            .parse_mode(ParseMode::Html)
            .await?;
            return Ok(());
        }
    };

    let outcome = services
        .verification_service
        .process(session, Some(bytes))
        .await?;
    report_outcome(&bot, msg.chat.id, outcome).await
}

async fn download_document(bot: &Bot, file_id: String) -> Result<Vec<u8>> {
    let file = bot.get_file(file_id).await?;
    let mut buffer = std::io::Cursor::new(Vec::new());
    bot.download_file(&file.path, &mut buffer).await?;
    Ok(buffer.into_inner())
}

async fn report_outcome(bot: &Bot, chat_id: ChatId, outcome: VerificationOutcome) -> Result<()> {
    let text = match outcome {
        VerificationOutcome::Approved => {
            "🎉 <b>Verification completed successfully!</b>".to_string()
        }
        VerificationOutcome::Rejected { remaining_attempts } => {
            let mut text = "❌ <b>Verification failed</b>".to_string();
            if remaining_attempts > 0 {
                text.push_str(&format!(
                    "\n\n🔄 Use /start to try again ({} attempts left)",
                    remaining_attempts
                ));
            } else {
                text.push_str("\n\nYou have no attempts left. Contact an administrator.");
            }
            text
        }
        VerificationOutcome::Errored { remaining_attempts } => {
            let mut text = "❌ <b>Verification processing error</b>\n\n\
                 A technical error occurred while checking your evidence."
                .to_string();
            if remaining_attempts > 0 {
                text.push_str("\n\n🔄 Use /start to try again later.");
            }
            text
        }
    };

    bot.send_message(chat_id, text)
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

/// Called from the callback layer after a method is chosen, so the prompts
/// live next to the other step prompts.
pub async fn send_method_prompt(
    bot: &Bot,
    chat_id: ChatId,
    method: VerificationMethod,
) -> Result<()> {
    let text = match method {
        VerificationMethod::Website => {
            "🌐 <b>Step 4/4: Your organization's website</b>\n\n\
             Enter the URL of your medical organization's official website.\n\n\
             📝 <b>Examples:</b>\n\
             • hospital1.ru\n\
             • medcenter-health.com\n\
             • https://cardio-institute.org\n\n\
             💡 <b>Hint:</b> with or without https:// both work"
        }
        VerificationMethod::Document => {
            "📄 <b>Step 4/4: Upload a document</b>\n\n\
             Upload a photo or scan of one of these documents:\n\n\
             ✅ <b>Accepted documents:</b>\n\
             • Medical education diploma\n\
             • Specialist certificate\n\
             • Employment credential\n\
             • Physician license\n\n\
             📋 <b>Requirements:</b>\n\
             • Format: JPEG, PNG or PDF\n\
             • Size: up to 20 MB\n\
             • Text clearly readable\n\
             • The document must carry your full name\n\n\
             📤 Send the document as a photo or file:"
        }
    };

    bot.send_message(chat_id, text)
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}
