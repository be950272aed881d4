//! MedGuard Telegram Bot
//!
//! Main application entry point

use std::sync::Arc;
use teloxide::{prelude::*, types::Update};
use teloxide::dispatching::UpdateHandler;
use tracing::{info, warn, error};

use MedGuard::{
    config::Settings,
    utils::logging,
    database::{DatabaseService, connection::create_pool},
    services::ServiceFactory,
    state::SessionStorage,
    handlers::{
        commands::{Command, handle_command},
        callbacks::handle_callback_query,
        messages::handle_message,
        members::{handle_chat_member_update, handle_bot_membership_update},
    },
};

type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    // Load configuration
    let settings = Settings::new()?;
    settings.validate()?;

    // Initialize logging
    logging::init_logging(&settings.logging)?;

    info!("Starting MedGuard Telegram Bot...");

    // Initialize database connection
    info!("Connecting to database...");
    let db_config = MedGuard::database::connection::DatabaseConfig {
        url: settings.database.url.clone(),
        max_connections: settings.database.max_connections,
        min_connections: settings.database.min_connections,
        acquire_timeout: std::time::Duration::from_secs(30),
        idle_timeout: Some(std::time::Duration::from_secs(600)),
        max_lifetime: Some(std::time::Duration::from_secs(1800)),
    };
    let db_pool = create_pool(&db_config).await?;

    // Run database migrations
    info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(&db_pool).await?;

    // Initialize Redis-backed session storage
    info!("Connecting to Redis...");
    let sessions = SessionStorage::new(settings.redis.clone()).await?;
    sessions.test_connection().await?;

    // Initialize database service
    let database_service = DatabaseService::new(db_pool);

    // Initialize bot
    let bot = Bot::new(&settings.bot.token);

    // Initialize services
    info!("Initializing services...");
    let services = ServiceFactory::new(
        bot.clone(),
        settings.clone(),
        database_service,
        sessions,
    )?;

    info!("Setting up bot handlers...");

    let services_arc = Arc::new(services);
    let settings_arc = Arc::new(settings);

    let handler = create_handler();

    let mut dispatcher = Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![services_arc, settings_arc])
        .default_handler(|upd| async move {
            warn!("Unhandled update: {:?}", upd);
        })
        .enable_ctrlc_handler()
        .build();

    info!("MedGuard bot is ready!");
    dispatcher.dispatch().await;

    info!("MedGuard bot has been shut down.");

    Ok(())
}

/// Create the main update handler
fn create_handler() -> UpdateHandler<Box<dyn std::error::Error + Send + Sync + 'static>> {
    use teloxide::dispatching::UpdateFilterExt;

    dptree::entry()
        .branch(
            Update::filter_message()
                .branch(
                    // Handle commands
                    dptree::entry()
                        .filter_command::<Command>()
                        .endpoint(handle_commands),
                )
                .branch(
                    // Handle all other messages through the gate
                    dptree::endpoint(handle_messages),
                ),
        )
        .branch(
            // Handle callback queries
            Update::filter_callback_query().endpoint(handle_callbacks),
        )
        .branch(
            // Handle member transitions in moderated groups
            Update::filter_chat_member().endpoint(handle_member_updates),
        )
        .branch(
            // Handle the bot's own membership changes (group registration)
            Update::filter_my_chat_member().endpoint(handle_bot_updates),
        )
}

/// Handle bot commands
async fn handle_commands(
    bot: Bot,
    msg: Message,
    cmd: Command,
    services: Arc<ServiceFactory>,
    settings: Arc<Settings>,
) -> HandlerResult {
    let services = (*services).clone();
    let settings = (*settings).clone();

    if let Err(e) = handle_command(bot, msg, cmd, services, settings).await {
        error!(error = %e, "Error handling command");
        return Err(e.into());
    }

    Ok(())
}

/// Handle regular messages
async fn handle_messages(
    bot: Bot,
    msg: Message,
    services: Arc<ServiceFactory>,
    settings: Arc<Settings>,
) -> HandlerResult {
    let services = (*services).clone();
    let settings = (*settings).clone();

    if let Err(e) = handle_message(bot, msg, services, settings).await {
        error!(error = %e, "Error handling message");
        return Err(e.into());
    }

    Ok(())
}

/// Handle callback queries
async fn handle_callbacks(
    bot: Bot,
    query: teloxide::types::CallbackQuery,
    services: Arc<ServiceFactory>,
) -> HandlerResult {
    let services = (*services).clone();

    if let Err(e) = handle_callback_query(bot, query, services).await {
        error!(error = %e, "Error handling callback query");
        return Err(e.into());
    }

    Ok(())
}

/// Handle chat member updates for ordinary users
async fn handle_member_updates(
    bot: Bot,
    update: teloxide::types::ChatMemberUpdated,
    services: Arc<ServiceFactory>,
    settings: Arc<Settings>,
) -> HandlerResult {
    let services = (*services).clone();
    let settings = (*settings).clone();

    if let Err(e) = handle_chat_member_update(bot, update, services, settings).await {
        error!(error = %e, "Error handling chat member update");
        return Err(e.into());
    }

    Ok(())
}

/// Handle the bot's own membership updates (added/removed/promoted in groups)
async fn handle_bot_updates(
    update: teloxide::types::ChatMemberUpdated,
    services: Arc<ServiceFactory>,
) -> HandlerResult {
    let services = (*services).clone();

    if let Err(e) = handle_bot_membership_update(update, services).await {
        error!(error = %e, "Error handling bot membership update");
        return Err(e.into());
    }

    Ok(())
}
