use std::sync::Arc;

use dotenvy::dotenv;
use media_fetch_bot::bot::handlers::{self, Command};
use media_fetch_bot::config::Settings;
use media_fetch_bot::pipeline::MediaPipeline;
use media_fetch_bot::token_store::TokenStore;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::CallbackQuery;
use tokio::sync::Semaphore;
use tracing::{error, info};
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() {
    // Load .env file
    dotenv().ok();

    init_logging();

    info!("Starting media fetch bot...");

    let settings = init_settings();

    let bot = Bot::new(settings.telegram_token.clone());

    let store = Arc::new(TokenStore::new());
    let pipeline = Arc::new(MediaPipeline::new(
        settings.download_dir(),
        settings.command_timeout(),
    ));
    let limiter = Arc::new(Semaphore::new(settings.max_concurrent_downloads()));

    if let Err(e) = pipeline.ensure_workdir().await {
        error!("Failed to create download directory: {e}");
        std::process::exit(1);
    }

    // Scheduled full flush of the correlation token store.
    let _eviction = store.clone().spawn_eviction(settings.token_flush_interval());

    info!("Bot is running...");

    Dispatcher::builder(bot, setup_handler())
        .dependencies(dptree::deps![store, pipeline, limiter])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_settings() -> Arc<Settings> {
    match Settings::new() {
        Ok(s) => {
            info!("Configuration loaded successfully.");
            Arc::new(s)
        }
        Err(e) => {
            error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    }
}

fn setup_handler() -> UpdateHandler<teloxide::RequestError> {
    dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handle_callback_update))
        .branch(
            Update::filter_message()
                .branch(
                    dptree::entry()
                        .filter_command::<Command>()
                        .endpoint(handle_command_update),
                )
                .branch(
                    Update::filter_message()
                        .filter(|msg: Message| msg.text().is_some())
                        .endpoint(handle_text_update),
                ),
        )
}

async fn handle_command_update(
    bot: Bot,
    msg: Message,
    cmd: Command,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = handlers::handle_command(bot, msg, cmd).await {
        error!("Command handler error: {e}");
    }
    respond(())
}

async fn handle_text_update(
    bot: Bot,
    msg: Message,
    store: Arc<TokenStore>,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = handlers::handle_text(bot, msg, store).await {
        error!("Text handler error: {e}");
    }
    respond(())
}

async fn handle_callback_update(
    bot: Bot,
    q: CallbackQuery,
    store: Arc<TokenStore>,
    pipeline: Arc<MediaPipeline>,
    limiter: Arc<Semaphore>,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = handlers::handle_callback(bot, q, store, pipeline, limiter).await {
        error!("Callback handler error: {e}");
    }
    respond(())
}
