//! Inbound update classification and per-request dispatch.
//!
//! Every update arrives on its own dispatcher task. Plain text becomes a
//! correlation token and a choice prompt; a button press resolves the token
//! and spawns an independent pipeline run gated by the shared semaphore, so
//! long downloads never block the event loop or other users.

use std::sync::Arc;

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::CallbackQuery;
use teloxide::utils::command::BotCommands;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::bot::presenter;
use crate::error::AppError;
use crate::pipeline::{ArtifactSet, MediaAction, MediaPipeline, PipelineRequest};
use crate::token_store::TokenStore;
use crate::utils::{canonicalize_url, truncate_str};

/// Greeting for /start
const GREETING: &str =
    "Hi! Send me a video link and I will download it for you as video or audio.";

/// Response to anything that is not a link or a known command
const FALLBACK_RESPONSE: &str =
    "I don't understand that command. Please send me a video link.";

/// Supported commands for the bot
#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum Command {
    /// Start the bot and show welcome message
    #[command(description = "Start the bot.")]
    Start,
}

/// Split a callback payload into its action and token.
///
/// The payload must be exactly `{action}:{token}` with a known action and a
/// non-empty token.
///
/// # Errors
///
/// Returns `MalformedCallback` for any other shape.
pub fn parse_callback_payload(data: &str) -> Result<(MediaAction, &str), AppError> {
    let (action_name, token) = data
        .split_once(':')
        .ok_or_else(|| AppError::MalformedCallback(data.to_string()))?;

    let action = MediaAction::from_callback_name(action_name)
        .ok_or_else(|| AppError::MalformedCallback(data.to_string()))?;

    if token.is_empty() {
        return Err(AppError::MalformedCallback(data.to_string()));
    }

    Ok((action, token))
}

/// Command handler.
///
/// # Errors
///
/// Returns an error if the response cannot be sent.
pub async fn handle_command(bot: Bot, msg: Message, cmd: Command) -> Result<()> {
    match cmd {
        Command::Start => {
            info!(chat = msg.chat.id.0, "start command");
            bot.send_message(msg.chat.id, GREETING).await?;
        }
    }
    Ok(())
}

/// Plain-text handler: treat the message as a candidate URL.
///
/// Unrecognized slash-commands get the fixed fallback; unusable text gets a
/// prompt for a valid link; a usable URL gets a token and the choice prompt.
///
/// # Errors
///
/// Returns an error if a response cannot be sent.
pub async fn handle_text(bot: Bot, msg: Message, store: Arc<TokenStore>) -> Result<()> {
    let text = msg.text().unwrap_or_default();
    let chat_id = msg.chat.id;

    if text.starts_with('/') {
        bot.send_message(chat_id, FALLBACK_RESPONSE).await?;
        return Ok(());
    }

    match canonicalize_url(text) {
        Ok(url) => {
            let token = store.issue(&url).await;
            info!(chat = chat_id.0, token = %token, url = %url, "issued correlation token");
            presenter::send_choice_prompt(&bot, chat_id, &token).await?;
        }
        Err(err) => {
            info!(
                chat = chat_id.0,
                text = %truncate_str(text, 80),
                "rejected message without usable url"
            );
            bot.send_message(chat_id, err.user_message()).await?;
        }
    }
    Ok(())
}

/// Button-press handler: resolve the token and spawn a pipeline run.
///
/// Malformed payloads and unknown tokens are reported to the user and never
/// create a run. The run itself executes on its own task, gated by the
/// semaphore, and does not block processing of further updates.
///
/// # Errors
///
/// Returns an error if a response cannot be sent.
pub async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    store: Arc<TokenStore>,
    pipeline: Arc<MediaPipeline>,
    limiter: Arc<Semaphore>,
) -> Result<()> {
    // Stop the button spinner regardless of what happens next.
    let _ = bot.answer_callback_query(q.id.clone()).await;

    let Some(data) = q.data.as_deref() else {
        return Ok(());
    };
    let Some(message) = q.message.as_ref() else {
        warn!("callback query without originating message");
        return Ok(());
    };
    let chat_id = message.chat().id;
    let prompt_id = message.id();

    let (action, token) = match parse_callback_payload(data) {
        Ok(parts) => parts,
        Err(err) => {
            warn!(chat = chat_id.0, payload = %truncate_str(data, 80), "malformed callback payload");
            bot.send_message(chat_id, err.user_message()).await?;
            return Ok(());
        }
    };

    let Some(url) = store.resolve(token).await else {
        info!(chat = chat_id.0, token = %token, "correlation token not found or evicted");
        let err = AppError::TokenNotFound(token.to_string());
        bot.send_message(chat_id, err.user_message()).await?;
        return Ok(());
    };

    presenter::delete_best_effort(&bot, chat_id, prompt_id).await;
    let status_id = presenter::send_status(&bot, chat_id, action.status_text()).await?;

    let request = PipelineRequest {
        chat_id,
        url,
        action,
        status_msg: status_id,
    };

    info!(chat = chat_id.0, action = action.as_str(), "dispatching pipeline run");
    tokio::spawn(async move {
        let Ok(_permit) = limiter.acquire_owned().await else {
            // Semaphore closed only on shutdown.
            return;
        };
        run_request(bot, pipeline, request).await;
    });

    Ok(())
}

/// Drive one request to completion: download → (extract) → deliver,
/// then remove every artifact regardless of the outcome.
pub async fn run_request(bot: Bot, pipeline: Arc<MediaPipeline>, request: PipelineRequest) {
    let artifacts = pipeline.new_artifacts();

    match execute_request(&bot, &pipeline, &request, &artifacts).await {
        Ok(()) => info!(chat = request.chat_id.0, "pipeline run finished"),
        Err(err) => {
            warn!(chat = request.chat_id.0, error = %err, "pipeline run failed");
            presenter::replace_with_error(&bot, request.chat_id, request.status_msg, &err).await;
        }
    }

    pipeline.cleanup(&artifacts).await;
}

async fn execute_request(
    bot: &Bot,
    pipeline: &MediaPipeline,
    request: &PipelineRequest,
    artifacts: &ArtifactSet,
) -> Result<(), AppError> {
    pipeline.download(&request.url, artifacts).await?;

    let deliver = match request.action {
        MediaAction::Video => artifacts.video.as_path(),
        MediaAction::Audio => {
            pipeline.extract_audio(artifacts).await?;
            artifacts.audio.as_path()
        }
    };

    presenter::replace_with_result(bot, request.chat_id, request.status_msg, deliver).await
}
