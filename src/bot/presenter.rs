//! Outward-facing prompts and status message lifecycle.
//!
//! The user sees a single evolving status line, not a growing log: the
//! choice prompt is deleted when a button is pressed, and the status
//! message is deleted before the result (or a failure notice) is sent.
//! Message deletion is always best-effort; a failed delete never blocks
//! delivery.

use std::path::Path;

use teloxide::prelude::*;
use teloxide::types::{ChatId, InlineKeyboardButton, InlineKeyboardMarkup, InputFile, MessageId};
use tracing::{debug, warn};

use crate::error::AppError;
use crate::pipeline::MediaAction;

/// Prompt shown under the two-button choice keyboard
pub const CHOICE_PROMPT: &str = "What would you like me to do with this link?";

/// Inline keyboard offering exactly the two supported actions.
///
/// Each button payload encodes `{action}:{token}`.
#[must_use]
pub fn choice_keyboard(token: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback(
            "⬇️ Download video",
            format!("{}:{token}", MediaAction::Video.as_str()),
        ),
        InlineKeyboardButton::callback(
            "🎵 Download audio",
            format!("{}:{token}", MediaAction::Audio.as_str()),
        ),
    ]])
}

/// Send the video/audio choice prompt keyed by a correlation token.
///
/// # Errors
///
/// Returns a transport error if the prompt cannot be sent.
pub async fn send_choice_prompt(bot: &Bot, chat_id: ChatId, token: &str) -> Result<(), AppError> {
    bot.send_message(chat_id, CHOICE_PROMPT)
        .reply_markup(choice_keyboard(token))
        .await?;
    Ok(())
}

/// Send a transient status message and return its handle for later
/// replacement.
///
/// # Errors
///
/// Returns a transport error if the message cannot be sent.
pub async fn send_status(bot: &Bot, chat_id: ChatId, text: &str) -> Result<MessageId, AppError> {
    let message = bot.send_message(chat_id, text).await?;
    Ok(message.id)
}

/// Delete a message, logging instead of failing.
///
/// Deletion failures are non-fatal by contract; the common case is a
/// message that was already removed.
pub async fn delete_best_effort(bot: &Bot, chat_id: ChatId, message_id: MessageId) {
    if let Err(e) = bot.delete_message(chat_id, message_id).await {
        debug!(chat = chat_id.0, error = %e, "message deletion failed, continuing");
    }
}

/// Replace the status message with the finished artifact.
///
/// The status message is deleted best-effort first, then the file is sent
/// as a document attachment.
///
/// # Errors
///
/// Returns a transport error if the document cannot be sent.
pub async fn replace_with_result(
    bot: &Bot,
    chat_id: ChatId,
    status_id: MessageId,
    artifact: &Path,
) -> Result<(), AppError> {
    delete_best_effort(bot, chat_id, status_id).await;
    bot.send_document(chat_id, InputFile::file(artifact)).await?;
    Ok(())
}

/// Replace the status message with a short generic failure notice.
///
/// Internal error detail never reaches the chat; only the category text
/// from [`AppError::user_message`] is sent. Transport failures here are
/// logged and swallowed so the pipeline's own error keeps priority.
pub async fn replace_with_error(bot: &Bot, chat_id: ChatId, status_id: MessageId, err: &AppError) {
    delete_best_effort(bot, chat_id, status_id).await;
    if let Err(send_err) = bot.send_message(chat_id, err.user_message()).await {
        warn!(chat = chat_id.0, error = %send_err, "failed to deliver error notice");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use teloxide::types::InlineKeyboardButtonKind;

    #[test]
    fn keyboard_has_two_buttons_with_token_payloads() {
        let keyboard = choice_keyboard("abc123");
        assert_eq!(keyboard.inline_keyboard.len(), 1);

        let row = &keyboard.inline_keyboard[0];
        assert_eq!(row.len(), 2);

        let payloads: Vec<&str> = row
            .iter()
            .map(|button| match &button.kind {
                InlineKeyboardButtonKind::CallbackData(data) => data.as_str(),
                other => panic!("unexpected button kind: {other:?}"),
            })
            .collect();

        assert_eq!(payloads, vec!["download_video:abc123", "download_audio:abc123"]);
    }
}
