//! Error taxonomy for the request pipeline.
//!
//! Internal detail stays in logs; users only ever see the generic category
//! text from [`AppError::user_message`].

use thiserror::Error;

/// All failure modes of a single user request
#[derive(Debug, Error)]
pub enum AppError {
    /// Message text could not be parsed as an http(s) URL
    #[error("invalid input, no usable url: {0}")]
    InvalidInput(String),

    /// Callback payload did not split into `{action}:{token}`
    #[error("malformed callback payload: {0}")]
    MalformedCallback(String),

    /// Correlation token unknown or already evicted
    #[error("correlation token not found: {0}")]
    TokenNotFound(String),

    /// The fetch step (yt-dlp) failed
    #[error("download failed: {0}")]
    Download(String),

    /// Re-encoding the fetched file failed
    #[error("transcode failed: {0}")]
    Transcode(String),

    /// Producing the audio-only file failed
    #[error("audio extraction failed: {0}")]
    Extraction(String),

    /// Telegram API call failed
    #[error("transport error: {0}")]
    Transport(#[from] teloxide::RequestError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Generic user-facing text for this error category.
    ///
    /// Never echoes internal error detail back to the chat.
    #[must_use]
    pub const fn user_message(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "Please send a valid video link.",
            Self::MalformedCallback(_) => "Invalid request.",
            Self::TokenNotFound(_) => "Data not found. Please send the link again.",
            Self::Download(_) => "Download failed. Please try again later.",
            Self::Transcode(_) => "Video processing failed. Please try again later.",
            Self::Extraction(_) => "Audio extraction failed. Please try again later.",
            Self::Transport(_) | Self::Io(_) => "Something went wrong. Please try again later.",
        }
    }
}
