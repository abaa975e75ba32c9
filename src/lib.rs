//! Telegram bot that relays media links to yt-dlp/ffmpeg.
//!
//! A user sends a link, picks "video" or "audio" from an inline keyboard,
//! and receives the downloaded (and, for audio, extracted) file. Callback
//! payloads carry short correlation tokens instead of full URLs; the token
//! store maps them back and is flushed on a fixed schedule.

pub mod bot;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod token_store;
pub mod utils;
