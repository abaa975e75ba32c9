//! End-to-end flow over the non-transport core: URL cleanup, token
//! issuance, callback payload parsing, and eviction semantics.

use std::sync::Arc;
use std::time::Duration;

use media_fetch_bot::bot::handlers::{parse_callback_payload, run_request};
use media_fetch_bot::bot::presenter::choice_keyboard;
use media_fetch_bot::pipeline::{MediaAction, MediaPipeline, PipelineRequest};
use media_fetch_bot::token_store::TokenStore;
use media_fetch_bot::utils::canonicalize_url;
use teloxide::types::{ChatId, InlineKeyboardButtonKind, MessageId};
use teloxide::Bot;
use uuid::Uuid;

#[tokio::test]
async fn text_to_button_press_round_trip() {
    let store = TokenStore::new();

    // Inbound plain text with tracking params attached.
    let url = canonicalize_url("https://x.test/v?ref=1").expect("usable url");
    assert_eq!(url, "https://x.test/v");

    let token = store.issue(&url).await;

    // The choice prompt embeds the token into both button payloads.
    let keyboard = choice_keyboard(&token);
    let row = &keyboard.inline_keyboard[0];
    let audio_payload = match &row[1].kind {
        InlineKeyboardButtonKind::CallbackData(data) => data.clone(),
        other => panic!("unexpected button kind: {other:?}"),
    };

    // Pressing "download audio" resolves back to the canonical URL.
    let (action, pressed_token) = parse_callback_payload(&audio_payload).expect("valid payload");
    assert_eq!(action, MediaAction::Audio);
    assert_eq!(store.resolve(pressed_token).await.as_deref(), Some(url.as_str()));
}

#[tokio::test]
async fn evicted_token_is_reported_missing() {
    let store = TokenStore::new();
    let url = canonicalize_url("https://x.test/v").expect("usable url");
    let token = store.issue(&url).await;

    store.evict_all().await;

    // A press after the flush resolves to nothing and must not be a fault.
    assert!(store.resolve(&token).await.is_none());
}

#[tokio::test]
async fn failed_run_leaves_no_artifacts_behind() {
    let scratch = std::env::temp_dir().join(format!("fetch-run-{}", Uuid::new_v4()));
    tokio::fs::create_dir_all(&scratch).await.expect("scratch dir");

    let pipeline = Arc::new(MediaPipeline::new(scratch.clone(), Duration::from_secs(10)));
    let bot = Bot::new("0000000000:TEST");
    let request = PipelineRequest {
        chat_id: ChatId(1),
        url: "https://127.0.0.1:9/video".to_string(),
        action: MediaAction::Audio,
        status_msg: MessageId(1),
    };

    // The fetch fails (nothing listens there); the error notice send fails
    // too and is swallowed. Cleanup must still run.
    run_request(bot, pipeline, request).await;

    let mut entries = tokio::fs::read_dir(&scratch).await.expect("read scratch");
    assert!(
        entries.next_entry().await.expect("scan scratch").is_none(),
        "failed run left artifacts behind"
    );

    tokio::fs::remove_dir(&scratch).await.expect("remove scratch");
}

#[tokio::test]
async fn concurrent_chats_never_cross_resolve() {
    let store = Arc::new(TokenStore::new());

    let a = {
        let store = store.clone();
        tokio::spawn(async move { store.issue("https://x.test/a").await })
    };
    let b = {
        let store = store.clone();
        tokio::spawn(async move { store.issue("https://x.test/b").await })
    };

    let token_a = a.await.expect("task a");
    let token_b = b.await.expect("task b");

    assert_eq!(store.resolve(&token_a).await.as_deref(), Some("https://x.test/a"));
    assert_eq!(store.resolve(&token_b).await.as_deref(), Some("https://x.test/b"));
}

#[test]
fn garbage_payload_never_creates_a_run() {
    // The dispatcher refuses these before any pipeline work starts.
    assert!(parse_callback_payload("bogus").is_err());
    assert!(parse_callback_payload(":abc").is_err());
    assert!(parse_callback_payload("download_video:").is_err());
}
