//! Correlation token store for inline-keyboard callback payloads.
//!
//! Telegram callback data is limited to 64 bytes, so full URLs cannot ride
//! inside a button. The store hands out a short content-hash token instead
//! and maps it back to the canonical URL when the button is pressed. The
//! whole map is flushed on a fixed schedule; a token is valid from creation
//! until the next flush, not for a per-entry TTL.

use std::collections::HashMap;
use std::fmt::Write;
use std::sync::Arc;
use std::time::Duration;

use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::debug;

/// Hex length of an issued token (16 bytes of the digest)
const TOKEN_LEN: usize = 32;

/// In-memory map from correlation tokens to canonical URLs.
///
/// Owns its synchronization primitive; readers proceed concurrently,
/// writers (including the scheduled flush) take the exclusive lock.
#[derive(Debug, Default)]
pub struct TokenStore {
    entries: RwLock<HashMap<String, String>>,
}

impl TokenStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a token for a canonical URL and remember the mapping.
    ///
    /// The token is a deterministic content hash, so repeated requests for
    /// the same URL within one flush window collapse to the same token.
    /// Last write wins; this call never fails.
    pub async fn issue(&self, canonical_url: &str) -> String {
        let token = hash_token(canonical_url);
        self.entries
            .write()
            .await
            .insert(token.clone(), canonical_url.to_string());
        token
    }

    /// Look up the canonical URL behind a token.
    ///
    /// `None` is a normal outcome (evicted or never issued), not a fault.
    pub async fn resolve(&self, token: &str) -> Option<String> {
        self.entries.read().await.get(token).cloned()
    }

    /// Unconditionally clear every mapping; returns how many were evicted.
    pub async fn evict_all(&self) -> usize {
        let mut entries = self.entries.write().await;
        let evicted = entries.len();
        entries.clear();
        evicted
    }

    /// Number of live mappings.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the store currently holds no mappings.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Spawn the background task that flushes the store every `period`.
    ///
    /// The flush lives behind the store's own interface; nothing outside
    /// this type touches the map directly.
    pub fn spawn_eviction(self: Arc<Self>, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut timer = tokio::time::interval(period);
            // The first tick of a tokio interval completes immediately.
            timer.tick().await;
            loop {
                timer.tick().await;
                let evicted = self.evict_all().await;
                debug!(evicted, "correlation token store flushed");
            }
        })
    }
}

fn hash_token(canonical_url: &str) -> String {
    let digest = Sha256::digest(canonical_url.as_bytes());
    let mut token = String::with_capacity(TOKEN_LEN);
    for byte in digest.iter().take(TOKEN_LEN / 2) {
        let _ = write!(token, "{byte:02x}");
    }
    token
}
