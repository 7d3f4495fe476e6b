//! Short-TTL cache for content awaiting a follow-up interaction, such as
//! an analysis result held between "here is what I found" and the user's
//! store/discard choice.
//!
//! An injected capability rather than module-level state: opaque tokens,
//! bounded lifetime, expiry enforced on every touch so the map cannot
//! grow without bound.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use uuid::Uuid;

const DEFAULT_TTL: Duration = Duration::from_secs(600);

pub struct PendingCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, (Instant, String)>>,
}

impl PendingCache {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Store a payload and return the opaque token that retrieves it.
    /// Expired entries are swept on every insert.
    pub async fn put(&self, payload: String) -> String {
        let token = Uuid::new_v4().to_string();
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        entries.retain(|_, entry| now.duration_since(entry.0) < self.ttl);
        entries.insert(token.clone(), (now, payload));
        token
    }

    /// Retrieve and consume a payload. Unknown or expired tokens yield
    /// None; a token is good for one retrieval only.
    pub async fn take(&self, token: &str) -> Option<String> {
        let mut entries = self.entries.lock().await;
        let (stored, payload) = entries.remove(token)?;
        if stored.elapsed() >= self.ttl {
            return None;
        }
        Some(payload)
    }
}

impl Default for PendingCache {
    fn default() -> Self {
        Self::new()
    }
}
