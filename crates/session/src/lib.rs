//! Server-side session store.
//!
//! The browser cookie carries only an opaque uuid; identity, flash
//! messages, and in-progress wizard state all live here, in an in-memory
//! map shared across handlers. Entries expire after an idle TTL, pruned
//! lazily on access. Concurrent tabs of the same browser session are
//! last-write-wins on wizard state.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use serde::{Deserialize, Serialize};
use shared::domain::Identity;
use tokio::sync::RwLock;
use uuid::Uuid;

pub mod wizard;

pub use wizard::{StepOutcome, WizardDef, WizardState, WIZARDS};

const DEFAULT_IDLE_TTL: Duration = Duration::from_secs(8 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlashLevel {
    Info,
    Success,
    Error,
}

/// One-shot message shown on the next rendered page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flash {
    pub level: FlashLevel,
    pub message: String,
}

impl Flash {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: FlashLevel::Info,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: FlashLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: FlashLevel::Error,
            message: message.into(),
        }
    }
}

#[derive(Debug, Default)]
struct SessionData {
    identity: Option<Identity>,
    flashes: Vec<Flash>,
    wizards: HashMap<String, WizardState>,
}

struct SessionEntry {
    data: SessionData,
    last_seen: Instant,
}

#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<String, SessionEntry>>>,
    idle_ttl: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_IDLE_TTL)
    }
}

impl SessionStore {
    pub fn new(idle_ttl: Duration) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            idle_ttl,
        }
    }

    /// Allocates a fresh session and returns its opaque id.
    pub async fn create(&self) -> String {
        let id = Uuid::new_v4().to_string();
        let mut sessions = self.inner.write().await;
        sessions.insert(
            id.clone(),
            SessionEntry {
                data: SessionData::default(),
                last_seen: Instant::now(),
            },
        );
        id
    }

    /// Drops the whole session (logout).
    pub async fn destroy(&self, id: &str) {
        self.inner.write().await.remove(id);
    }

    /// True when the id refers to a live (non-expired) session. Touches
    /// the entry.
    pub async fn exists(&self, id: &str) -> bool {
        self.with_entry(id, |_| ()).await.is_some()
    }

    pub async fn identity(&self, id: &str) -> Option<Identity> {
        self.with_entry(id, |data| data.identity.clone()).await?
    }

    pub async fn set_identity(&self, id: &str, identity: Identity) {
        self.with_entry(id, |data| data.identity = Some(identity))
            .await;
    }

    pub async fn push_flash(&self, id: &str, flash: Flash) {
        self.with_entry(id, |data| data.flashes.push(flash)).await;
    }

    /// Takes the pending flashes; each is shown exactly once.
    pub async fn drain_flashes(&self, id: &str) -> Vec<Flash> {
        self.with_entry(id, |data| std::mem::take(&mut data.flashes))
            .await
            .unwrap_or_default()
    }

    pub async fn wizard(&self, id: &str, key: &str) -> Option<WizardState> {
        self.with_entry(id, |data| data.wizards.get(key).cloned())
            .await?
    }

    pub async fn put_wizard(&self, id: &str, key: &str, state: WizardState) {
        self.with_entry(id, |data| {
            data.wizards.insert(key.to_string(), state);
        })
        .await;
    }

    /// Removes a wizard's state on final commit or explicit cancellation.
    pub async fn remove_wizard(&self, id: &str, key: &str) {
        self.with_entry(id, |data| {
            data.wizards.remove(key);
        })
        .await;
    }

    /// Runs `f` against the session's data if the session exists and has
    /// not idled out, refreshing its `last_seen`. An expired entry is
    /// removed and treated as absent.
    async fn with_entry<T>(&self, id: &str, f: impl FnOnce(&mut SessionData) -> T) -> Option<T> {
        let mut sessions = self.inner.write().await;
        let expired = match sessions.get(id) {
            Some(entry) => entry.last_seen.elapsed() > self.idle_ttl,
            None => return None,
        };
        if expired {
            sessions.remove(id);
            return None;
        }
        let entry = sessions.get_mut(id)?;
        entry.last_seen = Instant::now();
        Some(f(&mut entry.data))
    }
}

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod tests;
