//! Session identity storage.
//!
//! The order service identifies an anonymous-or-authenticated cart by an
//! opaque token carried on every response. [`SessionStore`] abstracts where
//! that token lives so the gateway and synchronizer depend on an interface,
//! not a storage medium: [`FileSessionStore`] persists it across restarts,
//! [`MemorySessionStore`] backs tests and degraded operation.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::config::SyncConfig;

/// Opaque credential identifying the current cart session on the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionToken {
    pub value: String,
    /// When this token was first observed locally. Used only as a staleness
    /// heuristic; the backend remains the authority on validity.
    pub issued_at: Option<DateTime<Utc>>,
}

impl SessionToken {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            issued_at: Some(Utc::now()),
        }
    }

    /// Returns `true` if the token was observed longer than `max_age` ago.
    /// Tokens without an `issued_at` are never considered stale.
    #[must_use]
    pub fn is_stale(&self, max_age: Duration) -> bool {
        self.issued_at
            .is_some_and(|at| Utc::now() - at > max_age)
    }
}

/// Storage for the single active [`SessionToken`].
///
/// All three operations are non-blocking and never touch the network.
/// `set` atomically replaces the previous token: a read issued after `set`
/// returns observes the new value.
pub trait SessionStore: Send + Sync {
    fn get(&self) -> Option<SessionToken>;
    fn set(&self, token: SessionToken);
    fn clear(&self);
}

/// In-memory token slot. The test double, and the fallback medium when
/// file persistence is unavailable.
#[derive(Default)]
pub struct MemorySessionStore {
    slot: Mutex<Option<SessionToken>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self) -> Option<SessionToken> {
        self.slot.lock().clone()
    }

    fn set(&self, token: SessionToken) {
        *self.slot.lock() = Some(token);
    }

    fn clear(&self) {
        *self.slot.lock() = None;
    }
}

/// Persisted tokens older than this are discarded on open; the backend
/// would reject them anyway and a fresh anonymous session is cheaper than
/// a doomed round trip.
const PERSISTED_TOKEN_MAX_AGE_DAYS: i64 = 30;

/// File-backed token store (the well-known-key persistence medium).
///
/// Reads are always served from an in-memory cache, so `get` never blocks
/// on I/O. If a write ever fails the store logs a warning and degrades to
/// in-memory-only for the rest of the session; callers see no error.
pub struct FileSessionStore {
    path: PathBuf,
    cache: Mutex<Option<SessionToken>>,
    degraded: AtomicBool,
}

impl FileSessionStore {
    /// Opens the store, loading any token persisted by a previous session.
    /// A missing or unreadable file simply yields an empty store.
    #[must_use]
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let cached = Self::load(&path);
        Self {
            path,
            cache: Mutex::new(cached),
            degraded: AtomicBool::new(false),
        }
    }

    fn load(path: &Path) -> Option<SessionToken> {
        let raw = std::fs::read_to_string(path).ok()?;
        let token: SessionToken = match serde_json::from_str(&raw) {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "discarding unparseable persisted session token");
                return None;
            }
        };
        if token.is_stale(Duration::days(PERSISTED_TOKEN_MAX_AGE_DAYS)) {
            tracing::info!(path = %path.display(), "discarding stale persisted session token");
            return None;
        }
        Some(token)
    }

    fn persist(&self, token: &SessionToken) -> std::io::Result<()> {
        let raw = serde_json::to_string(token)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(&self.path, raw)
    }
}

impl SessionStore for FileSessionStore {
    fn get(&self) -> Option<SessionToken> {
        self.cache.lock().clone()
    }

    fn set(&self, token: SessionToken) {
        *self.cache.lock() = Some(token.clone());
        if self.degraded.load(Ordering::Relaxed) {
            return;
        }
        if let Err(e) = self.persist(&token) {
            tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "session token persistence unavailable; continuing in-memory only"
            );
            self.degraded.store(true, Ordering::Relaxed);
        }
    }

    fn clear(&self) {
        *self.cache.lock() = None;
        // Removal runs even when writes have degraded: a token persisted
        // before the degradation must not outlive an explicit logout.
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "could not remove persisted session token on clear"
                );
            }
        }
    }
}

/// Builds the session store named by the configuration: file-backed when
/// `session_token_path` is set, in-memory otherwise.
#[must_use]
pub fn store_from_config(config: &SyncConfig) -> Arc<dyn SessionStore> {
    match &config.session_token_path {
        Some(path) => Arc::new(FileSessionStore::open(path.clone())),
        None => Arc::new(MemorySessionStore::new()),
    }
}
