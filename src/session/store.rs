//! Live session registry

use crate::error::{Error, Result};
use crate::session::SessionState;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Shared handle to one session; the async mutex serializes its transitions
pub type SessionHandle = Arc<tokio::sync::Mutex<SessionState>>;

/// Bounded session map with least-recently-used eviction
pub struct SessionStore {
    inner: Mutex<LruCache<String, SessionHandle>>,
}

impl SessionStore {
    /// Create a store holding at most `capacity` sessions
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Start a fresh session under a new unique id
    pub fn create(&self) -> (String, SessionHandle) {
        let mut inner = self.inner.lock();
        let id = loop {
            let key = uuid::Uuid::new_v4().to_string();
            if !inner.contains(&key) {
                break key;
            }
        };

        let handle = Arc::new(tokio::sync::Mutex::new(SessionState::new(id.clone())));
        if let Some((evicted, _)) = inner.push(id.clone(), handle.clone()) {
            if evicted != id {
                tracing::info!(session = %evicted, "evicted least recently used session");
            }
        }

        (id, handle)
    }

    /// Look up a session, marking it as recently used
    pub fn get(&self, id: &str) -> Result<SessionHandle> {
        self.inner
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::SessionNotFound { id: id.to_string() })
    }

    /// Check if a session exists without touching its recency
    #[cfg(test)]
    pub(crate) fn contains(&self, id: &str) -> bool {
        self.inner.lock().contains(id)
    }

    /// Get the number of live sessions
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Check if there are no live sessions
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("sessions", &self.len())
            .finish()
    }
}
