//! Session byte stores.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// Backing store for persisted sessions, keyed by session id.
///
/// Implementations must be thread-safe (`Send + Sync`) so one store can
/// serve concurrent sessions.
pub trait SessionStore: Send + Sync {
    /// Returns the bytes stored for `session_id`, if any.
    fn get(&self, session_id: &str) -> Option<Vec<u8>>;

    /// Stores `bytes` for `session_id`, replacing any previous value.
    fn put(&self, session_id: &str, bytes: Vec<u8>);

    /// Forgets `session_id`. Returns whether anything was stored.
    fn remove(&self, session_id: &str) -> bool;
}

/// In-memory store for tests and single-process deployments.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the map, recovering it if a previous holder panicked.
    fn entries(&self) -> MutexGuard<'_, HashMap<String, Vec<u8>>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionStore for MemoryStore {
    fn get(&self, session_id: &str) -> Option<Vec<u8>> {
        self.entries().get(session_id).cloned()
    }

    fn put(&self, session_id: &str, bytes: Vec<u8>) {
        self.entries().insert(session_id.to_string(), bytes);
    }

    fn remove(&self, session_id: &str) -> bool {
        self.entries().remove(session_id).is_some()
    }
}
