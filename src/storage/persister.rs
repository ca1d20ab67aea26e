//! Encoding of session state and cache between turns.

use crate::debug;
use crate::storage::store::SessionStore;
use crate::types::encoding::{Decode, DecodeError, Encode};
use crate::virtual_machine::cache::{Cache, CacheError, CacheSnapshot, Memory};
use crate::virtual_machine::state::{State, StateError, StateSnapshot};
use menuvm_derive::{BinaryCodec, Error};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PersistError {
    #[error("no stored session {0}")]
    NotFound(String),
    #[error("corrupt session record: {0}")]
    Decode(#[from] DecodeError),
    #[error("{0}")]
    State(#[from] StateError),
    #[error("{0}")]
    Cache(#[from] CacheError),
}

/// Wire shape of a stored session.
#[derive(Clone, Debug, Eq, PartialEq, BinaryCodec)]
struct SessionRecord {
    state: StateSnapshot,
    cache: CacheSnapshot,
}

/// Serializes a session's [`State`] and [`Cache`] into a [`SessionStore`].
pub struct Persister<S: SessionStore> {
    store: S,
}

impl<S: SessionStore> Persister<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Encodes `state` and `cache` into one record.
    ///
    /// # Panics
    ///
    /// Panics if either has been invalidated.
    pub fn encode(state: &State, cache: &Cache) -> Vec<u8> {
        assert!(!state.invalid(), "persisting invalidated state");
        assert!(!cache.invalid(), "persisting invalidated cache");
        SessionRecord {
            state: state.snapshot(),
            cache: cache.snapshot(),
        }
        .to_bytes()
    }

    /// Decodes a record produced by [`Persister::encode`].
    pub fn decode(bytes: &[u8]) -> Result<(State, Cache), PersistError> {
        let record = SessionRecord::from_bytes(bytes)?;
        let state = State::from_snapshot(record.state)?;
        let cache = Cache::from_snapshot(record.cache)?;
        Ok((state, cache))
    }

    /// Stores the session under `session_id`.
    ///
    /// # Panics
    ///
    /// Panics if the state or cache has been invalidated.
    pub fn save(&self, session_id: &str, state: &State, cache: &Cache) {
        let bytes = Self::encode(state, cache);
        debug!("saving session {} ({} bytes)", session_id, bytes.len());
        self.store.put(session_id, bytes);
    }

    /// Restores the session stored under `session_id`.
    pub fn load(&self, session_id: &str) -> Result<(State, Cache), PersistError> {
        let bytes = self
            .store
            .get(session_id)
            .ok_or_else(|| PersistError::NotFound(session_id.to_string()))?;
        debug!("loading session {} ({} bytes)", session_id, bytes.len());
        Self::decode(&bytes)
    }
}
