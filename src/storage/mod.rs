//! Session persistence.
//!
//! - [`store`]: [`SessionStore`](store::SessionStore) trait and the in-memory
//!   [`MemoryStore`](store::MemoryStore)
//! - [`persister`]: [`Persister`](persister::Persister), which encodes a
//!   session's state and cache into a store

pub mod persister;
pub mod store;
