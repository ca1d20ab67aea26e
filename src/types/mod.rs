//! Deterministic binary encoding used for persisted session state.

pub mod encoding;
