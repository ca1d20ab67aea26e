//! Session driver around the VM.
//!
//! - [`config`]: session wiring and `MENUVM_*` environment overrides
//! - [`session`]: [`Engine`], which runs a session turn by turn

pub mod config;
pub mod session;

pub use config::{Config, ConfigError};
pub use session::{Engine, EngineError};
