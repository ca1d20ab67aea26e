//! Session configuration.

use crate::virtual_machine::input::is_node_symbol;
use crate::virtual_machine::render::BrowseConfig;
use menuvm_derive::Error;
use std::env;

pub const ROOT_ENV: &str = "MENUVM_ROOT";
pub const FLAG_COUNT_ENV: &str = "MENUVM_FLAG_COUNT";
pub const CACHE_SIZE_ENV: &str = "MENUVM_CACHE_SIZE";
pub const OUTPUT_SIZE_ENV: &str = "MENUVM_OUTPUT_SIZE";
pub const LANGUAGE_ENV: &str = "MENUVM_LANGUAGE";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be a non-negative integer, got {value:?}")]
    InvalidNumber { var: String, value: String },
    #[error("invalid root node symbol {0:?}")]
    InvalidRoot(String),
}

/// Wiring for one session.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Config {
    /// Node the session starts in.
    pub root: String,
    /// Number of caller-defined flags.
    pub flag_count: u32,
    /// Total cache capacity in bytes, 0 for unbounded.
    pub cache_size: usize,
    /// Render budget in bytes, 0 for unbounded.
    pub output_size: usize,
    pub language: Option<String>,
    pub session_id: String,
    pub browse: BrowseConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: "root".to_string(),
            flag_count: 0,
            cache_size: 0,
            output_size: 0,
            language: None,
            session_id: String::new(),
            browse: BrowseConfig::default(),
        }
    }
}

fn parse_number<T: std::str::FromStr>(var: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidNumber {
        var: var.to_string(),
        value: value.to_string(),
    })
}

impl Config {
    /// Defaults overlaid with the `MENUVM_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Defaults overlaid with whatever `lookup` returns for each variable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(root) = lookup(ROOT_ENV) {
            config.root = root;
        }
        if let Some(v) = lookup(FLAG_COUNT_ENV) {
            config.flag_count = parse_number(FLAG_COUNT_ENV, &v)?;
        }
        if let Some(v) = lookup(CACHE_SIZE_ENV) {
            config.cache_size = parse_number(CACHE_SIZE_ENV, &v)?;
        }
        if let Some(v) = lookup(OUTPUT_SIZE_ENV) {
            config.output_size = parse_number(OUTPUT_SIZE_ENV, &v)?;
        }
        if let Some(lang) = lookup(LANGUAGE_ENV).filter(|l| !l.is_empty()) {
            config.language = Some(lang);
        }
        config.validate()?;
        Ok(config)
    }

    /// Checks that the root is a node symbol.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_node_symbol(&self.root) {
            return Err(ConfigError::InvalidRoot(self.root.clone()));
        }
        Ok(())
    }
}
