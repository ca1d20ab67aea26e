//! Client input and navigation target validation.

use menuvm_derive::Error;
use once_cell::sync::Lazy;
use regex::Regex;

/// Reserved fallback node for unmatched input and out-of-range pages.
pub const CATCH_NODE: &str = "_catch";

static INPUT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\+?[A-Za-z0-9].*").unwrap());
static CTRL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[><_^.]$").unwrap());
static SYM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_]+$").unwrap());

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InputError {
    /// Client input does not start with an alphanumeric (optionally after `+`).
    #[error("invalid input {0:?}")]
    InvalidInput(String),
    /// Navigation target is neither a control symbol nor a node symbol.
    #[error("invalid navigation target {0:?}")]
    InvalidTarget(String),
}

/// A parsed navigation target.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Target {
    /// `_`: one level up.
    Up,
    /// `^`: up to the first node.
    Top,
    /// `>`: next page.
    Next,
    /// `<`: previous page.
    Previous,
    /// `.`: stay and re-render.
    Same,
    /// Descend into a named node.
    Node(String),
}

impl Target {
    pub fn parse(sym: &str) -> Result<Self, InputError> {
        if CTRL_RE.is_match(sym) {
            return Ok(match sym {
                "_" => Target::Up,
                "^" => Target::Top,
                ">" => Target::Next,
                "<" => Target::Previous,
                _ => Target::Same,
            });
        }
        if is_node_symbol(sym) {
            return Ok(Target::Node(sym.to_string()));
        }
        Err(InputError::InvalidTarget(sym.to_string()))
    }
}

/// Checks client input before it is stored for a turn.
pub fn validate_input(input: &str) -> Result<(), InputError> {
    if INPUT_RE.is_match(input) {
        Ok(())
    } else {
        Err(InputError::InvalidInput(input.to_string()))
    }
}

/// True for single-character navigation controls.
pub fn is_control_symbol(sym: &str) -> bool {
    CTRL_RE.is_match(sym)
}

/// True for symbols that may name a node; the catch-all node always qualifies.
pub fn is_node_symbol(sym: &str) -> bool {
    sym == CATCH_NODE || SYM_RE.is_match(sym)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_patterns() {
        assert!(validate_input("1").is_ok());
        assert!(validate_input("+25571234567").is_ok());
        assert!(validate_input("yes please").is_ok());
        assert!(validate_input("").is_err());
        assert!(validate_input("#").is_err());
        assert!(validate_input("+").is_err());
    }

    #[test]
    fn controls_parse() {
        assert_eq!(Target::parse("_"), Ok(Target::Up));
        assert_eq!(Target::parse("^"), Ok(Target::Top));
        assert_eq!(Target::parse(">"), Ok(Target::Next));
        assert_eq!(Target::parse("<"), Ok(Target::Previous));
        assert_eq!(Target::parse("."), Ok(Target::Same));
        assert!(!is_control_symbol("__"));
    }

    #[test]
    fn node_symbols() {
        assert_eq!(Target::parse("foo_1"), Ok(Target::Node("foo_1".into())));
        assert_eq!(Target::parse(CATCH_NODE), Ok(Target::Node(CATCH_NODE.into())));
        assert!(Target::parse("x").is_err());
        assert!(Target::parse("_foo").is_err());
        assert!(Target::parse("foo-bar").is_err());
    }
}
