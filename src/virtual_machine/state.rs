//! Navigation state of one session.
//!
//! [`State`] tracks where the session is in the node tree (the execution
//! path), the flag bits, the lateral page index within the current node, the
//! last client input, the language tag and the bytecode still pending for the
//! next turn.

use crate::virtual_machine::flags::{FlagNames, Flags};
use menuvm_derive::{BinaryCodec, Error};
use std::fmt;

/// Maximum number of symbols on the execution path.
pub const MAX_PATH_DEPTH: usize = 128;

/// Maximum byte length of client input.
pub const MAX_INPUT_LEN: usize = 255;

/// Errors raised by navigation and flag operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StateError {
    /// Flag index beyond the declared bit width.
    #[error("flag index {index} out of range, bit size is {size}")]
    FlagOutOfRange { index: u32, size: u32 },
    /// Descending would exceed the maximum path depth.
    #[error("execution path depth {depth} exceeds maximum of 128")]
    PathTooDeep { depth: usize },
    /// Previous page requested on the first page.
    #[error("already at first page")]
    Index,
    /// Client input longer than 255 bytes.
    #[error("input length {len} exceeds maximum of 255")]
    InputTooLong { len: usize },
    /// Language tag is not 2 or 3 lowercase ASCII letters.
    #[error("invalid language tag {0:?}")]
    InvalidLanguage(String),
    /// Snapshot contents contradict each other.
    #[error("invalid state snapshot: {reason}")]
    InvalidSnapshot { reason: String },
}

/// Session navigation state.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct State {
    exec_path: Vec<String>,
    flags: Flags,
    page_index: u32,
    moves: u32,
    language: Option<String>,
    input: String,
    code: Vec<u8>,
    invalid: bool,
}

impl State {
    /// Creates an empty state with room for `flag_count` caller-defined flags.
    pub fn new(flag_count: u32) -> Self {
        Self {
            exec_path: Vec::new(),
            flags: Flags::new(flag_count),
            page_index: 0,
            moves: 0,
            language: None,
            input: String::new(),
            code: Vec::new(),
            invalid: false,
        }
    }

    /// Descends into `sym`, resetting the page index.
    ///
    /// # Panics
    ///
    /// Panics if `sym` is already the current node, or if the state has
    /// been invalidated.
    pub fn down(&mut self, sym: &str) -> Result<(), StateError> {
        self.assert_valid();
        if let Some(top) = self.exec_path.last() {
            assert!(top != sym, "down into current node {sym:?}");
        }
        if self.exec_path.len() >= MAX_PATH_DEPTH {
            return Err(StateError::PathTooDeep {
                depth: self.exec_path.len() + 1,
            });
        }
        self.exec_path.push(sym.to_string());
        self.page_index = 0;
        self.moves += 1;
        Ok(())
    }

    /// Leaves the current node and returns the new current node, or an empty
    /// string when the path is now empty.
    pub fn up(&mut self) -> String {
        self.assert_valid();
        self.exec_path.pop();
        self.page_index = 0;
        self.moves += 1;
        self.exec_path.last().cloned().unwrap_or_default()
    }

    /// Advances to the next page and returns its index.
    pub fn next(&mut self) -> u32 {
        self.assert_valid();
        self.page_index += 1;
        self.moves += 1;
        self.page_index
    }

    /// Goes back one page and returns its index.
    pub fn previous(&mut self) -> Result<u32, StateError> {
        self.assert_valid();
        if self.page_index == 0 {
            return Err(StateError::Index);
        }
        self.page_index -= 1;
        self.moves += 1;
        Ok(self.page_index)
    }

    /// Stays on the current node and page.
    pub fn same(&mut self) {
        self.assert_valid();
        self.moves += 1;
    }

    /// True when the path holds exactly one node.
    pub fn top(&self) -> bool {
        self.exec_path.len() == 1
    }

    /// Levels below the first node.
    pub fn depth(&self) -> usize {
        self.exec_path.len().saturating_sub(1)
    }

    /// Current node symbol and page index.
    pub fn location(&self) -> (&str, u32) {
        let sym = self.exec_path.last().map(String::as_str).unwrap_or("");
        (sym, self.page_index)
    }

    pub fn path(&self) -> &[String] {
        &self.exec_path
    }

    pub fn page_index(&self) -> u32 {
        self.page_index
    }

    pub fn moves(&self) -> u32 {
        self.moves
    }

    /// Returns to the first node: clears caller flags, the move counter and
    /// the page index.
    pub fn restart(&mut self) {
        self.assert_valid();
        self.flags.reset_user();
        self.moves = 0;
        self.page_index = 0;
        self.exec_path.truncate(1);
    }

    pub fn flags(&self) -> &Flags {
        &self.flags
    }

    pub fn get_flag(&self, index: u32) -> Result<bool, StateError> {
        self.flags.get(index)
    }

    pub fn set_flag(&mut self, index: u32) -> Result<bool, StateError> {
        self.assert_valid();
        self.flags.set(index)
    }

    pub fn reset_flag(&mut self, index: u32) -> Result<bool, StateError> {
        self.assert_valid();
        self.flags.reset(index)
    }

    /// Tests a flag against a match mode.
    pub fn match_flag(&self, index: u32, mode: bool) -> Result<bool, StateError> {
        self.flags.matches(index, mode)
    }

    /// Stores the client input for this turn.
    pub fn set_input(&mut self, input: &str) -> Result<(), StateError> {
        self.assert_valid();
        if input.len() > MAX_INPUT_LEN {
            return Err(StateError::InputTooLong { len: input.len() });
        }
        self.input.clear();
        self.input.push_str(input);
        Ok(())
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    /// Sets the language tag, e.g. `en` or `swa`.
    pub fn set_language(&mut self, tag: &str) -> Result<(), StateError> {
        self.assert_valid();
        let valid = (2..=3).contains(&tag.len()) && tag.bytes().all(|b| b.is_ascii_lowercase());
        if !valid {
            return Err(StateError::InvalidLanguage(tag.to_string()));
        }
        self.language = Some(tag.to_string());
        Ok(())
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    pub fn code(&self) -> &[u8] {
        &self.code
    }

    pub fn set_code(&mut self, code: Vec<u8>) {
        self.assert_valid();
        self.code = code;
    }

    pub fn append_code(&mut self, code: &[u8]) {
        self.assert_valid();
        self.code.extend_from_slice(code);
    }

    /// Removes and returns the pending code.
    pub fn take_code(&mut self) -> Vec<u8> {
        self.assert_valid();
        std::mem::take(&mut self.code)
    }

    fn assert_valid(&self) {
        assert!(!self.invalid, "mutating invalidated state");
    }

    /// Marks the state as no longer safe to persist or mutate.
    ///
    /// Every mutating method panics afterwards.
    pub fn invalidate(&mut self) {
        self.invalid = true;
    }

    pub fn invalid(&self) -> bool {
        self.invalid
    }

    /// Renders the state with flag names resolved through `names`.
    pub fn describe(&self, names: &FlagNames) -> String {
        format!(
            "path [{}] idx {} moves {} flags [{}]",
            self.exec_path.join("/"),
            self.page_index,
            self.moves,
            names.describe(&self.flags)
        )
    }

    /// Captures the persisted fields.
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            exec_path: self.exec_path.clone(),
            flags: self.flags.clone(),
            page_index: self.page_index,
            moves: self.moves,
            language: self.language.clone(),
            code: self.code.clone(),
            invalid: self.invalid,
        }
    }

    /// Rebuilds a state from a snapshot. Input starts empty.
    pub fn from_snapshot(snap: StateSnapshot) -> Result<Self, StateError> {
        if snap.exec_path.len() > MAX_PATH_DEPTH {
            return Err(StateError::PathTooDeep {
                depth: snap.exec_path.len(),
            });
        }
        let expected = snap.flags.bit_size().div_ceil(8) as usize;
        if snap.flags.as_bytes().len() != expected {
            return Err(StateError::InvalidSnapshot {
                reason: format!(
                    "{} flag bytes for {} bits",
                    snap.flags.as_bytes().len(),
                    snap.flags.bit_size()
                ),
            });
        }
        Ok(Self {
            exec_path: snap.exec_path,
            flags: snap.flags,
            page_index: snap.page_index,
            moves: snap.moves,
            language: snap.language,
            input: String::new(),
            code: snap.code,
            invalid: snap.invalid,
        })
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "path [{}] idx {} moves {} flags {}",
            self.exec_path.join("/"),
            self.page_index,
            self.moves,
            self.flags
        )
    }
}

/// Persisted shape of [`State`].
#[derive(Clone, Debug, Eq, PartialEq, BinaryCodec)]
pub struct StateSnapshot {
    pub exec_path: Vec<String>,
    pub flags: Flags,
    pub page_index: u32,
    pub moves: u32,
    pub language: Option<String>,
    pub code: Vec<u8>,
    pub invalid: bool,
}
