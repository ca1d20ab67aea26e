use crate::virtual_machine::cache::CacheError;
use crate::virtual_machine::input::InputError;
use crate::virtual_machine::render::RenderError;
use crate::virtual_machine::resource::ResourceError;
use crate::virtual_machine::state::StateError;
use menuvm_derive::Error;

/// Errors that can occur while decoding or executing bytecode.
#[derive(Debug, Error)]
pub enum VMError {
    /// Opcode value outside the instruction table.
    #[error("invalid instruction 0x{opcode:04x} at offset {offset}")]
    InvalidInstruction { opcode: u16, offset: usize },
    /// Fewer than two bytes left where an opcode was expected.
    #[error("truncated opcode at offset {offset}")]
    TruncatedOpcode { offset: usize },
    /// Bytecode ended in the middle of an operand.
    #[error(
        "unexpected end of bytecode at offset {offset}: requested {requested} bytes, {available} available"
    )]
    UnexpectedEndOfBytecode {
        offset: usize,
        requested: usize,
        available: usize,
    },
    /// Symbol operand declared with zero length.
    #[error("empty symbol operand at offset {offset}")]
    EmptySymbol { offset: usize },
    /// Symbol operand is not valid UTF-8.
    #[error("invalid utf8 in symbol operand at offset {offset}")]
    InvalidUtf8 { offset: usize },
    /// Numeric operand wider than four bytes.
    #[error("numeric operand width {width} at offset {offset} exceeds 4")]
    InvalidNumberWidth { width: usize, offset: usize },
    /// Code ran out with no current node to fall back from.
    #[error("dead runner: no code left and no current node")]
    DeadRunner,
    /// Navigation state rejected a transition or flag operation.
    #[error("{0}")]
    State(#[from] StateError),
    /// Content cache rejected an operation.
    #[error("{0}")]
    Cache(#[from] CacheError),
    /// Page rendering failed.
    #[error("{0}")]
    Render(#[from] RenderError),
    /// Navigation target or input failed validation.
    #[error("{0}")]
    Input(#[from] InputError),
    /// Resource lookup failed.
    #[error("{0}")]
    Resource(#[from] ResourceError),
}

impl VMError {
    /// Returns true for errors raised while decoding the instruction stream.
    pub fn is_decode(&self) -> bool {
        matches!(
            self,
            VMError::InvalidInstruction { .. }
                | VMError::TruncatedOpcode { .. }
                | VMError::UnexpectedEndOfBytecode { .. }
                | VMError::EmptySymbol { .. }
                | VMError::InvalidUtf8 { .. }
                | VMError::InvalidNumberWidth { .. }
        )
    }
}

/// A failed turn: the error plus the bytecode that was not executed.
#[derive(Debug, Error)]
#[error("{error} ({remaining:?} left unexecuted)")]
pub struct RunError {
    pub error: VMError,
    pub remaining: Vec<u8>,
}

impl RunError {
    pub fn new(error: VMError, remaining: Vec<u8>) -> Self {
        Self { error, remaining }
    }
}
