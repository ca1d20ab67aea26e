//! Instruction stream decoding and construction.
//!
//! [`decode`] splits one instruction off the front of a code buffer, which is
//! how the runner consumes code. [`Program`] builds code buffers from typed
//! instructions, and [`disassemble`] renders a buffer for inspection.

use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::isa::{Instruction, Opcode};
use crate::virtual_machine::operand::OperandReader;

/// Decodes the first instruction in `code`.
///
/// Returns the instruction and the bytes that follow it. Error offsets are
/// relative to the start of `code`.
pub fn decode(code: &[u8]) -> Result<(Instruction, &[u8]), VMError> {
    let mut reader = OperandReader::new(code);
    let offset = reader.offset();
    let raw = reader.read_opcode()?;
    let op = Opcode::try_from(raw).map_err(|_| VMError::InvalidInstruction {
        opcode: raw,
        offset,
    })?;
    let instr = Instruction::read_args(op, &mut reader)?;
    Ok((instr, reader.rest()))
}

/// Decodes every instruction in `code`.
pub fn decode_all(code: &[u8]) -> Result<Vec<Instruction>, VMError> {
    let mut out = Vec::new();
    let mut rest = code;
    while !rest.is_empty() {
        let consumed = code.len() - rest.len();
        let (instr, next) = decode(rest).map_err(|e| shift_offset(e, consumed))?;
        out.push(instr);
        rest = next;
    }
    Ok(out)
}

/// Renders `code` one instruction per line.
pub fn disassemble(code: &[u8]) -> Result<String, VMError> {
    let mut out = String::new();
    for instr in decode_all(code)? {
        out.push_str(&instr.to_string());
        out.push('\n');
    }
    Ok(out)
}

/// Rebases a decode error offset onto the enclosing buffer.
fn shift_offset(err: VMError, by: usize) -> VMError {
    match err {
        VMError::InvalidInstruction { opcode, offset } => VMError::InvalidInstruction {
            opcode,
            offset: offset + by,
        },
        VMError::TruncatedOpcode { offset } => VMError::TruncatedOpcode { offset: offset + by },
        VMError::UnexpectedEndOfBytecode {
            offset,
            requested,
            available,
        } => VMError::UnexpectedEndOfBytecode {
            offset: offset + by,
            requested,
            available,
        },
        VMError::EmptySymbol { offset } => VMError::EmptySymbol { offset: offset + by },
        VMError::InvalidUtf8 { offset } => VMError::InvalidUtf8 { offset: offset + by },
        VMError::InvalidNumberWidth { width, offset } => VMError::InvalidNumberWidth {
            width,
            offset: offset + by,
        },
        other => other,
    }
}

/// Builder for bytecode buffers.
///
/// ```ignore
/// let code = Program::new().mout("0", "one").mout("1", "two").halt().into_bytes();
/// ```
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Program {
    code: Vec<u8>,
}

impl Program {
    pub fn new() -> Self {
        Self { code: Vec::new() }
    }

    /// Appends an already typed instruction.
    pub fn push(mut self, instr: Instruction) -> Self {
        instr.encode_into(&mut self.code);
        self
    }

    pub fn noop(self) -> Self {
        self.push(Instruction::Noop {})
    }

    pub fn catch(self, sym: &str, flag: u32, mode: bool) -> Self {
        self.push(Instruction::Catch {
            sym: sym.to_string(),
            flag,
            mode: mode as u8,
        })
    }

    pub fn croak(self, flag: u32, mode: bool) -> Self {
        self.push(Instruction::Croak {
            flag,
            mode: mode as u8,
        })
    }

    pub fn load(self, sym: &str, size: u32) -> Self {
        self.push(Instruction::Load {
            sym: sym.to_string(),
            size,
        })
    }

    pub fn reload(self, sym: &str) -> Self {
        self.push(Instruction::Reload {
            sym: sym.to_string(),
        })
    }

    pub fn map(self, sym: &str) -> Self {
        self.push(Instruction::Map {
            sym: sym.to_string(),
        })
    }

    pub fn mv(self, sym: &str) -> Self {
        self.push(Instruction::Move {
            sym: sym.to_string(),
        })
    }

    pub fn halt(self) -> Self {
        self.push(Instruction::Halt {})
    }

    pub fn incmp(self, selector: &str, target: &str) -> Self {
        self.push(Instruction::InCmp {
            selector: selector.to_string(),
            target: target.to_string(),
        })
    }

    pub fn msink(self) -> Self {
        self.push(Instruction::MSink {})
    }

    pub fn mout(self, selector: &str, title: &str) -> Self {
        self.push(Instruction::MOut {
            selector: selector.to_string(),
            title: title.to_string(),
        })
    }

    pub fn mnext(self, selector: &str, title: &str) -> Self {
        self.push(Instruction::MNext {
            selector: selector.to_string(),
            title: title.to_string(),
        })
    }

    pub fn mprev(self, selector: &str, title: &str) -> Self {
        self.push(Instruction::MPrev {
            selector: selector.to_string(),
            title: title.to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.code
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.code
    }
}
