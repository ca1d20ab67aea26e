//! Operand encoding and decoding helpers.
//!
//! Writers append one operand to a buffer; [`OperandReader`] walks a byte
//! slice and reports failures with the absolute offset into the code being
//! decoded.

use crate::virtual_machine::errors::VMError;

/// Maximum encoded length of a symbol operand.
pub const MAX_SYM_LEN: usize = u8::MAX as usize;

/// Maximum byte width of a numeric operand.
pub const MAX_NUM_WIDTH: usize = 4;

/// Appends a length-prefixed symbol.
///
/// # Panics
///
/// Panics if `sym` is empty or longer than [`MAX_SYM_LEN`] bytes.
pub fn write_sym(out: &mut Vec<u8>, sym: &str) {
    let bytes = sym.as_bytes();
    assert!(!bytes.is_empty(), "symbol operand must not be empty");
    assert!(
        bytes.len() <= MAX_SYM_LEN,
        "symbol operand {} bytes long, limit is {}",
        bytes.len(),
        MAX_SYM_LEN
    );
    out.push(bytes.len() as u8);
    out.extend_from_slice(bytes);
}

/// Appends a width-prefixed big-endian number with leading zero bytes stripped.
///
/// Zero is written as a bare width byte of 0.
pub fn write_num(out: &mut Vec<u8>, value: u32) {
    let be = value.to_be_bytes();
    let skip = be.iter().take_while(|b| **b == 0).count();
    out.push((MAX_NUM_WIDTH - skip) as u8);
    out.extend_from_slice(&be[skip..]);
}

/// Appends a raw byte.
pub fn write_byte(out: &mut Vec<u8>, value: u8) {
    out.push(value);
}

/// Cursor over bytecode that decodes operands.
pub struct OperandReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> OperandReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Current offset into the underlying slice.
    pub fn offset(&self) -> usize {
        self.pos
    }

    /// Bytes not yet consumed.
    pub fn rest(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn read_exact(&mut self, count: usize) -> Result<&'a [u8], VMError> {
        let start = self.pos;
        let available = self.data.len().saturating_sub(start);
        if count > available {
            return Err(VMError::UnexpectedEndOfBytecode {
                offset: start,
                requested: count,
                available,
            });
        }
        self.pos += count;
        Ok(&self.data[start..start + count])
    }

    /// Reads a 2-byte big-endian opcode value.
    pub fn read_opcode(&mut self) -> Result<u16, VMError> {
        let offset = self.pos;
        let bytes = self
            .read_exact(2)
            .map_err(|_| VMError::TruncatedOpcode { offset })?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    /// Reads a length-prefixed symbol.
    pub fn read_sym(&mut self) -> Result<String, VMError> {
        let offset = self.pos;
        let len = self.read_exact(1)?[0] as usize;
        if len == 0 {
            return Err(VMError::EmptySymbol { offset });
        }
        let bytes = self.read_exact(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| VMError::InvalidUtf8 { offset })
    }

    /// Reads a width-prefixed big-endian number.
    pub fn read_num(&mut self) -> Result<u32, VMError> {
        let offset = self.pos;
        let width = self.read_exact(1)?[0] as usize;
        if width > MAX_NUM_WIDTH {
            return Err(VMError::InvalidNumberWidth { width, offset });
        }
        let bytes = self.read_exact(width)?;
        Ok(bytes.iter().fold(0u32, |acc, b| (acc << 8) | u32::from(*b)))
    }

    /// Reads one raw byte.
    pub fn read_byte(&mut self) -> Result<u8, VMError> {
        Ok(self.read_exact(1)?[0])
    }
}
