//! Session flag bit vector.
//!
//! Bits below [`USER_START`] are reserved for the runner's own signalling;
//! content functions may only touch bits at or above it.

use crate::virtual_machine::state::StateError;
use menuvm_derive::BinaryCodec;
use std::collections::BTreeMap;
use std::fmt;

/// Awaiting an input match this turn.
pub const READIN: u32 = 0;
/// An input match already happened this turn.
pub const INMATCH: u32 = 1;
/// End execution.
pub const TERMINATE: u32 = 2;
/// Output needs a re-render.
pub const DIRTY: u32 = 3;
/// Turn boundary reached.
pub const WAIT: u32 = 4;
/// Last content load failed.
pub const LOADFAIL: u32 = 5;

/// First caller-defined flag index.
pub const USER_START: u32 = 8;

const RESERVED_NAMES: [&str; USER_START as usize] = [
    "READIN", "INMATCH", "TERMINATE", "DIRTY", "WAIT", "LOADFAIL", "", "",
];

/// Fixed-width bit vector holding the reserved and caller-defined flags.
#[derive(Clone, Debug, Eq, PartialEq, BinaryCodec)]
pub struct Flags {
    bits: Vec<u8>,
    bit_size: u32,
}

impl Flags {
    /// Creates a vector with room for the reserved bits plus `user_count` caller flags.
    pub fn new(user_count: u32) -> Self {
        let bit_size = USER_START + user_count;
        Self {
            bits: vec![0; bit_size.div_ceil(8) as usize],
            bit_size,
        }
    }

    /// Number of addressable bits.
    pub fn bit_size(&self) -> u32 {
        self.bit_size
    }

    /// Raw byte view, least significant bit first within each byte.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bits
    }

    fn locate(&self, index: u32) -> Result<(usize, u8), StateError> {
        if index >= self.bit_size {
            return Err(StateError::FlagOutOfRange {
                index,
                size: self.bit_size,
            });
        }
        Ok(((index / 8) as usize, 1 << (index % 8)))
    }

    /// Returns whether the flag is set.
    pub fn get(&self, index: u32) -> Result<bool, StateError> {
        let (byte, mask) = self.locate(index)?;
        Ok(self.bits[byte] & mask != 0)
    }

    /// Sets a flag, returning true if it was previously clear.
    pub fn set(&mut self, index: u32) -> Result<bool, StateError> {
        let (byte, mask) = self.locate(index)?;
        let changed = self.bits[byte] & mask == 0;
        self.bits[byte] |= mask;
        Ok(changed)
    }

    /// Clears a flag, returning true if it was previously set.
    pub fn reset(&mut self, index: u32) -> Result<bool, StateError> {
        let (byte, mask) = self.locate(index)?;
        let changed = self.bits[byte] & mask != 0;
        self.bits[byte] &= !mask;
        Ok(changed)
    }

    /// Tests the flag against a match mode: a set flag matches `true`, a clear flag matches `false`.
    pub fn matches(&self, index: u32, mode: bool) -> Result<bool, StateError> {
        Ok(self.get(index)? == mode)
    }

    /// Clears every caller-defined flag.
    pub fn reset_user(&mut self) {
        let first = (USER_START / 8) as usize;
        for b in &mut self.bits[first..] {
            *b = 0;
        }
    }

    /// Indices of every set flag, ascending.
    pub fn iter_set(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.bit_size).filter(|i| self.get(*i).unwrap_or(false))
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.bits {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

/// Caller-owned names for flag indices, used in debug output.
#[derive(Clone, Debug, Default)]
pub struct FlagNames {
    names: BTreeMap<u32, String>,
}

impl FlagNames {
    /// Creates a map that already knows the reserved flag names.
    pub fn new() -> Self {
        let mut names = BTreeMap::new();
        for (i, name) in RESERVED_NAMES.iter().enumerate() {
            if !name.is_empty() {
                names.insert(i as u32, name.to_string());
            }
        }
        Self { names }
    }

    /// Names a caller flag given as an offset from [`USER_START`].
    pub fn register(&mut self, offset: u32, name: &str) -> &mut Self {
        self.names.insert(USER_START + offset, name.to_string());
        self
    }

    pub fn name(&self, index: u32) -> Option<&str> {
        self.names.get(&index).map(String::as_str)
    }

    /// Lists set flags by name, falling back to the bare index.
    pub fn describe(&self, flags: &Flags) -> String {
        flags
            .iter_set()
            .map(|i| match self.name(i) {
                Some(n) => n.to_string(),
                None => i.to_string(),
            })
            .collect::<Vec<_>>()
            .join(",")
    }
}
