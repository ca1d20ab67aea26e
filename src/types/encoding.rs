//! Binary encoding and decoding traits for persisted session state.
//!
//! Navigation state and cache snapshots are written with this codec so a
//! session can be suspended between turns and resumed byte-for-byte.
//!
//! # Binary Format
//!
//! - Integers: little-endian, fixed-width
//! - `usize`: encoded as `u64` for portability
//! - `bool`: single byte (0 = false, 1 = true)
//! - `Vec<T>`/`String`: 8-byte length prefix followed by elements
//! - `BTreeMap<K, V>`: 8-byte entry count followed by key/value pairs in key order
//! - `Option<T>`: 1-byte tag (0 = None, 1 = Some) followed by value if present
//!
//! # Example
//!
//! ```ignore
//! use crate::types::encoding::{Encode, Decode};
//!
//! let path = vec!["root".to_string(), "balance".to_string()];
//! let bytes = path.to_bytes();
//! assert_eq!(Vec::<String>::from_bytes(&bytes).unwrap(), path);
//! ```

use menuvm_derive::Error;
use std::collections::BTreeMap;

/// Sink for writing encoded bytes.
pub trait EncodeSink {
    /// Writes the given bytes to the sink.
    fn write(&mut self, bytes: &[u8]);
}

/// Counter for computing encoded size without allocating memory.
pub struct SizeCounter {
    len: usize,
}

impl SizeCounter {
    pub fn new() -> Self {
        Self { len: 0 }
    }

    pub fn len(&self) -> usize {
        self.len
    }
}

impl Default for SizeCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl EncodeSink for SizeCounter {
    fn write(&mut self, bytes: &[u8]) {
        self.len += bytes.len();
    }
}

impl EncodeSink for Vec<u8> {
    fn write(&mut self, bytes: &[u8]) {
        self.extend_from_slice(bytes);
    }
}

/// Trait for types that can be serialized to binary format.
pub trait Encode {
    /// Writes the binary representation to the given sink.
    fn encode<S: EncodeSink>(&self, out: &mut S);

    /// Serializes to a new buffer with exact capacity.
    fn to_bytes(&self) -> Vec<u8> {
        let mut counter = SizeCounter::new();
        self.encode(&mut counter);

        let mut out = Vec::with_capacity(counter.len());
        self.encode(&mut out);
        out
    }
}

/// Errors that can occur during decoding.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// Input ended before expected data was read.
    #[error("unexpected end of input")]
    UnexpectedEof,
    /// Data does not represent a valid value for the target type.
    #[error("invalid value")]
    InvalidValue,
    /// Length prefix exceeds maximum allowed size.
    #[error("length prefix too large")]
    LengthOverflow,
}

/// Trait for types that can be deserialized from binary format.
pub trait Decode: Sized {
    /// Reads and decodes a value, advancing the input slice past the consumed bytes.
    fn decode(input: &mut &[u8]) -> Result<Self, DecodeError>;

    /// Decodes a value from a byte slice, requiring all bytes to be consumed.
    fn from_bytes(data: &[u8]) -> Result<Self, DecodeError> {
        let mut input = data;
        let value = Self::decode(&mut input)?;

        if !input.is_empty() {
            return Err(DecodeError::InvalidValue);
        }

        Ok(value)
    }
}

fn read_bytes<'a>(input: &mut &'a [u8], n: usize) -> Result<&'a [u8], DecodeError> {
    if input.len() < n {
        return Err(DecodeError::UnexpectedEof);
    }
    let (bytes, rest) = input.split_at(n);
    *input = rest;
    Ok(bytes)
}

impl Encode for u8 {
    fn encode<S: EncodeSink>(&self, out: &mut S) {
        out.write(&[*self]);
    }
}

impl Decode for u8 {
    fn decode(input: &mut &[u8]) -> Result<Self, DecodeError> {
        Ok(read_bytes(input, 1)?[0])
    }
}

macro_rules! impl_int {
    ($($t:ty),*) => {
        $(
            impl Encode for $t {
                fn encode<S: EncodeSink>(&self, out: &mut S) {
                    out.write(&self.to_le_bytes());
                }
            }

            impl Decode for $t {
                fn decode(input: &mut &[u8]) -> Result<Self, DecodeError> {
                    let mut buf = [0u8; std::mem::size_of::<$t>()];
                    buf.copy_from_slice(read_bytes(input, std::mem::size_of::<$t>())?);
                    Ok(<$t>::from_le_bytes(buf))
                }
            }
        )*
    };
}

impl_int!(u16, u32, u64);

impl Encode for usize {
    fn encode<S: EncodeSink>(&self, out: &mut S) {
        (*self as u64).encode(out);
    }
}

impl Decode for usize {
    fn decode(input: &mut &[u8]) -> Result<Self, DecodeError> {
        let v = u64::decode(input)?;
        usize::try_from(v).map_err(|_| DecodeError::LengthOverflow)
    }
}

impl Encode for bool {
    fn encode<S: EncodeSink>(&self, out: &mut S) {
        out.write(&[*self as u8]);
    }
}

impl Decode for bool {
    fn decode(input: &mut &[u8]) -> Result<Self, DecodeError> {
        match u8::decode(input)? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(DecodeError::InvalidValue),
        }
    }
}

/// Maximum allowed length for decoded collections to prevent memory exhaustion.
const MAX_VEC_LEN: usize = 1_000_000;

fn decode_len(input: &mut &[u8]) -> Result<usize, DecodeError> {
    let len = usize::decode(input)?;
    if len > MAX_VEC_LEN {
        return Err(DecodeError::LengthOverflow);
    }
    Ok(len)
}

impl<T: Encode> Encode for Vec<T> {
    fn encode<S: EncodeSink>(&self, out: &mut S) {
        self.len().encode(out);
        for item in self {
            item.encode(out);
        }
    }
}

impl<T: Decode> Decode for Vec<T> {
    fn decode(input: &mut &[u8]) -> Result<Self, DecodeError> {
        let len = decode_len(input)?;
        let mut vec = Vec::with_capacity(len.min(input.len()));
        for _ in 0..len {
            vec.push(T::decode(input)?);
        }
        Ok(vec)
    }
}

impl Encode for String {
    fn encode<S: EncodeSink>(&self, out: &mut S) {
        self.as_str().encode(out);
    }
}

impl Encode for &str {
    fn encode<S: EncodeSink>(&self, out: &mut S) {
        self.len().encode(out);
        out.write(self.as_bytes());
    }
}

impl Decode for String {
    fn decode(input: &mut &[u8]) -> Result<Self, DecodeError> {
        let len = decode_len(input)?;
        let bytes = read_bytes(input, len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| DecodeError::InvalidValue)
    }
}

impl<T: Encode> Encode for Option<T> {
    fn encode<S: EncodeSink>(&self, out: &mut S) {
        match self {
            None => 0u8.encode(out),
            Some(v) => {
                1u8.encode(out);
                v.encode(out);
            }
        }
    }
}

impl<T: Decode> Decode for Option<T> {
    fn decode(input: &mut &[u8]) -> Result<Self, DecodeError> {
        match u8::decode(input)? {
            0 => Ok(None),
            1 => Ok(Some(T::decode(input)?)),
            _ => Err(DecodeError::InvalidValue),
        }
    }
}

impl<K: Encode, V: Encode> Encode for BTreeMap<K, V> {
    fn encode<S: EncodeSink>(&self, out: &mut S) {
        self.len().encode(out);
        for (k, v) in self {
            k.encode(out);
            v.encode(out);
        }
    }
}

impl<K: Decode + Ord, V: Decode> Decode for BTreeMap<K, V> {
    fn decode(input: &mut &[u8]) -> Result<Self, DecodeError> {
        let len = decode_len(input)?;
        let mut map = BTreeMap::new();
        for _ in 0..len {
            let k = K::decode(input)?;
            let v = V::decode(input)?;
            if map.insert(k, v).is_some() {
                return Err(DecodeError::InvalidValue);
            }
        }
        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_bytes_preallocates_exact_capacity() {
        let data: Vec<u8> = vec![1, 2, 3, 4, 5];
        let bytes = data.to_bytes();
        assert_eq!(bytes.len(), 8 + 5);
        assert_eq!(bytes.capacity(), bytes.len());
    }

    #[test]
    fn u32_little_endian() {
        let val: u32 = 0x12345678;
        let bytes = val.to_bytes();
        assert_eq!(bytes, vec![0x78, 0x56, 0x34, 0x12]);
        assert_eq!(u32::from_bytes(&bytes).unwrap(), val);
    }

    #[test]
    fn bool_invalid_value() {
        for invalid in [2u8, 128, 255] {
            assert_eq!(bool::from_bytes(&[invalid]), Err(DecodeError::InvalidValue));
        }
    }

    #[test]
    fn string_invalid_utf8() {
        let mut bytes = Vec::new();
        3u64.encode(&mut bytes);
        bytes.extend_from_slice(&[0xFF, 0xFE, 0x00]);
        assert_eq!(String::from_bytes(&bytes), Err(DecodeError::InvalidValue));
    }

    #[test]
    fn str_encodes_same_as_string() {
        let s = "xyzzy";
        assert_eq!(s.to_bytes(), s.to_string().to_bytes());
    }

    #[test]
    fn vec_length_overflow() {
        let bytes = ((MAX_VEC_LEN as u64) + 1).to_bytes();
        assert_eq!(Vec::<u8>::from_bytes(&bytes), Err(DecodeError::LengthOverflow));
    }

    #[test]
    fn map_roundtrip_keeps_key_order() {
        let mut map = BTreeMap::new();
        map.insert("pinky".to_string(), "inky".to_string());
        map.insert("blinky".to_string(), "clyde".to_string());
        let bytes = map.to_bytes();
        let decoded = BTreeMap::<String, String>::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, map);
        assert_eq!(decoded.keys().next().unwrap(), "blinky");
    }

    #[test]
    fn map_duplicate_key_rejected() {
        let mut bytes = Vec::new();
        2usize.encode(&mut bytes);
        "foo".encode(&mut bytes);
        1u8.encode(&mut bytes);
        "foo".encode(&mut bytes);
        2u8.encode(&mut bytes);
        assert_eq!(
            BTreeMap::<String, u8>::from_bytes(&bytes),
            Err(DecodeError::InvalidValue)
        );
    }

    #[test]
    fn option_roundtrip() {
        let none: Option<String> = None;
        assert_eq!(Option::<String>::from_bytes(&none.to_bytes()).unwrap(), none);
        let some = Some("nl".to_string());
        assert_eq!(Option::<String>::from_bytes(&some.to_bytes()).unwrap(), some);
    }

    #[test]
    fn unexpected_eof_partial_input() {
        assert_eq!(u32::from_bytes(&[0x12, 0x34]), Err(DecodeError::UnexpectedEof));
    }

    #[test]
    fn trailing_bytes_error() {
        assert_eq!(u8::from_bytes(&[42u8, 0xFF]), Err(DecodeError::InvalidValue));
    }
}
