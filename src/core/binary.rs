// src/core/binary.rs

//! # Binary cache codec
//!
//! A compact, non-self-describing encoding used for the configure-time cache.
//! Every primitive is a one-byte tag followed by its native-endian bytes.
//! Strings, arrays and maps carry a `u16` length after their tag. Entities and
//! tuples are plain concatenations of their fields, so writer and reader must
//! agree on the field order exactly; `SCHEMA_VERSION` guards that.

use crate::constants::MAX_CONTAINER_LEN;
use crate::models::MultiMap;
use std::collections::BTreeMap;
use std::io::{Read, Write};
use thiserror::Error;

/// Errors raised while encoding or decoding the binary cache.
#[derive(Error, Debug)]
pub enum BinaryError {
    /// Underlying reader or writer failed, including truncated input.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The next value does not have the expected type.
    #[error("expected tag 0x{expected:02x} but found 0x{found:02x}")]
    TagMismatch {
        /// Tag the reader asked for.
        expected: u8,
        /// Tag present in the stream.
        found: u8,
    },

    /// A string, array or map exceeds the `u16` length prefix.
    #[error("{what} of length {len} is too large (limit is {limit})", limit = MAX_CONTAINER_LEN)]
    TooLarge {
        /// Kind of container.
        what: &'static str,
        /// Actual length.
        len: usize,
    },

    /// A string payload is not valid UTF-8.
    #[error("string payload is not valid UTF-8")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// An enum discriminant outside the known range.
    #[error("invalid {name} discriminant {value}")]
    InvalidEnum {
        /// Enum name.
        name: &'static str,
        /// Decoded discriminant.
        value: u8,
    },
}

/// One-byte type tags.
pub mod tag {
    /// `false`
    pub const FALSE: u8 = 0xC2;
    /// `true`
    pub const TRUE: u8 = 0xC3;
    /// `f32`
    pub const F32: u8 = 0xCA;
    /// `f64`
    pub const F64: u8 = 0xCB;
    /// `u8`
    pub const U8: u8 = 0xCC;
    /// `u16`
    pub const U16: u8 = 0xCD;
    /// `u32`
    pub const U32: u8 = 0xCE;
    /// `u64`
    pub const U64: u8 = 0xCF;
    /// `i8`
    pub const I8: u8 = 0xD0;
    /// `i16`
    pub const I16: u8 = 0xD1;
    /// `i32`
    pub const I32: u8 = 0xD2;
    /// `i64`
    pub const I64: u8 = 0xD3;
    /// UTF-8 string with `u16` byte length.
    pub const STR: u8 = 0xDA;
    /// Array with `u16` element count.
    pub const ARRAY: u8 = 0xDC;
    /// Map with `u16` pair count.
    pub const MAP: u8 = 0xDE;
}

/// A value with a binary cache representation.
pub trait Binary: Sized {
    /// Encodes the value.
    fn write<W: Write>(&self, out: &mut W) -> Result<(), BinaryError>;

    /// Decodes a value produced by [`Binary::write`].
    fn read<R: Read>(input: &mut R) -> Result<Self, BinaryError>;
}

/// Encodes a value into a fresh buffer. Nothing reaches the final sink if encoding fails.
pub fn to_bytes<T: Binary>(value: &T) -> Result<Vec<u8>, BinaryError> {
    let mut buffer = Vec::new();
    value.write(&mut buffer)?;
    Ok(buffer)
}

fn read_byte<R: Read>(input: &mut R) -> Result<u8, BinaryError> {
    let mut byte = [0u8; 1];
    input.read_exact(&mut byte)?;
    let [value] = byte;
    Ok(value)
}

fn expect_tag<R: Read>(input: &mut R, expected: u8) -> Result<(), BinaryError> {
    let found = read_byte(input)?;
    if found != expected {
        return Err(BinaryError::TagMismatch { expected, found });
    }
    Ok(())
}

fn check_len(what: &'static str, len: usize) -> Result<u16, BinaryError> {
    u16::try_from(len).map_err(|_| BinaryError::TooLarge { what, len })
}

/// Writes a container header: tag then `u16` length.
fn write_header<W: Write>(out: &mut W, tag: u8, len: u16) -> Result<(), BinaryError> {
    out.write_all(&[tag])?;
    out.write_all(&len.to_ne_bytes())?;
    Ok(())
}

fn read_header<R: Read>(input: &mut R, tag: u8) -> Result<usize, BinaryError> {
    expect_tag(input, tag)?;
    let mut len = [0u8; 2];
    input.read_exact(&mut len)?;
    Ok(usize::from(u16::from_ne_bytes(len)))
}

// --- Primitives ---

impl Binary for bool {
    fn write<W: Write>(&self, out: &mut W) -> Result<(), BinaryError> {
        out.write_all(&[if *self { tag::TRUE } else { tag::FALSE }])?;
        Ok(())
    }

    fn read<R: Read>(input: &mut R) -> Result<Self, BinaryError> {
        match read_byte(input)? {
            tag::TRUE => Ok(true),
            tag::FALSE => Ok(false),
            found => Err(BinaryError::TagMismatch {
                expected: tag::FALSE,
                found,
            }),
        }
    }
}

macro_rules! binary_number {
    ($($ty:ty => $tag:expr),* $(,)?) => {
        $(
            impl Binary for $ty {
                fn write<W: Write>(&self, out: &mut W) -> Result<(), BinaryError> {
                    out.write_all(&[$tag])?;
                    out.write_all(&self.to_ne_bytes())?;
                    Ok(())
                }

                fn read<R: Read>(input: &mut R) -> Result<Self, BinaryError> {
                    expect_tag(input, $tag)?;
                    let mut bytes = [0u8; std::mem::size_of::<$ty>()];
                    input.read_exact(&mut bytes)?;
                    Ok(<$ty>::from_ne_bytes(bytes))
                }
            }
        )*
    };
}

binary_number! {
    u8 => tag::U8,
    u16 => tag::U16,
    u32 => tag::U32,
    u64 => tag::U64,
    i8 => tag::I8,
    i16 => tag::I16,
    i32 => tag::I32,
    i64 => tag::I64,
    f32 => tag::F32,
    f64 => tag::F64,
}

impl Binary for String {
    fn write<W: Write>(&self, out: &mut W) -> Result<(), BinaryError> {
        let len = check_len("string", self.len())?;
        write_header(out, tag::STR, len)?;
        out.write_all(self.as_bytes())?;
        Ok(())
    }

    fn read<R: Read>(input: &mut R) -> Result<Self, BinaryError> {
        let len = read_header(input, tag::STR)?;
        let mut bytes = vec![0u8; len];
        input.read_exact(&mut bytes)?;
        Ok(Self::from_utf8(bytes)?)
    }
}

// --- Containers ---

impl<T: Binary> Binary for Vec<T> {
    fn write<W: Write>(&self, out: &mut W) -> Result<(), BinaryError> {
        let len = check_len("array", self.len())?;
        write_header(out, tag::ARRAY, len)?;
        for item in self {
            item.write(out)?;
        }
        Ok(())
    }

    fn read<R: Read>(input: &mut R) -> Result<Self, BinaryError> {
        let len = read_header(input, tag::ARRAY)?;
        let mut result = Self::with_capacity(len);
        for _ in 0..len {
            result.push(T::read(input)?);
        }
        Ok(result)
    }
}

impl<V: Binary> Binary for BTreeMap<String, V> {
    fn write<W: Write>(&self, out: &mut W) -> Result<(), BinaryError> {
        let len = check_len("map", self.len())?;
        write_header(out, tag::MAP, len)?;
        for (key, value) in self {
            key.write(out)?;
            value.write(out)?;
        }
        Ok(())
    }

    /// Later duplicates of a key overwrite earlier ones.
    fn read<R: Read>(input: &mut R) -> Result<Self, BinaryError> {
        let len = read_header(input, tag::MAP)?;
        let mut result = Self::new();
        for _ in 0..len {
            let key = String::read(input)?;
            result.insert(key, V::read(input)?);
        }
        Ok(result)
    }
}

/// Encoded as a map whose pair count is the number of values; duplicate keys repeat.
impl<V: Binary> Binary for MultiMap<V> {
    fn write<W: Write>(&self, out: &mut W) -> Result<(), BinaryError> {
        let len = check_len("map", self.len())?;
        write_header(out, tag::MAP, len)?;
        for (key, value) in self.iter() {
            key.to_string().write(out)?;
            value.write(out)?;
        }
        Ok(())
    }

    fn read<R: Read>(input: &mut R) -> Result<Self, BinaryError> {
        let len = read_header(input, tag::MAP)?;
        let mut result = Self::new();
        for _ in 0..len {
            let key = String::read(input)?;
            result.insert(key, V::read(input)?);
        }
        Ok(result)
    }
}

impl<T: Binary> Binary for Option<T> {
    fn write<W: Write>(&self, out: &mut W) -> Result<(), BinaryError> {
        self.is_some().write(out)?;
        if let Some(value) = self {
            value.write(out)?;
        }
        Ok(())
    }

    fn read<R: Read>(input: &mut R) -> Result<Self, BinaryError> {
        if bool::read(input)? {
            Ok(Some(T::read(input)?))
        } else {
            Ok(None)
        }
    }
}

impl<A: Binary, B: Binary> Binary for (A, B) {
    fn write<W: Write>(&self, out: &mut W) -> Result<(), BinaryError> {
        self.0.write(out)?;
        self.1.write(out)
    }

    fn read<R: Read>(input: &mut R) -> Result<Self, BinaryError> {
        Ok((A::read(input)?, B::read(input)?))
    }
}

impl<A: Binary, B: Binary, C: Binary> Binary for (A, B, C) {
    fn write<W: Write>(&self, out: &mut W) -> Result<(), BinaryError> {
        self.0.write(out)?;
        self.1.write(out)?;
        self.2.write(out)
    }

    fn read<R: Read>(input: &mut R) -> Result<Self, BinaryError> {
        Ok((A::read(input)?, B::read(input)?, C::read(input)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip<T: Binary>(value: &T) -> T {
        let bytes = to_bytes(value).unwrap();
        let mut cursor = bytes.as_slice();
        let decoded = T::read(&mut cursor).unwrap();
        assert!(cursor.is_empty(), "reader left trailing bytes");
        decoded
    }

    #[test]
    fn test_primitive_layout() {
        assert_eq!(to_bytes(&true).unwrap(), vec![tag::TRUE]);
        assert_eq!(to_bytes(&false).unwrap(), vec![tag::FALSE]);

        let mut expected = vec![tag::U16];
        expected.extend_from_slice(&300u16.to_ne_bytes());
        assert_eq!(to_bytes(&300u16).unwrap(), expected);

        let mut expected = vec![tag::STR];
        expected.extend_from_slice(&3u16.to_ne_bytes());
        expected.extend_from_slice(b"abc");
        assert_eq!(to_bytes(&"abc".to_string()).unwrap(), expected);
    }

    #[test]
    fn test_numbers_and_tuples() {
        let value = (-7i64, 1.5f64, 4_000_000_000u32);
        assert_eq!(round_trip(&value), value);
        assert_eq!(round_trip(&(i8::MIN, u64::MAX)), (i8::MIN, u64::MAX));
    }

    #[test]
    fn test_containers() {
        let list = vec!["a".to_string(), "é".to_string()];
        assert_eq!(round_trip(&list), list);

        let mut map = BTreeMap::new();
        map.insert("one".to_string(), 1u32);
        map.insert("two".to_string(), 2u32);
        assert_eq!(round_trip(&map), map);

        let some: Option<String> = Some("x".into());
        assert_eq!(round_trip(&some), some);
        assert_eq!(round_trip(&None::<String>), None);
    }

    #[test]
    fn test_multimap_keeps_every_value() {
        let mut map = MultiMap::new();
        map.insert("v".to_string(), 1u8);
        map.insert("v".to_string(), 2u8);
        map.insert("w".to_string(), 3u8);
        let decoded = round_trip(&map);
        assert_eq!(decoded.get_all("v"), &[1, 2]);
        assert_eq!(decoded, map);
    }

    #[test]
    fn test_map_read_overwrites_duplicate_keys() {
        let mut bytes = Vec::new();
        write_header(&mut bytes, tag::MAP, 2).unwrap();
        for value in [1u8, 9u8] {
            "k".to_string().write(&mut bytes).unwrap();
            value.write(&mut bytes).unwrap();
        }
        let map = BTreeMap::<String, u8>::read(&mut bytes.as_slice()).unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("k"), Some(&9));
    }

    #[test]
    fn test_oversized_containers_write_nothing() {
        let mut out = Vec::new();
        let long = "x".repeat(MAX_CONTAINER_LEN + 1);
        let err = long.write(&mut out).unwrap_err();
        assert!(matches!(err, BinaryError::TooLarge { what: "string", len } if len == 65536));
        assert!(out.is_empty());

        let many = vec![0u8; MAX_CONTAINER_LEN + 1];
        assert!(matches!(
            many.write(&mut out),
            Err(BinaryError::TooLarge { what: "array", .. })
        ));
        assert!(out.is_empty());

        let exact = "y".repeat(MAX_CONTAINER_LEN);
        assert_eq!(round_trip(&exact), exact);
    }

    #[test]
    fn test_tag_mismatch_reports_both_tags() {
        let bytes = to_bytes(&true).unwrap();
        let err = u32::read(&mut bytes.as_slice()).unwrap_err();
        assert!(matches!(
            err,
            BinaryError::TagMismatch {
                expected: tag::U32,
                found: tag::TRUE
            }
        ));
        assert!(err.to_string().contains("0xce"));
    }

    #[test]
    fn test_truncated_and_invalid_input() {
        let bytes = to_bytes(&"hello".to_string()).unwrap();
        let mut truncated = bytes.get(..4).unwrap();
        assert!(matches!(
            String::read(&mut truncated),
            Err(BinaryError::Io(_))
        ));

        let mut invalid = Vec::new();
        write_header(&mut invalid, tag::STR, 1).unwrap();
        invalid.push(0xFF);
        assert!(matches!(
            String::read(&mut invalid.as_slice()),
            Err(BinaryError::InvalidUtf8(_))
        ));
    }
}
