// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Wire codec for call metadata and message envelopes.
//!
//! Every encoded value is plain little-endian: fixed-width integers,
//! `u32`-length-prefixed strings and byte sequences, and a presence byte
//! in front of each optional field.

pub mod cursor;

pub use cursor::{Cursor, CursorMut};

use std::fmt;

/// Serialization error with the buffer offset where it was detected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Buffer ended before `wanted` more bytes could be read.
    UnexpectedEof { offset: usize, wanted: usize },
    /// A field held a value outside its domain.
    InvalidValue { offset: usize, reason: String },
    /// A variable-size field does not fit the `u32` length prefix.
    TooLarge { offset: usize, len: usize },
    /// Bytes were left over after a complete value was decoded.
    TrailingBytes { offset: usize, remaining: usize },
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::UnexpectedEof { offset, wanted } => write!(
                f,
                "unexpected end of buffer at offset {} (wanted {} bytes)",
                offset, wanted
            ),
            CodecError::InvalidValue { offset, reason } => {
                write!(f, "invalid value at offset {}: {}", offset, reason)
            }
            CodecError::TooLarge { offset, len } => {
                write!(f, "field of {} bytes at offset {} is too large", len, offset)
            }
            CodecError::TrailingBytes { offset, remaining } => {
                write!(f, "{} trailing bytes at offset {}", remaining, offset)
            }
        }
    }
}

impl std::error::Error for CodecError {}

pub type CodecResult<T> = core::result::Result<T, CodecError>;

/// Types that can be written to the wire.
pub trait Encode {
    /// Append the encoded form of `self` to `cursor`.
    fn encode(&self, cursor: &mut CursorMut) -> CodecResult<()>;

    /// Encode into a fresh buffer.
    fn to_bytes(&self) -> CodecResult<Vec<u8>> {
        let mut cursor = CursorMut::with_capacity(64);
        self.encode(&mut cursor)?;
        Ok(cursor.into_inner())
    }
}

/// Types that can be read back from the wire.
pub trait Decode: Sized {
    /// Read one value, advancing `cursor` past it.
    fn decode(cursor: &mut Cursor<'_>) -> CodecResult<Self>;

    /// Decode a buffer that must contain exactly one value.
    fn from_bytes(bytes: &[u8]) -> CodecResult<Self> {
        let mut cursor = Cursor::new(bytes);
        let value = Self::decode(&mut cursor)?;
        if !cursor.is_eof() {
            return Err(CodecError::TrailingBytes {
                offset: cursor.offset(),
                remaining: cursor.remaining(),
            });
        }
        Ok(value)
    }
}

/// Write `value` behind a presence byte.
pub fn put_optional<T, F>(cursor: &mut CursorMut, value: Option<&T>, put: F) -> CodecResult<()>
where
    T: ?Sized,
    F: FnOnce(&mut CursorMut, &T) -> CodecResult<()>,
{
    match value {
        Some(inner) => {
            cursor.put_bool(true);
            put(cursor, inner)
        }
        None => {
            cursor.put_bool(false);
            Ok(())
        }
    }
}

/// Read a value written by [`put_optional`].
pub fn read_optional<'a, T, F>(cursor: &mut Cursor<'a>, read: F) -> CodecResult<Option<T>>
where
    F: FnOnce(&mut Cursor<'a>) -> CodecResult<T>,
{
    if cursor.read_bool()? {
        read(cursor).map(Some)
    } else {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_error_display_variants() {
        let err = CodecError::UnexpectedEof {
            offset: 12,
            wanted: 4,
        };
        assert_eq!(
            err.to_string(),
            "unexpected end of buffer at offset 12 (wanted 4 bytes)"
        );

        let err = CodecError::TrailingBytes {
            offset: 8,
            remaining: 3,
        };
        assert_eq!(err.to_string(), "3 trailing bytes at offset 8");
    }

    #[test]
    fn test_optional_presence_byte() {
        let mut cursor = CursorMut::new();
        put_optional(&mut cursor, Some(&7u32), |c, v| {
            c.put_u32_le(*v);
            Ok(())
        })
        .expect("encode");
        put_optional::<u32, _>(&mut cursor, None, |c, v| {
            c.put_u32_le(*v);
            Ok(())
        })
        .expect("encode");
        let bytes = cursor.into_inner();
        assert_eq!(bytes, vec![1, 7, 0, 0, 0, 0]);

        let mut reader = Cursor::new(&bytes);
        assert_eq!(
            read_optional(&mut reader, |c| c.read_u32_le()).expect("decode"),
            Some(7)
        );
        assert_eq!(
            read_optional(&mut reader, |c| c.read_u32_le()).expect("decode"),
            None
        );
        assert!(reader.is_eof());
    }
}
