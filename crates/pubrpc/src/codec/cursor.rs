// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Bounds-checked little-endian cursors over byte buffers.

use super::{CodecError, CodecResult};

macro_rules! impl_put_le {
    ($name:ident, $type:ty) => {
        pub fn $name(&mut self, value: $type) {
            self.buffer.extend_from_slice(&value.to_le_bytes());
        }
    };
}

macro_rules! impl_read_le {
    ($name:ident, $type:ty, $size:expr) => {
        pub fn $name(&mut self) -> CodecResult<$type> {
            let mut bytes = [0u8; $size];
            bytes.copy_from_slice(self.read_bytes($size)?);
            Ok(<$type>::from_le_bytes(bytes))
        }
    };
}

/// Growable write cursor.
///
/// Writes never fail; the only limit is the `u32` length prefix used for
/// variable-size fields, checked by [`CursorMut::put_len_prefixed`].
#[derive(Debug, Default)]
pub struct CursorMut {
    buffer: Vec<u8>,
}

impl CursorMut {
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    impl_put_le!(put_u8, u8);
    impl_put_le!(put_u16_le, u16);
    impl_put_le!(put_u32_le, u32);
    impl_put_le!(put_u64_le, u64);

    pub fn put_bool(&mut self, value: bool) {
        self.put_u8(u8::from(value));
    }

    pub fn put_bytes(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Write a `u32` length followed by `data`.
    pub fn put_len_prefixed(&mut self, data: &[u8]) -> CodecResult<()> {
        let len = u32::try_from(data.len()).map_err(|_| CodecError::TooLarge {
            offset: self.buffer.len(),
            len: data.len(),
        })?;
        self.put_u32_le(len);
        self.put_bytes(data);
        Ok(())
    }

    pub fn put_str(&mut self, value: &str) -> CodecResult<()> {
        self.put_len_prefixed(value.as_bytes())
    }

    pub fn offset(&self) -> usize {
        self.buffer.len()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buffer
    }
}

/// Read cursor over a borrowed buffer.
pub struct Cursor<'a> {
    buffer: &'a [u8],
    offset: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Self { buffer, offset: 0 }
    }

    impl_read_le!(read_u8, u8, 1);
    impl_read_le!(read_u16_le, u16, 2);
    impl_read_le!(read_u32_le, u32, 4);
    impl_read_le!(read_u64_le, u64, 8);

    pub fn read_bool(&mut self) -> CodecResult<bool> {
        let offset = self.offset;
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(CodecError::InvalidValue {
                offset,
                reason: format!("bool byte {:#04x}", other),
            }),
        }
    }

    pub fn read_bytes(&mut self, len: usize) -> CodecResult<&'a [u8]> {
        let end = self
            .offset
            .checked_add(len)
            .filter(|end| *end <= self.buffer.len())
            .ok_or(CodecError::UnexpectedEof {
                offset: self.offset,
                wanted: len,
            })?;
        let slice = &self.buffer[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    pub fn read_len_prefixed(&mut self) -> CodecResult<&'a [u8]> {
        let len = self.read_u32_le()? as usize;
        self.read_bytes(len)
    }

    pub fn read_string(&mut self) -> CodecResult<String> {
        let offset = self.offset;
        let raw = self.read_len_prefixed()?;
        String::from_utf8(raw.to_vec()).map_err(|_| CodecError::InvalidValue {
            offset,
            reason: "string is not valid UTF-8".into(),
        })
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.offset)
    }

    pub fn is_eof(&self) -> bool {
        self.offset >= self.buffer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_U16: u16 = 0xCDEF;
    const TEST_U32: u32 = 0x1234_5678;
    const TEST_U64: u64 = 0x1122_3344_5566_7788;

    #[test]
    fn test_primitives_are_little_endian() {
        let mut cursor = CursorMut::new();
        cursor.put_u16_le(TEST_U16);
        cursor.put_u32_le(TEST_U32);
        let bytes = cursor.into_inner();
        assert_eq!(bytes, vec![0xEF, 0xCD, 0x78, 0x56, 0x34, 0x12]);
    }

    #[test]
    fn test_read_past_end_reports_offset() {
        let bytes = TEST_U64.to_le_bytes();
        let mut cursor = Cursor::new(&bytes[..6]);
        cursor.read_u32_le().expect("first read fits");
        let err = cursor.read_u32_le().unwrap_err();
        assert!(matches!(
            err,
            CodecError::UnexpectedEof {
                offset: 4,
                wanted: 4
            }
        ));
    }

    #[test]
    fn test_huge_length_prefix_does_not_overflow() {
        let bytes = u32::MAX.to_le_bytes();
        let mut cursor = Cursor::new(&bytes);
        assert!(matches!(
            cursor.read_len_prefixed(),
            Err(CodecError::UnexpectedEof { offset: 4, .. })
        ));
    }

    #[test]
    fn test_invalid_bool_rejected() {
        let mut cursor = Cursor::new(&[2u8]);
        assert!(matches!(
            cursor.read_bool(),
            Err(CodecError::InvalidValue { offset: 0, .. })
        ));
    }

    #[test]
    fn test_string_with_bad_utf8_rejected() {
        let mut writer = CursorMut::new();
        writer.put_len_prefixed(&[0xFF, 0xFE]).expect("small slice");
        let bytes = writer.into_inner();
        let mut cursor = Cursor::new(&bytes);
        assert!(cursor.read_string().is_err());
        assert_eq!(cursor.remaining(), 0);
    }
}
