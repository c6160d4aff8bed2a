// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Field-level encoding primitives shared by the record codec.
//!
//! Fixed-width integers are little endian. Length-prefixed fields are a varint32 length followed
//! by that many bytes.

use crate::{Result, TraceError};
use byteorder::{ByteOrder, LittleEndian};

const MAX_VARINT32_LEN: usize = 5;

pub fn put_fixed32(dst: &mut Vec<u8>, value: u32) {
    let mut buf = [0u8; 4];
    LittleEndian::write_u32(&mut buf, value);
    dst.extend_from_slice(&buf);
}

pub fn put_fixed64(dst: &mut Vec<u8>, value: u64) {
    let mut buf = [0u8; 8];
    LittleEndian::write_u64(&mut buf, value);
    dst.extend_from_slice(&buf);
}

pub fn put_varint32(dst: &mut Vec<u8>, mut value: u32) {
    while value >= 0x80 {
        dst.push((value as u8) | 0x80);
        value >>= 7;
    }
    dst.push(value as u8);
}

/// Number of bytes `put_varint32` writes for `value`.
pub fn varint32_len(value: u32) -> usize {
    match value {
        0..=0x7f => 1,
        0x80..=0x3fff => 2,
        0x4000..=0x1f_ffff => 3,
        0x20_0000..=0x0fff_ffff => 4,
        _ => 5,
    }
}

/// Appends `value` with a varint32 length prefix.
///
/// Fails if the value is longer than a varint32 can describe.
pub fn put_length_prefixed(dst: &mut Vec<u8>, value: &[u8]) -> Result<()> {
    let len = u32::try_from(value.len()).map_err(|_| {
        TraceError::ResourceExhausted(format!("field of {} bytes is too long", value.len()))
    })?;
    put_varint32(dst, len);
    dst.extend_from_slice(value);
    Ok(())
}

/// A forward-only cursor over an encoded buffer.
#[derive(Debug, Clone)]
pub struct Decoder<'a> {
    buf: &'a [u8],
}

impl<'a> Decoder<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Decoder { buf }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    fn take(&mut self, n: usize, what: &str) -> Result<&'a [u8]> {
        if self.buf.len() < n {
            return Err(TraceError::incomplete(format!(
                "{what}: need {n} bytes, {} left",
                self.buf.len()
            )));
        }
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    pub fn get_u8(&mut self, what: &str) -> Result<u8> {
        Ok(self.take(1, what)?[0])
    }

    pub fn get_fixed32(&mut self, what: &str) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.take(4, what)?))
    }

    pub fn get_fixed64(&mut self, what: &str) -> Result<u64> {
        Ok(LittleEndian::read_u64(self.take(8, what)?))
    }

    pub fn get_varint32(&mut self, what: &str) -> Result<u32> {
        let mut value = 0u32;
        for (i, byte) in self.buf.iter().enumerate().take(MAX_VARINT32_LEN) {
            value |= u32::from(byte & 0x7f) << (7 * i);
            if byte & 0x80 == 0 {
                self.buf = &self.buf[i + 1..];
                return Ok(value);
            }
        }
        if self.buf.len() < MAX_VARINT32_LEN {
            Err(TraceError::incomplete(format!("{what}: truncated varint")))
        } else {
            Err(TraceError::corruption(format!("{what}: malformed varint")))
        }
    }

    pub fn get_length_prefixed(&mut self, what: &str) -> Result<&'a [u8]> {
        let len = self.get_varint32(what)? as usize;
        self.take(len, what)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_fields_are_little_endian() {
        let mut buf = Vec::new();
        put_fixed32(&mut buf, 0x0403_0201);
        put_fixed64(&mut buf, 0x0807_0605_0403_0201);
        assert_eq!(buf, [1, 2, 3, 4, 1, 2, 3, 4, 5, 6, 7, 8]);

        let mut decoder = Decoder::new(&buf);
        assert_eq!(decoder.get_fixed32("a").unwrap(), 0x0403_0201);
        assert_eq!(decoder.get_fixed64("b").unwrap(), 0x0807_0605_0403_0201);
        assert!(decoder.is_empty());
    }

    #[test]
    fn varint_lengths() {
        for value in [0, 1, 127, 128, 300, 16_383, 16_384, u32::MAX] {
            let mut buf = Vec::new();
            put_varint32(&mut buf, value);
            assert_eq!(buf.len(), varint32_len(value), "value {value}");
            assert_eq!(Decoder::new(&buf).get_varint32("v").unwrap(), value);
        }
        let mut buf = Vec::new();
        put_varint32(&mut buf, 300);
        assert_eq!(buf, [0xac, 0x02]);
    }

    #[test]
    fn short_fixed_field_is_incomplete() {
        let err = Decoder::new(&[1, 2, 3]).get_fixed32("key size").unwrap_err();
        assert!(err.is_incomplete(), "{err}");
    }

    #[test]
    fn truncated_varint_is_incomplete() {
        let err = Decoder::new(&[0x80, 0x80]).get_varint32("len").unwrap_err();
        assert!(err.is_incomplete(), "{err}");
    }

    #[test]
    fn overlong_varint_is_corruption() {
        let err = Decoder::new(&[0xff; 6]).get_varint32("len").unwrap_err();
        assert!(matches!(err, TraceError::Corruption(_)), "{err}");
    }

    #[test]
    fn length_prefix_past_end_is_incomplete() {
        let mut buf = Vec::new();
        put_varint32(&mut buf, 10);
        buf.extend_from_slice(b"abc");
        let err = Decoder::new(&buf).get_length_prefixed("key").unwrap_err();
        assert!(err.is_incomplete(), "{err}");
    }

    #[test]
    fn length_prefixed_round_trip() {
        let mut buf = Vec::new();
        put_length_prefixed(&mut buf, b"key").unwrap();
        put_length_prefixed(&mut buf, b"").unwrap();
        let mut decoder = Decoder::new(&buf);
        assert_eq!(decoder.get_length_prefixed("k").unwrap(), b"key");
        assert_eq!(decoder.get_length_prefixed("v").unwrap(), b"");
        assert_eq!(decoder.remaining(), 0);
    }
}
