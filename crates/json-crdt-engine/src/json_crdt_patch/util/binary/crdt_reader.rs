//! [`CrdtReader`]: bounds-checked cursor over a byte slice, the decoding
//! side of [`CrdtWriter`](super::CrdtWriter). Every read returns a
//! [`DecodeError`] instead of panicking on truncated input.

use crate::json_crdt_patch::codec::DecodeError;

pub struct CrdtReader<'a> {
    pub data: &'a [u8],
    pub x: usize,
}

impl<'a> CrdtReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, x: 0 }
    }

    pub fn is_eof(&self) -> bool {
        self.x >= self.data.len()
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.x)
    }

    #[inline]
    pub fn u8(&mut self) -> Result<u8, DecodeError> {
        let v = *self.data.get(self.x).ok_or(DecodeError::UnexpectedEof)?;
        self.x += 1;
        Ok(v)
    }

    #[inline]
    pub fn peek(&self) -> Result<u8, DecodeError> {
        self.data.get(self.x).copied().ok_or(DecodeError::UnexpectedEof)
    }

    /// Returns the next `len` bytes and advances past them.
    pub fn buf(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        let end = self.x.checked_add(len).ok_or(DecodeError::UnexpectedEof)?;
        let out = self.data.get(self.x..end).ok_or(DecodeError::UnexpectedEof)?;
        self.x = end;
        Ok(out)
    }

    pub fn utf8(&mut self, len: usize) -> Result<&'a str, DecodeError> {
        let bytes = self.buf(len)?;
        std::str::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8)
    }

    /// Reads a `vu57` length followed by that many UTF-8 bytes.
    pub fn str(&mut self) -> Result<&'a str, DecodeError> {
        let len = self.length()?;
        self.utf8(len)
    }

    /// A `vu57` used as a length; rejects values that cannot fit the input.
    pub fn length(&mut self) -> Result<usize, DecodeError> {
        let n = self.vu57()?;
        if n > self.remaining() as u64 {
            return Err(DecodeError::UnexpectedEof);
        }
        Ok(n as usize)
    }

    /// Decodes a compact relative id, returning `(x, y)`.
    pub fn id(&mut self) -> Result<(u64, u64), DecodeError> {
        let byte = self.peek()?;
        if byte <= 0b0111_1111 {
            self.x += 1;
            return Ok(((byte >> 4) as u64, (byte & 0x0F) as u64));
        }
        let (_, x) = self.b1vu56()?;
        let y = self.vu57()?;
        Ok((x, y))
    }

    pub fn vu57(&mut self) -> Result<u64, DecodeError> {
        let mut result = 0u64;
        let mut shift = 0;
        for _ in 0..7 {
            let byte = self.u8()?;
            result |= ((byte & 0x7F) as u64) << shift;
            if byte & 0x80 == 0 {
                return Ok(result);
            }
            shift += 7;
        }
        let last = self.u8()?;
        Ok(result | ((last as u64) << shift))
    }

    /// Returns `(flag, value)`.
    pub fn b1vu56(&mut self) -> Result<(u8, u64), DecodeError> {
        let first = self.u8()?;
        let flag = first >> 7;
        let mut result = (first & 0x3F) as u64;
        if first & 0x40 == 0 {
            return Ok((flag, result));
        }
        let mut shift = 6;
        for _ in 0..6 {
            let byte = self.u8()?;
            result |= ((byte & 0x7F) as u64) << shift;
            if byte & 0x80 == 0 {
                return Ok((flag, result));
            }
            shift += 7;
        }
        let last = self.u8()?;
        Ok((flag, result | ((last as u64) << shift)))
    }
}
