//! [`CrdtWriter`]: growable byte buffer with CRDT-specific encodings.
//!
//! ## `vu57`: variable-length unsigned 57-bit integer (up to 8 bytes)
//!
//! The first seven bytes carry 7 payload bits each, little-endian, with the
//! high bit as a continuation flag. An eighth byte, if reached, carries 8 bits.
//!
//! ## `b1vu56`: 1-bit flag + variable-length unsigned 56-bit integer
//!
//! First byte is `|fczzzzzz|`: user flag, continuation bit, 6 low payload
//! bits. The rest continues like `vu57`, the eighth byte carrying 8 bits.
//!
//! ## `id(x, y)`: compact relative id
//!
//! `x <= 7` and `y <= 15` fit one byte `|0xxxyyyy|`. Otherwise `x` is written
//! as `b1vu56(1, x)` followed by `vu57(y)`.

#[derive(Debug, Default, Clone)]
pub struct CrdtWriter {
    buf: Vec<u8>,
}

impl CrdtWriter {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Returns the written bytes and leaves the writer empty.
    pub fn flush(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buf)
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    #[inline]
    pub fn u8(&mut self, val: u8) {
        self.buf.push(val);
    }

    #[inline]
    pub fn buf(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Writes the UTF-8 bytes of `s` and returns how many were written.
    #[inline]
    pub fn utf8(&mut self, s: &str) -> usize {
        self.buf.extend_from_slice(s.as_bytes());
        s.len()
    }

    /// `vu57` byte length followed by the UTF-8 bytes.
    pub fn str(&mut self, s: &str) {
        self.vu57(s.len() as u64);
        self.utf8(s);
    }

    pub fn id(&mut self, x: u64, y: u64) {
        if x <= 0b111 && y <= 0b1111 {
            self.u8((x as u8) << 4 | (y as u8));
        } else {
            self.b1vu56(1, x);
            self.vu57(y);
        }
    }

    pub fn vu57(&mut self, num: u64) {
        let mut rest = num;
        for _ in 0..7 {
            if rest <= 0x7F {
                self.u8(rest as u8);
                return;
            }
            self.u8(0x80 | (rest & 0x7F) as u8);
            rest >>= 7;
        }
        self.u8(rest as u8);
    }

    pub fn b1vu56(&mut self, flag: u8, num: u64) {
        let flag_bit = (flag & 1) << 7;
        if num <= 0x3F {
            self.u8(flag_bit | num as u8);
            return;
        }
        self.u8(flag_bit | 0x40 | (num & 0x3F) as u8);
        let mut rest = num >> 6;
        for _ in 0..6 {
            if rest <= 0x7F {
                self.u8(rest as u8);
                return;
            }
            self.u8(0x80 | (rest & 0x7F) as u8);
            rest >>= 7;
        }
        self.u8(rest as u8);
    }
}
