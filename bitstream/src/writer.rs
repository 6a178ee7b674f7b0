//! Bit-level writer producing the encodings [`BitReader`](crate::BitReader) consumes.

use crate::error::{BitError, BitResult};

/// A bit-level writer for encoding packed binary data.
///
/// Writes are accumulated MSB-first in an internal buffer. Call
/// [`finish`](Self::finish) to get the final byte buffer.
#[derive(Debug, Default, Clone)]
pub struct BitWriter {
    bytes: Vec<u8>,
    current_byte: u8,
    bit_count: u8,
}

impl BitWriter {
    /// Creates a new empty `BitWriter`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new `BitWriter` with pre-allocated capacity.
    #[must_use]
    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(bytes),
            current_byte: 0,
            bit_count: 0,
        }
    }

    /// Returns the number of bits written so far.
    #[must_use]
    pub fn bits_written(&self) -> usize {
        self.bytes.len() * 8 + usize::from(self.bit_count)
    }

    /// Writes a single bit.
    pub fn write_bool(&mut self, value: bool) {
        self.current_byte = (self.current_byte << 1) | u8::from(value);
        self.bit_count += 1;
        if self.bit_count == 8 {
            self.bytes.push(self.current_byte);
            self.current_byte = 0;
            self.bit_count = 0;
        }
    }

    /// Writes up to 64 bits from an unsigned integer.
    ///
    /// # Errors
    ///
    /// Returns [`BitError::InvalidBitCount`] if `bits > 64`.
    /// Returns [`BitError::ValueOutOfRange`] if `value` doesn't fit in `bits`.
    pub fn write_bits(&mut self, value: u64, bits: u8) -> BitResult<()> {
        if bits > 64 {
            return Err(BitError::InvalidBitCount { bits, max_bits: 64 });
        }
        if bits == 0 {
            return Ok(());
        }
        if bits < 64 && value >= (1u64 << bits) {
            return Err(BitError::ValueOutOfRange { value, bits });
        }
        for i in (0..bits).rev() {
            self.write_bool((value >> i) & 1 == 1);
        }
        Ok(())
    }

    /// Pads with zero bits up to the next byte boundary.
    pub fn align_to_byte(&mut self) {
        while self.bit_count != 0 {
            self.write_bool(false);
        }
    }

    /// Writes a byte at the current (possibly unaligned) position.
    pub fn write_u8(&mut self, value: u8) {
        for i in (0..8).rev() {
            self.write_bool((value >> i) & 1 == 1);
        }
    }

    /// Writes a varint `u32` as 8-bit groups.
    pub fn write_varu32(&mut self, value: u32) {
        self.write_varu64(u64::from(value));
    }

    /// Writes a varint `u64` as 8-bit groups.
    pub fn write_varu64(&mut self, mut value: u64) {
        loop {
            let mut byte = (value & 0x7F) as u8;
            value >>= 7;
            if value != 0 {
                byte |= 0x80;
            }
            self.write_u8(byte);
            if value == 0 {
                break;
            }
        }
    }

    /// Writes a zigzag varint `i32`.
    pub fn write_vars32(&mut self, value: i32) {
        let zigzag = ((value << 1) ^ (value >> 31)) as u32;
        self.write_varu32(zigzag);
    }

    /// Writes an unsigned bit-varint (see [`BitReader::read_ubitvar`](crate::BitReader::read_ubitvar)).
    pub fn write_ubitvar(&mut self, value: u32) -> BitResult<()> {
        let low = u64::from(value & 0x0F);
        let high = u64::from(value >> 4);
        if high == 0 {
            self.write_bits(low, 6)
        } else if high < 1 << 4 {
            self.write_bits((1 << 4) | low, 6)?;
            self.write_bits(high, 4)
        } else if high < 1 << 8 {
            self.write_bits((2 << 4) | low, 6)?;
            self.write_bits(high, 8)
        } else {
            self.write_bits((3 << 4) | low, 6)?;
            self.write_bits(high, 28)
        }
    }

    /// Writes a field-path bit-varint (see [`BitReader::read_ubitvar_fp`](crate::BitReader::read_ubitvar_fp)).
    ///
    /// # Errors
    ///
    /// Returns [`BitError::ValueOutOfRange`] for values of 2^31 or more.
    pub fn write_ubitvar_fp(&mut self, value: u32) -> BitResult<()> {
        for width in [2u8, 4, 10, 17] {
            if u64::from(value) < 1u64 << width {
                self.write_bool(true);
                return self.write_bits(u64::from(value), width);
            }
            self.write_bool(false);
        }
        self.write_bits(u64::from(value), 31)
    }

    /// Writes an IEEE-754 `f32` as 32 raw bits.
    pub fn write_f32(&mut self, value: f32) {
        self.write_u32_raw(value.to_bits());
    }

    /// Writes a coordinate, rounded to 1/32 units.
    ///
    /// # Errors
    ///
    /// Returns [`BitError::ValueOutOfRange`] when the integral part does not
    /// fit in 14 bits.
    pub fn write_bit_coord(&mut self, value: f32) -> BitResult<()> {
        let negative = value.is_sign_negative();
        let scaled = (f64::from(value.abs()) * 32.0).round() as u64;
        let int_part = scaled / 32;
        let frac_part = scaled % 32;
        let has_int = int_part > 0;
        let has_frac = frac_part > 0;
        self.write_bool(has_int);
        self.write_bool(has_frac);
        if !has_int && !has_frac {
            return Ok(());
        }
        self.write_bool(negative);
        if has_int {
            self.write_bits(int_part - 1, 14)?;
        }
        if has_frac {
            self.write_bits(frac_part, 5)?;
        }
        Ok(())
    }

    /// Writes a NUL-terminated string.
    pub fn write_string(&mut self, value: &str) {
        self.write_bytes(value.as_bytes());
        self.write_u8(0);
    }

    /// Writes raw bytes at the current position.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        if self.bit_count == 0 {
            self.bytes.extend_from_slice(bytes);
            return;
        }
        for &byte in bytes {
            self.write_u8(byte);
        }
    }

    /// Writes `bits` bits from a byte vector laid out like
    /// [`BitReader::read_bits_as_bytes`](crate::BitReader::read_bits_as_bytes).
    pub fn write_bits_from_bytes(&mut self, bytes: &[u8], bits: usize) -> BitResult<()> {
        let whole = bits / 8;
        let tail = (bits % 8) as u8;
        let needed = whole + usize::from(tail > 0);
        if bytes.len() < needed {
            return Err(BitError::UnexpectedEof {
                requested: needed,
                available: bytes.len(),
            });
        }
        self.write_bytes(&bytes[..whole]);
        if tail > 0 {
            self.write_bits(u64::from(bytes[whole]), tail)?;
        }
        Ok(())
    }

    /// Finishes writing and returns the byte buffer.
    ///
    /// If the last byte is incomplete, it is padded with zeros on the right.
    #[must_use]
    pub fn finish(mut self) -> Vec<u8> {
        if self.bit_count > 0 {
            self.current_byte <<= 8 - self.bit_count;
            self.bytes.push(self.current_byte);
        }
        self.bytes
    }

    fn write_u32_raw(&mut self, value: u32) {
        for byte in value.to_be_bytes() {
            self.write_u8(byte);
        }
    }
}
