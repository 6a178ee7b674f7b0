//! Bit-level reader with bounded operations.

use crate::error::{BitError, BitResult};

/// Resolution of the fractional part of a bit coordinate.
const COORD_FRACTIONAL_BITS: u8 = 5;
/// Width of the integral part of a bit coordinate.
const COORD_INTEGER_BITS: u8 = 14;

/// A bit-level reader for decoding packed binary data.
///
/// Bits are consumed MSB-first within each byte. All read operations are
/// bounds-checked and return errors on failure; the reader never panics on
/// malformed input.
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    data: &'a [u8],
    bit_pos: usize,
}

impl<'a> BitReader<'a> {
    /// Creates a new `BitReader` from a byte slice.
    #[must_use]
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, bit_pos: 0 }
    }

    /// Returns the number of bits remaining to read.
    #[must_use]
    pub const fn bits_remaining(&self) -> usize {
        self.data
            .len()
            .saturating_mul(8)
            .saturating_sub(self.bit_pos)
    }

    /// Returns `true` if there are no more bits to read.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.bits_remaining() == 0
    }

    /// Returns the current bit position.
    #[must_use]
    pub const fn bit_position(&self) -> usize {
        self.bit_pos
    }

    /// Reads a single bit as a boolean.
    pub fn read_bit(&mut self) -> BitResult<bool> {
        self.ensure_bits(1)?;
        let byte = self.data[self.bit_pos / 8];
        let bit = (byte >> (7 - self.bit_pos % 8)) & 1;
        self.bit_pos += 1;
        Ok(bit == 1)
    }

    /// Alias for [`read_bit`](Self::read_bit).
    pub fn read_bool(&mut self) -> BitResult<bool> {
        self.read_bit()
    }

    /// Reads up to 64 bits as an unsigned integer.
    pub fn read_bits(&mut self, bits: u8) -> BitResult<u64> {
        if bits > 64 {
            return Err(BitError::InvalidBitCount { bits, max_bits: 64 });
        }
        if bits == 0 {
            return Ok(0);
        }
        self.ensure_bits(usize::from(bits))?;

        let mut value = 0u64;
        let mut remaining = bits;
        while remaining > 0 {
            let byte = self.data[self.bit_pos / 8];
            let offset = (self.bit_pos % 8) as u8;
            let available = 8 - offset;
            let take = available.min(remaining);
            let shift = available - take;
            let mask = ((1u16 << take) - 1) as u8;
            value = (value << take) | u64::from((byte >> shift) & mask);
            self.bit_pos += usize::from(take);
            remaining -= take;
        }
        Ok(value)
    }

    /// Reads up to 32 bits as a `u32`.
    pub fn read_u32_bits(&mut self, bits: u8) -> BitResult<u32> {
        if bits > 32 {
            return Err(BitError::InvalidBitCount { bits, max_bits: 32 });
        }
        // At most 32 bits were read, so the value fits.
        Ok(self.read_bits(bits)? as u32)
    }

    /// Skips `bits` bits.
    pub fn skip_bits(&mut self, bits: usize) -> BitResult<()> {
        self.ensure_bits(bits)?;
        self.bit_pos += bits;
        Ok(())
    }

    /// Aligns to the next byte boundary.
    pub fn align_to_byte(&mut self) -> BitResult<()> {
        let rem = self.bit_pos % 8;
        if rem == 0 {
            return Ok(());
        }
        self.skip_bits(8 - rem)
    }

    /// Reads a `u8` at the current (possibly unaligned) position.
    pub fn read_u8(&mut self) -> BitResult<u8> {
        Ok(self.read_bits(8)? as u8)
    }

    /// Reads a varint `u32` made of 8-bit groups at any bit position.
    pub fn read_varu32(&mut self) -> BitResult<u32> {
        let mut result = 0u32;
        for shift in (0..35).step_by(7) {
            let byte = self.read_u8()?;
            result |= u32::from(byte & 0x7F) << shift;
            if byte & 0x80 == 0 {
                return Ok(result);
            }
        }
        Err(BitError::InvalidVarint)
    }

    /// Reads a varint `u64` made of 8-bit groups at any bit position.
    pub fn read_varu64(&mut self) -> BitResult<u64> {
        let mut result = 0u64;
        for shift in (0..70).step_by(7) {
            let byte = self.read_u8()?;
            result |= u64::from(byte & 0x7F) << shift;
            if byte & 0x80 == 0 {
                return Ok(result);
            }
        }
        Err(BitError::InvalidVarint)
    }

    /// Reads a zigzag varint `i32`.
    pub fn read_vars32(&mut self) -> BitResult<i32> {
        let value = self.read_varu32()?;
        Ok(((value >> 1) as i32) ^ -((value & 1) as i32))
    }

    /// Reads an unsigned bit-varint.
    ///
    /// Six header bits carry the low nibble and a two-bit selector choosing
    /// 0, 4, 8 or 28 additional high bits.
    pub fn read_ubitvar(&mut self) -> BitResult<u32> {
        let head = self.read_u32_bits(6)?;
        let low = head & 0x0F;
        let value = match head >> 4 {
            0 => low,
            1 => low | (self.read_u32_bits(4)? << 4),
            2 => low | (self.read_u32_bits(8)? << 4),
            _ => low | (self.read_u32_bits(28)? << 4),
        };
        Ok(value)
    }

    /// Reads an unsigned bit-varint tuned for field path deltas.
    ///
    /// A unary prefix selects a 2, 4, 10, 17 or 31 bit payload.
    pub fn read_ubitvar_fp(&mut self) -> BitResult<u32> {
        for width in [2u8, 4, 10, 17] {
            if self.read_bit()? {
                return self.read_u32_bits(width);
            }
        }
        self.read_u32_bits(31)
    }

    /// Reads an IEEE-754 `f32` from 32 raw bits.
    pub fn read_f32(&mut self) -> BitResult<f32> {
        Ok(f32::from_bits(self.read_u32_bits(32)?))
    }

    /// Reads a coordinate with 14 integral and 5 fractional bits.
    pub fn read_bit_coord(&mut self) -> BitResult<f32> {
        let has_int = self.read_bit()?;
        let has_frac = self.read_bit()?;
        if !has_int && !has_frac {
            return Ok(0.0);
        }
        let negative = self.read_bit()?;
        let int_part = if has_int {
            self.read_u32_bits(COORD_INTEGER_BITS)? + 1
        } else {
            0
        };
        let frac_part = if has_frac {
            self.read_u32_bits(COORD_FRACTIONAL_BITS)?
        } else {
            0
        };
        let resolution = 1.0 / f64::from(1u32 << COORD_FRACTIONAL_BITS);
        let magnitude = (f64::from(int_part) + f64::from(frac_part) * resolution) as f32;
        Ok(if negative { -magnitude } else { magnitude })
    }

    /// Reads a NUL-terminated string of at most `max_len` bytes.
    ///
    /// Invalid UTF-8 sequences are replaced rather than rejected.
    pub fn read_string(&mut self, max_len: usize) -> BitResult<String> {
        let mut buf = Vec::new();
        loop {
            let byte = self.read_u8()?;
            if byte == 0 {
                break;
            }
            if buf.len() == max_len {
                return Err(BitError::StringTooLong { limit: max_len });
            }
            buf.push(byte);
        }
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Reads `len` whole bytes at the current position.
    pub fn read_bytes(&mut self, len: usize) -> BitResult<Vec<u8>> {
        self.ensure_bits(len.saturating_mul(8))?;
        if self.bit_pos % 8 == 0 {
            let start = self.bit_pos / 8;
            self.bit_pos += len * 8;
            return Ok(self.data[start..start + len].to_vec());
        }
        (0..len).map(|_| self.read_u8()).collect()
    }

    /// Reads `bits` bits into a byte vector.
    ///
    /// Whole bytes come first; a trailing partial byte holds the remaining
    /// bits right-aligned.
    pub fn read_bits_as_bytes(&mut self, bits: usize) -> BitResult<Vec<u8>> {
        self.ensure_bits(bits)?;
        let mut out = self.read_bytes(bits / 8)?;
        let tail = (bits % 8) as u8;
        if tail > 0 {
            out.push(self.read_bits(tail)? as u8);
        }
        Ok(out)
    }

    fn ensure_bits(&self, bits: usize) -> BitResult<()> {
        let available = self.bits_remaining();
        if bits > available {
            return Err(BitError::UnexpectedEof {
                requested: bits,
                available,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_reader() {
        let reader = BitReader::new(&[]);
        assert!(reader.is_empty());
        assert_eq!(reader.bits_remaining(), 0);
        assert_eq!(reader.bit_position(), 0);
    }

    #[test]
    fn read_from_empty_fails() {
        let mut reader = BitReader::new(&[]);
        let result = reader.read_bit();
        assert!(matches!(result, Err(BitError::UnexpectedEof { .. })));
    }

    #[test]
    fn read_bits_across_bytes() {
        let mut reader = BitReader::new(&[0b1111_0000, 0b0000_1111]);
        assert_eq!(reader.read_bits(12).unwrap(), 0b1111_0000_0000);
        assert_eq!(reader.bits_remaining(), 4);
        assert_eq!(reader.read_bits(4).unwrap(), 0b1111);
    }

    #[test]
    fn read_bits_unaligned_start() {
        let mut reader = BitReader::new(&[0b1011_0110, 0b1100_0000]);
        assert!(reader.read_bit().unwrap());
        assert_eq!(reader.read_bits(9).unwrap(), 0b0_1101_1011);
    }

    #[test]
    fn read_bits_rejects_oversized_count() {
        let mut reader = BitReader::new(&[0; 16]);
        let err = reader.read_bits(65).unwrap_err();
        assert!(matches!(err, BitError::InvalidBitCount { bits: 65, .. }));
    }

    #[test]
    fn read_bits_past_end_reports_eof() {
        let mut reader = BitReader::new(&[0xFF]);
        let err = reader.read_bits(9).unwrap_err();
        assert_eq!(
            err,
            BitError::UnexpectedEof {
                requested: 9,
                available: 8
            }
        );
        // A failed read leaves the cursor where it was.
        assert_eq!(reader.bit_position(), 0);
    }

    #[test]
    fn read_varu32_bytes() {
        let mut reader = BitReader::new(&[0xAC, 0x02]);
        assert_eq!(reader.read_varu32().unwrap(), 300);
    }

    #[test]
    fn read_vars32_negative_one() {
        let mut reader = BitReader::new(&[0x01]);
        assert_eq!(reader.read_vars32().unwrap(), -1);
    }

    #[test]
    fn read_varu32_invalid() {
        let mut reader = BitReader::new(&[0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01]);
        let err = reader.read_varu32().unwrap_err();
        assert!(matches!(err, BitError::InvalidVarint));
    }

    #[test]
    fn read_ubitvar_short_form() {
        // Selector 00, low nibble 0b1010.
        let mut reader = BitReader::new(&[0b0010_1000]);
        assert_eq!(reader.read_ubitvar().unwrap(), 10);
    }

    #[test]
    fn read_ubitvar_fp_first_bucket() {
        // Prefix bit set, then 2 bits of payload.
        let mut reader = BitReader::new(&[0b1110_0000]);
        assert_eq!(reader.read_ubitvar_fp().unwrap(), 3);
    }

    #[test]
    fn read_string_stops_at_nul() {
        let mut reader = BitReader::new(b"de_dust2\0rest");
        assert_eq!(reader.read_string(64).unwrap(), "de_dust2");
        assert_eq!(reader.read_u8().unwrap(), b'r');
    }

    #[test]
    fn read_string_enforces_limit() {
        let mut reader = BitReader::new(b"abcdef\0");
        let err = reader.read_string(3).unwrap_err();
        assert_eq!(err, BitError::StringTooLong { limit: 3 });
    }

    #[test]
    fn read_bit_coord_zero() {
        let mut reader = BitReader::new(&[0b0000_0000]);
        assert!(reader.read_bit_coord().unwrap().abs() < f32::EPSILON);
        assert_eq!(reader.bit_position(), 2);
    }

    #[test]
    fn read_bytes_unaligned() {
        let mut reader = BitReader::new(&[0b1000_0000, 0b1000_0000, 0b0000_0000]);
        assert!(reader.read_bit().unwrap());
        assert_eq!(reader.read_bytes(2).unwrap(), vec![0x01, 0x00]);
    }
}
