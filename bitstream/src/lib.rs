//! Low-level bit and byte primitives for the demodec replay decoder.
//!
//! This crate provides [`BitReader`] and [`BitWriter`] for bit-packed entity
//! and string-table payloads, [`ByteReader`] for the byte-oriented outer
//! framing, and Snappy block helpers for compressed frames.
//!
//! # Design Principles
//!
//! - **No unsafe code** - Safety is paramount.
//! - **Bounded operations** - All reads are bounds-checked; a failed read never moves the cursor.
//! - **No domain knowledge** - This crate knows nothing about entities, events, or frames.
//! - **Explicit errors** - All failures return structured errors, never panic.
//!
//! # Example
//!
//! ```
//! use bitstream::{BitReader, BitWriter};
//!
//! let mut writer = BitWriter::new();
//! writer.write_bool(true);
//! writer.write_ubitvar(300).unwrap();
//! writer.write_string("de_mirage");
//!
//! let bytes = writer.finish();
//!
//! let mut reader = BitReader::new(&bytes);
//! assert!(reader.read_bool().unwrap());
//! assert_eq!(reader.read_ubitvar().unwrap(), 300);
//! assert_eq!(reader.read_string(64).unwrap(), "de_mirage");
//! ```

mod bytes;
mod compress;
mod error;
mod reader;
mod writer;

pub use bytes::{put_string, put_varu32, put_varu64, put_vars32, varu32_len, ByteReader};
pub use compress::{compress_block, decompress_block, decompress_block_bounded};
pub use error::{BitError, BitResult};
pub use reader::BitReader;
pub use writer::BitWriter;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_roundtrip() {
        let writer = BitWriter::new();
        let bytes = writer.finish();
        assert!(bytes.is_empty());

        let reader = BitReader::new(&bytes);
        assert!(reader.is_empty());
    }

    #[test]
    fn bits_roundtrip_various_sizes() {
        let test_cases = [
            (0b1010u64, 4),
            (0xFFu64, 8),
            (0xABCDu64, 16),
            (0x1234_5678u64, 32),
            (u64::MAX, 64),
        ];

        for (value, bits) in test_cases {
            let mut writer = BitWriter::new();
            writer.write_bits(value, bits).unwrap();
            let bytes = writer.finish();

            let mut reader = BitReader::new(&bytes);
            let read_value = reader.read_bits(bits).unwrap();
            assert_eq!(
                read_value, value,
                "roundtrip failed for {bits}-bit value {value}"
            );
        }
    }

    #[test]
    fn mixed_roundtrip() {
        let mut writer = BitWriter::new();
        writer.write_bool(true);
        writer.write_bits(0b1010, 4).unwrap();
        writer.write_varu32(70_000);
        writer.write_vars32(-3);
        writer.write_f32(1.5);
        writer.write_ubitvar_fp(9).unwrap();
        let bytes = writer.finish();

        let mut reader = BitReader::new(&bytes);
        assert!(reader.read_bool().unwrap());
        assert_eq!(reader.read_bits(4).unwrap(), 0b1010);
        assert_eq!(reader.read_varu32().unwrap(), 70_000);
        assert_eq!(reader.read_vars32().unwrap(), -3);
        assert!((reader.read_f32().unwrap() - 1.5).abs() < f32::EPSILON);
        assert_eq!(reader.read_ubitvar_fp().unwrap(), 9);
    }

    #[test]
    fn compressed_block_through_byte_reader() {
        let payload = b"snapshot ".repeat(20);
        let block = compress_block(&payload).unwrap();
        let mut framed = Vec::new();
        put_varu32(&mut framed, u32::try_from(block.len()).unwrap());
        framed.extend_from_slice(&block);

        let mut reader = ByteReader::new(&framed);
        let len = reader.read_varu32().unwrap() as usize;
        assert_eq!(reader.read_compressed_block(len).unwrap(), payload);
        assert!(reader.is_empty());
    }
}
