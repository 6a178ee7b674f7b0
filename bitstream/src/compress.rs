//! Snappy block compression (raw format, no framing).

use crate::error::{BitError, BitResult};

/// Decompresses a raw Snappy block.
pub fn decompress_block(input: &[u8]) -> BitResult<Vec<u8>> {
    snap::raw::Decoder::new()
        .decompress_vec(input)
        .map_err(|err| BitError::Decompress {
            reason: err.to_string(),
        })
}

/// Decompresses a raw Snappy block, rejecting outputs larger than `max_len`
/// before allocating.
pub fn decompress_block_bounded(input: &[u8], max_len: usize) -> BitResult<Vec<u8>> {
    let len = snap::raw::decompress_len(input).map_err(|err| BitError::Decompress {
        reason: err.to_string(),
    })?;
    if len > max_len {
        return Err(BitError::Decompress {
            reason: format!("decompressed length {len} exceeds limit {max_len}"),
        });
    }
    decompress_block(input)
}

/// Compresses `input` into a raw Snappy block.
pub fn compress_block(input: &[u8]) -> BitResult<Vec<u8>> {
    snap::raw::Encoder::new()
        .compress_vec(input)
        .map_err(|err| BitError::Decompress {
            reason: err.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_roundtrip() {
        let input = b"entity entity entity entity entity".repeat(8);
        let compressed = compress_block(&input).unwrap();
        assert!(compressed.len() < input.len());
        assert_eq!(decompress_block(&compressed).unwrap(), input);
    }

    #[test]
    fn bounded_rejects_large_output() {
        let input = vec![7u8; 4096];
        let compressed = compress_block(&input).unwrap();
        let err = decompress_block_bounded(&compressed, 1024).unwrap_err();
        assert!(err.to_string().contains("exceeds limit"));
        assert_eq!(decompress_block_bounded(&compressed, 4096).unwrap(), input);
    }

    #[test]
    fn garbage_is_rejected() {
        let err = decompress_block(&[0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]).unwrap_err();
        assert!(matches!(err, BitError::Decompress { .. }));
    }
}
