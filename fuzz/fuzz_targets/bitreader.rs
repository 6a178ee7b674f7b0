#![no_main]

use bitstream::{BitReader, ByteReader};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut reader = BitReader::new(data);
    let mut bytes = ByteReader::new(data);
    let mut idx = 0usize;

    // Input bytes pick a bounded sequence of reads.
    while idx < data.len() && idx < 1024 {
        let op = data[idx] % 10;
        let arg = data[idx];
        idx += 1;

        match op {
            0 => {
                let _ = reader.read_bit();
            }
            1 => {
                let _ = reader.read_bits(arg % 64 + 1);
            }
            2 => {
                let _ = reader.align_to_byte();
            }
            3 => {
                let _ = reader.read_ubitvar();
            }
            4 => {
                let _ = reader.read_varu32();
            }
            5 => {
                let _ = reader.read_vars32();
            }
            6 => {
                let _ = reader.read_bit_coord();
            }
            7 => {
                let _ = reader.read_string(64);
            }
            8 => {
                let _ = bytes.read_varu64();
            }
            _ => {
                let _ = bytes.read_string(64);
            }
        }
    }
});
