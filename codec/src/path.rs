//! Field path op streams.
//!
//! An entity delta lists the properties it touches as a sequence of ops,
//! each moving a cursor path to the next changed property. Ops are coded
//! with a canonical Huffman code built from fixed weights, so the table is
//! identical on every run and never travels on the wire.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::OnceLock;

use bitstream::{BitReader, BitWriter};
use schema::{FieldPath, MAX_PATH_DEPTH};

use crate::error::{CodecError, CodecResult, LimitKind, PathReason};
use crate::limits::CodecLimits;

const OP_COUNT: usize = 20;
const MAX_CODE_LEN: usize = 31;

/// A single field path operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathOp {
    PlusOne,
    PlusTwo,
    PlusThree,
    PlusFour,
    PlusN,
    PushOneLeftDeltaZeroRightZero,
    PushOneLeftDeltaZeroRightNonZero,
    PushOneLeftDeltaOneRightZero,
    PushOneLeftDeltaOneRightNonZero,
    PushOneLeftDeltaNRightZero,
    PushOneLeftDeltaNRightNonZero,
    PushN,
    PopOnePlusOne,
    PopOnePlusN,
    PopAllButOnePlusOne,
    PopAllButOnePlusN,
    PopNPlusOne,
    PopNPlusN,
    PopNPushN,
    Finish,
}

impl PathOp {
    /// Every op, in symbol order.
    pub const ALL: [Self; OP_COUNT] = [
        Self::PlusOne,
        Self::PlusTwo,
        Self::PlusThree,
        Self::PlusFour,
        Self::PlusN,
        Self::PushOneLeftDeltaZeroRightZero,
        Self::PushOneLeftDeltaZeroRightNonZero,
        Self::PushOneLeftDeltaOneRightZero,
        Self::PushOneLeftDeltaOneRightNonZero,
        Self::PushOneLeftDeltaNRightZero,
        Self::PushOneLeftDeltaNRightNonZero,
        Self::PushN,
        Self::PopOnePlusOne,
        Self::PopOnePlusN,
        Self::PopAllButOnePlusOne,
        Self::PopAllButOnePlusN,
        Self::PopNPlusOne,
        Self::PopNPlusN,
        Self::PopNPushN,
        Self::Finish,
    ];

    /// Relative frequency used to build the Huffman code.
    #[must_use]
    pub const fn weight(self) -> u32 {
        match self {
            Self::PlusOne => 36271,
            Self::PlusTwo => 10334,
            Self::PlusThree => 1375,
            Self::PlusFour => 646,
            Self::PlusN => 4128,
            Self::PushOneLeftDeltaZeroRightZero => 35,
            Self::PushOneLeftDeltaZeroRightNonZero => 3,
            Self::PushOneLeftDeltaOneRightZero => 521,
            Self::PushOneLeftDeltaOneRightNonZero => 2942,
            Self::PushOneLeftDeltaNRightZero => 560,
            Self::PushOneLeftDeltaNRightNonZero => 471,
            Self::PushN => 1,
            Self::PopOnePlusOne => 2,
            Self::PopOnePlusN => 1,
            Self::PopAllButOnePlusOne => 1837,
            Self::PopAllButOnePlusN => 149,
            Self::PopNPlusOne => 1,
            Self::PopNPlusN => 1,
            Self::PopNPushN => 160,
            Self::Finish => 25474,
        }
    }

    const fn symbol(self) -> usize {
        self as usize
    }
}

/// Canonical Huffman code over [`PathOp`].
#[derive(Debug)]
struct OpCode {
    lengths: [u8; OP_COUNT],
    codes: [u32; OP_COUNT],
    counts: [u32; MAX_CODE_LEN + 1],
    sorted: [PathOp; OP_COUNT],
    max_len: usize,
}

impl OpCode {
    fn build() -> Self {
        let lengths = code_lengths();

        let mut counts = [0u32; MAX_CODE_LEN + 1];
        for &len in &lengths {
            counts[usize::from(len)] += 1;
        }

        let mut sorted = PathOp::ALL;
        sorted.sort_by_key(|op| (lengths[op.symbol()], op.symbol()));

        let mut next_code = [0u32; MAX_CODE_LEN + 1];
        let mut code = 0u32;
        for len in 1..=MAX_CODE_LEN {
            code = (code + counts[len - 1]) << 1;
            next_code[len] = code;
        }
        let mut codes = [0u32; OP_COUNT];
        for op in sorted {
            let len = usize::from(lengths[op.symbol()]);
            codes[op.symbol()] = next_code[len];
            next_code[len] += 1;
        }

        let max_len = usize::from(lengths.iter().copied().max().unwrap_or(0));
        Self {
            lengths,
            codes,
            counts,
            sorted,
            max_len,
        }
    }

    fn decode(&self, reader: &mut BitReader<'_>) -> CodecResult<PathOp> {
        let mut code = 0u32;
        let mut first = 0u32;
        let mut index = 0usize;
        for len in 1..=self.max_len {
            code |= u32::from(reader.read_bit()?);
            let count = self.counts[len];
            if code.wrapping_sub(first) < count {
                return Ok(self.sorted[index + (code - first) as usize]);
            }
            index += count as usize;
            first = (first + count) << 1;
            code <<= 1;
        }
        Err(CodecError::InvalidFieldPath {
            reason: PathReason::IndexOverflow,
        })
    }

    fn encode(&self, writer: &mut BitWriter, op: PathOp) -> CodecResult<()> {
        let symbol = op.symbol();
        writer.write_bits(u64::from(self.codes[symbol]), self.lengths[symbol])?;
        Ok(())
    }
}

/// Computes Huffman code lengths; ties break on the lower node id.
fn code_lengths() -> [u8; OP_COUNT] {
    let mut heap = BinaryHeap::with_capacity(OP_COUNT);
    for op in PathOp::ALL {
        heap.push(Reverse((u64::from(op.weight()), op.symbol())));
    }

    let mut parent = [usize::MAX; 2 * OP_COUNT - 1];
    let mut next_node = OP_COUNT;
    loop {
        let Some(Reverse((w1, a))) = heap.pop() else {
            break;
        };
        let Some(Reverse((w2, b))) = heap.pop() else {
            break;
        };
        parent[a] = next_node;
        parent[b] = next_node;
        heap.push(Reverse((w1 + w2, next_node)));
        next_node += 1;
    }

    let mut lengths = [0u8; OP_COUNT];
    for (symbol, length) in lengths.iter_mut().enumerate() {
        let mut node = symbol;
        while parent[node] != usize::MAX {
            node = parent[node];
            *length += 1;
        }
    }
    lengths
}

fn op_code() -> &'static OpCode {
    static CODE: OnceLock<OpCode> = OnceLock::new();
    CODE.get_or_init(OpCode::build)
}

/// Returns the code length in bits of an op.
#[must_use]
pub fn op_code_len(op: PathOp) -> u8 {
    op_code().lengths[op.symbol()]
}

/// Cursor path while an op stream is replayed.
#[derive(Debug, Clone, Copy)]
struct PathCursor {
    path: [i32; MAX_PATH_DEPTH],
    last: usize,
}

impl PathCursor {
    const fn new() -> Self {
        let mut path = [0; MAX_PATH_DEPTH];
        path[0] = -1;
        Self { path, last: 0 }
    }

    fn add(&mut self, delta: i64) -> CodecResult<()> {
        let slot = &mut self.path[self.last];
        *slot = i32::try_from(i64::from(*slot) + delta).map_err(|_| invalid(PathReason::IndexOverflow))?;
        Ok(())
    }

    fn push(&mut self, value: i64) -> CodecResult<()> {
        if self.last + 1 >= MAX_PATH_DEPTH {
            return Err(invalid(PathReason::DepthOverflow));
        }
        self.last += 1;
        self.path[self.last] =
            i32::try_from(value).map_err(|_| invalid(PathReason::IndexOverflow))?;
        Ok(())
    }

    fn pop(&mut self, count: usize) -> CodecResult<()> {
        if count > self.last {
            return Err(invalid(PathReason::PopUnderflow));
        }
        for _ in 0..count {
            self.path[self.last] = 0;
            self.last -= 1;
        }
        Ok(())
    }

    fn apply(&mut self, op: PathOp, reader: &mut BitReader<'_>) -> CodecResult<()> {
        match op {
            PathOp::PlusOne => self.add(1),
            PathOp::PlusTwo => self.add(2),
            PathOp::PlusThree => self.add(3),
            PathOp::PlusFour => self.add(4),
            PathOp::PlusN => self.add(read_fp(reader)? + 5),
            PathOp::PushOneLeftDeltaZeroRightZero => self.push(0),
            PathOp::PushOneLeftDeltaZeroRightNonZero => self.push(read_fp(reader)?),
            PathOp::PushOneLeftDeltaOneRightZero => {
                self.add(1)?;
                self.push(0)
            }
            PathOp::PushOneLeftDeltaOneRightNonZero => {
                self.add(1)?;
                self.push(read_fp(reader)?)
            }
            PathOp::PushOneLeftDeltaNRightZero => {
                self.add(read_fp(reader)?)?;
                self.push(0)
            }
            PathOp::PushOneLeftDeltaNRightNonZero => {
                self.add(read_fp(reader)? + 2)?;
                self.push(read_fp(reader)? + 1)
            }
            PathOp::PushN => {
                let count = reader.read_ubitvar()?;
                self.add(i64::from(reader.read_ubitvar()?))?;
                self.push_many(count, reader)
            }
            PathOp::PopOnePlusOne => {
                self.pop(1)?;
                self.add(1)
            }
            PathOp::PopOnePlusN => {
                self.pop(1)?;
                self.add(read_fp(reader)? + 1)
            }
            PathOp::PopAllButOnePlusOne => {
                self.pop(self.last)?;
                self.add(1)
            }
            PathOp::PopAllButOnePlusN => {
                self.pop(self.last)?;
                self.add(read_fp(reader)? + 1)
            }
            PathOp::PopNPlusOne => {
                self.pop(read_fp(reader)? as usize)?;
                self.add(1)
            }
            PathOp::PopNPlusN => {
                self.pop(read_fp(reader)? as usize)?;
                self.add(i64::from(reader.read_vars32()?))
            }
            PathOp::PopNPushN => {
                self.pop(read_fp(reader)? as usize)?;
                self.add(i64::from(reader.read_vars32()?))?;
                let count = reader.read_ubitvar()?;
                self.push_many(count, reader)
            }
            PathOp::Finish => Ok(()),
        }
    }

    fn push_many(&mut self, count: u32, reader: &mut BitReader<'_>) -> CodecResult<()> {
        for _ in 0..count {
            self.push(read_fp(reader)?)?;
        }
        Ok(())
    }

    fn to_field_path(&self) -> CodecResult<FieldPath> {
        let mut components = [0u32; MAX_PATH_DEPTH];
        for (out, &value) in components.iter_mut().zip(&self.path[..=self.last]) {
            *out = u32::try_from(value).map_err(|_| invalid(PathReason::NegativeComponent))?;
        }
        FieldPath::new(&components[..=self.last]).ok_or(invalid(PathReason::DepthOverflow))
    }
}

fn read_fp(reader: &mut BitReader<'_>) -> CodecResult<i64> {
    Ok(i64::from(reader.read_ubitvar_fp()?))
}

const fn invalid(reason: PathReason) -> CodecError {
    CodecError::InvalidFieldPath { reason }
}

/// Reads an op stream up to its finish op, appending each visited path.
pub fn read_field_paths(
    reader: &mut BitReader<'_>,
    limits: &CodecLimits,
    out: &mut Vec<FieldPath>,
) -> CodecResult<()> {
    let code = op_code();
    let mut cursor = PathCursor::new();
    let start = out.len();
    loop {
        let op = code.decode(reader)?;
        if op == PathOp::Finish {
            return Ok(());
        }
        cursor.apply(op, reader)?;
        let count = out.len() - start;
        if count >= limits.max_field_paths {
            return Err(CodecError::LimitsExceeded {
                kind: LimitKind::FieldPaths,
                limit: limits.max_field_paths,
                actual: count + 1,
            });
        }
        out.push(cursor.to_field_path()?);
    }
}

/// Writes the op stream for strictly ascending `paths`, then the finish op.
pub fn write_field_paths(writer: &mut BitWriter, paths: &[FieldPath]) -> CodecResult<()> {
    let code = op_code();
    let mut prev: Vec<i64> = vec![-1];
    for path in paths {
        let next: Vec<i64> = path.as_slice().iter().map(|&c| i64::from(c)).collect();
        write_step(code, writer, &prev, &next)?;
        prev = next;
    }
    code.encode(writer, PathOp::Finish)
}

fn write_step(code: &OpCode, writer: &mut BitWriter, prev: &[i64], next: &[i64]) -> CodecResult<()> {
    let common = prev
        .iter()
        .zip(next)
        .take_while(|(a, b)| a == b)
        .count();

    if common == prev.len() {
        if common == next.len() {
            return Err(invalid(PathReason::NotAscending));
        }
        return write_pushes(code, writer, &next[common..]);
    }
    if common == next.len() || next[common] < prev[common] {
        return Err(invalid(PathReason::NotAscending));
    }

    let pops = prev.len() - 1 - common;
    let delta = next[common] - prev[common];
    let pushes = &next[common + 1..];

    if pops == 0 {
        return write_advance(code, writer, delta, pushes);
    }
    if !pushes.is_empty() {
        code.encode(writer, PathOp::PopNPushN)?;
        write_fp(writer, pops as i64)?;
        writer.write_vars32(to_i32(delta)?);
        writer.write_ubitvar(pushes.len() as u32)?;
        for &value in pushes {
            write_fp(writer, value)?;
        }
        return Ok(());
    }

    match (common, pops, delta) {
        (0, _, 1) => code.encode(writer, PathOp::PopAllButOnePlusOne),
        (0, _, _) => {
            code.encode(writer, PathOp::PopAllButOnePlusN)?;
            write_fp(writer, delta - 1)
        }
        (_, 1, 1) => code.encode(writer, PathOp::PopOnePlusOne),
        (_, 1, _) => {
            code.encode(writer, PathOp::PopOnePlusN)?;
            write_fp(writer, delta - 1)
        }
        (_, _, 1) => {
            code.encode(writer, PathOp::PopNPlusOne)?;
            write_fp(writer, pops as i64)
        }
        _ => {
            code.encode(writer, PathOp::PopNPlusN)?;
            write_fp(writer, pops as i64)?;
            writer.write_vars32(to_i32(delta)?);
            Ok(())
        }
    }
}

/// Advances the last component by `delta > 0`, then pushes `pushes`.
fn write_advance(code: &OpCode, writer: &mut BitWriter, delta: i64, pushes: &[i64]) -> CodecResult<()> {
    match pushes {
        [] => match delta {
            1 => code.encode(writer, PathOp::PlusOne),
            2 => code.encode(writer, PathOp::PlusTwo),
            3 => code.encode(writer, PathOp::PlusThree),
            4 => code.encode(writer, PathOp::PlusFour),
            _ => {
                code.encode(writer, PathOp::PlusN)?;
                write_fp(writer, delta - 5)
            }
        },
        [0] if delta == 1 => code.encode(writer, PathOp::PushOneLeftDeltaOneRightZero),
        [value] if delta == 1 => {
            code.encode(writer, PathOp::PushOneLeftDeltaOneRightNonZero)?;
            write_fp(writer, *value)
        }
        [0] => {
            code.encode(writer, PathOp::PushOneLeftDeltaNRightZero)?;
            write_fp(writer, delta)
        }
        [value] => {
            code.encode(writer, PathOp::PushOneLeftDeltaNRightNonZero)?;
            write_fp(writer, delta - 2)?;
            write_fp(writer, value - 1)
        }
        _ => write_push_n(code, writer, delta, pushes),
    }
}

fn write_pushes(code: &OpCode, writer: &mut BitWriter, pushes: &[i64]) -> CodecResult<()> {
    match pushes {
        [0] => code.encode(writer, PathOp::PushOneLeftDeltaZeroRightZero),
        [value] => {
            code.encode(writer, PathOp::PushOneLeftDeltaZeroRightNonZero)?;
            write_fp(writer, *value)
        }
        _ => write_push_n(code, writer, 0, pushes),
    }
}

fn write_push_n(code: &OpCode, writer: &mut BitWriter, delta: i64, pushes: &[i64]) -> CodecResult<()> {
    code.encode(writer, PathOp::PushN)?;
    writer.write_ubitvar(pushes.len() as u32)?;
    writer.write_ubitvar(to_u32(delta)?)?;
    for &value in pushes {
        write_fp(writer, value)?;
    }
    Ok(())
}

fn write_fp(writer: &mut BitWriter, value: i64) -> CodecResult<()> {
    writer.write_ubitvar_fp(to_u32(value)?)?;
    Ok(())
}

fn to_u32(value: i64) -> CodecResult<u32> {
    u32::try_from(value).map_err(|_| invalid(PathReason::IndexOverflow))
}

fn to_i32(value: i64) -> CodecResult<i32> {
    i32::try_from(value).map_err(|_| invalid(PathReason::IndexOverflow))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(components: &[u32]) -> FieldPath {
        FieldPath::new(components).unwrap()
    }

    fn roundtrip(paths: &[FieldPath]) -> Vec<FieldPath> {
        let mut writer = BitWriter::new();
        write_field_paths(&mut writer, paths).unwrap();
        let bytes = writer.finish();
        let mut reader = BitReader::new(&bytes);
        let mut out = Vec::new();
        read_field_paths(&mut reader, &CodecLimits::for_testing(), &mut out).unwrap();
        out
    }

    #[test]
    fn code_is_prefix_free_and_complete() {
        let code = op_code();
        let kraft: f64 = code
            .lengths
            .iter()
            .map(|&len| 2f64.powi(-i32::from(len)))
            .sum();
        assert!((kraft - 1.0).abs() < 1e-12);

        for a in PathOp::ALL {
            for b in PathOp::ALL {
                if a == b {
                    continue;
                }
                let (la, lb) = (code.lengths[a.symbol()], code.lengths[b.symbol()]);
                if la <= lb {
                    let prefix = code.codes[b.symbol()] >> (lb - la);
                    assert_ne!(prefix, code.codes[a.symbol()], "{a:?} prefixes {b:?}");
                }
            }
        }
    }

    #[test]
    fn frequent_ops_get_short_codes() {
        assert!(op_code_len(PathOp::PlusOne) <= 2);
        assert!(op_code_len(PathOp::Finish) <= 3);
        assert!(op_code_len(PathOp::PlusOne) < op_code_len(PathOp::PushN));
    }

    #[test]
    fn every_op_decodes_to_itself() {
        let code = op_code();
        for op in PathOp::ALL {
            let mut writer = BitWriter::new();
            code.encode(&mut writer, op).unwrap();
            let bytes = writer.finish();
            let mut reader = BitReader::new(&bytes);
            assert_eq!(code.decode(&mut reader).unwrap(), op);
        }
    }

    #[test]
    fn empty_stream_is_only_finish() {
        assert!(roundtrip(&[]).is_empty());
    }

    #[test]
    fn flat_paths_roundtrip() {
        let paths: Vec<_> = [0, 1, 3, 6, 10, 40, 41].iter().map(|&i| path(&[i])).collect();
        assert_eq!(roundtrip(&paths), paths);
    }

    #[test]
    fn nested_paths_roundtrip() {
        let paths = vec![
            path(&[0]),
            path(&[2]),
            path(&[2, 0]),
            path(&[2, 1]),
            path(&[2, 7]),
            path(&[3, 0, 0]),
            path(&[3, 0, 4, 2]),
            path(&[3, 5]),
            path(&[4, 1, 1, 1, 1, 1, 1]),
            path(&[4, 2]),
            path(&[9, 0, 3]),
            path(&[12]),
            path(&[200, 7, 0]),
        ];
        assert_eq!(roundtrip(&paths), paths);
    }

    #[test]
    fn unordered_paths_rejected() {
        let mut writer = BitWriter::new();
        let err = write_field_paths(&mut writer, &[path(&[2]), path(&[1])]).unwrap_err();
        assert_eq!(err, invalid(PathReason::NotAscending));

        let mut writer = BitWriter::new();
        let err = write_field_paths(&mut writer, &[path(&[2, 1]), path(&[2])]).unwrap_err();
        assert_eq!(err, invalid(PathReason::NotAscending));

        let mut writer = BitWriter::new();
        let err = write_field_paths(&mut writer, &[path(&[2]), path(&[2])]).unwrap_err();
        assert_eq!(err, invalid(PathReason::NotAscending));
    }

    #[test]
    fn pop_underflow_detected() {
        let code = op_code();
        let mut writer = BitWriter::new();
        code.encode(&mut writer, PathOp::PlusOne).unwrap();
        code.encode(&mut writer, PathOp::PopOnePlusOne).unwrap();
        let bytes = writer.finish();
        let mut reader = BitReader::new(&bytes);
        let mut out = Vec::new();
        let err = read_field_paths(&mut reader, &CodecLimits::for_testing(), &mut out).unwrap_err();
        assert_eq!(err, invalid(PathReason::PopUnderflow));
        assert_eq!(out, vec![path(&[0])]);
    }

    #[test]
    fn depth_overflow_detected() {
        let code = op_code();
        let mut writer = BitWriter::new();
        code.encode(&mut writer, PathOp::PlusOne).unwrap();
        for _ in 0..MAX_PATH_DEPTH {
            code.encode(&mut writer, PathOp::PushOneLeftDeltaZeroRightZero)
                .unwrap();
        }
        let bytes = writer.finish();
        let mut reader = BitReader::new(&bytes);
        let mut out = Vec::new();
        let err = read_field_paths(&mut reader, &CodecLimits::for_testing(), &mut out).unwrap_err();
        assert_eq!(err, invalid(PathReason::DepthOverflow));
    }

    #[test]
    fn negative_component_detected() {
        let code = op_code();
        let mut writer = BitWriter::new();
        code.encode(&mut writer, PathOp::PushOneLeftDeltaZeroRightZero)
            .unwrap();
        let bytes = writer.finish();
        let mut reader = BitReader::new(&bytes);
        let mut out = Vec::new();
        let err = read_field_paths(&mut reader, &CodecLimits::for_testing(), &mut out).unwrap_err();
        assert_eq!(err, invalid(PathReason::NegativeComponent));
    }

    #[test]
    fn truncated_stream_is_bitstream_error() {
        let mut reader = BitReader::new(&[]);
        let mut out = Vec::new();
        let err = read_field_paths(&mut reader, &CodecLimits::for_testing(), &mut out).unwrap_err();
        assert!(matches!(err, CodecError::Bitstream(e) if e.is_eof()));
    }

    #[test]
    fn path_limit_enforced() {
        let paths: Vec<_> = (0..10).map(|i| path(&[i])).collect();
        let mut writer = BitWriter::new();
        write_field_paths(&mut writer, &paths).unwrap();
        let bytes = writer.finish();
        let limits = CodecLimits {
            max_field_paths: 4,
            ..CodecLimits::for_testing()
        };
        let mut out = Vec::new();
        let err = read_field_paths(&mut BitReader::new(&bytes), &limits, &mut out).unwrap_err();
        assert!(matches!(
            err,
            CodecError::LimitsExceeded {
                kind: LimitKind::FieldPaths,
                limit: 4,
                actual: 5
            }
        ));
    }
}
