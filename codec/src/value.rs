//! Property values and their per-encoding bit layouts.

use std::fmt;

use bitstream::{BitReader, BitWriter};
use schema::{EncoderFlags, FieldEncoding, FieldPath, FloatEncoding, QuantizedFloat};

use crate::error::{CodecError, CodecResult};

/// Seconds per simulation tick for [`FieldEncoding::SimulationTime`].
pub const SIMULATION_TICK_SECONDS: f32 = 1.0 / 30.0;

/// A decoded property value.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize), serde(untagged))]
pub enum FieldValue {
    Bool(bool),
    I32(i32),
    U32(u32),
    U64(u64),
    F32(f32),
    String(String),
    Vector2([f32; 2]),
    Vector3([f32; 3]),
}

impl FieldValue {
    /// Returns the value as a signed integer, if it is integral.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Bool(v) => Some(i64::from(*v)),
            Self::I32(v) => Some(i64::from(*v)),
            Self::U32(v) => Some(i64::from(*v)),
            Self::U64(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Returns the value as an unsigned 64-bit integer, if it is integral
    /// and non-negative.
    #[must_use]
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::U64(v) => Some(*v),
            other => other.as_i64().and_then(|v| u64::try_from(v).ok()),
        }
    }

    #[must_use]
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Self::F32(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    /// Returns a 3D vector; 2D vectors get `z = 0`.
    #[must_use]
    pub fn as_vector3(&self) -> Option<[f32; 3]> {
        match self {
            Self::Vector3(v) => Some(*v),
            Self::Vector2([x, y]) => Some([*x, *y, 0.0]),
            _ => None,
        }
    }

    /// Short name of the variant.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::I32(_) => "i32",
            Self::U32(_) => "u32",
            Self::U64(_) => "u64",
            Self::F32(_) => "f32",
            Self::String(_) => "string",
            Self::Vector2(_) => "vector2",
            Self::Vector3(_) => "vector3",
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::I32(v) => write!(f, "{v}"),
            Self::U32(v) => write!(f, "{v}"),
            Self::U64(v) => write!(f, "{v}"),
            Self::F32(v) => write!(f, "{v}"),
            Self::String(v) => write!(f, "{v}"),
            Self::Vector2([x, y]) => write!(f, "[{x}, {y}]"),
            Self::Vector3([x, y, z]) => write!(f, "[{x}, {y}, {z}]"),
        }
    }
}

/// Reads one value laid out with `encoding`.
pub fn read_value(
    reader: &mut BitReader<'_>,
    encoding: &FieldEncoding,
    max_string_len: usize,
) -> CodecResult<FieldValue> {
    let value = match encoding {
        FieldEncoding::Bool => FieldValue::Bool(reader.read_bool()?),
        FieldEncoding::VarUInt => FieldValue::U32(reader.read_varu32()?),
        FieldEncoding::VarInt => FieldValue::I32(reader.read_vars32()?),
        FieldEncoding::VarUInt64 => FieldValue::U64(reader.read_varu64()?),
        FieldEncoding::Fixed64 => FieldValue::U64(reader.read_bits(64)?),
        FieldEncoding::Bits(bits) => FieldValue::U32(reader.read_u32_bits(*bits)?),
        FieldEncoding::NoScale => FieldValue::F32(reader.read_f32()?),
        FieldEncoding::Coord => FieldValue::F32(reader.read_bit_coord()?),
        FieldEncoding::SimulationTime => {
            FieldValue::F32(reader.read_varu32()? as f32 * SIMULATION_TICK_SECONDS)
        }
        FieldEncoding::Quantized(qf) => FieldValue::F32(read_quantized(reader, qf)?),
        FieldEncoding::String => FieldValue::String(reader.read_string(max_string_len)?),
        FieldEncoding::Vector { dims, element } => {
            let mut out = [0.0f32; 3];
            for slot in out.iter_mut().take(usize::from(*dims)) {
                *slot = read_float(reader, element)?;
            }
            if *dims == 2 {
                FieldValue::Vector2([out[0], out[1]])
            } else {
                FieldValue::Vector3(out)
            }
        }
    };
    Ok(value)
}

fn read_float(reader: &mut BitReader<'_>, encoding: &FloatEncoding) -> CodecResult<f32> {
    match encoding {
        FloatEncoding::NoScale => Ok(reader.read_f32()?),
        FloatEncoding::Coord => Ok(reader.read_bit_coord()?),
        FloatEncoding::Quantized(qf) => read_quantized(reader, qf),
    }
}

fn read_quantized(reader: &mut BitReader<'_>, qf: &QuantizedFloat) -> CodecResult<f32> {
    if qf.flags.contains(EncoderFlags::ROUND_DOWN) && reader.read_bool()? {
        return Ok(qf.low);
    }
    if qf.flags.contains(EncoderFlags::ROUND_UP) && reader.read_bool()? {
        return Ok(qf.high);
    }
    if qf.flags.contains(EncoderFlags::ENCODE_ZERO) && reader.read_bool()? {
        return Ok(0.0);
    }
    let raw = reader.read_u32_bits(qf.bits)?;
    Ok(qf.value_of(raw))
}

/// Writes one value laid out with `encoding`.
pub fn write_value(
    writer: &mut BitWriter,
    path: FieldPath,
    encoding: &FieldEncoding,
    value: &FieldValue,
) -> CodecResult<()> {
    let mismatch = || CodecError::ValueMismatch {
        path,
        expected: encoding.field_type(),
    };
    match (encoding, value) {
        (FieldEncoding::Bool, FieldValue::Bool(v)) => writer.write_bool(*v),
        (FieldEncoding::VarUInt, FieldValue::U32(v)) => writer.write_varu32(*v),
        (FieldEncoding::VarInt, FieldValue::I32(v)) => writer.write_vars32(*v),
        (FieldEncoding::VarUInt64 | FieldEncoding::Fixed64, FieldValue::U64(v)) => {
            if matches!(encoding, FieldEncoding::Fixed64) {
                writer.write_bits(*v, 64)?;
            } else {
                writer.write_varu64(*v);
            }
        }
        (FieldEncoding::Bits(bits), FieldValue::U32(v)) => {
            writer.write_bits(u64::from(*v), *bits)?;
        }
        (FieldEncoding::NoScale, FieldValue::F32(v)) => writer.write_f32(*v),
        (FieldEncoding::Coord, FieldValue::F32(v)) => writer.write_bit_coord(*v)?,
        (FieldEncoding::SimulationTime, FieldValue::F32(v)) => {
            let ticks = (v / SIMULATION_TICK_SECONDS).round();
            if !(0.0..=u32::MAX as f32).contains(&ticks) {
                return Err(mismatch());
            }
            writer.write_varu32(ticks as u32);
        }
        (FieldEncoding::Quantized(qf), FieldValue::F32(v)) => write_quantized(writer, qf, *v)?,
        (FieldEncoding::String, FieldValue::String(v)) => writer.write_string(v),
        (FieldEncoding::Vector { dims: 2, element }, FieldValue::Vector2(v)) => {
            for component in v {
                write_float(writer, element, *component)?;
            }
        }
        (FieldEncoding::Vector { dims: 3, element }, FieldValue::Vector3(v)) => {
            for component in v {
                write_float(writer, element, *component)?;
            }
        }
        _ => return Err(mismatch()),
    }
    Ok(())
}

fn write_float(writer: &mut BitWriter, encoding: &FloatEncoding, value: f32) -> CodecResult<()> {
    match encoding {
        FloatEncoding::NoScale => writer.write_f32(value),
        FloatEncoding::Coord => writer.write_bit_coord(value)?,
        FloatEncoding::Quantized(qf) => write_quantized(writer, qf, value)?,
    }
    Ok(())
}

fn write_quantized(writer: &mut BitWriter, qf: &QuantizedFloat, value: f32) -> CodecResult<()> {
    if qf.flags.contains(EncoderFlags::ROUND_DOWN) {
        let exact = value <= qf.low;
        writer.write_bool(exact);
        if exact {
            return Ok(());
        }
    }
    if qf.flags.contains(EncoderFlags::ROUND_UP) {
        let exact = value >= qf.high;
        writer.write_bool(exact);
        if exact {
            return Ok(());
        }
    }
    if qf.flags.contains(EncoderFlags::ENCODE_ZERO) {
        let exact = value == 0.0;
        writer.write_bool(exact);
        if exact {
            return Ok(());
        }
    }
    writer.write_bits(u64::from(qf.quantize(value)), qf.bits)?;
    Ok(())
}
