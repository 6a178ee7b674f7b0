//! Byte layouts of the SendTables and ClassInfo frame payloads.
//!
//! ```text
//! SendTables := varint count, Serializer*
//! Serializer := cstring name, varint field_count, Field*
//! Field      := cstring name, u8 kind [kind args], [Encoding]
//! ClassInfo  := varint count, (varint class_id, cstring name, cstring serializer)*
//! ```

use bitstream::{put_string, put_varu32, ByteReader};

use crate::error::{LimitKind, SchemaError, SchemaResult};
use crate::field::{
    EncoderFlags, FieldDecl, FieldEncoding, FieldKind, FloatEncoding, QuantizedFloat,
};
use crate::limits::SchemaLimits;
use crate::serializer::{ClassInfo, Serializer};

const KIND_VALUE: u8 = 0;
const KIND_FIXED_ARRAY: u8 = 1;
const KIND_VECTOR: u8 = 2;
const KIND_TABLE: u8 = 3;
const KIND_TABLE_VECTOR: u8 = 4;

const ENC_BOOL: u8 = 0;
const ENC_VAR_UINT: u8 = 1;
const ENC_VAR_INT: u8 = 2;
const ENC_VAR_UINT64: u8 = 3;
const ENC_FIXED64: u8 = 4;
const ENC_BITS: u8 = 5;
const ENC_NO_SCALE: u8 = 6;
const ENC_COORD: u8 = 7;
const ENC_SIMULATION_TIME: u8 = 8;
const ENC_QUANTIZED: u8 = 9;
const ENC_STRING: u8 = 10;
const ENC_VECTOR: u8 = 11;

/// Decodes a SendTables payload into serializers.
pub fn decode_send_tables(payload: &[u8], limits: &SchemaLimits) -> SchemaResult<Vec<Serializer>> {
    let mut reader = ByteReader::new(payload);
    let count = reader.read_varu32()? as usize;
    check_limit(LimitKind::Serializers, limits.max_serializers, count)?;

    let mut serializers = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        let name = reader.read_string(limits.max_name_len)?;
        let field_count = reader.read_varu32()? as usize;
        check_limit(
            LimitKind::FieldsPerSerializer,
            limits.max_fields_per_serializer,
            field_count,
        )?;
        let mut fields = Vec::with_capacity(field_count.min(1024));
        for _ in 0..field_count {
            fields.push(decode_field(&mut reader, limits)?);
        }
        serializers.push(Serializer::new(name, fields)?);
    }
    Ok(serializers)
}

/// Decodes a ClassInfo payload.
pub fn decode_class_info(payload: &[u8], limits: &SchemaLimits) -> SchemaResult<Vec<ClassInfo>> {
    let mut reader = ByteReader::new(payload);
    let count = reader.read_varu32()? as usize;
    check_limit(LimitKind::Classes, limits.max_classes, count)?;

    let mut classes = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        let class_id = reader.read_varu32()?;
        let name = reader.read_string(limits.max_name_len)?;
        let serializer = reader.read_string(limits.max_name_len)?;
        classes.push(ClassInfo {
            class_id,
            name,
            serializer,
        });
    }
    Ok(classes)
}

/// Encodes serializers as a SendTables payload.
#[must_use]
pub fn encode_send_tables(serializers: &[Serializer]) -> Vec<u8> {
    let mut out = Vec::new();
    put_varu32(&mut out, serializers.len() as u32);
    for serializer in serializers {
        put_string(&mut out, &serializer.name);
        put_varu32(&mut out, serializer.fields().len() as u32);
        for field in serializer.fields() {
            encode_field(&mut out, field);
        }
    }
    out
}

/// Encodes classes as a ClassInfo payload.
#[must_use]
pub fn encode_class_info(classes: &[ClassInfo]) -> Vec<u8> {
    let mut out = Vec::new();
    put_varu32(&mut out, classes.len() as u32);
    for class in classes {
        put_varu32(&mut out, class.class_id);
        put_string(&mut out, &class.name);
        put_string(&mut out, &class.serializer);
    }
    out
}

fn check_limit(kind: LimitKind, limit: usize, actual: usize) -> SchemaResult<()> {
    if actual > limit {
        return Err(SchemaError::LimitsExceeded {
            kind,
            limit,
            actual,
        });
    }
    Ok(())
}

fn decode_field(reader: &mut ByteReader<'_>, limits: &SchemaLimits) -> SchemaResult<FieldDecl> {
    let name = reader.read_string(limits.max_name_len)?;
    let tag = reader.read_u8()?;
    let field = match tag {
        KIND_VALUE => FieldDecl::value(name, decode_encoding(reader)?),
        KIND_FIXED_ARRAY => {
            let len = reader.read_varu32()?;
            check_limit(LimitKind::ArrayLength, limits.max_array_len, len as usize)?;
            FieldDecl::array(name, len, decode_encoding(reader)?)
        }
        KIND_VECTOR => FieldDecl::vector(name, decode_encoding(reader)?),
        KIND_TABLE => FieldDecl::table(name, reader.read_string(limits.max_name_len)?),
        KIND_TABLE_VECTOR => {
            FieldDecl::table_vector(name, reader.read_string(limits.max_name_len)?)
        }
        other => return Err(SchemaError::UnknownFieldKind { tag: other }),
    };
    Ok(field)
}

fn encode_field(out: &mut Vec<u8>, field: &FieldDecl) {
    put_string(out, &field.name);
    match &field.kind {
        FieldKind::Value => {
            out.push(KIND_VALUE);
            encode_encoding(out, &field.encoding);
        }
        FieldKind::FixedArray(len) => {
            out.push(KIND_FIXED_ARRAY);
            put_varu32(out, *len);
            encode_encoding(out, &field.encoding);
        }
        FieldKind::Vector => {
            out.push(KIND_VECTOR);
            encode_encoding(out, &field.encoding);
        }
        FieldKind::Table(serializer) => {
            out.push(KIND_TABLE);
            put_string(out, serializer);
        }
        FieldKind::TableVector(serializer) => {
            out.push(KIND_TABLE_VECTOR);
            put_string(out, serializer);
        }
    }
}

fn decode_encoding(reader: &mut ByteReader<'_>) -> SchemaResult<FieldEncoding> {
    let tag = reader.read_u8()?;
    let encoding = match tag {
        ENC_BOOL => FieldEncoding::Bool,
        ENC_VAR_UINT => FieldEncoding::VarUInt,
        ENC_VAR_INT => FieldEncoding::VarInt,
        ENC_VAR_UINT64 => FieldEncoding::VarUInt64,
        ENC_FIXED64 => FieldEncoding::Fixed64,
        ENC_BITS => FieldEncoding::Bits(reader.read_u8()?),
        ENC_NO_SCALE => FieldEncoding::NoScale,
        ENC_COORD => FieldEncoding::Coord,
        ENC_SIMULATION_TIME => FieldEncoding::SimulationTime,
        ENC_QUANTIZED => FieldEncoding::Quantized(decode_quantized(reader)?),
        ENC_STRING => FieldEncoding::String,
        ENC_VECTOR => {
            let dims = reader.read_u8()?;
            let element = match reader.read_u8()? {
                ENC_NO_SCALE => FloatEncoding::NoScale,
                ENC_COORD => FloatEncoding::Coord,
                ENC_QUANTIZED => FloatEncoding::Quantized(decode_quantized(reader)?),
                other => return Err(SchemaError::UnknownEncoding { tag: other }),
            };
            FieldEncoding::Vector { dims, element }
        }
        other => return Err(SchemaError::UnknownEncoding { tag: other }),
    };
    Ok(encoding)
}

fn decode_quantized(reader: &mut ByteReader<'_>) -> SchemaResult<QuantizedFloat> {
    let bits = reader.read_u8()?;
    let flags = EncoderFlags::from_raw(reader.read_varu32()?);
    let low = reader.read_f32_le()?;
    let high = reader.read_f32_le()?;
    Ok(QuantizedFloat::new(bits, low, high, flags))
}

fn encode_encoding(out: &mut Vec<u8>, encoding: &FieldEncoding) {
    match encoding {
        FieldEncoding::Bool => out.push(ENC_BOOL),
        FieldEncoding::VarUInt => out.push(ENC_VAR_UINT),
        FieldEncoding::VarInt => out.push(ENC_VAR_INT),
        FieldEncoding::VarUInt64 => out.push(ENC_VAR_UINT64),
        FieldEncoding::Fixed64 => out.push(ENC_FIXED64),
        FieldEncoding::Bits(bits) => {
            out.push(ENC_BITS);
            out.push(*bits);
        }
        FieldEncoding::NoScale => out.push(ENC_NO_SCALE),
        FieldEncoding::Coord => out.push(ENC_COORD),
        FieldEncoding::SimulationTime => out.push(ENC_SIMULATION_TIME),
        FieldEncoding::Quantized(qf) => {
            out.push(ENC_QUANTIZED);
            encode_quantized(out, qf);
        }
        FieldEncoding::String => out.push(ENC_STRING),
        FieldEncoding::Vector { dims, element } => {
            out.push(ENC_VECTOR);
            out.push(*dims);
            match element {
                FloatEncoding::NoScale => out.push(ENC_NO_SCALE),
                FloatEncoding::Coord => out.push(ENC_COORD),
                FloatEncoding::Quantized(qf) => {
                    out.push(ENC_QUANTIZED);
                    encode_quantized(out, qf);
                }
            }
        }
    }
}

fn encode_quantized(out: &mut Vec<u8>, qf: &QuantizedFloat) {
    out.push(qf.bits);
    put_varu32(out, qf.flags.raw());
    out.extend_from_slice(&qf.low.to_le_bytes());
    out.extend_from_slice(&qf.high.to_le_bytes());
}
