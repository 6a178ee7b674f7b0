//! Deterministic schema fingerprints.

use blake3::Hasher;

use crate::field::{FieldEncoding, FieldKind, FloatEncoding, QuantizedFloat};
use crate::registry::SchemaRegistry;

/// Computes a stable fingerprint of everything a registry has declared.
///
/// Two recordings that declare the same serializers (in the same order) and
/// the same classes produce the same value.
#[must_use]
pub fn fingerprint(registry: &SchemaRegistry) -> u64 {
    let mut hasher = Hasher::new();
    write_u32(&mut hasher, registry.serializer_count() as u32);
    for serializer in registry.serializers() {
        write_str(&mut hasher, &serializer.name);
        write_u32(&mut hasher, serializer.fields().len() as u32);
        for field in serializer.fields() {
            write_str(&mut hasher, &field.name);
            write_kind(&mut hasher, &field.kind);
            if !matches!(field.kind, FieldKind::Table(_) | FieldKind::TableVector(_)) {
                write_encoding(&mut hasher, &field.encoding);
            }
        }
    }

    write_u32(&mut hasher, registry.class_count() as u32);
    for class in registry.classes() {
        write_u32(&mut hasher, class.class_id);
        write_str(&mut hasher, &class.name);
        write_str(&mut hasher, &class.serializer);
    }

    let hash = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&hash.as_bytes()[..8]);
    u64::from_le_bytes(bytes)
}

fn write_kind(hasher: &mut Hasher, kind: &FieldKind) {
    match kind {
        FieldKind::Value => write_u8(hasher, 0),
        FieldKind::FixedArray(len) => {
            write_u8(hasher, 1);
            write_u32(hasher, *len);
        }
        FieldKind::Vector => write_u8(hasher, 2),
        FieldKind::Table(serializer) => {
            write_u8(hasher, 3);
            write_str(hasher, serializer);
        }
        FieldKind::TableVector(serializer) => {
            write_u8(hasher, 4);
            write_str(hasher, serializer);
        }
    }
}

fn write_encoding(hasher: &mut Hasher, encoding: &FieldEncoding) {
    match encoding {
        FieldEncoding::Bool => write_u8(hasher, 0),
        FieldEncoding::VarUInt => write_u8(hasher, 1),
        FieldEncoding::VarInt => write_u8(hasher, 2),
        FieldEncoding::VarUInt64 => write_u8(hasher, 3),
        FieldEncoding::Fixed64 => write_u8(hasher, 4),
        FieldEncoding::Bits(bits) => {
            write_u8(hasher, 5);
            write_u8(hasher, *bits);
        }
        FieldEncoding::NoScale => write_u8(hasher, 6),
        FieldEncoding::Coord => write_u8(hasher, 7),
        FieldEncoding::SimulationTime => write_u8(hasher, 8),
        FieldEncoding::Quantized(qf) => {
            write_u8(hasher, 9);
            write_quantized(hasher, qf);
        }
        FieldEncoding::String => write_u8(hasher, 10),
        FieldEncoding::Vector { dims, element } => {
            write_u8(hasher, 11);
            write_u8(hasher, *dims);
            match element {
                FloatEncoding::NoScale => write_u8(hasher, 6),
                FloatEncoding::Coord => write_u8(hasher, 7),
                FloatEncoding::Quantized(qf) => {
                    write_u8(hasher, 9);
                    write_quantized(hasher, qf);
                }
            }
        }
    }
}

fn write_quantized(hasher: &mut Hasher, qf: &QuantizedFloat) {
    write_u8(hasher, qf.bits);
    write_u32(hasher, qf.flags.raw());
    write_u32(hasher, qf.low.to_bits());
    write_u32(hasher, qf.high.to_bits());
}

fn write_str(hasher: &mut Hasher, value: &str) {
    write_u32(hasher, value.len() as u32);
    hasher.update(value.as_bytes());
}

fn write_u8(hasher: &mut Hasher, value: u8) {
    hasher.update(&[value]);
}

fn write_u32(hasher: &mut Hasher, value: u32) {
    hasher.update(&value.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldDecl;
    use crate::serializer::{ClassInfo, Serializer};

    fn registry(health: FieldEncoding) -> SchemaRegistry {
        let mut registry = SchemaRegistry::new();
        registry.add_serializers([Serializer::builder("CCSPlayerPawn")
            .field(FieldDecl::value("m_iHealth", health))
            .field(FieldDecl::array("m_iAmmo", 4, FieldEncoding::VarUInt))
            .build()
            .unwrap()]);
        registry.add_classes([ClassInfo::new(3, "CCSPlayerPawn", "CCSPlayerPawn")]);
        registry
    }

    #[test]
    fn fingerprint_is_stable() {
        let a = registry(FieldEncoding::VarInt);
        let b = registry(FieldEncoding::VarInt);
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn fingerprint_tracks_encoding() {
        let a = registry(FieldEncoding::VarInt);
        let b = registry(FieldEncoding::Bits(8));
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn fingerprint_tracks_classes() {
        let a = registry(FieldEncoding::VarInt);
        let mut b = registry(FieldEncoding::VarInt);
        b.add_classes([ClassInfo::new(4, "CCSPlayerController", "CCSPlayerPawn")]);
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn empty_registry_differs_from_populated() {
        assert_ne!(
            fingerprint(&SchemaRegistry::new()),
            fingerprint(&registry(FieldEncoding::Bool))
        );
    }
}
