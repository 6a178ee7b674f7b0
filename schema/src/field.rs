//! Field encodings and declarations.

use std::fmt;

/// Encoder flag bitmask attached to a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct EncoderFlags(u32);

impl EncoderFlags {
    /// A set bit before the payload means "exactly the low bound".
    pub const ROUND_DOWN: u32 = 1 << 0;
    /// A set bit before the payload means "exactly the high bound".
    pub const ROUND_UP: u32 = 1 << 1;
    /// A set bit before the payload means "exactly zero".
    pub const ENCODE_ZERO: u32 = 1 << 2;
    /// Integers inside the range are representable exactly.
    pub const ENCODE_INTEGERS: u32 = 1 << 3;
    /// Full 32-bit float, no quantization.
    pub const NOSCALE: u32 = 1 << 4;

    /// Creates flags from a raw value.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw flag bits.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Returns `true` if every bit in `flag` is set.
    #[must_use]
    pub const fn contains(self, flag: u32) -> bool {
        self.0 & flag == flag
    }
}

/// The `type_tag` of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum FieldType {
    Bool,
    Int,
    Float,
    String,
    Vector,
    Array,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::String => "string",
            Self::Vector => "vector",
            Self::Array => "array",
        };
        write!(f, "{name}")
    }
}

/// Range quantization parameters for floats.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct QuantizedFloat {
    /// Payload width in bits (1..=31).
    pub bits: u8,
    pub low: f32,
    pub high: f32,
    pub flags: EncoderFlags,
}

impl QuantizedFloat {
    #[must_use]
    pub const fn new(bits: u8, low: f32, high: f32, flags: EncoderFlags) -> Self {
        Self {
            bits,
            low,
            high,
            flags,
        }
    }

    /// Number of intervals between `low` and `high`.
    #[must_use]
    pub const fn steps(&self) -> u32 {
        if self.bits == 0 || self.bits > 31 {
            return 1;
        }
        (1u32 << self.bits) - 1
    }

    /// Maps a raw payload onto the range.
    #[must_use]
    pub fn value_of(&self, raw: u32) -> f32 {
        let fraction = f64::from(raw.min(self.steps())) / f64::from(self.steps());
        (f64::from(self.low) + f64::from(self.high - self.low) * fraction) as f32
    }

    /// Maps a value onto the nearest raw payload, clamping to the range.
    #[must_use]
    pub fn quantize(&self, value: f32) -> u32 {
        let range = f64::from(self.high - self.low);
        if range <= 0.0 {
            return 0;
        }
        let clamped = f64::from(value.clamp(self.low, self.high));
        let fraction = (clamped - f64::from(self.low)) / range;
        (fraction * f64::from(self.steps())).round() as u32
    }
}

/// Float encodings usable as vector elements.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum FloatEncoding {
    NoScale,
    Coord,
    Quantized(QuantizedFloat),
}

/// How a property value is laid out in the bitstream.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum FieldEncoding {
    /// One bit.
    Bool,
    /// Unsigned varint (32-bit).
    VarUInt,
    /// Zigzag varint (32-bit).
    VarInt,
    /// Unsigned varint (64-bit).
    VarUInt64,
    /// Raw 64 bits.
    Fixed64,
    /// Unsigned integer of a fixed width (1..=32 bits).
    Bits(u8),
    /// Raw IEEE-754 float.
    NoScale,
    /// 14.5 fixed-point coordinate.
    Coord,
    /// Varint ticks scaled to seconds.
    SimulationTime,
    /// Range-quantized float.
    Quantized(QuantizedFloat),
    /// NUL-terminated string.
    String,
    /// Two or three floats sharing one element encoding.
    Vector { dims: u8, element: FloatEncoding },
}

impl FieldEncoding {
    /// Returns the `type_tag` this encoding produces.
    #[must_use]
    pub const fn field_type(&self) -> FieldType {
        match self {
            Self::Bool => FieldType::Bool,
            Self::VarUInt | Self::VarInt | Self::VarUInt64 | Self::Fixed64 | Self::Bits(_) => {
                FieldType::Int
            }
            Self::NoScale | Self::Coord | Self::SimulationTime | Self::Quantized(_) => {
                FieldType::Float
            }
            Self::String => FieldType::String,
            Self::Vector { .. } => FieldType::Vector,
        }
    }

    /// Returns the fixed bit width, or 0 for variable-width encodings.
    #[must_use]
    pub const fn bit_width(&self) -> u8 {
        match self {
            Self::Bool => 1,
            Self::Bits(bits) => *bits,
            Self::NoScale => 32,
            Self::Fixed64 => 64,
            Self::Quantized(qf) => qf.bits,
            Self::Vector {
                dims,
                element: FloatEncoding::NoScale,
            } => dims.saturating_mul(32),
            Self::Vector {
                dims,
                element: FloatEncoding::Quantized(qf),
            } => dims.saturating_mul(qf.bits),
            _ => 0,
        }
    }

    /// Returns the encoder flags implied by this encoding.
    #[must_use]
    pub const fn encoder_flags(&self) -> EncoderFlags {
        match self {
            Self::NoScale
            | Self::Vector {
                element: FloatEncoding::NoScale,
                ..
            } => EncoderFlags::from_raw(EncoderFlags::NOSCALE),
            Self::Quantized(qf)
            | Self::Vector {
                element: FloatEncoding::Quantized(qf),
                ..
            } => qf.flags,
            _ => EncoderFlags::from_raw(0),
        }
    }
}

/// Structural kind of a declared field.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum FieldKind {
    /// A single value.
    Value,
    /// A fixed number of elements addressed by index.
    FixedArray(u32),
    /// A dynamic vector: its own path holds the length, children hold elements.
    Vector,
    /// A nested serializer, addressed by name.
    Table(String),
    /// A dynamic vector of nested serializers.
    TableVector(String),
}

/// A field declared by a serializer.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FieldDecl {
    pub name: String,
    pub kind: FieldKind,
    /// Encoding of the value, or of each element for arrays and vectors.
    /// Ignored for table kinds.
    pub encoding: FieldEncoding,
}

impl FieldDecl {
    /// Declares a single value.
    #[must_use]
    pub fn value(name: impl Into<String>, encoding: FieldEncoding) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Value,
            encoding,
        }
    }

    /// Declares a fixed-size array.
    #[must_use]
    pub fn array(name: impl Into<String>, len: u32, encoding: FieldEncoding) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::FixedArray(len),
            encoding,
        }
    }

    /// Declares a dynamic vector.
    #[must_use]
    pub fn vector(name: impl Into<String>, encoding: FieldEncoding) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Vector,
            encoding,
        }
    }

    /// Declares a nested table.
    #[must_use]
    pub fn table(name: impl Into<String>, serializer: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Table(serializer.into()),
            encoding: FieldEncoding::Bool,
        }
    }

    /// Declares a dynamic vector of nested tables.
    #[must_use]
    pub fn table_vector(name: impl Into<String>, serializer: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::TableVector(serializer.into()),
            encoding: FieldEncoding::VarUInt,
        }
    }
}
