//! Serializers and class declarations.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::error::{SchemaError, SchemaResult};
use crate::field::{FieldDecl, FieldEncoding, FieldKind, FloatEncoding, QuantizedFloat};

/// An ordered list of fields shared by one or more classes.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Serializer {
    pub name: String,
    fields: Vec<FieldDecl>,
    #[cfg_attr(feature = "serde", serde(skip))]
    by_name: HashMap<String, u32>,
}

impl Serializer {
    /// Creates a serializer after validating its fields.
    pub fn new(name: impl Into<String>, fields: Vec<FieldDecl>) -> SchemaResult<Self> {
        let name = name.into();
        let mut by_name = HashMap::with_capacity(fields.len());
        for (index, field) in fields.iter().enumerate() {
            if field.name.is_empty() || field.name.contains('.') {
                return Err(SchemaError::InvalidFieldName {
                    serializer: name,
                    field: field.name.clone(),
                });
            }
            validate_field(field)?;
            if by_name.insert(field.name.clone(), index as u32).is_some() {
                return Err(SchemaError::DuplicateField {
                    serializer: name,
                    field: field.name.clone(),
                });
            }
        }
        Ok(Self {
            name,
            fields,
            by_name,
        })
    }

    /// Creates a serializer builder.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> SerializerBuilder {
        SerializerBuilder {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Returns the fields in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[FieldDecl] {
        &self.fields
    }

    /// Returns the field at a path index.
    #[must_use]
    pub fn field(&self, index: u32) -> Option<&FieldDecl> {
        self.fields.get(index as usize)
    }

    /// Returns the path index of a field by name.
    #[must_use]
    pub fn field_index(&self, name: &str) -> Option<u32> {
        self.by_name.get(name).copied()
    }
}

/// Builder for [`Serializer`].
#[derive(Debug)]
pub struct SerializerBuilder {
    name: String,
    fields: Vec<FieldDecl>,
}

impl SerializerBuilder {
    /// Adds a field declaration.
    #[must_use]
    pub fn field(mut self, field: FieldDecl) -> Self {
        self.fields.push(field);
        self
    }

    /// Builds the serializer after validation.
    pub fn build(self) -> SchemaResult<Serializer> {
        Serializer::new(self.name, self.fields)
    }
}

/// Binds a numeric class id to a class name and serializer.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ClassInfo {
    pub class_id: u32,
    pub name: String,
    pub serializer: String,
}

impl ClassInfo {
    #[must_use]
    pub fn new(class_id: u32, name: impl Into<String>, serializer: impl Into<String>) -> Self {
        Self {
            class_id,
            name: name.into(),
            serializer: serializer.into(),
        }
    }
}

fn validate_field(field: &FieldDecl) -> SchemaResult<()> {
    match field.kind {
        FieldKind::Value | FieldKind::FixedArray(_) | FieldKind::Vector => {
            validate_encoding(&field.encoding)
        }
        FieldKind::Table(_) | FieldKind::TableVector(_) => Ok(()),
    }
}

pub(crate) fn validate_encoding(encoding: &FieldEncoding) -> SchemaResult<()> {
    match encoding {
        FieldEncoding::Bits(bits) => {
            if *bits == 0 || *bits > 32 {
                return Err(SchemaError::InvalidBitWidth { bits: *bits });
            }
            Ok(())
        }
        FieldEncoding::Quantized(qf) => validate_quantized(qf),
        FieldEncoding::Vector { dims, element } => {
            if !(2..=3).contains(dims) {
                return Err(SchemaError::InvalidVectorDims { dims: *dims });
            }
            match element {
                FloatEncoding::Quantized(qf) => validate_quantized(qf),
                FloatEncoding::NoScale | FloatEncoding::Coord => Ok(()),
            }
        }
        _ => Ok(()),
    }
}

fn validate_quantized(qf: &QuantizedFloat) -> SchemaResult<()> {
    if qf.bits == 0 || qf.bits > 31 {
        return Err(SchemaError::InvalidBitWidth { bits: qf.bits });
    }
    if qf.low.partial_cmp(&qf.high) != Some(Ordering::Less) {
        return Err(SchemaError::InvalidQuantizedRange {
            low: qf.low.to_bits(),
            high: qf.high.to_bits(),
        });
    }
    Ok(())
}
