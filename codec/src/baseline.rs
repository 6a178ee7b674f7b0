//! Instance baselines keyed by class id.
//!
//! Raw baselines arrive as entries of the `instancebaseline` string table:
//! the key is the decimal class id, the value is a field delta. The decoded
//! form is cached per class and dropped whenever the raw bytes change.

use ahash::AHashMap;
use bitstream::BitReader;
use schema::{FieldPath, SchemaRegistry};

use crate::entities::read_field_delta;
use crate::error::CodecResult;
use crate::limits::CodecLimits;
use crate::value::FieldValue;

/// Name of the string table carrying instance baselines.
pub const INSTANCE_BASELINE_TABLE: &str = "instancebaseline";

#[derive(Debug, Clone)]
struct Entry {
    raw: Vec<u8>,
    decoded: Option<Vec<(FieldPath, FieldValue)>>,
}

/// Per-class instance baselines with a decode cache.
#[derive(Debug, Clone, Default)]
pub struct BaselineStore {
    entries: AHashMap<u32, Entry>,
}

impl BaselineStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of classes with a baseline.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn contains(&self, class_id: u32) -> bool {
        self.entries.contains_key(&class_id)
    }

    /// Returns the raw baseline bytes of a class.
    #[must_use]
    pub fn raw(&self, class_id: u32) -> Option<&[u8]> {
        self.entries.get(&class_id).map(|entry| entry.raw.as_slice())
    }

    /// Stores raw baseline bytes. Returns `true` if they differ from the
    /// stored ones, in which case the decoded cache is dropped.
    pub fn set_raw(&mut self, class_id: u32, raw: Vec<u8>) -> bool {
        match self.entries.get_mut(&class_id) {
            Some(entry) if entry.raw == raw => false,
            Some(entry) => {
                entry.raw = raw;
                entry.decoded = None;
                true
            }
            None => {
                self.entries.insert(
                    class_id,
                    Entry {
                        raw,
                        decoded: None,
                    },
                );
                true
            }
        }
    }

    /// Stores a baseline from a string table entry. Keys that are not a
    /// class id are ignored.
    pub fn set_from_entry(&mut self, key: &str, value: &[u8]) -> bool {
        match key.parse::<u32>() {
            Ok(class_id) => self.set_raw(class_id, value.to_vec()),
            Err(_) => false,
        }
    }

    /// Returns the decoded baseline of a class, decoding it on first use.
    pub fn decoded(
        &mut self,
        class_id: u32,
        registry: &SchemaRegistry,
        limits: &CodecLimits,
    ) -> CodecResult<Option<&[(FieldPath, FieldValue)]>> {
        let Some(entry) = self.entries.get_mut(&class_id) else {
            return Ok(None);
        };
        if entry.decoded.is_none() {
            let mut reader = BitReader::new(&entry.raw);
            let mut paths = Vec::new();
            let mut fields = Vec::new();
            read_field_delta(
                &mut reader,
                registry,
                class_id,
                limits,
                &mut paths,
                |path, value| fields.push((path, value)),
            )?;
            entry.decoded = Some(fields);
        }
        Ok(entry.decoded.as_deref())
    }

    /// Drops every decoded baseline, keeping the raw bytes.
    ///
    /// Needed when the schema a cached decode was made against changes.
    pub fn invalidate_decoded(&mut self) {
        for entry in self.entries.values_mut() {
            entry.decoded = None;
        }
    }
}
