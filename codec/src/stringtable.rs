//! String tables: named, index-addressed key/user-data stores.
//!
//! CreateStringTable body (bytes):
//!
//! ```text
//! name:cstring max_entries:varu32 num_entries:varu32 flags:u8
//! [user_data_size_bits:varu32]   when flags & FIXED_SIZE
//! data_len:varu32 data           snappy block when flags & COMPRESSED
//! ```
//!
//! UpdateStringTable body: `table_id:varu32 count:varu32 data_len:varu32
//! data`. `data` is an MSB-first bitstream of `count` entries.

use std::collections::{BTreeMap, HashMap, VecDeque};

use bitstream::{
    decompress_block_bounded, put_string, put_varu32, BitReader, BitWriter, ByteReader,
};
use tracing::trace;

use crate::error::{CodecError, CodecResult, LimitKind};
use crate::limits::CodecLimits;

/// Name of the table carrying player info.
pub const USER_INFO_TABLE: &str = "userinfo";

const FLAG_FIXED_SIZE: u8 = 1 << 0;
const FLAG_COMPRESSED: u8 = 1 << 1;
const KEY_HISTORY_LEN: usize = 32;
const KEY_HISTORY_MIN_PREFIX: usize = 3;
const KEY_HISTORY_MAX_PREFIX: usize = (1 << 5) - 1;
const VALUE_LEN_BITS: u8 = 17;
/// Upper bound on decompressed entry data.
const MAX_TABLE_DATA_BYTES: usize = 1 << 26;

/// How entry user data is sized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UserDataLayout {
    /// Each value carries a 17-bit byte length.
    #[default]
    Variable,
    /// Every value is exactly this many bits.
    Fixed { size_bits: u32 },
}

/// One table entry.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct StringEntry {
    pub key: String,
    pub value: Vec<u8>,
}

/// A named string table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringTable {
    name: String,
    max_entries: u32,
    layout: UserDataLayout,
    entries: BTreeMap<u32, StringEntry>,
}

impl StringTable {
    #[must_use]
    pub fn new(name: impl Into<String>, max_entries: u32, layout: UserDataLayout) -> Self {
        Self {
            name: name.into(),
            max_entries,
            layout,
            entries: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn max_entries(&self) -> u32 {
        self.max_entries
    }

    #[must_use]
    pub const fn layout(&self) -> UserDataLayout {
        self.layout
    }

    #[must_use]
    pub fn get(&self, index: u32) -> Option<&StringEntry> {
        self.entries.get(&index)
    }

    /// Finds the first entry with `key`.
    #[must_use]
    pub fn find(&self, key: &str) -> Option<(u32, &StringEntry)> {
        self.entries
            .iter()
            .find(|(_, entry)| entry.key == key)
            .map(|(index, entry)| (*index, entry))
    }

    /// Entries in index order.
    pub fn entries(&self) -> impl Iterator<Item = (u32, &StringEntry)> {
        self.entries.iter().map(|(index, entry)| (*index, entry))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copies the current entries out.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(u32, StringEntry)> {
        self.entries
            .iter()
            .map(|(index, entry)| (*index, entry.clone()))
            .collect()
    }

    /// Applies an entry stream, returning the touched indices in order.
    ///
    /// A missing key or value leaves the stored one untouched.
    pub fn apply_entries(
        &mut self,
        data: &[u8],
        count: usize,
        limits: &CodecLimits,
    ) -> CodecResult<Vec<u32>> {
        let mut reader = BitReader::new(data);
        let mut history: VecDeque<Vec<u8>> = VecDeque::with_capacity(KEY_HISTORY_LEN);
        let mut changed = Vec::with_capacity(count);
        let mut index: i64 = -1;
        for _ in 0..count {
            index += if reader.read_bool()? {
                1
            } else {
                i64::from(reader.read_varu32()?) + 1
            };
            let slot = u32::try_from(index)
                .ok()
                .filter(|&slot| (slot as usize) < limits.max_string_table_entries)
                .ok_or(CodecError::LimitsExceeded {
                    kind: LimitKind::StringTableEntries,
                    limit: limits.max_string_table_entries,
                    actual: usize::try_from(index).unwrap_or(usize::MAX),
                })?;

            let key = if reader.read_bool()? {
                Some(read_key(&mut reader, &mut history, limits)?)
            } else {
                None
            };
            let value = if reader.read_bool()? {
                Some(self.read_value(&mut reader, limits)?)
            } else {
                None
            };

            let entry = self.entries.entry(slot).or_default();
            if let Some(key) = key {
                entry.key = key;
            }
            if let Some(value) = value {
                entry.value = value;
            }
            changed.push(slot);
        }
        trace!(table = %self.name, entries = changed.len(), "string table entries applied");
        Ok(changed)
    }

    fn read_value(&self, reader: &mut BitReader<'_>, limits: &CodecLimits) -> CodecResult<Vec<u8>> {
        match self.layout {
            UserDataLayout::Fixed { size_bits } => {
                let len = (size_bits as usize).div_ceil(8);
                check_user_data_len(len, limits)?;
                Ok(reader.read_bits_as_bytes(size_bits as usize)?)
            }
            UserDataLayout::Variable => {
                let len = reader.read_u32_bits(VALUE_LEN_BITS)? as usize;
                check_user_data_len(len, limits)?;
                Ok(reader.read_bytes(len)?)
            }
        }
    }
}

fn check_user_data_len(len: usize, limits: &CodecLimits) -> CodecResult<()> {
    if len > limits.max_user_data_len {
        return Err(CodecError::LimitsExceeded {
            kind: LimitKind::UserDataLength,
            limit: limits.max_user_data_len,
            actual: len,
        });
    }
    Ok(())
}

fn read_key(
    reader: &mut BitReader<'_>,
    history: &mut VecDeque<Vec<u8>>,
    limits: &CodecLimits,
) -> CodecResult<String> {
    let mut key = Vec::new();
    if reader.read_bool()? {
        let position = reader.read_u32_bits(5)? as usize;
        let len = reader.read_u32_bits(5)? as usize;
        if let Some(previous) = history.get(position) {
            key.extend_from_slice(&previous[..len.min(previous.len())]);
        }
    }
    key.extend_from_slice(reader.read_string(limits.max_string_len)?.as_bytes());
    if history.len() == KEY_HISTORY_LEN {
        history.pop_front();
    }
    history.push_back(key.clone());
    Ok(String::from_utf8_lossy(&key).into_owned())
}

/// Result of a create or update: which table and which of its indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableChange {
    pub table_id: u32,
    pub changed: Vec<u32>,
}

/// All string tables of a recording, addressed by creation order or name.
///
/// Creating a table under a name that already exists starts a new table;
/// name lookups then return the newest one.
#[derive(Debug, Clone, Default)]
pub struct StringTables {
    tables: Vec<StringTable>,
    by_name: HashMap<String, u32>,
}

impl StringTables {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&StringTable> {
        self.by_name
            .get(name)
            .and_then(|&id| self.tables.get(id as usize))
    }

    #[must_use]
    pub fn by_id(&self, table_id: u32) -> Option<&StringTable> {
        self.tables.get(table_id as usize)
    }

    /// Tables in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &StringTable> {
        self.tables.iter()
    }

    /// Decodes a CreateStringTable body and registers the table.
    pub fn create(&mut self, body: &[u8], limits: &CodecLimits) -> CodecResult<TableChange> {
        if self.tables.len() >= limits.max_string_tables {
            return Err(CodecError::LimitsExceeded {
                kind: LimitKind::StringTables,
                limit: limits.max_string_tables,
                actual: self.tables.len() + 1,
            });
        }
        let mut reader = ByteReader::new(body);
        let name = reader.read_string(limits.max_string_len)?;
        let max_entries = reader.read_varu32()?;
        let num_entries = reader.read_varu32()? as usize;
        let flags = reader.read_u8()?;
        let layout = if flags & FLAG_FIXED_SIZE != 0 {
            UserDataLayout::Fixed {
                size_bits: reader.read_varu32()?,
            }
        } else {
            UserDataLayout::Variable
        };
        let data_len = reader.read_varu32()? as usize;
        let data = reader.read_slice(data_len)?;

        let mut table = StringTable::new(name, max_entries, layout);
        let changed = if flags & FLAG_COMPRESSED != 0 {
            let data = decompress_block_bounded(data, MAX_TABLE_DATA_BYTES)?;
            table.apply_entries(&data, num_entries, limits)?
        } else {
            table.apply_entries(data, num_entries, limits)?
        };

        let table_id = self.tables.len() as u32;
        self.by_name.insert(table.name.clone(), table_id);
        self.tables.push(table);
        Ok(TableChange { table_id, changed })
    }

    /// Decodes an UpdateStringTable body and applies it.
    pub fn update(&mut self, body: &[u8], limits: &CodecLimits) -> CodecResult<TableChange> {
        let mut reader = ByteReader::new(body);
        let table_id = reader.read_varu32()?;
        let count = reader.read_varu32()? as usize;
        let data_len = reader.read_varu32()? as usize;
        let data = reader.read_slice(data_len)?;
        let table = self
            .tables
            .get_mut(table_id as usize)
            .ok_or(CodecError::UnknownStringTable { table_id })?;
        let changed = table.apply_entries(data, count, limits)?;
        Ok(TableChange { table_id, changed })
    }
}

/// An entry to encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryWrite<'a> {
    pub index: u32,
    pub key: Option<&'a str>,
    pub value: Option<&'a [u8]>,
}

impl<'a> EntryWrite<'a> {
    #[must_use]
    pub const fn new(index: u32, key: &'a str, value: &'a [u8]) -> Self {
        Self {
            index,
            key: Some(key),
            value: Some(value),
        }
    }
}

/// Encodes an entry stream. Indices must be strictly ascending.
pub fn encode_entries(layout: UserDataLayout, entries: &[EntryWrite<'_>]) -> CodecResult<Vec<u8>> {
    let mut writer = BitWriter::new();
    let mut history: VecDeque<Vec<u8>> = VecDeque::with_capacity(KEY_HISTORY_LEN);
    let mut previous: i64 = -1;
    for entry in entries {
        let index = i64::from(entry.index);
        if index <= previous {
            return Err(CodecError::UnorderedTableEntries {
                previous: previous as u32,
                current: entry.index,
            });
        }
        if index == previous + 1 {
            writer.write_bool(true);
        } else {
            writer.write_bool(false);
            // Gap is at least 1 and below 2^32.
            writer.write_varu32((index - previous - 1) as u32);
        }
        previous = index;

        writer.write_bool(entry.key.is_some());
        if let Some(key) = entry.key {
            write_key(&mut writer, &mut history, key);
        }
        writer.write_bool(entry.value.is_some());
        if let Some(value) = entry.value {
            match layout {
                UserDataLayout::Fixed { size_bits } => {
                    writer.write_bits_from_bytes(value, size_bits as usize)?;
                }
                UserDataLayout::Variable => {
                    writer.write_bits(value.len() as u64, VALUE_LEN_BITS)?;
                    writer.write_bytes(value);
                }
            }
        }
    }
    Ok(writer.finish())
}

fn write_key(writer: &mut BitWriter, history: &mut VecDeque<Vec<u8>>, key: &str) {
    let bytes = key.as_bytes();
    let best = history
        .iter()
        .enumerate()
        .map(|(position, previous)| {
            let shared = previous
                .iter()
                .zip(bytes)
                .take_while(|(a, b)| a == b)
                .count()
                .min(KEY_HISTORY_MAX_PREFIX);
            // Suffixes are decoded as strings, so split on a char boundary.
            let shared = (0..=shared)
                .rev()
                .find(|&i| key.is_char_boundary(i))
                .unwrap_or(0);
            (position, shared)
        })
        .max_by_key(|&(position, shared)| (shared, std::cmp::Reverse(position)));

    match best {
        Some((position, shared)) if shared >= KEY_HISTORY_MIN_PREFIX => {
            writer.write_bool(true);
            write_small(writer, position);
            write_small(writer, shared);
            write_cstring_bytes(writer, &bytes[shared..]);
        }
        _ => {
            writer.write_bool(false);
            write_cstring_bytes(writer, bytes);
        }
    }
    if history.len() == KEY_HISTORY_LEN {
        history.pop_front();
    }
    history.push_back(bytes.to_vec());
}

fn write_small(writer: &mut BitWriter, value: usize) {
    for i in (0..5).rev() {
        writer.write_bool((value >> i) & 1 == 1);
    }
}

fn write_cstring_bytes(writer: &mut BitWriter, bytes: &[u8]) {
    writer.write_bytes(bytes);
    writer.write_u8(0);
}

/// Encodes a CreateStringTable body.
pub fn encode_create_string_table(
    name: &str,
    max_entries: u32,
    layout: UserDataLayout,
    entries: &[EntryWrite<'_>],
    compress: bool,
) -> CodecResult<Vec<u8>> {
    let data = encode_entries(layout, entries)?;
    let data = if compress {
        bitstream::compress_block(&data)?
    } else {
        data
    };
    let mut flags = 0u8;
    if matches!(layout, UserDataLayout::Fixed { .. }) {
        flags |= FLAG_FIXED_SIZE;
    }
    if compress {
        flags |= FLAG_COMPRESSED;
    }

    let mut out = Vec::with_capacity(data.len() + name.len() + 16);
    put_string(&mut out, name);
    put_varu32(&mut out, max_entries);
    put_varu32(&mut out, entries.len() as u32);
    out.push(flags);
    if let UserDataLayout::Fixed { size_bits } = layout {
        put_varu32(&mut out, size_bits);
    }
    put_varu32(&mut out, data.len() as u32);
    out.extend_from_slice(&data);
    Ok(out)
}

/// Encodes an UpdateStringTable body.
pub fn encode_update_string_table(
    table_id: u32,
    layout: UserDataLayout,
    entries: &[EntryWrite<'_>],
) -> CodecResult<Vec<u8>> {
    let data = encode_entries(layout, entries)?;
    let mut out = Vec::with_capacity(data.len() + 12);
    put_varu32(&mut out, table_id);
    put_varu32(&mut out, entries.len() as u32);
    put_varu32(&mut out, data.len() as u32);
    out.extend_from_slice(&data);
    Ok(out)
}

/// Player info carried by `userinfo` entries.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct UserInfo {
    pub steamid: u64,
    pub name: String,
    pub userid: u32,
    pub is_hltv: bool,
}

impl UserInfo {
    /// Parses a `userinfo` entry value.
    pub fn decode(value: &[u8], limits: &CodecLimits) -> CodecResult<Self> {
        let mut reader = ByteReader::new(value);
        Ok(Self {
            steamid: reader.read_u64_le()?,
            name: reader.read_string(limits.max_string_len)?,
            userid: reader.read_varu32()?,
            is_hltv: reader.read_u8()? != 0,
        })
    }

    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.name.len() + 16);
        out.extend_from_slice(&self.steamid.to_le_bytes());
        put_string(&mut out, &self.name);
        put_varu32(&mut out, self.userid);
        out.push(u8::from(self.is_hltv));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> CodecLimits {
        CodecLimits::for_testing()
    }

    #[test]
    fn create_and_lookup() {
        let body = encode_create_string_table(
            "modelprecache",
            1024,
            UserDataLayout::Variable,
            &[
                EntryWrite::new(0, "models/weapons/w_rif_ak47.vmdl", b""),
                EntryWrite::new(1, "models/weapons/w_rif_m4a1.vmdl", b"\x01"),
                EntryWrite::new(5, "models/player/ctm_sas.vmdl", b"\x02\x03"),
            ],
            false,
        )
        .unwrap();

        let mut tables = StringTables::new();
        let change = tables.create(&body, &limits()).unwrap();
        assert_eq!(change.table_id, 0);
        assert_eq!(change.changed, vec![0, 1, 5]);

        let table = tables.get("modelprecache").unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.get(1).unwrap().key, "models/weapons/w_rif_m4a1.vmdl");
        assert_eq!(table.get(5).unwrap().value, vec![2, 3]);
        assert!(table.get(2).is_none());
        assert_eq!(table.find("models/player/ctm_sas.vmdl").unwrap().0, 5);
    }

    #[test]
    fn compressed_fixed_size_table() {
        let body = encode_create_string_table(
            "lightstyles",
            64,
            UserDataLayout::Fixed { size_bits: 12 },
            &[
                EntryWrite::new(0, "a", &[0xAB, 0x0C]),
                EntryWrite::new(1, "b", &[0x01, 0x0F]),
            ],
            true,
        )
        .unwrap();
        let mut tables = StringTables::new();
        tables.create(&body, &limits()).unwrap();
        let table = tables.get("lightstyles").unwrap();
        assert_eq!(table.layout(), UserDataLayout::Fixed { size_bits: 12 });
        assert_eq!(table.get(0).unwrap().value, vec![0xAB, 0x0C]);
        assert_eq!(table.get(1).unwrap().value, vec![0x01, 0x0F]);
    }

    #[test]
    fn history_prefixes_roundtrip() {
        let keys = [
            "weapon_ak47",
            "weapon_awp",
            "weapon_deagle",
            "item_kevlar",
            "weapon_ak47_extra",
        ];
        let entries: Vec<EntryWrite<'_>> = keys
            .iter()
            .enumerate()
            .map(|(i, key)| EntryWrite {
                index: i as u32,
                key: Some(*key),
                value: None,
            })
            .collect();
        let data = encode_entries(UserDataLayout::Variable, &entries).unwrap();
        let mut table = StringTable::new("t", 16, UserDataLayout::Variable);
        table.apply_entries(&data, keys.len(), &limits()).unwrap();
        let decoded: Vec<&str> = table.entries().map(|(_, e)| e.key.as_str()).collect();
        assert_eq!(decoded, keys);
    }

    #[test]
    fn update_overwrites_by_index() {
        let mut tables = StringTables::new();
        tables
            .create(
                &encode_create_string_table(
                    USER_INFO_TABLE,
                    64,
                    UserDataLayout::Variable,
                    &[EntryWrite::new(0, "0", b"old")],
                    false,
                )
                .unwrap(),
                &limits(),
            )
            .unwrap();

        let body = encode_update_string_table(
            0,
            UserDataLayout::Variable,
            &[
                EntryWrite {
                    index: 0,
                    key: None,
                    value: Some(&b"new"[..]),
                },
                EntryWrite::new(3, "3", b"x"),
            ],
        )
        .unwrap();
        let change = tables.update(&body, &limits()).unwrap();
        assert_eq!(change.changed, vec![0, 3]);
        let table = tables.get(USER_INFO_TABLE).unwrap();
        assert_eq!(table.get(0).unwrap().key, "0");
        assert_eq!(table.get(0).unwrap().value, b"new".to_vec());
        assert_eq!(table.snapshot().len(), 2);
    }

    #[test]
    fn update_of_unknown_table() {
        let body = encode_update_string_table(4, UserDataLayout::Variable, &[]).unwrap();
        let err = StringTables::new().update(&body, &limits()).unwrap_err();
        assert_eq!(err, CodecError::UnknownStringTable { table_id: 4 });
    }

    #[test]
    fn encoder_rejects_descending_indices() {
        let err = encode_entries(
            UserDataLayout::Variable,
            &[EntryWrite::new(2, "a", b""), EntryWrite::new(1, "b", b"")],
        )
        .unwrap_err();
        assert_eq!(
            err,
            CodecError::UnorderedTableEntries {
                previous: 2,
                current: 1
            }
        );
    }

    #[test]
    fn entry_index_limit() {
        let data = encode_entries(
            UserDataLayout::Variable,
            &[EntryWrite::new(5000, "far", b"")],
        )
        .unwrap();
        let mut table = StringTable::new("t", 0, UserDataLayout::Variable);
        let err = table.apply_entries(&data, 1, &limits()).unwrap_err();
        assert!(matches!(
            err,
            CodecError::LimitsExceeded {
                kind: LimitKind::StringTableEntries,
                ..
            }
        ));
    }

    #[test]
    fn table_count_limit() {
        let mut tables = StringTables::new();
        let limits = CodecLimits {
            max_string_tables: 1,
            ..CodecLimits::for_testing()
        };
        let body =
            encode_create_string_table("a", 1, UserDataLayout::Variable, &[], false).unwrap();
        tables.create(&body, &limits).unwrap();
        assert!(matches!(
            tables.create(&body, &limits),
            Err(CodecError::LimitsExceeded {
                kind: LimitKind::StringTables,
                ..
            })
        ));
    }

    #[test]
    fn user_info_roundtrip() {
        let info = UserInfo {
            steamid: 76_561_198_012_345_678,
            name: "NiKo".to_string(),
            userid: 11,
            is_hltv: false,
        };
        assert_eq!(UserInfo::decode(&info.encode(), &limits()).unwrap(), info);
        assert!(UserInfo::decode(&[1, 2, 3], &limits()).is_err());
    }
}
