//! Server variables, item drops and end-of-match inventories.
//!
//! ```text
//! SetConVar  := count:varu32 (name:cstring value:cstring)*
//! ItemDrops  := count:varu32 item*
//! EndOfMatch := count:varu32 (xuid:u64 name:cstring team:vars32 items:varu32 item*)*
//! item       := account_id:varu32 item_id:varu64 def_index:varu32 paint_index:varu32
//!               rarity:varu32 quality:varu32 paint_wear:varu32 paint_seed:varu32
//!               quest_id:varu32 drop_reason:varu32 inventory:varu32
//!               entity_index:vars32 custom_name:cstring
//! ```
//!
//! An empty custom name decodes as `None`.

use bitstream::{put_string, put_varu32, put_varu64, put_vars32, ByteReader};

use crate::error::{CodecError, CodecResult, LimitKind};
use crate::limits::CodecLimits;

/// An economy item: a drop, or a weapon skin a player owned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct EconItem {
    pub account_id: u32,
    pub item_id: u64,
    pub def_index: u32,
    pub paint_index: u32,
    pub rarity: u32,
    pub quality: u32,
    pub paint_wear: u32,
    pub paint_seed: u32,
    pub quest_id: u32,
    pub drop_reason: u32,
    pub custom_name: Option<String>,
    pub inventory: u32,
    /// Entity that carried the item, or -1.
    pub entity_index: i32,
    /// Owner, known only for end-of-match inventories.
    pub steamid: Option<u64>,
}

impl EconItem {
    fn read(reader: &mut ByteReader<'_>, limits: &CodecLimits) -> CodecResult<Self> {
        Ok(Self {
            account_id: reader.read_varu32()?,
            item_id: reader.read_varu64()?,
            def_index: reader.read_varu32()?,
            paint_index: reader.read_varu32()?,
            rarity: reader.read_varu32()?,
            quality: reader.read_varu32()?,
            paint_wear: reader.read_varu32()?,
            paint_seed: reader.read_varu32()?,
            quest_id: reader.read_varu32()?,
            drop_reason: reader.read_varu32()?,
            inventory: reader.read_varu32()?,
            entity_index: reader.read_vars32()?,
            custom_name: Some(reader.read_string(limits.max_string_len)?)
                .filter(|name| !name.is_empty()),
            steamid: None,
        })
    }

    fn write(&self, out: &mut Vec<u8>) {
        put_varu32(out, self.account_id);
        put_varu64(out, self.item_id);
        put_varu32(out, self.def_index);
        put_varu32(out, self.paint_index);
        put_varu32(out, self.rarity);
        put_varu32(out, self.quality);
        put_varu32(out, self.paint_wear);
        put_varu32(out, self.paint_seed);
        put_varu32(out, self.quest_id);
        put_varu32(out, self.drop_reason);
        put_varu32(out, self.inventory);
        put_vars32(out, self.entity_index);
        put_string(out, self.custom_name.as_deref().unwrap_or(""));
    }
}

/// One player's line in the end-of-match summary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayerEndData {
    pub steamid: u64,
    pub name: String,
    pub team: i32,
    pub items: Vec<EconItem>,
}

impl PlayerEndData {
    /// Items with a real item id, stamped with the owner.
    pub fn skins(&self) -> impl Iterator<Item = EconItem> + '_ {
        self.items
            .iter()
            .filter(|item| item.item_id != 0)
            .map(|item| EconItem {
                steamid: Some(self.steamid),
                ..item.clone()
            })
    }
}

fn read_count(reader: &mut ByteReader<'_>, limits: &CodecLimits) -> CodecResult<usize> {
    let count = reader.read_varu32()? as usize;
    if count > limits.max_list_len {
        return Err(CodecError::LimitsExceeded {
            kind: LimitKind::ListLength,
            limit: limits.max_list_len,
            actual: count,
        });
    }
    Ok(count)
}

fn put_count(out: &mut Vec<u8>, count: usize) {
    put_varu32(out, u32::try_from(count).unwrap_or(u32::MAX));
}

/// Decodes a SetConVar body into name/value pairs in stream order.
pub fn decode_convars(body: &[u8], limits: &CodecLimits) -> CodecResult<Vec<(String, String)>> {
    let mut reader = ByteReader::new(body);
    let count = read_count(&mut reader, limits)?;
    let mut vars = Vec::with_capacity(count);
    for _ in 0..count {
        let name = reader.read_string(limits.max_string_len)?;
        let value = reader.read_string(limits.max_string_len)?;
        vars.push((name, value));
    }
    Ok(vars)
}

#[must_use]
pub fn encode_convars(vars: &[(&str, &str)]) -> Vec<u8> {
    let mut out = Vec::new();
    put_count(&mut out, vars.len());
    for (name, value) in vars {
        put_string(&mut out, name);
        put_string(&mut out, value);
    }
    out
}

/// Decodes an ItemDrops body.
pub fn decode_item_drops(body: &[u8], limits: &CodecLimits) -> CodecResult<Vec<EconItem>> {
    let mut reader = ByteReader::new(body);
    let count = read_count(&mut reader, limits)?;
    (0..count)
        .map(|_| EconItem::read(&mut reader, limits))
        .collect()
}

#[must_use]
pub fn encode_item_drops(items: &[EconItem]) -> Vec<u8> {
    let mut out = Vec::new();
    put_count(&mut out, items.len());
    for item in items {
        item.write(&mut out);
    }
    out
}

/// Decodes an EndOfMatch body.
pub fn decode_end_of_match(body: &[u8], limits: &CodecLimits) -> CodecResult<Vec<PlayerEndData>> {
    let mut reader = ByteReader::new(body);
    let count = read_count(&mut reader, limits)?;
    let mut players = Vec::with_capacity(count);
    for _ in 0..count {
        let steamid = reader.read_u64_le()?;
        let name = reader.read_string(limits.max_string_len)?;
        let team = reader.read_vars32()?;
        let item_count = read_count(&mut reader, limits)?;
        let items = (0..item_count)
            .map(|_| EconItem::read(&mut reader, limits))
            .collect::<CodecResult<Vec<_>>>()?;
        players.push(PlayerEndData {
            steamid,
            name,
            team,
            items,
        });
    }
    Ok(players)
}

#[must_use]
pub fn encode_end_of_match(players: &[PlayerEndData]) -> Vec<u8> {
    let mut out = Vec::new();
    put_count(&mut out, players.len());
    for player in players {
        out.extend_from_slice(&player.steamid.to_le_bytes());
        put_string(&mut out, &player.name);
        put_vars32(&mut out, player.team);
        put_count(&mut out, player.items.len());
        for item in &player.items {
            item.write(&mut out);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ak(item_id: u64) -> EconItem {
        EconItem {
            account_id: 40_512,
            item_id,
            def_index: 7,
            paint_index: 282,
            rarity: 5,
            quality: 4,
            paint_wear: 1_036_831_949,
            paint_seed: 661,
            inventory: 3_221_225_475,
            entity_index: -1,
            custom_name: Some("redline".into()),
            ..EconItem::default()
        }
    }

    #[test]
    fn convars_keep_stream_order() {
        let body = encode_convars(&[("mp_roundtime", "1.92"), ("sv_cheats", "0")]);
        let vars = decode_convars(&body, &CodecLimits::for_testing()).unwrap();
        assert_eq!(
            vars,
            vec![
                ("mp_roundtime".to_string(), "1.92".to_string()),
                ("sv_cheats".to_string(), "0".to_string()),
            ]
        );
    }

    #[test]
    fn item_drops_decode() {
        let mut plain = ak(0);
        plain.custom_name = None;
        let body = encode_item_drops(&[ak(31_337), plain.clone()]);
        let items = decode_item_drops(&body, &CodecLimits::for_testing()).unwrap();
        assert_eq!(items, vec![ak(31_337), plain]);
        assert!(items.iter().all(|item| item.steamid.is_none()));
    }

    #[test]
    fn skins_skip_default_items_and_carry_the_owner() {
        let player = PlayerEndData {
            steamid: 76_561_198_000_000_001,
            name: "alice".into(),
            team: 2,
            items: vec![ak(0), ak(99)],
        };
        let body = encode_end_of_match(std::slice::from_ref(&player));
        let players = decode_end_of_match(&body, &CodecLimits::for_testing()).unwrap();
        assert_eq!(players, vec![player]);

        let skins: Vec<_> = players[0].skins().collect();
        assert_eq!(skins.len(), 1);
        assert_eq!(skins[0].item_id, 99);
        assert_eq!(skins[0].steamid, Some(76_561_198_000_000_001));
    }

    #[test]
    fn list_length_is_bounded() {
        let mut body = Vec::new();
        put_varu32(&mut body, 65);
        let err = decode_item_drops(&body, &CodecLimits::for_testing()).unwrap_err();
        assert!(matches!(
            err,
            CodecError::LimitsExceeded {
                kind: LimitKind::ListLength,
                limit: 64,
                actual: 65
            }
        ));
    }

    #[test]
    fn truncated_item_fails() {
        let body = encode_item_drops(&[ak(5)]);
        assert!(decode_item_drops(&body[..body.len() - 3], &CodecLimits::for_testing()).is_err());
    }
}
