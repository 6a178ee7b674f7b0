//! A synthetic match shared by the integration tests.
//!
//! Two players on de_mirage. Ticks 100..=6000 in steps of 100 each carry
//! one packet; alice's pawn walks along x = tick. Scripted moments:
//!
//! | tick | what happens |
//! |------|--------------|
//! | 100  | round_start |
//! | 1000 | alice chats |
//! | 1500, 1600 | alice speaks |
//! | 2000..2300 | alice's smoke flies, removed at 2300 |
//! | 2500 | round_end, T win; bob gets an item drop |
//! | 2600 | round_start |
//! | 3000 | bob kills alice |
//! | 4000 | bob plants |
//! | 5000 | round_end, CT win, rounds played becomes 1 |
//! | 6000 | end-of-match summary with both inventories |
//!
//! Signon sets `mp_maxrounds` and `sv_cheats`.

#![allow(dead_code)]

use std::sync::OnceLock;

use demodec::codec::{
    ChatMessage, EconItem, EntityId, EntityOp, EntryWrite, EventDescriptor, EventKeyType,
    FieldValue, FileHeader, PlayerEndData, ServerInfo, UserDataLayout, UserInfo, VoiceFormat,
    VoicePacket, INSTANCE_BASELINE_TABLE, USER_INFO_TABLE,
};
use demodec::schema::{ClassInfo, FieldDecl, FieldEncoding, FloatEncoding, Serializer};
use demodec::writer::DemoWriter;

pub const CONTROLLER: u32 = 1;
pub const PAWN: u32 = 2;
pub const SMOKE: u32 = 3;
pub const RULES: u32 = 4;

pub const ALICE_STEAMID: u64 = 76_561_198_000_000_001;
pub const BOB_STEAMID: u64 = 76_561_198_000_000_002;

pub const ALICE_CONTROLLER: u32 = 1;
pub const BOB_CONTROLLER: u32 = 2;
pub const ALICE_PAWN: u32 = 10;
pub const BOB_PAWN: u32 = 11;
pub const RULES_ENTITY: u32 = 20;
pub const SMOKE_ENTITY: u32 = 30;

pub const PLAYER_DEATH: u32 = 1;
pub const ROUND_END: u32 = 2;
pub const BOMB_PLANTED: u32 = 3;
pub const ROUND_START: u32 = 4;
pub const WEAPON_FIRE: u32 = 5;
pub const SMOKE_DETONATE: u32 = 6;
pub const PLAYER_JUMP: u32 = 7;

pub const TEAM_T: u32 = 2;
pub const TEAM_CT: u32 = 3;

pub const FIRST_TICK: u32 = 100;
pub const LAST_TICK: u32 = 6000;
pub const TICK_STEP: usize = 100;

pub const VOICE_PAYLOAD: [u8; 4] = [1, 0, 2, 0];

const VEC3: FieldEncoding = FieldEncoding::Vector {
    dims: 3,
    element: FloatEncoding::NoScale,
};

/// Handle of an entity with serial 1.
pub const fn handle(id: u32) -> u32 {
    (1 << 11) | id
}

/// Ticks that carry a packet after signon.
pub fn ticks() -> impl Iterator<Item = u32> {
    (FIRST_TICK..=LAST_TICK).step_by(TICK_STEP)
}

pub fn alice_origin(tick: u32) -> [f32; 3] {
    [tick as f32, -(tick as f32), 64.0]
}

pub const BOB_ORIGIN: [f32; 3] = [500.0, 500.0, 0.0];

pub const CONVARS: [(&str, &str); 2] = [("mp_maxrounds", "24"), ("sv_cheats", "0")];

pub fn dropped_item() -> EconItem {
    EconItem {
        account_id: 2,
        item_id: 40_001,
        def_index: 4_001,
        rarity: 1,
        quality: 4,
        drop_reason: 3,
        entity_index: BOB_CONTROLLER as i32,
        ..EconItem::default()
    }
}

/// Alice carries one skinned rifle and a stock knife; bob only stock items.
pub fn end_of_match() -> Vec<PlayerEndData> {
    let stock = EconItem {
        def_index: 42,
        entity_index: -1,
        ..EconItem::default()
    };
    vec![
        PlayerEndData {
            steamid: ALICE_STEAMID,
            name: "alice".into(),
            team: TEAM_T as i32,
            items: vec![
                EconItem {
                    account_id: 1,
                    item_id: 30_007,
                    def_index: 7,
                    paint_index: 282,
                    paint_seed: 661,
                    custom_name: Some("redline".into()),
                    entity_index: -1,
                    ..EconItem::default()
                },
                stock.clone(),
            ],
        },
        PlayerEndData {
            steamid: BOB_STEAMID,
            name: "bob".into(),
            team: TEAM_CT as i32,
            items: vec![stock],
        },
    ]
}

pub fn file_header() -> FileHeader {
    FileHeader {
        demo_file_stamp: "PBDEMS2".into(),
        network_protocol: 14_000,
        server_name: "fixture".into(),
        client_name: "SourceTV".into(),
        map_name: "de_mirage".into(),
        game_directory: "csgo".into(),
        build_num: 9_999,
        ..FileHeader::default()
    }
}

pub fn server_info() -> ServerInfo {
    ServerInfo {
        max_clients: 10,
        max_classes: 16,
        tick_interval: 1.0 / 64.0,
        map_name: "de_mirage".into(),
    }
}

pub fn serializers() -> Vec<Serializer> {
    vec![
        Serializer::builder("CCSPlayerController")
            .field(FieldDecl::value("m_hPlayerPawn", FieldEncoding::VarUInt))
            .field(FieldDecl::value("m_iszPlayerName", FieldEncoding::String))
            .field(FieldDecl::value("m_steamID", FieldEncoding::Fixed64))
            .field(FieldDecl::value("m_iTeamNum", FieldEncoding::VarUInt))
            .build()
            .unwrap(),
        Serializer::builder("CCSPlayerPawn")
            .field(FieldDecl::value("m_iHealth", FieldEncoding::VarInt))
            .field(FieldDecl::value("m_vecOrigin", VEC3))
            .build()
            .unwrap(),
        Serializer::builder("CSmokeGrenadeProjectile")
            .field(FieldDecl::value("m_hThrower", FieldEncoding::VarUInt))
            .field(FieldDecl::value("m_vecOrigin", VEC3))
            .build()
            .unwrap(),
        Serializer::builder("CCSGameRulesProxy")
            .field(FieldDecl::value("m_totalRoundsPlayed", FieldEncoding::VarInt))
            .field(FieldDecl::value("m_bBombPlanted", FieldEncoding::Bool))
            .build()
            .unwrap(),
    ]
}

pub fn classes() -> Vec<ClassInfo> {
    vec![
        ClassInfo::new(CONTROLLER, "CCSPlayerController", "CCSPlayerController"),
        ClassInfo::new(PAWN, "CCSPlayerPawn", "CCSPlayerPawn"),
        ClassInfo::new(SMOKE, "CSmokeGrenadeProjectile", "CSmokeGrenadeProjectile"),
        ClassInfo::new(RULES, "CCSGameRulesProxy", "CCSGameRulesProxy"),
    ]
}

pub fn descriptors() -> Vec<EventDescriptor> {
    vec![
        EventDescriptor::new(PLAYER_DEATH, "player_death")
            .key("userid", EventKeyType::Short)
            .key("attacker", EventKeyType::Short)
            .key("weapon", EventKeyType::String)
            .key("headshot", EventKeyType::Bool),
        EventDescriptor::new(ROUND_END, "round_end")
            .key("winner", EventKeyType::Byte)
            .key("reason", EventKeyType::Byte),
        EventDescriptor::new(BOMB_PLANTED, "bomb_planted")
            .key("userid_pawn", EventKeyType::PlayerPawn)
            .key("site", EventKeyType::Short),
        EventDescriptor::new(ROUND_START, "round_start"),
        EventDescriptor::new(WEAPON_FIRE, "weapon_fire").key("userid", EventKeyType::Short),
        EventDescriptor::new(SMOKE_DETONATE, "smokegrenade_detonate")
            .key("entityid", EventKeyType::Short)
            .key("userid_pawn", EventKeyType::PlayerPawn)
            .key("x", EventKeyType::Float),
        EventDescriptor::new(PLAYER_JUMP, "player_jump")
            .key("userid", EventKeyType::Short)
            .key("userid_pawn", EventKeyType::PlayerPawn),
    ]
}

/// Preamble, header and schema frames.
pub fn schema_writer() -> DemoWriter {
    let mut writer = DemoWriter::new();
    writer.file_header(&file_header()).unwrap();
    writer.send_tables(serializers()).unwrap();
    writer.class_info(classes()).unwrap();
    writer
}

/// Schema frames plus the signon packet: server info, event list, player
/// table and the pawn baseline.
pub fn signon_writer() -> DemoWriter {
    let mut writer = schema_writer();
    let pawn_baseline = writer
        .baseline(PAWN, &[("m_iHealth", FieldValue::I32(100))])
        .unwrap();
    let users: Vec<Vec<u8>> = [
        UserInfo {
            steamid: ALICE_STEAMID,
            name: "alice".into(),
            userid: 11,
            is_hltv: false,
        },
        UserInfo {
            steamid: BOB_STEAMID,
            name: "bob".into(),
            userid: 12,
            is_hltv: false,
        },
        UserInfo {
            steamid: 0,
            name: "GOTV".into(),
            userid: 13,
            is_hltv: true,
        },
    ]
    .iter()
    .map(UserInfo::encode)
    .collect();
    writer
        .signon(0, |packet| {
            packet.server_info(&server_info())?;
            packet.convars(&CONVARS)?;
            packet.event_list(&descriptors())?;
            packet.create_string_table(
                USER_INFO_TABLE,
                64,
                UserDataLayout::Variable,
                &[
                    EntryWrite::new(0, "0", &users[0]),
                    EntryWrite::new(1, "1", &users[1]),
                    EntryWrite::new(4, "4", &users[2]),
                ],
            )?;
            packet.create_string_table(
                INSTANCE_BASELINE_TABLE,
                64,
                UserDataLayout::Variable,
                &[EntryWrite::new(0, "2", &pawn_baseline)],
            )?;
            Ok(())
        })
        .unwrap();
    writer
}

fn op_create(writer: &DemoWriter, id: u32, class_id: u32, named: &[(&str, FieldValue)]) -> EntityOp {
    EntityOp::Create {
        id: EntityId::new(id),
        class_id,
        serial: 1,
        fields: writer.fields(class_id, named).unwrap(),
    }
}

fn op_update(writer: &DemoWriter, id: u32, class_id: u32, named: &[(&str, FieldValue)]) -> EntityOp {
    EntityOp::Update {
        id: EntityId::new(id),
        class_id,
        fields: writer.fields(class_id, named).unwrap(),
    }
}

/// Creates both players and the game rules at tick 1.
pub fn spawn_players(writer: &mut DemoWriter) {
    let ops = vec![
        op_create(
            writer,
            ALICE_CONTROLLER,
            CONTROLLER,
            &[
                ("m_hPlayerPawn", FieldValue::U32(handle(ALICE_PAWN))),
                ("m_iszPlayerName", FieldValue::String("alice".into())),
                ("m_steamID", FieldValue::U64(ALICE_STEAMID)),
                ("m_iTeamNum", FieldValue::U32(TEAM_T)),
            ],
        ),
        op_create(
            writer,
            BOB_CONTROLLER,
            CONTROLLER,
            &[
                ("m_hPlayerPawn", FieldValue::U32(handle(BOB_PAWN))),
                ("m_iszPlayerName", FieldValue::String("bob".into())),
                ("m_steamID", FieldValue::U64(BOB_STEAMID)),
                ("m_iTeamNum", FieldValue::U32(TEAM_CT)),
            ],
        ),
        op_create(
            writer,
            ALICE_PAWN,
            PAWN,
            &[("m_vecOrigin", FieldValue::Vector3(alice_origin(0)))],
        ),
        op_create(
            writer,
            BOB_PAWN,
            PAWN,
            &[("m_vecOrigin", FieldValue::Vector3(BOB_ORIGIN))],
        ),
        op_create(
            writer,
            RULES_ENTITY,
            RULES,
            &[
                ("m_totalRoundsPlayed", FieldValue::I32(0)),
                ("m_bBombPlanted", FieldValue::Bool(false)),
            ],
        ),
    ];
    writer
        .packet(1, |packet| {
            packet.entities(&ops)?;
            Ok(())
        })
        .unwrap();
}

fn tick_ops(writer: &DemoWriter, tick: u32) -> Vec<EntityOp> {
    let mut pawn = vec![("m_vecOrigin", FieldValue::Vector3(alice_origin(tick)))];
    if tick == 3000 {
        pawn.push(("m_iHealth", FieldValue::I32(0)));
    }
    let mut ops = vec![op_update(writer, ALICE_PAWN, PAWN, &pawn)];
    match tick {
        4000 => ops.push(op_update(
            writer,
            RULES_ENTITY,
            RULES,
            &[("m_bBombPlanted", FieldValue::Bool(true))],
        )),
        5000 => ops.push(op_update(
            writer,
            RULES_ENTITY,
            RULES,
            &[("m_totalRoundsPlayed", FieldValue::I32(1))],
        )),
        _ => {}
    }
    let smoke_origin = FieldValue::Vector3([tick as f32, 0.0, 32.0]);
    match tick {
        2000 => ops.push(op_create(
            writer,
            SMOKE_ENTITY,
            SMOKE,
            &[
                ("m_hThrower", FieldValue::U32(handle(ALICE_PAWN))),
                ("m_vecOrigin", smoke_origin),
            ],
        )),
        2100 | 2200 => ops.push(op_update(
            writer,
            SMOKE_ENTITY,
            SMOKE,
            &[("m_vecOrigin", smoke_origin)],
        )),
        2300 => ops.push(EntityOp::Delete {
            id: EntityId::new(SMOKE_ENTITY),
        }),
        _ => {}
    }
    ops
}

/// Writes the packet of one scripted tick.
pub fn play_tick(writer: &mut DemoWriter, tick: u32) {
    let ops = tick_ops(writer, tick);
    writer
        .packet(tick, |packet| {
            packet.entities(&ops)?;
            match tick {
                100 | 2600 => {
                    packet.event(ROUND_START, &[])?;
                }
                1000 => {
                    packet.chat(&ChatMessage {
                        entity_id: ALICE_CONTROLLER,
                        chat_all: true,
                        text: "gl hf".into(),
                    })?;
                }
                1500 | 1600 => {
                    packet.voice(&VoicePacket {
                        xuid: ALICE_STEAMID,
                        format: VoiceFormat::Pcm16,
                        sequence: tick / 100,
                        payload: &VOICE_PAYLOAD,
                    })?;
                }
                2500 => {
                    packet.event(
                        ROUND_END,
                        &[
                            (EventKeyType::Byte, FieldValue::U32(TEAM_T)),
                            (EventKeyType::Byte, FieldValue::U32(9)),
                        ],
                    )?;
                    packet.item_drops(&[dropped_item()])?;
                }
                3000 => {
                    packet.event(
                        PLAYER_DEATH,
                        &[
                            (EventKeyType::Short, FieldValue::I32(0)),
                            (EventKeyType::Short, FieldValue::I32(1)),
                            (EventKeyType::String, FieldValue::String("ak47".into())),
                            (EventKeyType::Bool, FieldValue::Bool(true)),
                        ],
                    )?;
                }
                4000 => {
                    packet.event(
                        BOMB_PLANTED,
                        &[
                            (EventKeyType::PlayerPawn, FieldValue::I32(handle(BOB_PAWN) as i32)),
                            (EventKeyType::Short, FieldValue::I32(1)),
                        ],
                    )?;
                }
                5000 => {
                    packet.event(
                        ROUND_END,
                        &[
                            (EventKeyType::Byte, FieldValue::U32(TEAM_CT)),
                            (EventKeyType::Byte, FieldValue::U32(8)),
                        ],
                    )?;
                }
                LAST_TICK => {
                    packet.end_of_match(&end_of_match())?;
                }
                _ => {}
            }
            Ok(())
        })
        .unwrap();
}

/// The whole match, without the closing frames.
pub fn match_writer() -> DemoWriter {
    let mut writer = signon_writer();
    spawn_players(&mut writer);
    for tick in ticks() {
        play_tick(&mut writer, tick);
    }
    writer
}

/// The finished match recording, built once per test binary.
pub fn recording() -> &'static [u8] {
    static RECORDING: OnceLock<Vec<u8>> = OnceLock::new();
    RECORDING.get_or_init(|| match_writer().finish().unwrap())
}
