//! Players, grenades, voice and damaged recordings.

mod common;

use common::*;
use demodec::codec::{FieldValue, Tick, VoiceFormat};
use demodec::wire::{FrameKind, Frames, Limits, MessageTag};
use demodec::{
    list_game_events, parse_event, parse_events, parse_grenades, parse_header,
    parse_item_drops, parse_player_info, parse_skins, parse_voice, Demo, DemoError, Dispatcher,
    ParseOptions, Selection,
};
use proptest::prelude::*;

#[test]
fn roster_merges_controllers_and_userinfo() {
    let roster = parse_player_info(recording()).unwrap();
    assert_eq!(roster.len(), 3);

    let alice = roster.by_slot(0).unwrap();
    assert_eq!(alice.entity_id, Some(ALICE_CONTROLLER));
    assert_eq!(alice.name.as_deref(), Some("alice"));
    assert_eq!(alice.steamid, Some(ALICE_STEAMID));
    assert_eq!(alice.userid, Some(11));
    assert_eq!(alice.team, Some(i64::from(TEAM_T)));
    assert!(!alice.is_hltv);

    let bob = roster.by_steamid(BOB_STEAMID).unwrap();
    assert_eq!(bob.slot, 1);
    assert_eq!(bob.team, Some(i64::from(TEAM_CT)));

    let gotv = roster.by_slot(4).unwrap();
    assert_eq!(gotv.entity_id, None);
    assert_eq!(gotv.name.as_deref(), Some("GOTV"));
    assert!(gotv.is_hltv);

    let slots: Vec<u32> = roster.iter().map(|player| player.slot).collect();
    assert_eq!(slots, [0, 1, 4]);
}

#[test]
fn grenades_are_tracked_until_removed() {
    let rows = parse_grenades(recording()).unwrap();
    let ticks: Vec<u32> = rows.iter().map(|row| row.tick).collect();
    assert_eq!(ticks, [2000, 2100, 2200]);
    for row in &rows {
        assert_eq!(row.entity_id, SMOKE_ENTITY);
        assert_eq!(row.grenade_type, "CSmokeGrenadeProjectile");
        assert_eq!(row.x, Some(row.tick as f32));
        assert_eq!(row.z, Some(32.0));
        assert_eq!(row.thrower_name.as_deref(), Some("alice"));
        assert_eq!(row.thrower_steamid, Some(ALICE_STEAMID));
    }
}

#[test]
fn voice_is_grouped_by_speaker() {
    let tracks = parse_voice(recording()).unwrap();
    assert_eq!(tracks.len(), 1);
    let track = &tracks[&ALICE_STEAMID];
    assert_eq!(track.format, VoiceFormat::Pcm16);
    assert_eq!(track.packets, 2);
    assert_eq!(track.samples, [1, 2, 1, 2]);
    assert!(track.raw.is_empty());
    assert_eq!(track.first_tick, Tick::new(1500));
    assert_eq!(track.last_tick, Tick::new(1600));
}

#[test]
fn item_drops_are_listed_in_stream_order() {
    let drops = parse_item_drops(recording()).unwrap();
    assert_eq!(drops, vec![dropped_item()]);
    assert_eq!(drops[0].steamid, None);
}

#[test]
fn skins_skip_stock_items_and_name_the_owner() {
    let skins = parse_skins(recording()).unwrap();
    assert_eq!(skins.len(), 1);
    let rifle = &skins[0];
    assert_eq!(rifle.steamid, Some(ALICE_STEAMID));
    assert_eq!(rifle.item_id, 30_007);
    assert_eq!(rifle.paint_index, 282);
    assert_eq!(rifle.custom_name.as_deref(), Some("redline"));

    let json = serde_json::to_value(rifle).unwrap();
    assert_eq!(json["steamid"], ALICE_STEAMID);
    assert_eq!(json["def_index"], 7);
}

#[test]
fn header_stops_before_match_convars() {
    let mut writer = signon_writer();
    writer
        .packet(200, |packet| {
            packet.convars(&[("mp_maxrounds", "30")])?;
            Ok(())
        })
        .unwrap();
    let bytes = writer.finish().unwrap();

    let header = parse_header(&bytes).unwrap();
    assert_eq!(header.convars.get("mp_maxrounds").map(String::as_str), Some("24"));
    let summary = Demo::new(&bytes).inspect().unwrap();
    assert_eq!(summary.convars.get("mp_maxrounds").map(String::as_str), Some("30"));
}

#[test]
fn compressed_recording_decodes_the_same() {
    let plain = recording();
    let mut writer = signon_writer().compressed(true);
    spawn_players(&mut writer);
    for tick in ticks() {
        play_tick(&mut writer, tick);
    }
    let compressed = writer.finish().unwrap();
    let all = || Selection::All;
    assert_eq!(
        parse_events(&compressed, all(), all(), Selection::none()).unwrap(),
        parse_events(plain, all(), all(), Selection::none()).unwrap()
    );
}

#[test]
fn bad_magic_is_rejected() {
    let mut bytes = recording().to_vec();
    bytes[0] = b'X';
    assert!(matches!(
        parse_header(&bytes),
        Err(DemoError::InvalidMagic { .. })
    ));
}

#[test]
fn unsupported_version_is_rejected_before_any_frame() {
    let mut bytes = recording().to_vec();
    bytes[8..12].copy_from_slice(&99u32.to_le_bytes());
    assert_eq!(
        list_game_events(&bytes).unwrap_err(),
        DemoError::UnsupportedVersion { found: 99 }
    );
}

/// Cuts the recording inside the payload of the packet at `tick`.
fn cut_inside_packet(tick: u32) -> Vec<u8> {
    let bytes = recording();
    let frame = Frames::new(bytes, &Limits::default())
        .unwrap()
        .map(Result::unwrap)
        .find(|frame| frame.kind == FrameKind::Packet && frame.tick == tick)
        .unwrap();
    bytes[..frame.offset + 6].to_vec()
}

#[test]
fn truncation_is_fatal() {
    let bytes = cut_inside_packet(3000);
    let err = parse_events(&bytes, Selection::All, Selection::none(), Selection::none())
        .unwrap_err();
    assert!(err.is_truncation(), "{err}");
}

#[test]
fn rows_before_truncation_are_delivered() {
    let bytes = cut_inside_packet(3000);
    let mut projection = Demo::new(&bytes)
        .project(demodec::ProjectionRequest::new().events(Selection::only(["round_end"])))
        .unwrap();
    let first = projection.next().unwrap().unwrap();
    assert_eq!(first.tick(), 2500);
    assert!(projection.next().unwrap().unwrap_err().is_truncation());
    assert!(projection.next().is_none());
}

#[test]
fn unknown_frames_are_skipped_unless_strict() {
    let mut writer = signon_writer();
    writer.raw_frame(FrameKind::Unknown(42), 5, b"future").unwrap();
    spawn_players(&mut writer);
    play_tick(&mut writer, 100);
    let bytes = writer.finish().unwrap();

    let rows = parse_event(&bytes, "round_start", Selection::none(), Selection::none()).unwrap();
    assert_eq!(rows.len(), 1);
    let summary = Demo::new(&bytes).inspect().unwrap();
    assert_eq!(summary.skipped_frames, 1);

    let strict = ParseOptions::default().strict(true);
    let err = Demo::with_options(&bytes, &strict).inspect().unwrap_err();
    assert_eq!(
        err,
        DemoError::UnknownFrameType {
            command: 42,
            offset: err_offset(&bytes)
        }
    );
}

fn err_offset(bytes: &[u8]) -> usize {
    Frames::new(bytes, &Limits::default())
        .unwrap()
        .map(Result::unwrap)
        .find(|frame| frame.kind == FrameKind::Unknown(42))
        .unwrap()
        .offset
}

#[test]
fn corrupt_event_is_dropped_and_counted() {
    let mut writer = signon_writer();
    spawn_players(&mut writer);
    writer
        .packet(100, |packet| {
            // Declared id, then a key tag that does not exist.
            packet.message(MessageTag::GameEvent, &[ROUND_END as u8, 0xEE])?;
            packet.event(ROUND_START, &[])?;
            Ok(())
        })
        .unwrap();
    let bytes = writer.finish().unwrap();

    let rows = parse_events(&bytes, Selection::All, Selection::none(), Selection::none()).unwrap();
    let names: Vec<&str> = rows.iter().map(|row| row.name.as_str()).collect();
    assert_eq!(names, ["round_start"]);
    assert_eq!(Demo::new(&bytes).inspect().unwrap().dropped_messages, 1);

    let strict = ParseOptions::default().strict(true);
    assert!(Demo::with_options(&bytes, &strict).inspect().is_err());
}

#[test]
fn unknown_messages_are_ignored() {
    let mut writer = signon_writer();
    spawn_players(&mut writer);
    writer
        .packet(100, |packet| {
            packet.message(MessageTag::Unknown(200), b"opaque")?;
            packet.event(ROUND_START, &[])?;
            Ok(())
        })
        .unwrap();
    let bytes = writer.finish().unwrap();
    let strict = ParseOptions::default().strict(true);
    let summary = Demo::with_options(&bytes, &strict).inspect().unwrap();
    assert_eq!(summary.unknown_messages, 1);
    assert_eq!(summary.events, 1);
}

#[test]
fn entity_gap_hides_players() {
    // Bob's controller is deleted at 200 and recreated at 300 under the
    // same id; snapshots at 200 report alice alone.
    let mut writer = signon_writer();
    spawn_players(&mut writer);
    play_tick(&mut writer, 100);
    writer
        .packet(200, |packet| {
            packet.entities(&[demodec::codec::EntityOp::Delete {
                id: demodec::codec::EntityId::new(BOB_CONTROLLER),
            }])?;
            Ok(())
        })
        .unwrap();
    let fields = writer
        .fields(
            CONTROLLER,
            &[
                ("m_iszPlayerName", FieldValue::String("bob".into())),
                ("m_steamID", FieldValue::U64(BOB_STEAMID)),
            ],
        )
        .unwrap();
    writer
        .packet(300, |packet| {
            packet.entities(&[demodec::codec::EntityOp::Create {
                id: demodec::codec::EntityId::new(BOB_CONTROLLER),
                class_id: CONTROLLER,
                serial: 2,
                fields,
            }])?;
            Ok(())
        })
        .unwrap();
    let bytes = writer.finish().unwrap();

    let demodec::TickOutput::Rows(rows) = demodec::parse_ticks(
        &bytes,
        Selection::only(["m_iTeamNum"]),
        Selection::only([100u32, 200, 300]),
        Selection::All,
        false,
    )
    .unwrap() else {
        panic!("asked for rows");
    };
    let per_tick: Vec<(u32, u32)> = rows.iter().map(|row| (row.tick, row.entity_id)).collect();
    assert_eq!(
        per_tick,
        [(100, 1), (100, 2), (200, 1), (300, 1), (300, 2)]
    );
    // The recreated controller starts without the team it had before.
    let bob = rows.iter().find(|row| row.tick == 300 && row.entity_id == 2).unwrap();
    assert_eq!(bob.fields.get("m_iTeamNum"), Some(&None));
}

#[test]
fn dispatcher_runs_files_independently() {
    let dir = std::env::temp_dir().join(format!("demodec-dispatch-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let good = dir.join("match.dem");
    std::fs::write(&good, recording()).unwrap();
    let missing = dir.join("missing.dem");

    let dispatcher = Dispatcher::new(2).unwrap();
    let results = dispatcher.run(&[good.clone(), missing, good], |_, bytes| {
        list_game_events(bytes)
    });
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].as_ref().unwrap().len(), 5);
    assert!(matches!(results[1], Err(DemoError::Io { .. })));
    assert_eq!(results[0], results[2]);
    std::fs::remove_dir_all(&dir).unwrap();
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn garbage_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
        let _ = parse_header(&bytes);
        let _ = parse_events(&bytes, Selection::All, Selection::All, Selection::All);
        let _ = parse_player_info(&bytes);
    }

    #[test]
    fn damaged_recording_never_panics(
        cut in 16usize..4096,
        flips in prop::collection::vec((16usize..4096, any::<u8>()), 0..8),
    ) {
        let mut bytes = recording().to_vec();
        for (at, value) in flips {
            if let Some(byte) = bytes.get_mut(at) {
                *byte ^= value;
            }
        }
        bytes.truncate(cut.min(bytes.len()));
        let _ = parse_events(&bytes, Selection::All, Selection::All, Selection::All);
        let _ = parse_grenades(&bytes);
        let _ = parse_voice(&bytes);
    }
}
