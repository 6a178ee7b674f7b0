//! Criterion benchmarks over a synthetic ten-player recording.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use demodec::codec::{
    EntityId, EntityOp, EventDescriptor, EventKeyType, FieldValue, FileHeader, ServerInfo,
};
use demodec::schema::{ClassInfo, FieldDecl, FieldEncoding, FloatEncoding, Serializer};
use demodec::writer::DemoWriter;
use demodec::{parse_events, parse_ticks, Demo, Selection};

const PLAYERS: u32 = 10;
const TICKS: u32 = 4096;
const CONTROLLER: u32 = 1;
const PAWN: u32 = 2;
const PLAYER_HURT: u32 = 1;

fn pawn_id(slot: u32) -> u32 {
    64 + slot
}

/// Every pawn moves every tick; every 32nd tick somebody gets hurt.
fn recording(compress: bool) -> Vec<u8> {
    let mut writer = DemoWriter::new().compressed(compress);
    writer.file_header(&FileHeader::default()).unwrap();
    writer
        .send_tables(vec![
            Serializer::builder("CCSPlayerController")
                .field(FieldDecl::value("m_hPlayerPawn", FieldEncoding::VarUInt))
                .field(FieldDecl::value("m_iszPlayerName", FieldEncoding::String))
                .field(FieldDecl::value("m_steamID", FieldEncoding::Fixed64))
                .build()
                .unwrap(),
            Serializer::builder("CCSPlayerPawn")
                .field(FieldDecl::value("m_iHealth", FieldEncoding::VarInt))
                .field(FieldDecl::value(
                    "m_vecOrigin",
                    FieldEncoding::Vector {
                        dims: 3,
                        element: FloatEncoding::NoScale,
                    },
                ))
                .field(FieldDecl::value("m_angEyeAngles", FieldEncoding::Coord))
                .build()
                .unwrap(),
        ])
        .unwrap();
    writer
        .class_info(vec![
            ClassInfo::new(CONTROLLER, "CCSPlayerController", "CCSPlayerController"),
            ClassInfo::new(PAWN, "CCSPlayerPawn", "CCSPlayerPawn"),
        ])
        .unwrap();
    writer
        .signon(0, |packet| {
            packet.server_info(&ServerInfo {
                max_clients: PLAYERS,
                max_classes: 8,
                tick_interval: 1.0 / 64.0,
                map_name: "de_inferno".into(),
            })?;
            packet.event_list(&[EventDescriptor::new(PLAYER_HURT, "player_hurt")
                .key("userid", EventKeyType::Short)
                .key("attacker", EventKeyType::Short)
                .key("dmg_health", EventKeyType::Short)])?;
            Ok(())
        })
        .unwrap();

    let mut ops = Vec::new();
    for slot in 0..PLAYERS {
        ops.push(EntityOp::Create {
            id: EntityId::from_player_slot(slot),
            class_id: CONTROLLER,
            serial: 1,
            fields: writer
                .fields(
                    CONTROLLER,
                    &[
                        ("m_hPlayerPawn", FieldValue::U32(pawn_id(slot))),
                        ("m_iszPlayerName", FieldValue::String(format!("player{slot}"))),
                        ("m_steamID", FieldValue::U64(76_561_198_000_000_000 + u64::from(slot))),
                    ],
                )
                .unwrap(),
        });
    }
    for slot in 0..PLAYERS {
        ops.push(EntityOp::Create {
            id: EntityId::new(pawn_id(slot)),
            class_id: PAWN,
            serial: 1,
            fields: writer
                .fields(PAWN, &[("m_iHealth", FieldValue::I32(100))])
                .unwrap(),
        });
    }
    writer
        .packet(1, |packet| {
            packet.entities(&ops)?;
            Ok(())
        })
        .unwrap();

    for tick in 2..TICKS {
        let ops: Vec<EntityOp> = (0..PLAYERS)
            .map(|slot| {
                let t = tick as f32;
                let s = slot as f32;
                EntityOp::Update {
                    id: EntityId::new(pawn_id(slot)),
                    class_id: PAWN,
                    fields: writer
                        .fields(
                            PAWN,
                            &[
                                ("m_vecOrigin", FieldValue::Vector3([t + s, t - s, 0.0])),
                                ("m_angEyeAngles", FieldValue::F32((t * 0.5) % 360.0)),
                            ],
                        )
                        .unwrap(),
                }
            })
            .collect();
        writer
            .packet(tick, |packet| {
                packet.entities(&ops)?;
                if tick % 32 == 0 {
                    let victim = (tick / 32) % PLAYERS;
                    packet.event(
                        PLAYER_HURT,
                        &[
                            (EventKeyType::Short, FieldValue::I32(victim as i32)),
                            (EventKeyType::Short, FieldValue::I32(((victim + 1) % PLAYERS) as i32)),
                            (EventKeyType::Short, FieldValue::I32(27)),
                        ],
                    )?;
                }
                Ok(())
            })
            .unwrap();
    }
    writer.finish().unwrap()
}

fn bench_full_pass(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_pass");
    for compress in [false, true] {
        let bytes = recording(compress);
        group.throughput(Throughput::Bytes(bytes.len() as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(if compress { "snappy" } else { "plain" }),
            &bytes,
            |b, bytes| {
                b.iter(|| {
                    let summary = Demo::new(bytes).inspect().unwrap();
                    std::hint::black_box(summary);
                });
            },
        );
    }
    group.finish();
}

fn bench_events(c: &mut Criterion) {
    let bytes = recording(false);
    c.bench_function("events_with_enrichment", |b| {
        b.iter(|| {
            let rows = parse_events(
                &bytes,
                Selection::only(["player_hurt"]),
                Selection::only(["X", "Y", "m_iHealth"]),
                Selection::none(),
            )
            .unwrap();
            std::hint::black_box(rows);
        });
    });
}

fn bench_ticks(c: &mut Criterion) {
    let bytes = recording(false);
    let mut group = c.benchmark_group("ticks");
    for (label, ticks) in [
        ("every_tick", Selection::All),
        ("every_64th", Selection::only((0..TICKS).step_by(64))),
    ] {
        group.bench_with_input(BenchmarkId::from_parameter(label), &ticks, |b, ticks| {
            b.iter(|| {
                let out = parse_ticks(
                    &bytes,
                    Selection::only(["X", "Y", "Z", "m_iHealth"]),
                    ticks.clone(),
                    Selection::All,
                    true,
                )
                .unwrap();
                std::hint::black_box(out);
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_full_pass, bench_events, bench_ticks);
criterion_main!(benches);
