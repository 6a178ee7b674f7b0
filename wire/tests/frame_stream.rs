use proptest::prelude::*;
use wire::{encode_frame, encode_preamble, FrameKind, Frames, Limits, Preamble, WireResult};

fn kind_strategy() -> impl Strategy<Value = FrameKind> {
    prop_oneof![
        Just(FrameKind::FileHeader),
        Just(FrameKind::SendTables),
        Just(FrameKind::ClassInfo),
        Just(FrameKind::Packet),
        Just(FrameKind::SignonPacket),
        Just(FrameKind::FullPacket),
        Just(FrameKind::SyncTick),
        (20u32..60).prop_map(FrameKind::from_command),
    ]
}

proptest! {
    #[test]
    fn prop_frames_roundtrip(
        frames in prop::collection::vec(
            (kind_strategy(), any::<u32>(), prop::collection::vec(any::<u8>(), 0..64), any::<bool>()),
            0..16,
        )
    ) {
        let mut file = Vec::new();
        encode_preamble(&Preamble::new(0), &mut file);
        for (kind, tick, payload, compress) in &frames {
            encode_frame(&mut file, *kind, *tick, payload, *compress).unwrap();
        }

        let decoded: Vec<_> = Frames::new(&file, &Limits::for_testing())
            .unwrap()
            .collect::<WireResult<_>>()
            .unwrap();
        prop_assert_eq!(decoded.len(), frames.len());
        for (frame, (kind, tick, payload, compress)) in decoded.iter().zip(&frames) {
            prop_assert_eq!(frame.kind, *kind);
            prop_assert_eq!(frame.tick, *tick);
            prop_assert_eq!(frame.compressed, *compress);
            prop_assert_eq!(frame.payload.as_ref(), payload.as_slice());
        }
    }

    #[test]
    fn prop_garbage_never_panics(data in prop::collection::vec(any::<u8>(), 0..256)) {
        let mut file = Vec::new();
        encode_preamble(&Preamble::new(0), &mut file);
        file.extend_from_slice(&data);
        let frames = Frames::new(&file, &Limits::for_testing()).unwrap();
        // Bounded: every yielded item either consumed bytes or ended iteration.
        prop_assert!(frames.take(data.len() + 1).count() <= data.len() + 1);
    }
}

#[test]
fn stop_frame_hides_trailing_bytes() {
    let mut file = Vec::new();
    encode_preamble(&Preamble::new(0), &mut file);
    encode_frame(&mut file, FrameKind::Stop, 10, &[], false).unwrap();
    file.extend_from_slice(&[0xFF; 12]);

    let kinds: Vec<_> = Frames::new(&file, &Limits::for_testing())
        .unwrap()
        .map(|frame| frame.map(|frame| frame.kind))
        .collect::<WireResult<_>>()
        .unwrap();
    assert_eq!(kinds, vec![FrameKind::Stop]);
}
