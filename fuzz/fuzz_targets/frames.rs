#![no_main]

use codec::{CodecLimits, EventDecoder, StringTables, Tick};
use libfuzzer_sys::fuzz_target;
use wire::{Frames, Limits, Messages, MessageTag};

fuzz_target!(|data: &[u8]| {
    let limits = Limits::for_testing();
    let codec_limits = CodecLimits::for_testing();
    let mut tables = StringTables::new();
    let mut events = EventDecoder::new();

    // Frame bodies are read without a preamble, starting at offset 0.
    let Ok(frames) = Frames::starting_at(data, 0, &limits) else {
        return;
    };
    for frame in frames.take(256) {
        let Ok(frame) = frame else {
            break;
        };
        if !frame.kind.carries_messages() {
            continue;
        }
        for message in Messages::new(&frame.payload, &limits).take(256) {
            let Ok(message) = message else {
                break;
            };
            match message.tag {
                MessageTag::CreateStringTable => {
                    let _ = tables.create(message.body, &codec_limits);
                }
                MessageTag::UpdateStringTable => {
                    let _ = tables.update(message.body, &codec_limits);
                }
                MessageTag::GameEventList => {
                    let _ = events.load_list(message.body, &codec_limits);
                }
                MessageTag::GameEvent => {
                    let _ = events.decode(message.body, Tick::new(frame.tick), &codec_limits);
                }
                MessageTag::SetConVar => {
                    let _ = codec::decode_convars(message.body, &codec_limits);
                }
                MessageTag::ItemDrops => {
                    let _ = codec::decode_item_drops(message.body, &codec_limits);
                }
                MessageTag::EndOfMatch => {
                    let _ = codec::decode_end_of_match(message.body, &codec_limits);
                }
                _ => {}
            }
        }
    }
});
