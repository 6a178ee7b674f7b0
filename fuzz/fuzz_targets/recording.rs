#![no_main]

use demodec::{Demo, ParseOptions, ProjectionRequest, Selection};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let options = ParseOptions::for_testing();
    let demo = Demo::with_options(data, &options);
    let _ = demo.header();

    let request = ProjectionRequest::new()
        .events(Selection::All)
        .player_fields(Selection::All)
        .other_fields(Selection::All)
        .ticks(Selection::All)
        .tick_fields(Selection::All)
        .grenades(true);
    if let Ok(projection) = demo.project(request) {
        for row in projection.take(10_000) {
            if row.is_err() {
                break;
            }
        }
    }
});
