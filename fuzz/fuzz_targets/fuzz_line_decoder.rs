//! Fuzz target: `LineDecoder::feed` + `parse_line`
//!
//! Drives arbitrary byte sequences through the streaming line decoder and
//! the wire grammar, asserting that neither panics, that no emitted line
//! exceeds `MAX_LINE_LEN`, and that every accepted reading is finite.
//!
//! cargo fuzz run fuzz_line_decoder

#![no_main]

use comfortlink::link::codec::MAX_LINE_LEN;
use comfortlink::link::{Inbound, LineDecoder, parse_line};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut decoder = LineDecoder::new();

    decoder.feed(data, |line| {
        let Ok(line) = line else { return };
        assert!(line.len() <= MAX_LINE_LEN, "line exceeds MAX_LINE_LEN");
        match parse_line(line) {
            Ok(Inbound::Telemetry {
                temperature,
                humidity,
            })
            | Ok(Inbound::Feedback {
                temperature, humidity, ..
            }) => {
                assert!(temperature.is_finite() && humidity.is_finite());
            }
            Ok(Inbound::Notice { .. }) | Err(_) => {}
        }
    });
    assert!(decoder.pending() <= data.len());

    // After a reset the decoder must accept bytes cleanly again.
    decoder.reset();
    assert_eq!(decoder.pending(), 0);
    decoder.feed(data, |_| {});
});
