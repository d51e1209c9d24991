#![no_main]

use libfuzzer_sys::fuzz_target;
use poker_room_client::protocol::ServerMessage;
use poker_room_client::{reduce, render, RoomEvent, RoomMirror};

// Feed newline-separated server frames through the reducer. Any sequence must
// either reduce or be rejected, and every accepted mirror must render.
fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let mut mirror = RoomMirror::new("FUZZ", "alice");
    if let Ok(step) = reduce(&mirror, &RoomEvent::Connected) {
        mirror = step.mirror;
    }
    for line in text.lines() {
        let Ok(msg) = serde_json::from_str::<ServerMessage>(line) else {
            continue;
        };
        if let Ok(step) = reduce(&mirror, &RoomEvent::from(msg)) {
            mirror = step.mirror;
            let _ = render(&mirror);
        }
    }
});
