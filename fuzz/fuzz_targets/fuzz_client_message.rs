#![no_main]

use libfuzzer_sys::fuzz_target;
use poker_room_client::protocol::ClientMessage;

fuzz_target!(|data: &[u8]| {
    if let Ok(msg) = serde_json::from_slice::<ClientMessage>(data) {
        // Anything we accept must encode again.
        let _ = serde_json::to_string(&msg);
    }
});
