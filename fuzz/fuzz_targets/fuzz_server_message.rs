#![no_main]

use libfuzzer_sys::fuzz_target;
use poker_room_client::protocol::ServerMessage;
use poker_room_client::RoomEvent;

fuzz_target!(|data: &[u8]| {
    // Byte path: includes serde_json's own UTF-8 validation.
    let _ = serde_json::from_slice::<ServerMessage>(data);

    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(msg) = serde_json::from_str::<ServerMessage>(s) {
            let _ = RoomEvent::from(msg);
        }
    }
});
