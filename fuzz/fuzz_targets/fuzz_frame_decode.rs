//! Fuzzes the `$OTA` frame decoder.
//!
//! Run with:
//!   cargo +nightly fuzz run fuzz_frame_decode
#![no_main]
use libfuzzer_sys::fuzz_target;
use lora_ota_protocol::Message;

fuzz_target!(|data: &[u8]| {
    // Must never panic on arbitrary bytes; errors are expected, panics are not.
    if let Ok(message) = Message::decode(data) {
        let _summary = message.summary();
        let _frame = message.encode();
    }
});
