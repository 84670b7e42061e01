//! Fuzzes MANIFEST body parsing.
//!
//! Run with:
//!   cargo +nightly fuzz run fuzz_manifest
#![no_main]
use libfuzzer_sys::fuzz_target;
use lora_ota_protocol::ManifestCounters;

fuzz_target!(|data: &[u8]| {
    if let Ok(body) = std::str::from_utf8(data) {
        let _parsed = ManifestCounters::parse(body);
    }
});
