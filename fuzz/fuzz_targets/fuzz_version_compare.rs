//! Fuzzes version parsing and ordering.
//!
//! Run with:
//!   cargo +nightly fuzz run fuzz_version_compare
#![no_main]
use libfuzzer_sys::fuzz_target;
use lora_ota_versioning::compare;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let (a, b) = text.split_once(' ').unwrap_or((text, text));
    if let (Ok(forward), Ok(backward)) = (compare(a, b), compare(b, a)) {
        assert_eq!(forward, backward.reverse());
    }
});
