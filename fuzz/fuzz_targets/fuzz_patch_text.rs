//! Fuzzes the text patch parser and applier.
//!
//! Run with:
//!   cargo +nightly fuzz run fuzz_patch_text
#![no_main]
use libfuzzer_sys::fuzz_target;
use lora_ota_update::text_patch;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    // Split the input into a patch and the text it is applied to.
    let (patch, target) = text.split_once('\0').unwrap_or((text, ""));
    if let Ok(hunks) = text_patch::parse(patch) {
        let (_patched, results) = text_patch::apply(&hunks, target);
        assert_eq!(results.len(), hunks.len());
    }
});
