#![no_main]

use harmoniq_tempo::fuzz_apply_edits;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    fuzz_apply_edits(data);
});
