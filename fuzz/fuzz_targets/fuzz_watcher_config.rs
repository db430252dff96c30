#![no_main]

use dashrelay_core::WatcherConfig;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(config) = WatcherConfig::from_json(text) {
        assert!(!config.target_element_id.trim().is_empty());
        assert!(!config.target_origin.trim().is_empty());
    }
});
