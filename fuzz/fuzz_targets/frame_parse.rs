#![no_main]

use libfuzzer_sys::fuzz_target;
use tidal_client::Frame;

fuzz_target!(|data: &[u8]| {
    if let Ok(value) = tidal_core::decode_value(data) {
        let _ = Frame::parse(value);
    }
});
