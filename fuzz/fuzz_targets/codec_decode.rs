#![no_main]

use libfuzzer_sys::fuzz_target;
use tidal_codec::{decode, decode_all, encode, DecodeOptions};

fuzz_target!(|data: &[u8]| {
    if let Ok(value) = decode(data) {
        let _ = encode(&value);
    }
    let _ = decode_all(data, &DecodeOptions::default());
    let _ = tidal_core::decode_value(data);
});
