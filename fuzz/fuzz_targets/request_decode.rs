//! Fuzz target for request and response decoding
//!
//! Frames arrive from untrusted clients. Decoding arbitrary bytes must never
//! panic, whatever the length prefix claims. Anything that decodes must
//! encode again.

#![no_main]

use hybridchat_proto::{codec, Request, Response};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(request) = codec::decode::<Request>(data) {
        assert!(codec::to_frame(&request).is_ok());
    }

    // Bare JSON bodies exercise the content shape resolution directly
    if let Ok(request) = codec::decode_body::<Request>(data) {
        assert!(codec::to_frame(&request).is_ok());
    }

    let _ = codec::decode_body::<Response>(data);
});
