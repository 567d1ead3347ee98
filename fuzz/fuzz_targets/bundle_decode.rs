//! Fuzz target for wire bundle decoding
//!
//! A bundle is chosen by the sender, so the receiving client must classify
//! and decode any string without panicking. Failures are always
//! `Decryption`.

#![no_main]

use hybridchat_client::bundle;
use hybridchat_proto::BundleWire;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|text: String| {
    let wire = BundleWire::Legacy(text);
    if let Ok(decoded) = bundle::decode(&wire) {
        // A decodable bundle re-encodes to something that decodes the same
        assert_eq!(bundle::decode(&bundle::encode(&decoded)).ok(), Some(decoded));
    }
});
