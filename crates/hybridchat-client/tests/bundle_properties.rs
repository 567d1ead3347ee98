//! Property tests for wire bundle decoding
//!
//! Bundles arrive from other clients through the server, so every string a
//! peer can produce must decode or fail with `Decryption`, never panic.

use hybridchat_client::bundle;
use hybridchat_crypto::{CipherBundle, CryptoError, NONCE_SIZE};
use hybridchat_proto::{BundleWire, HybridBundle};
use proptest::prelude::*;

proptest! {
    #[test]
    fn prop_legacy_strings_never_panic(text in ".*") {
        match bundle::decode(&BundleWire::Legacy(text)) {
            Ok(_) | Err(CryptoError::Decryption { .. }) => {},
            Err(other) => prop_assert!(false, "unexpected error: {other}"),
        }
    }

    #[test]
    fn prop_json_looking_strings_are_never_direct(tail in ".*") {
        let wire = BundleWire::Legacy(format!("{{{tail}"));
        let direct = matches!(bundle::decode(&wire), Ok(CipherBundle::Direct { .. }));
        prop_assert!(!direct, "JSON-looking legacy string decoded as direct");
    }

    #[test]
    fn prop_hybrid_fields_never_panic(
        encrypted_message in ".*",
        encrypted_key in ".*",
        iv in ".*",
    ) {
        let wire = BundleWire::Hybrid(HybridBundle { encrypted_message, encrypted_key, iv });
        match bundle::decode(&wire) {
            Ok(CipherBundle::Hybrid { nonce, .. }) => prop_assert_eq!(nonce.len(), NONCE_SIZE),
            Ok(CipherBundle::Direct { .. }) => prop_assert!(false, "hybrid decoded as direct"),
            Err(e) => {
                let decryption = matches!(e, CryptoError::Decryption { .. });
                prop_assert!(decryption, "unexpected error: {}", e);
            },
        }
    }
}
