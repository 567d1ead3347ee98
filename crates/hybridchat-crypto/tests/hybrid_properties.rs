//! Property-based tests for hybrid encryption and fan-out
//!
//! These tests verify the core invariants of the encryption scheme:
//!
//! 1. **Round-trip**: every addressed recipient decrypts the original plaintext
//! 2. **Tamper detection**: any flipped bit in the body fails with `Integrity`
//! 3. **Size boundary**: direct mode accepts 190 bytes and rejects 191
//! 4. **Legacy compatibility**: direct-mode ciphertexts still decrypt
//! 5. **Partial resilience**: a malformed recipient key never blocks the rest

use std::sync::LazyLock;

use hybridchat_crypto::{
    CipherBundle, CryptoError, DIRECT_MAX_PLAINTEXT, EncodedPublicKey, KeyPair, decrypt,
    decrypt_own, encrypt_for_recipients, encrypt_hybrid,
};
use proptest::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

// RSA key generation is slow; share a handful of keys across all cases
static ALICE: LazyLock<KeyPair> = LazyLock::new(|| key_pair(0xA11CE));
static BOB: LazyLock<KeyPair> = LazyLock::new(|| key_pair(0xB0B));
static CAROL: LazyLock<KeyPair> = LazyLock::new(|| key_pair(0xCA201));

fn key_pair(seed: u64) -> KeyPair {
    KeyPair::generate(&mut ChaCha20Rng::seed_from_u64(seed)).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_fanout_roundtrip(
        plaintext in prop::collection::vec(any::<u8>(), 0..4096),
        seed in any::<u64>(),
    ) {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let (alice, bob, carol) =
            (ALICE.export_public(), BOB.export_public(), CAROL.export_public());
        let recipients = [("alice", &alice), ("bob", &bob), ("carol", &carol)];

        let fanout = encrypt_for_recipients(&plaintext, recipients, &mut rng).unwrap();
        prop_assert_eq!(fanout.bundles().len(), 3);
        prop_assert!(fanout.omitted().is_empty());

        for (name, key_pair) in [("alice", &*ALICE), ("bob", &*BOB), ("carol", &*CAROL)] {
            let decrypted = decrypt_own(&fanout.bundles()[name], key_pair).unwrap();
            prop_assert_eq!(&decrypted, &plaintext);
        }
    }

    #[test]
    fn prop_flipped_body_bit_fails_integrity(
        plaintext in prop::collection::vec(any::<u8>(), 1..512),
        bit in any::<prop::sample::Index>(),
        seed in any::<u64>(),
    ) {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let bundle = encrypt_hybrid(&plaintext, BOB.public_key(), &mut rng).unwrap();

        let CipherBundle::Hybrid { mut ciphertext, wrapped_key, nonce } = bundle else {
            panic!("encrypt_hybrid must produce a hybrid bundle");
        };
        let position = bit.index(ciphertext.len() * 8);
        ciphertext[position / 8] ^= 1 << (position % 8);

        let tampered = CipherBundle::Hybrid { ciphertext, wrapped_key, nonce };
        prop_assert_eq!(decrypt(&tampered, &BOB), Err(CryptoError::Integrity));
    }

    #[test]
    fn prop_flipped_nonce_bit_fails_integrity(
        plaintext in prop::collection::vec(any::<u8>(), 0..256),
        bit in 0usize..96,
        seed in any::<u64>(),
    ) {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let bundle = encrypt_hybrid(&plaintext, BOB.public_key(), &mut rng).unwrap();

        let CipherBundle::Hybrid { ciphertext, wrapped_key, mut nonce } = bundle else {
            panic!("encrypt_hybrid must produce a hybrid bundle");
        };
        nonce[bit / 8] ^= 1 << (bit % 8);

        let tampered = CipherBundle::Hybrid { ciphertext, wrapped_key, nonce };
        prop_assert_eq!(decrypt(&tampered, &BOB), Err(CryptoError::Integrity));
    }

    #[test]
    fn prop_direct_mode_within_capacity_roundtrips(
        plaintext in prop::collection::vec(any::<u8>(), 0..=DIRECT_MAX_PLAINTEXT),
        seed in any::<u64>(),
    ) {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let ciphertext = BOB.public_key().encrypt_direct(&plaintext, &mut rng).unwrap();

        let bundle = CipherBundle::Direct { ciphertext };
        prop_assert_eq!(decrypt_own(&bundle, &BOB).unwrap(), plaintext);
    }
}

#[test]
fn direct_mode_size_boundary() {
    let mut rng = ChaCha20Rng::seed_from_u64(1);
    let public = BOB.public_key();

    let at_limit = vec![0x61; DIRECT_MAX_PLAINTEXT];
    let ciphertext = public.encrypt_direct(&at_limit, &mut rng).unwrap();
    assert_eq!(decrypt(&CipherBundle::Direct { ciphertext }, &BOB).unwrap(), at_limit);

    let over_limit = vec![0x61; DIRECT_MAX_PLAINTEXT + 1];
    assert_eq!(
        public.encrypt_direct(&over_limit, &mut rng),
        Err(CryptoError::MessageTooLarge { len: 191, max: 190 })
    );
}

#[test]
fn one_malformed_key_of_three_is_omitted() {
    let mut rng = ChaCha20Rng::seed_from_u64(2);
    let alice = ALICE.export_public();
    let bob = BOB.export_public();
    let broken = EncodedPublicKey::new("bm90IGEga2V5");

    let fanout = encrypt_for_recipients(
        b"still delivered",
        [("alice", &alice), ("bob", &bob), ("mallory", &broken)],
        &mut rng,
    )
    .unwrap();

    assert_eq!(fanout.bundles().keys().collect::<Vec<_>>(), ["alice", "bob"]);
    assert_eq!(fanout.omitted(), ["mallory"]);
    assert_eq!(
        fanout.partial_failure(),
        Some(CryptoError::EncryptionPartialFailure { omitted: vec!["mallory".to_string()] })
    );

    assert_eq!(decrypt_own(&fanout.bundles()["alice"], &ALICE).unwrap(), b"still delivered");
    assert_eq!(decrypt_own(&fanout.bundles()["bob"], &BOB).unwrap(), b"still delivered");
}

#[test]
fn flipped_wrapped_key_fails_unwrap() {
    let mut rng = ChaCha20Rng::seed_from_u64(3);
    let bundle = encrypt_hybrid(b"hi", CAROL.public_key(), &mut rng).unwrap();

    let CipherBundle::Hybrid { ciphertext, mut wrapped_key, nonce } = bundle else {
        panic!("encrypt_hybrid must produce a hybrid bundle");
    };
    wrapped_key[0] ^= 0x80;

    let tampered = CipherBundle::Hybrid { ciphertext, wrapped_key, nonce };
    assert!(matches!(decrypt(&tampered, &CAROL), Err(CryptoError::Unwrap { .. })));
}
