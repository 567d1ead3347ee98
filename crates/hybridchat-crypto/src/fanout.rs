//! Recipient fan-out.
//!
//! One session key, one nonce and one AEAD pass per message; only the 32-byte
//! session key is RSA-wrapped once per recipient. Symmetric cost is constant in
//! the number of recipients and asymmetric cost does not depend on message
//! length.

use std::collections::BTreeMap;

use rand::{CryptoRng, RngCore};

use crate::{
    cipher::{self, CipherBundle, SessionKey},
    error::CryptoError,
    keys::{EncodedPublicKey, KeyPair},
};

/// Result of encrypting one plaintext for many recipients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fanout {
    bundles: BTreeMap<String, CipherBundle>,
    omitted: Vec<String>,
}

impl Fanout {
    /// Bundles keyed by recipient username.
    pub fn bundles(&self) -> &BTreeMap<String, CipherBundle> {
        &self.bundles
    }

    /// Consume into the per-recipient bundles.
    pub fn into_bundles(self) -> BTreeMap<String, CipherBundle> {
        self.bundles
    }

    /// Recipients that were skipped because their key could not be imported
    /// or the wrap failed.
    pub fn omitted(&self) -> &[String] {
        &self.omitted
    }

    /// `EncryptionPartialFailure` if any recipient was skipped.
    pub fn partial_failure(&self) -> Option<CryptoError> {
        if self.omitted.is_empty() {
            None
        } else {
            Some(CryptoError::EncryptionPartialFailure { omitted: self.omitted.clone() })
        }
    }
}

/// Encrypt `plaintext` once and wrap the session key for every recipient.
///
/// A recipient whose key fails to import or wrap is omitted rather than
/// aborting the call.
///
/// # Errors
///
/// - `NoRecipients`: `recipients` is empty (send plaintext instead)
/// - `EncryptionFailed`: no recipient could be encrypted for; the send must be
///   rejected, never downgraded to plaintext
pub fn encrypt_for_recipients<'a, I, R>(
    plaintext: &[u8],
    recipients: I,
    rng: &mut R,
) -> Result<Fanout, CryptoError>
where
    I: IntoIterator<Item = (&'a str, &'a EncodedPublicKey)>,
    R: RngCore + CryptoRng,
{
    let recipients: Vec<_> = recipients.into_iter().collect();
    if recipients.is_empty() {
        return Err(CryptoError::NoRecipients);
    }

    let key = SessionKey::generate(rng);
    let nonce = cipher::generate_nonce(rng);
    let ciphertext = cipher::seal(&key, &nonce, plaintext);

    let mut bundles = BTreeMap::new();
    let mut omitted = Vec::new();

    for (username, encoded) in &recipients {
        let wrapped = encoded.import().and_then(|public| public.wrap_session_key(&key, rng));
        match wrapped {
            Ok(wrapped_key) => {
                bundles.insert(
                    (*username).to_string(),
                    CipherBundle::Hybrid { ciphertext: ciphertext.clone(), wrapped_key, nonce },
                );
            },
            Err(_) => omitted.push((*username).to_string()),
        }
    }

    if bundles.is_empty() {
        return Err(CryptoError::EncryptionFailed { attempted: recipients.len() });
    }

    Ok(Fanout { bundles, omitted })
}

/// Decrypt the bundle addressed to us.
pub fn decrypt_own(bundle: &CipherBundle, key_pair: &KeyPair) -> Result<Vec<u8>, CryptoError> {
    cipher::decrypt(bundle, key_pair)
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    use super::*;

    #[test]
    fn empty_recipients_is_rejected() {
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let result = encrypt_for_recipients(b"hi", std::iter::empty(), &mut rng);
        assert_eq!(result, Err(CryptoError::NoRecipients));
    }

    #[test]
    fn all_bad_keys_fail_the_send() {
        let mut rng = ChaCha20Rng::seed_from_u64(2);
        let bad = EncodedPublicKey::new("AAAA");
        let recipients = [("bob", &bad), ("carol", &bad)];

        let result = encrypt_for_recipients(b"hi", recipients, &mut rng);
        assert_eq!(result, Err(CryptoError::EncryptionFailed { attempted: 2 }));
    }

    #[test]
    fn recipients_share_body_and_nonce() {
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let bob = KeyPair::generate(&mut rng).unwrap();
        let carol = KeyPair::generate(&mut rng).unwrap();
        let (bob_key, carol_key) = (bob.export_public(), carol.export_public());

        let fanout =
            encrypt_for_recipients(b"hello", [("bob", &bob_key), ("carol", &carol_key)], &mut rng)
                .unwrap();

        let (
            CipherBundle::Hybrid { ciphertext: body_b, wrapped_key: wrap_b, nonce: nonce_b },
            CipherBundle::Hybrid { ciphertext: body_c, wrapped_key: wrap_c, nonce: nonce_c },
        ) = (&fanout.bundles()["bob"], &fanout.bundles()["carol"])
        else {
            panic!("fan-out must produce hybrid bundles");
        };

        assert_eq!(body_b, body_c);
        assert_eq!(nonce_b, nonce_c);
        assert_ne!(wrap_b, wrap_c);
        assert!(fanout.partial_failure().is_none());

        assert_eq!(decrypt_own(&fanout.bundles()["bob"], &bob).unwrap(), b"hello");
        assert_eq!(decrypt_own(&fanout.bundles()["carol"], &carol).unwrap(), b"hello");
    }

    #[test]
    fn bundle_for_other_recipient_does_not_unwrap() {
        let mut rng = ChaCha20Rng::seed_from_u64(4);
        let bob = KeyPair::generate(&mut rng).unwrap();
        let mallory = KeyPair::generate(&mut rng).unwrap();
        let bob_key = bob.export_public();

        let fanout = encrypt_for_recipients(b"for bob", [("bob", &bob_key)], &mut rng).unwrap();

        let result = decrypt_own(&fanout.bundles()["bob"], &mallory);
        assert!(matches!(result, Err(CryptoError::Unwrap { .. })));
    }
}
