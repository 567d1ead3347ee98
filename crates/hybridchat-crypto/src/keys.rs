//! RSA keypairs and portable public key encoding.
//!
//! Public keys travel as base64 of their SPKI DER structure. Imported keys are
//! wrapped in [`PublicKey`], which only exposes encryption-side operations;
//! the private half stays inside [`KeyPair`] and never leaves the process.

use std::fmt;

use base64::{Engine, engine::general_purpose::STANDARD};
use rand::{CryptoRng, RngCore};
use rsa::{
    RsaPrivateKey, RsaPublicKey,
    pkcs8::{DecodePublicKey, EncodePublicKey},
    traits::PublicKeyParts,
};

use crate::error::CryptoError;

/// Modulus size for generated keys, and the minimum accepted on import.
pub const MODULUS_BITS: usize = 2048;

/// A client's RSA keypair.
///
/// Not `Clone` and not serializable. The private key zeroizes itself on drop.
pub struct KeyPair {
    pub(crate) private: RsaPrivateKey,
    public: PublicKey,
    encoded: EncodedPublicKey,
}

impl KeyPair {
    /// Generate a fresh 2048-bit keypair (public exponent 65537).
    ///
    /// Caller MUST provide a cryptographically secure RNG in production.
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Result<Self, CryptoError> {
        let private = RsaPrivateKey::new(rng, MODULUS_BITS)
            .map_err(|e| CryptoError::KeyGeneration { reason: e.to_string() })?;
        let public = private.to_public_key();

        let der = public
            .to_public_key_der()
            .map_err(|e| CryptoError::KeyGeneration { reason: format!("SPKI export: {e}") })?;
        let encoded = EncodedPublicKey(STANDARD.encode(der.as_bytes()));

        Ok(Self { private, public: PublicKey(public), encoded })
    }

    /// The public half, usable for encrypting to ourselves.
    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// Portable encoding of the public half. Deterministic for a given key.
    pub fn export_public(&self) -> EncodedPublicKey {
        self.encoded.clone()
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.encoded)
            .field("private", &"<redacted>")
            .finish()
    }
}

/// A recipient's public key.
///
/// Only wraps session keys and encrypts legacy direct-mode messages; it can
/// never decrypt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey(pub(crate) RsaPublicKey);

impl PublicKey {
    /// Modulus size in bits.
    pub fn bits(&self) -> usize {
        self.0.size() * 8
    }

    /// Modulus size in bytes (also the size of every ciphertext it produces).
    pub fn size(&self) -> usize {
        self.0.size()
    }
}

/// Base64 (standard alphabet, padded) of a public key's SPKI DER encoding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EncodedPublicKey(String);

impl EncodedPublicKey {
    /// Wrap an encoded key received from the network. Not validated until
    /// [`import`](Self::import).
    pub fn new(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    /// The encoded text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the encoded text.
    pub fn into_string(self) -> String {
        self.0
    }

    /// Decode into a usable [`PublicKey`].
    ///
    /// # Errors
    ///
    /// - `InvalidKeyEncoding`: bad base64, bad SPKI DER, or a modulus smaller
    ///   than [`MODULUS_BITS`]
    pub fn import(&self) -> Result<PublicKey, CryptoError> {
        let der = STANDARD
            .decode(self.0.trim())
            .map_err(|e| CryptoError::InvalidKeyEncoding { reason: format!("base64: {e}") })?;

        let key = RsaPublicKey::from_public_key_der(&der)
            .map_err(|e| CryptoError::InvalidKeyEncoding { reason: format!("SPKI: {e}") })?;

        let key = PublicKey(key);
        if key.bits() < MODULUS_BITS {
            return Err(CryptoError::InvalidKeyEncoding {
                reason: format!("modulus is {} bits, need at least {MODULUS_BITS}", key.bits()),
            });
        }

        Ok(key)
    }
}

impl From<String> for EncodedPublicKey {
    fn from(encoded: String) -> Self {
        Self(encoded)
    }
}

impl fmt::Display for EncodedPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
