//! Hybrid and legacy direct-mode encryption.
//!
//! Hybrid mode seals the plaintext once with AES-256-GCM under a random
//! session key and 96-bit nonce, then wraps the raw session key with RSA-OAEP
//! (SHA-256) for each recipient. Legacy direct mode RSA-OAEP-encrypts a short
//! plaintext with no session key and no nonce.
//!
//! Bundle wire layout (before base64):
//!
//! ```text
//! Hybrid: ciphertext = AES-GCM(plaintext) || tag(16)
//!         wrapped_key = RSA-OAEP(session_key(32))
//!         nonce = 12 random bytes
//! Direct: ciphertext = RSA-OAEP(plaintext), plaintext <= 190 bytes
//! ```

use aes_gcm::{
    Aes256Gcm, Nonce as GcmNonce,
    aead::{Aead, KeyInit},
};
use rand::{CryptoRng, RngCore};
use rsa::Oaep;
use sha2::Sha256;
use zeroize::Zeroize;

use crate::{
    error::CryptoError,
    keys::{KeyPair, PublicKey},
};

/// Session key size (AES-256).
pub const SESSION_KEY_SIZE: usize = 32;

/// AES-GCM nonce size (96 bits).
pub const NONCE_SIZE: usize = 12;

/// AES-GCM authentication tag size.
pub const TAG_SIZE: usize = 16;

/// Largest plaintext accepted by legacy direct mode.
///
/// OAEP with SHA-256 over a 2048-bit modulus carries at most
/// `256 - 2 * 32 - 2` bytes.
pub const DIRECT_MAX_PLAINTEXT: usize = 190;

/// SHA-256 output size, part of the OAEP overhead.
const OAEP_HASH_SIZE: usize = 32;

/// A 96-bit AES-GCM nonce.
pub type Nonce = [u8; NONCE_SIZE];

/// Ephemeral symmetric key for a single message.
///
/// Zeroized on drop. Never serialized except wrapped under a public key.
pub struct SessionKey([u8; SESSION_KEY_SIZE]);

impl SessionKey {
    /// Generate a fresh random session key.
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut key = [0u8; SESSION_KEY_SIZE];
        rng.fill_bytes(&mut key);
        Self(key)
    }

    /// Rebuild a session key from unwrapped bytes.
    ///
    /// # Errors
    ///
    /// - `Unwrap`: length is not [`SESSION_KEY_SIZE`]
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let key: [u8; SESSION_KEY_SIZE] = bytes.try_into().map_err(|_| CryptoError::Unwrap {
            reason: format!("session key is {} bytes, expected {SESSION_KEY_SIZE}", bytes.len()),
        })?;
        Ok(Self(key))
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; SESSION_KEY_SIZE] {
        &self.0
    }
}

impl Drop for SessionKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// Generate a random nonce.
pub fn generate_nonce<R: RngCore + CryptoRng>(rng: &mut R) -> Nonce {
    let mut nonce = [0u8; NONCE_SIZE];
    rng.fill_bytes(&mut nonce);
    nonce
}

/// Ciphertext addressed to one recipient.
///
/// Wrapped key and nonce exist together (hybrid) or not at all (direct).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CipherBundle {
    /// AES-GCM body with an RSA-wrapped session key
    Hybrid {
        /// AES-GCM ciphertext including the 16-byte tag
        ciphertext: Vec<u8>,
        /// Session key encrypted under the recipient's public key
        wrapped_key: Vec<u8>,
        /// Nonce used for the body
        nonce: Nonce,
    },
    /// Legacy RSA-only ciphertext
    Direct {
        /// RSA-OAEP ciphertext of the whole message
        ciphertext: Vec<u8>,
    },
}

impl CipherBundle {
    /// Whether this bundle uses hybrid mode.
    pub fn is_hybrid(&self) -> bool {
        matches!(self, Self::Hybrid { .. })
    }
}

/// Encrypt with AES-256-GCM. Returns ciphertext with the tag appended.
pub fn seal(key: &SessionKey, nonce: &Nonce, plaintext: &[u8]) -> Vec<u8> {
    let cipher = Aes256Gcm::new(key.as_bytes().into());

    let Ok(ciphertext) = cipher.encrypt(GcmNonce::from_slice(nonce), plaintext) else {
        unreachable!("AES-256-GCM encryption cannot fail below 64 GiB of plaintext");
    };

    ciphertext
}

/// Decrypt and verify an AES-256-GCM ciphertext.
///
/// # Errors
///
/// - `Integrity`: tag mismatch, truncated ciphertext, wrong key or nonce.
///   No partial plaintext is ever returned.
pub fn open(key: &SessionKey, nonce: &Nonce, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if ciphertext.len() < TAG_SIZE {
        return Err(CryptoError::Integrity);
    }

    let cipher = Aes256Gcm::new(key.as_bytes().into());
    cipher.decrypt(GcmNonce::from_slice(nonce), ciphertext).map_err(|_| CryptoError::Integrity)
}

impl PublicKey {
    /// Largest plaintext this key can carry in direct mode.
    pub fn direct_capacity(&self) -> usize {
        self.size().saturating_sub(2 * OAEP_HASH_SIZE + 2).min(DIRECT_MAX_PLAINTEXT)
    }

    /// Wrap a session key with RSA-OAEP-SHA256.
    ///
    /// # Errors
    ///
    /// - `Wrap`: the RSA operation failed
    pub fn wrap_session_key<R: RngCore + CryptoRng>(
        &self,
        key: &SessionKey,
        rng: &mut R,
    ) -> Result<Vec<u8>, CryptoError> {
        self.0
            .encrypt(rng, Oaep::new::<Sha256>(), key.as_bytes())
            .map_err(|e| CryptoError::Wrap { reason: e.to_string() })
    }

    /// Legacy direct-mode encryption of a short plaintext.
    ///
    /// # Errors
    ///
    /// - `MessageTooLarge`: plaintext exceeds [`direct_capacity`]
    ///
    /// [`direct_capacity`]: Self::direct_capacity
    pub fn encrypt_direct<R: RngCore + CryptoRng>(
        &self,
        plaintext: &[u8],
        rng: &mut R,
    ) -> Result<Vec<u8>, CryptoError> {
        let max = self.direct_capacity();
        if plaintext.len() > max {
            return Err(CryptoError::MessageTooLarge { len: plaintext.len(), max });
        }

        self.0
            .encrypt(rng, Oaep::new::<Sha256>(), plaintext)
            .map_err(|e| CryptoError::Wrap { reason: e.to_string() })
    }
}

impl KeyPair {
    /// Recover a session key wrapped for us.
    ///
    /// # Errors
    ///
    /// - `Unwrap`: OAEP decryption failed (wrong key, corrupted bundle) or the
    ///   recovered key has the wrong length
    pub fn unwrap_session_key(&self, wrapped: &[u8]) -> Result<SessionKey, CryptoError> {
        let mut raw = self
            .private
            .decrypt(Oaep::new::<Sha256>(), wrapped)
            .map_err(|e| CryptoError::Unwrap { reason: e.to_string() })?;

        let key = SessionKey::from_slice(&raw);
        raw.zeroize();
        key
    }

    /// Decrypt a legacy direct-mode ciphertext.
    ///
    /// # Errors
    ///
    /// - `Integrity`: OAEP padding check failed
    pub fn decrypt_direct(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.private.decrypt(Oaep::new::<Sha256>(), ciphertext).map_err(|_| CryptoError::Integrity)
    }
}

/// Hybrid-encrypt a message for a single recipient.
pub fn encrypt_hybrid<R: RngCore + CryptoRng>(
    plaintext: &[u8],
    recipient: &PublicKey,
    rng: &mut R,
) -> Result<CipherBundle, CryptoError> {
    let key = SessionKey::generate(rng);
    let nonce = generate_nonce(rng);
    let ciphertext = seal(&key, &nonce, plaintext);
    let wrapped_key = recipient.wrap_session_key(&key, rng)?;

    Ok(CipherBundle::Hybrid { ciphertext, wrapped_key, nonce })
}

/// Decrypt a bundle addressed to `key_pair`, selecting the mode by variant.
///
/// # Errors
///
/// - `Unwrap`: hybrid session key could not be recovered
/// - `Integrity`: tag or padding check failed
pub fn decrypt(bundle: &CipherBundle, key_pair: &KeyPair) -> Result<Vec<u8>, CryptoError> {
    match bundle {
        CipherBundle::Hybrid { ciphertext, wrapped_key, nonce } => {
            let key = key_pair.unwrap_session_key(wrapped_key)?;
            open(&key, nonce, ciphertext)
        },
        CipherBundle::Direct { ciphertext } => key_pair.decrypt_direct(ciphertext),
    }
}
