//! Conversion between wire bundles and cipher bundles.
//!
//! The wire carries base64 strings; the crypto crate works on bytes. A legacy
//! string is classified by shape alone: text starting with `{` must be a JSON
//! hybrid bundle, anything else is a base64 direct-mode ciphertext. There is
//! no parse-and-fall-back, so a corrupted hybrid bundle is reported as such
//! instead of being retried as a direct ciphertext.

use base64::{Engine, engine::general_purpose::STANDARD};
use hybridchat_crypto::{CipherBundle, CryptoError, NONCE_SIZE, Nonce};
use hybridchat_proto::{BundleWire, HybridBundle};

/// Encode a cipher bundle for the wire.
pub fn encode(bundle: &CipherBundle) -> BundleWire {
    match bundle {
        CipherBundle::Hybrid { ciphertext, wrapped_key, nonce } => {
            BundleWire::Hybrid(HybridBundle {
                encrypted_message: STANDARD.encode(ciphertext),
                encrypted_key: STANDARD.encode(wrapped_key),
                iv: STANDARD.encode(nonce),
            })
        },
        CipherBundle::Direct { ciphertext } => BundleWire::Legacy(STANDARD.encode(ciphertext)),
    }
}

/// Decode a wire bundle.
///
/// # Errors
///
/// - `Decryption`: bad base64, a nonce of the wrong length, or a legacy
///   string that looks like JSON but is not a hybrid bundle
pub fn decode(wire: &BundleWire) -> Result<CipherBundle, CryptoError> {
    match wire {
        BundleWire::Hybrid(hybrid) => decode_hybrid(hybrid),
        BundleWire::Legacy(text) if text.trim_start().starts_with('{') => {
            let hybrid: HybridBundle = serde_json::from_str(text).map_err(|e| {
                CryptoError::Decryption { reason: format!("malformed hybrid bundle: {e}") }
            })?;
            decode_hybrid(&hybrid)
        },
        BundleWire::Legacy(text) => {
            Ok(CipherBundle::Direct { ciphertext: base64_field("ciphertext", text)? })
        },
    }
}

fn decode_hybrid(hybrid: &HybridBundle) -> Result<CipherBundle, CryptoError> {
    let ciphertext = base64_field("encryptedMessage", &hybrid.encrypted_message)?;
    let wrapped_key = base64_field("encryptedKey", &hybrid.encrypted_key)?;
    let iv = base64_field("iv", &hybrid.iv)?;

    let nonce: Nonce = iv.as_slice().try_into().map_err(|_| CryptoError::Decryption {
        reason: format!("iv is {} bytes, expected {NONCE_SIZE}", iv.len()),
    })?;

    Ok(CipherBundle::Hybrid { ciphertext, wrapped_key, nonce })
}

fn base64_field(field: &str, value: &str) -> Result<Vec<u8>, CryptoError> {
    STANDARD
        .decode(value)
        .map_err(|e| CryptoError::Decryption { reason: format!("{field} is not base64: {e}") })
}
