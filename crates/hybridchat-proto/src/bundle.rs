//! Per-recipient cipher bundle as it appears on the wire.
//!
//! Binary fields are base64 strings. Decoding the base64 and interpreting the
//! bundle is left to the client, which owns the private key; the server only
//! stores and projects bundles.

use serde::{Deserialize, Serialize};

/// Hybrid-mode bundle: AES-GCM body, RSA-wrapped session key and nonce.
///
/// The three fields always travel together. Unknown fields are rejected so a
/// malformed object never silently decodes as a partial bundle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct HybridBundle {
    /// base64 AES-GCM ciphertext with the 16-byte tag appended
    pub encrypted_message: String,

    /// base64 RSA-OAEP ciphertext of the 32-byte session key
    pub encrypted_key: String,

    /// base64 12-byte nonce
    pub iv: String,
}

/// A bundle addressed to one recipient.
///
/// Legacy senders emit a bare string: either a base64 direct-mode ciphertext
/// or a hybrid bundle serialized to JSON text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BundleWire {
    /// Structured hybrid bundle
    Hybrid(HybridBundle),

    /// Legacy string form
    Legacy(String),
}

impl From<HybridBundle> for BundleWire {
    fn from(bundle: HybridBundle) -> Self {
        Self::Hybrid(bundle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> HybridBundle {
        HybridBundle {
            encrypted_message: "bWVzc2FnZQ==".to_string(),
            encrypted_key: "a2V5".to_string(),
            iv: "AAAAAAAAAAAAAAAA".to_string(),
        }
    }

    #[test]
    fn hybrid_uses_camel_case_fields() {
        let json = serde_json::to_value(BundleWire::from(sample())).unwrap();
        assert_eq!(json["encryptedMessage"], "bWVzc2FnZQ==");
        assert_eq!(json["encryptedKey"], "a2V5");
        assert_eq!(json["iv"], "AAAAAAAAAAAAAAAA");
    }

    #[test]
    fn bare_string_decodes_as_legacy() {
        let bundle: BundleWire = serde_json::from_str("\"Zm9v\"").unwrap();
        assert_eq!(bundle, BundleWire::Legacy("Zm9v".to_string()));
    }

    #[test]
    fn object_with_missing_field_is_rejected() {
        let result =
            serde_json::from_str::<BundleWire>(r#"{"encryptedMessage":"a","encryptedKey":"b"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn object_with_unknown_field_is_rejected() {
        let result = serde_json::from_str::<BundleWire>(
            r#"{"encryptedMessage":"a","encryptedKey":"b","iv":"c","extra":1}"#,
        );
        assert!(result.is_err());
    }
}
