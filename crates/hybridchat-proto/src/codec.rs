//! Length-prefixed JSON framing.
//!
//! Layout on the wire:
//! `[length: u32 big-endian] + [JSON body: length bytes]`
//!
//! Each QUIC stream carries exactly one request frame and one response frame.

use bytes::BufMut;
use serde::{Serialize, de::DeserializeOwned};

use crate::errors::{ProtocolError, Result};

/// Size of the length prefix in bytes.
pub const PREFIX_SIZE: usize = 4;

/// Maximum body size (1 MiB). Poll responses are paged by the service to
/// stay below it.
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// ALPN protocol identifier for QUIC connections.
pub const ALPN_PROTOCOL: &[u8] = b"hybridchat";

/// Encode `value` as a length-prefixed JSON frame into `dst`.
///
/// # Errors
///
/// - `JsonEncode` if serialization fails
/// - `PayloadTooLarge` if the body exceeds [`MAX_FRAME_SIZE`]
pub fn encode<T: Serialize>(value: &T, dst: &mut impl BufMut) -> Result<()> {
    let body = serde_json::to_vec(value).map_err(|e| ProtocolError::JsonEncode(e.to_string()))?;

    if body.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::PayloadTooLarge { size: body.len(), max: MAX_FRAME_SIZE });
    }

    dst.put_u32(body.len() as u32);
    dst.put_slice(&body);

    Ok(())
}

/// Encode `value` into a fresh buffer.
pub fn to_frame<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut wire = Vec::new();
    encode(value, &mut wire)?;
    Ok(wire)
}

/// Size of the JSON body `value` encodes to, prefix excluded.
pub fn encoded_len<T: Serialize>(value: &T) -> Result<usize> {
    serde_json::to_vec(value)
        .map(|body| body.len())
        .map_err(|e| ProtocolError::JsonEncode(e.to_string()))
}

/// Validate a length prefix read from a stream.
///
/// Lets a streaming reader reject an oversized frame before allocating for it.
pub fn body_length(prefix: [u8; PREFIX_SIZE]) -> Result<usize> {
    let size = u32::from_be_bytes(prefix) as usize;
    if size > MAX_FRAME_SIZE {
        return Err(ProtocolError::PayloadTooLarge { size, max: MAX_FRAME_SIZE });
    }
    Ok(size)
}

/// Decode a JSON body (without prefix).
pub fn decode_body<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    serde_json::from_slice(body).map_err(|e| ProtocolError::JsonDecode(e.to_string()))
}

/// Decode a complete length-prefixed frame. Trailing bytes are ignored.
///
/// # Errors
///
/// - `FrameTooShort` if the prefix is incomplete
/// - `PayloadTooLarge` if the prefix exceeds [`MAX_FRAME_SIZE`]
/// - `FrameTruncated` if fewer body bytes are present than the prefix claims
/// - `JsonDecode` if the body is not a valid payload
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let Some((prefix, rest)) = bytes.split_first_chunk::<PREFIX_SIZE>() else {
        return Err(ProtocolError::FrameTooShort { expected: PREFIX_SIZE, actual: bytes.len() });
    };

    let size = body_length(*prefix)?;
    let Some(body) = rest.get(..size) else {
        return Err(ProtocolError::FrameTruncated { expected: size, actual: rest.len() });
    };

    decode_body(body)
}
