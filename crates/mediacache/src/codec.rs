//! Payload encoding for the disk tier

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Encoding or decoding failure. Treated as a cache miss by the manager.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Payload could not be encoded
    #[error("encode failed: {0}")]
    Encode(String),

    /// Stored bytes could not be decoded
    #[error("decode failed: {0}")]
    Decode(String),
}

/// Converts payloads to and from the bytes stored in blob files
pub trait Codec<V>: Send + Sync {
    /// Encode a payload for the disk tier
    fn encode(&self, value: &V) -> Result<Vec<u8>, CodecError>;

    /// Decode a payload read from the disk tier
    fn decode(&self, bytes: &[u8]) -> Result<V, CodecError>;
}

/// JSON encoding for any serde payload
pub struct JsonCodec<V> {
    _payload: PhantomData<fn() -> V>,
}

impl<V> JsonCodec<V> {
    /// Create a JSON codec
    pub fn new() -> Self {
        Self {
            _payload: PhantomData,
        }
    }
}

impl<V> Default for JsonCodec<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Codec<V> for JsonCodec<V>
where
    V: Serialize + DeserializeOwned,
{
    fn encode(&self, value: &V) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(value).map_err(|e| CodecError::Encode(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<V, CodecError> {
        serde_json::from_slice(bytes).map_err(|e| CodecError::Decode(e.to_string()))
    }
}

/// Raw bytes stored as-is
#[derive(Debug, Default, Clone, Copy)]
pub struct BytesCodec;

impl Codec<Vec<u8>> for BytesCodec {
    fn encode(&self, value: &Vec<u8>) -> Result<Vec<u8>, CodecError> {
        Ok(value.clone())
    }

    fn decode(&self, bytes: &[u8]) -> Result<Vec<u8>, CodecError> {
        Ok(bytes.to_vec())
    }
}

/// UTF-8 text stored as-is
#[derive(Debug, Default, Clone, Copy)]
pub struct Utf8Codec;

impl Codec<String> for Utf8Codec {
    fn encode(&self, value: &String) -> Result<Vec<u8>, CodecError> {
        Ok(value.as_bytes().to_vec())
    }

    fn decode(&self, bytes: &[u8]) -> Result<String, CodecError> {
        String::from_utf8(bytes.to_vec()).map_err(|e| CodecError::Decode(e.to_string()))
    }
}
