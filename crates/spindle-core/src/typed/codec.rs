//! PayloadCodec - typed values <-> JSON payloads.

use serde::Serialize;
use serde::de::DeserializeOwned;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("json encode: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("json decode: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Stateless JSON codec used on both sides of the pool: `Pool::run_typed`
/// encodes the task and decodes the output, `TypedHandler` does the reverse.
pub struct PayloadCodec;

impl PayloadCodec {
    pub fn encode<T: Serialize>(value: &T) -> Result<serde_json::Value, CodecError> {
        serde_json::to_value(value).map_err(CodecError::Encode)
    }

    pub fn decode<T: DeserializeOwned>(value: serde_json::Value) -> Result<T, CodecError> {
        serde_json::from_value(value).map_err(CodecError::Decode)
    }
}
