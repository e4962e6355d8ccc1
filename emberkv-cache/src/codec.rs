//! Value codec boundary.
//!
//! The cache never inspects the values it stores; SET records carry whatever
//! bytes the codec produced, and recovery hands them back for decoding. Any
//! symmetric encoder works; there is no cross-version guarantee.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use thiserror::Error;

/// Errors produced by a value codec.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to serialize value: {0}")]
    Serialize(#[source] bincode::Error),

    #[error("failed to deserialize value: {0}")]
    Deserialize(#[source] bincode::Error),

    #[error("invalid value encoding: {0}")]
    InvalidEncoding(String),
}

/// Symmetric encoder between caller values and stored bytes.
pub trait ValueCodec: Send + Sync {
    type Value;

    fn encode(&self, value: &Self::Value) -> Result<Vec<u8>, CodecError>;
    fn decode(&self, bytes: &[u8]) -> Result<Self::Value, CodecError>;
}

/// Bincode-backed codec for any serde value type.
pub struct BincodeCodec<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> BincodeCodec<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for BincodeCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ValueCodec for BincodeCodec<T>
where
    T: Serialize + DeserializeOwned,
{
    type Value = T;

    fn encode(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        bincode::serialize(value).map_err(CodecError::Serialize)
    }

    fn decode(&self, bytes: &[u8]) -> Result<T, CodecError> {
        bincode::deserialize(bytes).map_err(CodecError::Deserialize)
    }
}
