//! Value Codec
//!
//! The shared tier stores opaque bytes; a [`Codec`] turns domain values into
//! that wire form and back. The JSON codec is deterministic, round-trip
//! stable, and tolerates unknown fields on decode, so newer writers do not
//! break older readers.

use crate::error::Result;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;

/// Encoder/decoder for shared-tier values
pub trait Codec<V>: Send + Sync {
    fn encode(&self, value: &V) -> Result<Bytes>;
    fn decode(&self, raw: &[u8]) -> Result<V>;
}

/// JSON codec over serde
pub struct JsonCodec<V> {
    _marker: PhantomData<fn() -> V>,
}

impl<V> JsonCodec<V> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
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
    V: Serialize + DeserializeOwned + Send + Sync,
{
    fn encode(&self, value: &V) -> Result<Bytes> {
        let raw = serde_json::to_vec(value)?;
        Ok(Bytes::from(raw))
    }

    fn decode(&self, raw: &[u8]) -> Result<V> {
        Ok(serde_json::from_slice(raw)?)
    }
}
