//! Record serializers for typed queues.
//!
//! A [`Serializer`] turns a value into the opaque bytes an element store
//! keeps, and back. Queues are generic over the serializer so callers can
//! pick a wire format per queue.

use crate::error::{CoreError, CoreResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;

/// Encodes and decodes queue records.
pub trait Serializer<T>: Send + Sync {
    /// Encodes a value to bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be represented.
    fn encode(&self, value: &T) -> CoreResult<Vec<u8>>;

    /// Decodes a value from bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid encoding of `T`.
    fn decode(&self, bytes: &[u8]) -> CoreResult<T>;
}

/// JSON serializer. The default for typed queues.
pub struct JsonSerializer<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonSerializer<T> {
    /// Creates a JSON serializer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for JsonSerializer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for JsonSerializer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("JsonSerializer")
    }
}

impl<T: Serialize + DeserializeOwned> Serializer<T> for JsonSerializer<T> {
    fn encode(&self, value: &T) -> CoreResult<Vec<u8>> {
        serde_json::to_vec(value).map_err(CoreError::serialization)
    }

    fn decode(&self, bytes: &[u8]) -> CoreResult<T> {
        serde_json::from_slice(bytes).map_err(CoreError::serialization)
    }
}

/// CBOR serializer; more compact than JSON.
pub struct CborSerializer<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> CborSerializer<T> {
    /// Creates a CBOR serializer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for CborSerializer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for CborSerializer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CborSerializer")
    }
}

impl<T: Serialize + DeserializeOwned> Serializer<T> for CborSerializer<T> {
    fn encode(&self, value: &T) -> CoreResult<Vec<u8>> {
        let mut buffer = Vec::new();
        ciborium::ser::into_writer(value, &mut buffer).map_err(CoreError::serialization)?;
        Ok(buffer)
    }

    fn decode(&self, bytes: &[u8]) -> CoreResult<T> {
        ciborium::de::from_reader(bytes).map_err(CoreError::serialization)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        count: u32,
    }

    fn sample() -> Sample {
        Sample {
            name: "signup".into(),
            count: 3,
        }
    }

    #[test]
    fn json_encodes_readable_text() {
        let serializer = JsonSerializer::<Sample>::new();
        let bytes = serializer.encode(&sample()).unwrap();
        assert_eq!(bytes, br#"{"name":"signup","count":3}"#.to_vec());
        assert_eq!(serializer.decode(&bytes).unwrap(), sample());
    }

    #[test]
    fn json_rejects_garbage() {
        let serializer = JsonSerializer::<Sample>::new();
        let err = serializer.decode(b"{not json").unwrap_err();
        assert!(matches!(err, CoreError::Serialization(_)));
    }

    #[test]
    fn cbor_is_more_compact_than_json() {
        let json = JsonSerializer::<Sample>::new().encode(&sample()).unwrap();
        let cbor = CborSerializer::<Sample>::new();
        let bytes = cbor.encode(&sample()).unwrap();

        assert!(bytes.len() < json.len());
        assert_eq!(cbor.decode(&bytes).unwrap(), sample());
    }

    #[test]
    fn cbor_rejects_truncated_input() {
        let cbor = CborSerializer::<Sample>::new();
        let bytes = cbor.encode(&sample()).unwrap();
        assert!(cbor.decode(&bytes[..bytes.len() / 2]).is_err());
    }
}
