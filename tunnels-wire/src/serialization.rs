//! Deterministic binary serialization for wire messages.
//!
//! Uses bincode with fixed-size integer encoding and little-endian byte
//! order so the same message always produces the same bytes on every
//! platform.

use bincode::Options;
use serde::{de::DeserializeOwned, Serialize};

use crate::error::{WireError, WireResult};

fn config() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
        .reject_trailing_bytes()
}

/// Serialize a value to bytes.
pub fn serialize<T: Serialize>(value: &T) -> WireResult<Vec<u8>> {
    config()
        .serialize(value)
        .map_err(|e| WireError::Serialization(e.to_string()))
}

/// Deserialize a value from bytes, rejecting trailing garbage.
pub fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> WireResult<T> {
    config()
        .deserialize(bytes)
        .map_err(|e| WireError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::Message;

    #[test]
    fn test_roundtrip() {
        let original = Message::Ping(12345);
        let bytes = serialize(&original).unwrap();
        let recovered: Message = deserialize(&bytes).unwrap();
        assert_eq!(original, recovered);
    }

    #[test]
    fn test_rejects_trailing_bytes() {
        let mut bytes = serialize(&Message::VerAck).unwrap();
        bytes.push(0xFF);

        let result: WireResult<Message> = deserialize(&bytes);
        assert!(result.is_err());
    }

    #[test]
    fn test_determinism() {
        let value = Message::Ping(999_999);
        assert_eq!(serialize(&value).unwrap(), serialize(&value).unwrap());
    }
}
