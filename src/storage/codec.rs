//! Compact binary encoding of stored payloads
//!
//! The encoding is internal and not stable across versions.

use super::types::StorageResult;
use serde::de::DeserializeOwned;
use serde::Serialize;

pub fn encode<T: Serialize>(value: &T) -> StorageResult<Vec<u8>> {
    Ok(bincode::serialize(value)?)
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> StorageResult<T> {
    Ok(bincode::deserialize(bytes)?)
}
