//! JSON wire format for [`Event`]s.
//!
//! The encoded body is canonical: `serde_json` object maps are ordered by
//! key, so logically identical events always encode to the same bytes. The
//! dedup token relies on this.

use crate::error::CodecError;
use crate::event::Event;
use bytes::Bytes;
use sha2::{Digest, Sha256};

#[cfg(test)]
#[path = "codec_tests.rs"]
mod tests;

/// Encode an event into a message body
pub fn encode(event: &Event) -> Result<Bytes, CodecError> {
    serde_json::to_vec(event)
        .map(Bytes::from)
        .map_err(CodecError::Encode)
}

/// Decode a message body into an event. Unknown fields are ignored.
pub fn decode(body: &[u8]) -> Result<Event, CodecError> {
    serde_json::from_slice(body).map_err(CodecError::Decode)
}

/// Deterministic dedup token for an encoded body: hex SHA-256 of its bytes
pub fn dedup_token(body: &[u8]) -> String {
    hex::encode(Sha256::digest(body))
}
