// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Opaque payloads for functions bound to an external runtime.
//!
//! The bytes are never decoded here. They are stored as lowercase hex with a
//! BLAKE3 digest of the raw bytes; the only checks performed are "is this
//! valid hex" and "does the digest still match".

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Inert byte blob carried by a user-defined function operator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OpaquePayload {
    /// Hex encoding of the payload bytes.
    data: String,
    /// Hex BLAKE3 digest of the decoded bytes. Absent in pre-1.2 documents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    digest: Option<String>,
}

impl OpaquePayload {
    /// Wraps raw bytes, recording their digest.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            data: hex::encode(bytes),
            digest: Some(blake3::hash(bytes).to_hex().to_string()),
        }
    }

    /// Wraps an already hex-encoded blob without a digest (legacy shape).
    pub fn from_hex_unchecked(data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            digest: None,
        }
    }

    /// The encoded form exactly as persisted.
    pub fn encoded(&self) -> &str {
        &self.data
    }

    /// Recorded digest, if any.
    pub fn digest(&self) -> Option<&str> {
        self.digest.as_deref()
    }

    /// Decodes the payload bytes after checking encoding and digest.
    pub fn bytes(&self) -> Result<Vec<u8>, ModelError> {
        let bytes = hex::decode(&self.data).map_err(|err| {
            ModelError::OpaquePayloadCorrupt(format!("malformed hex encoding: {err}"))
        })?;
        if let Some(expected) = &self.digest {
            let computed = blake3::hash(&bytes).to_hex();
            if !computed.as_str().eq_ignore_ascii_case(expected) {
                return Err(ModelError::OpaquePayloadCorrupt(format!(
                    "digest mismatch: expected {expected}, computed {}",
                    computed.as_str()
                )));
            }
        }
        Ok(bytes)
    }

    /// Runs the integrity check without keeping the bytes.
    pub fn verify(&self) -> Result<(), ModelError> {
        self.bytes().map(|_| ())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn bytes_survive_unchanged() {
        let raw = [0u8, 1, 2, 0xfe, 0xff, b'j', b'a', b'r'];
        let p = OpaquePayload::from_bytes(&raw);
        assert_eq!(p.bytes().unwrap(), raw);
    }

    #[test]
    fn malformed_hex_is_corrupt() {
        let p = OpaquePayload::from_hex_unchecked("zz01");
        assert!(matches!(p.verify(), Err(ModelError::OpaquePayloadCorrupt(_))));
        let odd = OpaquePayload::from_hex_unchecked("abc");
        assert!(odd.verify().is_err());
    }

    #[test]
    fn digest_mismatch_is_corrupt() {
        let mut p = OpaquePayload::from_bytes(b"payload");
        p.data = hex::encode(b"tampered");
        assert!(matches!(p.verify(), Err(ModelError::OpaquePayloadCorrupt(_))));
    }

    #[test]
    fn legacy_payload_without_digest_is_accepted() {
        let p = OpaquePayload::from_hex_unchecked(hex::encode(b"udf"));
        assert_eq!(p.bytes().unwrap(), b"udf");
        assert!(p.digest().is_none());
    }
}
