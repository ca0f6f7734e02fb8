//! The fan-out command message.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A command fanned out to every live client.
///
/// All four fields are opaque 64-bit integers as far as the server is
/// concerned: `status`, `data1` and `data2` come from the upstream event
/// source unchanged, and `deadline` is a logical deadline stamped by the
/// caller. The liveness logic never interprets any of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HerdCommand {
    pub status: i64,
    pub data1: i64,
    pub data2: i64,
    pub deadline: i64,
}

impl HerdCommand {
    /// Creates a command from its four fields.
    pub fn new(status: i64, data1: i64, data2: i64, deadline: i64) -> Self {
        Self {
            status,
            data1,
            data2,
            deadline,
        }
    }

    /// Encodes the command into wire bytes (one JSON datagram).
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(self).map_err(CodecError::Encode)
    }

    /// Decodes a command from wire bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        serde_json::from_slice(bytes).map_err(CodecError::Decode)
    }
}

/// Errors that can occur encoding or decoding a command.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("failed to encode command: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to decode command: {0}")]
    Decode(#[source] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_roundtrip() {
        let command = HerdCommand::new(144, 60, 127, 1234);
        let wire = command.encode().unwrap();
        let decoded = HerdCommand::decode(&wire).unwrap();
        assert_eq!(decoded, command);
    }

    #[test]
    fn test_wire_form_is_flat_json() {
        let command = HerdCommand::new(1, 2, 3, 4);
        let wire = command.encode().unwrap();
        let json: serde_json::Value = serde_json::from_slice(&wire).unwrap();
        assert_eq!(json["status"], 1);
        assert_eq!(json["deadline"], 4);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(HerdCommand::decode(b"not json").is_err());
        assert!(HerdCommand::decode(b"").is_err());
        assert!(HerdCommand::decode(b"{\"status\": 1}").is_err());
    }

    #[test]
    fn test_negative_values_survive() {
        let command = HerdCommand::new(-1, i64::MIN, i64::MAX, -100);
        let wire = command.encode().unwrap();
        assert_eq!(HerdCommand::decode(&wire).unwrap(), command);
    }
}
