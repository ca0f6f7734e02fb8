//! Endpoint identity for remote clients.

use std::fmt;
use std::net::{AddrParseError, SocketAddr};
use std::str::FromStr;

use thiserror::Error;

/// Identity of a remote client endpoint.
///
/// Wraps the sender's socket address (IP + port). Two datagrams from the
/// same address and port are the same client. Value equality and `Hash`
/// make this usable directly as a registry key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EndpointId(SocketAddr);

impl EndpointId {
    /// Creates an endpoint identity from a socket address.
    pub fn new(addr: SocketAddr) -> Self {
        Self(addr)
    }

    /// Returns the underlying socket address.
    pub fn socket_addr(&self) -> SocketAddr {
        self.0
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<SocketAddr> for EndpointId {
    fn from(addr: SocketAddr) -> Self {
        Self(addr)
    }
}

impl FromStr for EndpointId {
    type Err = EndpointParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let addr = s
            .parse::<SocketAddr>()
            .map_err(|source| EndpointParseError {
                input: s.to_string(),
                source,
            })?;
        Ok(Self(addr))
    }
}

/// Error returned when an endpoint string is not a valid `host:port` address.
#[derive(Error, Debug)]
#[error("invalid endpoint address {input:?}: {source}")]
pub struct EndpointParseError {
    pub input: String,
    #[source]
    pub source: AddrParseError,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display_roundtrip() {
        let endpoint: EndpointId = "127.0.0.1:5000".parse().unwrap();
        assert_eq!(endpoint.to_string(), "127.0.0.1:5000");
        assert_eq!(endpoint.socket_addr().port(), 5000);
    }

    #[test]
    fn test_parse_rejects_missing_port() {
        let result = "127.0.0.1".parse::<EndpointId>();
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(err.to_string().contains("127.0.0.1"));
    }

    #[test]
    fn test_value_equality() {
        let a: EndpointId = "10.0.0.1:9000".parse().unwrap();
        let b: EndpointId = "10.0.0.1:9000".parse().unwrap();
        let c: EndpointId = "10.0.0.1:9001".parse().unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
