//! Daemon configuration.
//!
//! Three knobs, resolved in precedence order: command-line flag, then
//! environment variable, then built-in default.

use std::env;

use herd_core::LIVENESS_WINDOW_SECS;

/// Default address the daemon listens on for heartbeats.
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:5000";

/// Default receive buffer size in bytes.
pub const DEFAULT_RECV_BUFFER: usize = 1024;

/// Environment variable overriding the listen address.
pub const LISTEN_ENV: &str = "HERD_LISTEN";

/// Environment variable overriding the liveness window in seconds.
pub const TTL_ENV: &str = "HERD_TTL_SECS";

/// Runtime configuration for the daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// `host:port` the UDP socket binds to.
    pub listen_addr: String,
    /// Size of the datagram receive buffer in bytes.
    pub recv_buffer: usize,
    /// Maximum heartbeat age, in seconds, for a client to stay live.
    pub liveness_window_secs: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            recv_buffer: DEFAULT_RECV_BUFFER,
            liveness_window_secs: LIVENESS_WINDOW_SECS,
        }
    }
}

impl Config {
    /// Builds a config from explicit overrides, falling back to the
    /// environment and then to defaults.
    ///
    /// Flags win over environment variables; an unparsable `HERD_TTL_SECS`
    /// is ignored rather than fatal.
    pub fn resolve(
        listen: Option<String>,
        ttl_secs: Option<i64>,
        recv_buffer: Option<usize>,
    ) -> Self {
        let defaults = Self::default();

        let listen_addr = listen
            .or_else(|| env::var(LISTEN_ENV).ok())
            .unwrap_or(defaults.listen_addr);

        let liveness_window_secs = ttl_secs
            .or_else(|| env::var(TTL_ENV).ok().and_then(|v| v.parse().ok()))
            .unwrap_or(defaults.liveness_window_secs);

        let recv_buffer = recv_buffer.unwrap_or(defaults.recv_buffer);

        Self {
            listen_addr,
            recv_buffer,
            liveness_window_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.listen_addr, "127.0.0.1:5000");
        assert_eq!(config.recv_buffer, 1024);
        assert_eq!(config.liveness_window_secs, 10);
    }

    #[test]
    fn test_explicit_overrides_win() {
        let config = Config::resolve(Some("0.0.0.0:7000".to_string()), Some(30), Some(2048));
        assert_eq!(config.listen_addr, "0.0.0.0:7000");
        assert_eq!(config.liveness_window_secs, 30);
        assert_eq!(config.recv_buffer, 2048);
    }

    #[test]
    fn test_partial_overrides_keep_defaults() {
        let config = Config::resolve(None, Some(5), None);
        assert_eq!(config.listen_addr, "127.0.0.1:5000");
        assert_eq!(config.liveness_window_secs, 5);
        assert_eq!(config.recv_buffer, 1024);
    }
}
