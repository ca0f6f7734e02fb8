//! Herd Core - Shared types for the UDP fan-out server
//!
//! This crate provides the domain types shared between the daemon (herdd)
//! and anything that needs to reason about client liveness:
//! - `endpoint` - Stable identity for a remote sender
//! - `registry` - The recency-ordered live-client registry
//!
//! The registry is a pure data structure: no sockets, no clock, no locking.
//! Callers supply timestamps and transmission, which keeps every liveness
//! decision testable without I/O.

pub mod endpoint;
pub mod registry;

// Re-exports for convenience
pub use endpoint::{EndpointId, EndpointParseError};
pub use registry::{ClientRecord, ClientRegistry, LIVENESS_WINDOW_SECS};
