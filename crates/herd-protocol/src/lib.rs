//! Herd Protocol - Wire format for the UDP fan-out server
//!
//! This crate provides the two halves of the datagram protocol:
//! - `command` - the fan-out message broadcast to live clients
//! - `heartbeat` - classification of inbound datagrams (heartbeat vs
//!   proactive disconnect)

pub mod command;
pub mod heartbeat;

pub use command::{CodecError, HerdCommand};
pub use heartbeat::{classify, is_disconnect, Inbound, DISCONNECT_TOKEN};
