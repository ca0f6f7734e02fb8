//! Herd Daemon - UDP fan-out server
//!
//! This crate provides the infrastructure for the herd daemon:
//! - `config` - listen address, receive buffer and liveness window
//! - `pool` - the client pool: shared socket, registry and broadcaster
//! - `listener` - the heartbeat receive loop
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐  recv_from   ┌──────────────────────────┐
//! │ heartbeat        │─────────────▶│  ClientRegistry          │
//! │ listener task    │ touch/remove │  (behind a single Mutex) │
//! └──────────────────┘              └────────────┬─────────────┘
//!                                                │ collect_live
//!                                   ┌────────────▼─────────────┐
//!                                   │  ClientPool::send        │
//!                                   │  (encode, fan out)       │
//!                                   └──────────────────────────┘
//! ```
//!
//! The registry is the only shared state. The listener and every `send`
//! call take the same mutex, so a heartbeat is never half-applied while a
//! broadcast pass decides who is live.

pub mod config;
pub mod listener;
pub mod pool;
