//! Live-client registry with recency ordering.
//!
//! The registry tracks every endpoint that has recently sent a heartbeat.
//! It pairs a recency-ordered doubly linked list (most recently heard from
//! at the front) with a hash index from endpoint to list position, so both
//! `touch` and `remove` are O(1): one hash lookup plus a link splice.
//!
//! The list lives in a slab: nodes are slots in a `Vec`, links are slot
//! indices, and freed slots are recycled through a free list. This gives
//! the O(1) splice of an intrusive list without raw pointers.
//!
//! # Invariants
//!
//! - The index and the list are always mutually consistent: every linked
//!   node has exactly one index entry pointing at its slot, and vice versa.
//!   No endpoint appears twice.
//! - List order is only a recency hint. Liveness is always re-checked
//!   against `last_seen` at read time, never inferred from position.
//!
//! # Eviction
//!
//! Stale records are reaped lazily, as a side effect of a broadcast pass.
//! There is no background sweep; if nothing is ever broadcast, stale
//! entries are retained until the next pass. Callers that need prompt
//! reaping must broadcast (or call [`ClientRegistry::collect_live`])
//! periodically.

use std::collections::HashMap;

use tracing::{debug, trace};

use crate::endpoint::EndpointId;

/// Default maximum age, in seconds, for a client to be considered live.
pub const LIVENESS_WINDOW_SECS: i64 = 10;

/// Liveness state for one endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientRecord {
    /// Identity of the remote client.
    pub endpoint: EndpointId,
    /// Unix timestamp (seconds) of the last datagram heard from it.
    pub last_seen: i64,
}

/// One slab slot: the record plus its list links.
#[derive(Debug)]
struct Node {
    record: ClientRecord,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Registry of live clients, ordered by recency of their last heartbeat.
///
/// The registry is deliberately free of I/O and clocks. Callers pass `now`
/// into every time-sensitive operation and supply the transmission callback
/// to [`ClientRegistry::broadcast_live`], which keeps the whole structure
/// testable without sockets.
///
/// The registry is not internally synchronized. Concurrent users must wrap
/// it in a mutex and hold the lock for the full duration of each operation,
/// in particular across the classify-then-mutate decision for an inbound
/// datagram.
#[derive(Debug)]
pub struct ClientRegistry {
    /// Slab of list nodes; `None` marks a free slot.
    nodes: Vec<Option<Node>>,
    /// Recycled slot indices.
    free: Vec<usize>,
    /// Endpoint to slab slot.
    index: HashMap<EndpointId, usize>,
    /// Front of the list (most recently heard from).
    head: Option<usize>,
    /// Back of the list (least recently heard from).
    tail: Option<usize>,
    /// Maximum record age, in seconds, to count as live.
    window_secs: i64,
}

impl ClientRegistry {
    /// Creates a registry with the default liveness window.
    pub fn new() -> Self {
        Self::with_window(LIVENESS_WINDOW_SECS)
    }

    /// Creates a registry with a custom liveness window in seconds.
    ///
    /// The window is fixed for the lifetime of the registry; the
    /// surrounding system chooses it once at construction.
    pub fn with_window(window_secs: i64) -> Self {
        Self {
            nodes: Vec::new(),
            free: Vec::new(),
            index: HashMap::new(),
            head: None,
            tail: None,
            window_secs,
        }
    }

    /// Returns the liveness window in seconds.
    pub fn window_secs(&self) -> i64 {
        self.window_secs
    }

    /// Returns the number of tracked clients, live or not.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Returns true if no clients are tracked.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Returns true if the endpoint currently has a record.
    pub fn contains(&self, endpoint: &EndpointId) -> bool {
        self.index.contains_key(endpoint)
    }

    /// Records a heartbeat from `endpoint` at time `now`.
    ///
    /// If the endpoint already has a record it is moved to the front of the
    /// recency order with a refreshed timestamp; otherwise a new record is
    /// inserted at the front. O(1) either way.
    pub fn touch(&mut self, endpoint: EndpointId, now: i64) {
        if let Some(&slot) = self.index.get(&endpoint) {
            self.unlink(slot);
            if let Some(node) = self.node_mut(slot) {
                node.record.last_seen = now;
            }
            self.link_front(slot);
            trace!(%endpoint, "client refreshed");
        } else {
            let slot = self.alloc(ClientRecord {
                endpoint,
                last_seen: now,
            });
            self.link_front(slot);
            self.index.insert(endpoint, slot);
            debug!(%endpoint, total = self.index.len(), "client registered");
        }
    }

    /// Removes the record for `endpoint`, if any.
    ///
    /// Returns whether a record existed. No-op on unknown endpoints.
    pub fn remove(&mut self, endpoint: &EndpointId) -> bool {
        match self.index.remove(endpoint) {
            Some(slot) => {
                self.unlink(slot);
                self.release(slot);
                debug!(%endpoint, total = self.index.len(), "client removed");
                true
            }
            None => false,
        }
    }

    /// Runs one broadcast pass over the full recency order, front to back.
    ///
    /// For each record whose age is within the liveness window, `send` is
    /// invoked with its endpoint; the first error aborts the entire pass
    /// and is propagated, leaving later endpoints untouched. Records whose
    /// age has reached the window are unlinked and dropped instead (lazy
    /// eviction) and the pass continues.
    ///
    /// Already-sent endpoints are not rolled back on failure: delivery is
    /// at-most-once and partial per call.
    pub fn broadcast_live<E, F>(&mut self, now: i64, mut send: F) -> Result<(), E>
    where
        F: FnMut(&EndpointId) -> Result<(), E>,
    {
        let mut cursor = self.head;
        while let Some(slot) = cursor {
            let (endpoint, age, next) = match self.node(slot) {
                Some(node) => (
                    node.record.endpoint,
                    now - node.record.last_seen,
                    node.next,
                ),
                None => break,
            };
            cursor = next;

            if age < self.window_secs {
                send(&endpoint)?;
            } else {
                debug!(%endpoint, age, "evicting stale client");
                self.index.remove(&endpoint);
                self.unlink(slot);
                self.release(slot);
            }
        }
        Ok(())
    }

    /// Snapshot form of [`ClientRegistry::broadcast_live`]: evicts stale
    /// records and returns the live endpoints in recency order.
    ///
    /// Used when transmission happens outside the registry lock; the
    /// eviction decision and the sends then run in separate critical
    /// sections, so an endpoint evicted here stays evicted even if a later
    /// send in the same call fails.
    pub fn collect_live(&mut self, now: i64) -> Vec<EndpointId> {
        let mut live = Vec::with_capacity(self.index.len());
        let result: Result<(), std::convert::Infallible> =
            self.broadcast_live(now, |endpoint| {
                live.push(*endpoint);
                Ok(())
            });
        match result {
            Ok(()) => {}
            Err(never) => match never {},
        }
        live
    }

    /// Iterates records front to back (most recently heard from first).
    pub fn iter(&self) -> impl Iterator<Item = &ClientRecord> + '_ {
        let mut cursor = self.head;
        std::iter::from_fn(move || {
            let slot = cursor?;
            let node = self.nodes.get(slot)?.as_ref()?;
            cursor = node.next;
            Some(&node.record)
        })
    }

    // ------------------------------------------------------------------
    // Slab + link plumbing
    // ------------------------------------------------------------------

    fn node(&self, slot: usize) -> Option<&Node> {
        self.nodes.get(slot).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, slot: usize) -> Option<&mut Node> {
        self.nodes.get_mut(slot).and_then(Option::as_mut)
    }

    /// Stores a record in a recycled or fresh slot. The slot is unlinked.
    fn alloc(&mut self, record: ClientRecord) -> usize {
        let node = Node {
            record,
            prev: None,
            next: None,
        };
        match self.free.pop() {
            Some(slot) => {
                if let Some(cell) = self.nodes.get_mut(slot) {
                    *cell = Some(node);
                }
                slot
            }
            None => {
                self.nodes.push(Some(node));
                self.nodes.len() - 1
            }
        }
    }

    /// Frees a slot for reuse. The slot must already be unlinked.
    fn release(&mut self, slot: usize) {
        if let Some(cell) = self.nodes.get_mut(slot) {
            if cell.take().is_some() {
                self.free.push(slot);
            }
        }
    }

    /// Splices a node out of the list, fixing neighbors and head/tail.
    fn unlink(&mut self, slot: usize) {
        let (prev, next) = match self.node(slot) {
            Some(node) => (node.prev, node.next),
            None => return,
        };

        match prev {
            Some(p) => {
                if let Some(node) = self.node_mut(p) {
                    node.next = next;
                }
            }
            None => self.head = next,
        }
        match next {
            Some(n) => {
                if let Some(node) = self.node_mut(n) {
                    node.prev = prev;
                }
            }
            None => self.tail = prev,
        }

        if let Some(node) = self.node_mut(slot) {
            node.prev = None;
            node.next = None;
        }
    }

    /// Links an unlinked node at the front of the list.
    fn link_front(&mut self, slot: usize) {
        let old_head = self.head;
        if let Some(node) = self.node_mut(slot) {
            node.prev = None;
            node.next = old_head;
        }
        if let Some(h) = old_head {
            if let Some(node) = self.node_mut(h) {
                node.prev = Some(slot);
            }
        }
        self.head = Some(slot);
        if self.tail.is_none() {
            self.tail = Some(slot);
        }
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}
