//! Merkle clock: a per-peer append-only, hash-linked log of coordination
//! events.
//!
//! Each node references its predecessor by hash, so the log is
//! tamper-evident: rewriting any event breaks every hash after it. The
//! logical counter gives causal ordering for the owning peer; wall-clock
//! timestamps are recorded for operators but never used to order appends.
//!
//! ## Core concepts
//!
//! - **MerkleNode**: one coordination event, hashed over its canonical JSON
//! - **MerkleClock**: the per-peer chain, its head hash and logical counter
//! - **merge**: adopt another peer's nodes for state exchange: audit-grade
//!   reconciliation, not a CRDT

use std::collections::HashSet;
use std::time::{SystemTime, UNIX_EPOCH};

use meshkit_crypto::{canonical_json, content_hash};
use meshkit_primitives::PeerId;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClockError {
    /// The other clock failed verification; nothing was merged.
    #[error("refusing to merge: clock of peer {0} failed verification")]
    Corrupt(PeerId),
}

/// One event in the clock.
///
/// `hash` covers the other five fields via canonical JSON, so key order in
/// `payload` never affects it. `parent_hash` is empty for the genesis node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MerkleNode {
    /// Unix seconds at append time. Informational only.
    pub timestamp: f64,
    /// Author of the event.
    pub peer_id: PeerId,
    /// Event payload.
    pub payload: Map<String, Value>,
    /// Hash of the author's previous node, or empty for genesis.
    pub parent_hash: String,
    /// Author-local monotonic counter.
    pub logical_clock: u64,
    /// sha256 of the canonical JSON of the five fields above.
    pub hash: String,
}

impl MerkleNode {
    fn build(
        timestamp: f64,
        peer_id: PeerId,
        payload: Map<String, Value>,
        parent_hash: String,
        logical_clock: u64,
    ) -> Self {
        let mut node = Self {
            timestamp,
            peer_id,
            payload,
            parent_hash,
            logical_clock,
            hash: String::new(),
        };
        node.hash = node.compute_hash();
        node
    }

    /// Recomputes the hash from the node's fields.
    #[must_use]
    pub fn compute_hash(&self) -> String {
        let content = json!({
            "timestamp": self.timestamp,
            "peer_id": self.peer_id,
            "payload": self.payload,
            "parent_hash": self.parent_hash,
            "logical_clock": self.logical_clock,
        });

        content_hash(canonical_json(&content))
    }
}

/// Append-only hash-linked log owned by a single peer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MerkleClock {
    pub peer_id: PeerId,
    pub head_hash: Option<String>,
    pub logical_clock: u64,
    pub nodes: Vec<MerkleNode>,
}

impl MerkleClock {
    #[must_use]
    pub fn new(peer_id: PeerId) -> Self {
        Self {
            peer_id,
            head_hash: None,
            logical_clock: 0,
            nodes: Vec::new(),
        }
    }

    /// Appends an event and returns the new node.
    ///
    /// The whole increment -> link -> hash -> push -> swap-head sequence runs
    /// under the caller's exclusive borrow, so appends can never interleave
    /// or lose ordering.
    pub fn append(&mut self, payload: Map<String, Value>) -> &MerkleNode {
        self.logical_clock += 1;

        let node = MerkleNode::build(
            unix_seconds(),
            self.peer_id.clone(),
            payload,
            self.head_hash.clone().unwrap_or_default(),
            self.logical_clock,
        );

        self.head_hash = Some(node.hash.clone());
        self.nodes.push(node);

        self.nodes
            .last()
            .expect("push above guarantees a last node")
    }

    /// Head hash, or `None` for an empty clock.
    #[must_use]
    pub fn head(&self) -> Option<&str> {
        self.head_hash.as_deref()
    }

    /// Most recent node, or `None` for an empty clock.
    #[must_use]
    pub fn latest(&self) -> Option<&MerkleNode> {
        self.nodes.last()
    }

    /// Number of nodes in the log.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Recomputes every node's hash and checks every parent link.
    ///
    /// Returns `true` only if both hold for the whole chain. An empty clock
    /// is trivially valid.
    #[must_use]
    pub fn verify(&self) -> bool {
        let mut previous: Option<&str> = None;

        for node in &self.nodes {
            if node.hash != node.compute_hash() {
                return false;
            }

            if let Some(parent) = previous {
                if node.parent_hash != parent {
                    return false;
                }
            }

            previous = Some(&node.hash);
        }

        true
    }

    /// Adopts every node of `other` not already present, then re-sorts the
    /// combined log by `(logical_clock, timestamp)` and moves the head to
    /// the last node. The logical counter is raised to the pairwise max.
    ///
    /// Existing nodes are never rewritten; this reconciles state for audit
    /// purposes, it does not splice chains. An unverifiable `other` is
    /// rejected wholesale and local state is left untouched.
    pub fn merge(&mut self, other: &Self) -> Result<usize, ClockError> {
        if !other.verify() {
            return Err(ClockError::Corrupt(other.peer_id.clone()));
        }

        let known: HashSet<&str> = self.nodes.iter().map(|n| n.hash.as_str()).collect();
        let adopted: Vec<MerkleNode> = other
            .nodes
            .iter()
            .filter(|n| !known.contains(n.hash.as_str()))
            .cloned()
            .collect();
        drop(known);

        let count = adopted.len();
        if count == 0 && self.logical_clock >= other.logical_clock {
            return Ok(0);
        }

        self.nodes.extend(adopted);
        self.nodes.sort_by(|a, b| {
            a.logical_clock
                .cmp(&b.logical_clock)
                .then_with(|| a.timestamp.total_cmp(&b.timestamp))
        });

        self.head_hash = self.nodes.last().map(|n| n.hash.clone());
        self.logical_clock = self.logical_clock.max(other.logical_clock);

        Ok(count)
    }
}

fn unix_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0.0, |d| d.as_secs_f64())
}
