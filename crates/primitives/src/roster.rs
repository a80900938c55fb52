use serde::{Deserialize, Serialize};

use crate::id::PeerId;

/// Ordered roster of peers participating in coordination.
///
/// The owning peer is inserted at construction and cannot be removed. Order
/// is insertion order; owner selection does not depend on it, but keeping it
/// stable makes snapshots diff cleanly.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerRoster {
    peers: Vec<PeerId>,
}

impl PeerRoster {
    #[must_use]
    pub fn new(own_peer: PeerId) -> Self {
        Self {
            peers: vec![own_peer],
        }
    }

    /// Restores a roster from a snapshot, making sure `own_peer` is present.
    #[must_use]
    pub fn from_peers(own_peer: &PeerId, mut peers: Vec<PeerId>) -> Self {
        if !peers.contains(own_peer) {
            peers.insert(0, own_peer.clone());
        }

        Self { peers }
    }

    /// Adds a peer. Returns `false` if it was already present.
    pub fn add(&mut self, peer: PeerId) -> bool {
        if self.peers.contains(&peer) {
            return false;
        }

        self.peers.push(peer);
        true
    }

    /// Removes a peer. Returns `false` if it was absent or is the owner.
    pub fn remove(&mut self, own_peer: &PeerId, peer: &PeerId) -> bool {
        if peer == own_peer {
            return false;
        }

        let before = self.peers.len();
        self.peers.retain(|p| p != peer);
        self.peers.len() != before
    }

    #[must_use]
    pub fn contains(&self, peer: &PeerId) -> bool {
        self.peers.contains(peer)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    #[must_use]
    pub fn peers(&self) -> &[PeerId] {
        &self.peers
    }
}
