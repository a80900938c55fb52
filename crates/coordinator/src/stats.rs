use std::collections::BTreeMap;

use meshkit_primitives::PeerId;
use serde::{Deserialize, Serialize};

/// Operational summary returned by `get_stats`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CoordinatorStats {
    pub peer_id: PeerId,
    pub total_workflows: usize,
    pub queue_size: usize,
    pub peer_count: usize,
    /// This peer's logical clock value: the depth of its own append
    /// history (raised to the pairwise max on merge), not the total number
    /// of nodes in the log.
    pub merkle_clock_height: u64,
    /// Workflow counts keyed by status string.
    pub status_counts: BTreeMap<String, usize>,
    /// Workflows assigned to this peer.
    pub my_workflows: usize,
    /// Result of the most recent chain verification. `false` means the
    /// restored or merged log failed tamper checks; the coordinator keeps
    /// running and leaves resolution to the operator.
    pub clock_verified: bool,
}
