//! Coordinator state and the assignment engine.
//!
//! One value owns everything a peer coordinates over: the workflow table,
//! the peer roster, the pending-work priority queue and the Merkle clock.
//! The [`crate::Coordinator`] wraps this in a single reader-writer lock, so
//! every method here runs either under a consistent read view or with
//! exclusive access: no operation ever observes a half-applied mutation.

use std::collections::{BTreeMap, HashMap};
use std::time::{SystemTime, UNIX_EPOCH};

use meshkit_clock::{ClockError, MerkleClock};
use meshkit_crypto::{derive_workflow_id, select_owner, task_hash};
use meshkit_primitives::{
    PeerId, PeerRoster, WorkflowId, WorkflowRecord, WorkflowStatus, DEFAULT_PRIORITY,
};
use meshkit_queue::{Handle, PriorityQueue};
use meshkit_store::Snapshot;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::errors::CoordinatorError;
use crate::stats::CoordinatorStats;
use crate::table::WorkflowTable;
use crate::{events, workflow_file};

#[derive(Debug)]
pub(crate) struct CoordinatorState {
    peer_id: PeerId,
    roster: PeerRoster,
    table: WorkflowTable,
    queue: PriorityQueue<WorkflowId>,
    handles: HashMap<WorkflowId, Handle>,
    clock: MerkleClock,
    clock_verified: bool,
}

impl CoordinatorState {
    pub(crate) fn new(peer_id: PeerId) -> Self {
        Self {
            roster: PeerRoster::new(peer_id.clone()),
            table: WorkflowTable::new(),
            queue: PriorityQueue::new(),
            handles: HashMap::new(),
            clock: MerkleClock::new(peer_id.clone()),
            clock_verified: true,
            peer_id,
        }
    }

    /// Restores state from a snapshot, re-queueing every pending workflow
    /// in table order and re-verifying the clock.
    pub(crate) fn from_snapshot(peer_id: PeerId, snapshot: Snapshot) -> Self {
        let roster = PeerRoster::from_peers(&peer_id, snapshot.peer_list);
        let table = WorkflowTable::from_records(snapshot.workflows);
        let clock = snapshot.merkle_clock;

        let clock_verified = clock.verify();
        if !clock_verified {
            // Tampering is reported, not fatal: the coordinator stays
            // usable and surfaces the failure through stats.
            warn!(peer_id = %peer_id, "restored merkle clock failed verification");
        }

        let mut queue = PriorityQueue::new();
        let mut handles = HashMap::new();
        for (id, record) in table.records() {
            if record.status == WorkflowStatus::Pending {
                let handle = queue.insert(record.priority, id.clone());
                let _previous = handles.insert(id.clone(), handle);
            }
        }

        info!(
            peer_id = %peer_id,
            workflows = table.len(),
            pending = queue.len(),
            "coordinator state restored from snapshot"
        );

        Self {
            peer_id,
            roster,
            table,
            queue,
            handles,
            clock,
            clock_verified,
        }
    }

    pub(crate) fn to_snapshot(&self) -> Snapshot {
        Snapshot::new(
            self.peer_id.clone(),
            self.roster.peers().to_vec(),
            self.clock.clone(),
            self.table.records().clone(),
        )
    }

    /// Creates a pending record, queues it and logs the submission.
    pub(crate) fn submit(
        &mut self,
        source_ref: &str,
        name: Option<String>,
        inputs: Option<Map<String, Value>>,
        priority: Option<f64>,
    ) -> Result<WorkflowId, CoordinatorError> {
        let now_nanos = unix_nanos();
        let metadata = workflow_file::parse_source(source_ref);

        let id = derive_workflow_id(&self.peer_id, now_nanos, source_ref);
        let resolved_name = name
            .or(metadata.name)
            .unwrap_or_else(|| source_ref.to_owned());

        let mut record =
            WorkflowRecord::new(id.clone(), resolved_name, source_ref.to_owned(), now_nanos);
        record.inputs = inputs.unwrap_or_default();
        record.priority = priority.unwrap_or(DEFAULT_PRIORITY);
        record.tags = metadata.tags;
        record.error = metadata.error;

        let priority = record.priority;
        self.table.insert(record)?;

        let handle = self.queue.insert(priority, id.clone());
        let _previous = self.handles.insert(id.clone(), handle);

        let _node = self
            .clock
            .append(events::workflow_submitted(&id, &self.peer_id, unix_seconds()));

        info!(workflow_id = %id, priority, "workflow submitted");
        Ok(id)
    }

    /// The assignment engine.
    ///
    /// Examines the whole pending set against the clock head captured at
    /// entry: the head does not advance between workflows within one call,
    /// so a batch maps exactly as it would one-at-a-time on a frozen log.
    /// Per-workflow selection failures leave that workflow pending and the
    /// loop moving; returns the ids that were assigned.
    pub(crate) fn assign_pending(&mut self) -> Vec<WorkflowId> {
        let Some(head) = self.clock.head().map(ToOwned::to_owned) else {
            // Nothing has ever been logged; selection has no anchor.
            warn!("merkle clock is empty, no assignments possible");
            return Vec::new();
        };

        let mut assigned = Vec::new();

        for id in self.table.pending_ids() {
            let (name, priority) = match self.table.get(&id) {
                Ok(record) => (record.name.clone(), record.priority),
                Err(_) => continue,
            };

            let task = task_hash(&id, &name, priority);

            match select_owner(&head, &task, self.roster.peers()) {
                Ok((peer, distance)) => {
                    if let Err(e) = self.table.assign(&id, peer.clone()) {
                        warn!(workflow_id = %id, error = %e, "failed to mark assignment");
                        continue;
                    }

                    let _node = self.clock.append(events::workflow_assigned(
                        &id,
                        &peer,
                        distance,
                        unix_seconds(),
                    ));

                    if let Some(handle) = self.handles.remove(&id) {
                        if let Err(e) = self.queue.remove(handle) {
                            debug!(workflow_id = %id, error = %e, "queue entry already gone");
                        }
                    }

                    info!(workflow_id = %id, peer = %peer, distance, "workflow assigned");
                    assigned.push(id);
                }
                Err(e) => {
                    warn!(workflow_id = %id, error = %e, "failed to assign workflow");
                }
            }
        }

        assigned
    }

    pub(crate) fn get(&self, id: &WorkflowId) -> Result<&WorkflowRecord, CoordinatorError> {
        self.table.get(id)
    }

    pub(crate) fn list(
        &self,
        status: Option<WorkflowStatus>,
        peer: Option<&PeerId>,
    ) -> Vec<WorkflowRecord> {
        self.table.list(status, peer)
    }

    pub(crate) fn my_workflows(&self) -> Vec<WorkflowRecord> {
        self.table.list(None, Some(&self.peer_id))
    }

    /// Applies a status update, dropping the queue entry when a workflow
    /// leaves `pending` and logging the change. Returns whether anything
    /// changed.
    pub(crate) fn update_status(
        &mut self,
        id: &WorkflowId,
        status: WorkflowStatus,
        result: Option<Map<String, Value>>,
        error: Option<String>,
    ) -> Result<bool, CoordinatorError> {
        let change = self
            .table
            .update_status(id, status, result, error, unix_nanos())?;

        if !change.changed {
            debug!(workflow_id = %id, status = %status, "status unchanged");
            return Ok(false);
        }

        if change.old_status == WorkflowStatus::Pending {
            if let Some(handle) = self.handles.remove(id) {
                if let Err(e) = self.queue.remove(handle) {
                    debug!(workflow_id = %id, error = %e, "queue entry already gone");
                }
            }
        }

        let _node = self.clock.append(events::workflow_status_changed(
            id,
            change.old_status,
            status,
            &self.peer_id,
            unix_seconds(),
        ));

        info!(
            workflow_id = %id,
            from = %change.old_status,
            to = %status,
            "workflow status changed"
        );
        Ok(true)
    }

    /// Adds a peer to the roster. Idempotent; only an actual change is
    /// logged to the clock.
    pub(crate) fn add_peer(&mut self, peer: PeerId) -> bool {
        if !self.roster.add(peer.clone()) {
            return false;
        }

        let _node = self
            .clock
            .append(events::peer_added(&peer, unix_seconds()));

        info!(peer = %peer, "peer added to roster");
        true
    }

    /// Removes a peer from the roster. The owning peer cannot be removed.
    pub(crate) fn remove_peer(&mut self, peer: &PeerId) -> bool {
        if !self.roster.remove(&self.peer_id, peer) {
            return false;
        }

        let _node = self
            .clock
            .append(events::peer_removed(peer, unix_seconds()));

        info!(peer = %peer, "peer removed from roster");
        true
    }

    /// Adopts another peer's clock nodes. An unverifiable clock is rejected
    /// and local state is untouched.
    pub(crate) fn merge_clock(&mut self, other: &MerkleClock) -> Result<usize, ClockError> {
        let adopted = self.clock.merge(other)?;
        if adopted > 0 {
            info!(peer = %other.peer_id, adopted, "merged clock nodes");
        }
        Ok(adopted)
    }

    pub(crate) fn stats(&self) -> CoordinatorStats {
        let mut status_counts: BTreeMap<String, usize> = BTreeMap::new();
        for record in self.table.records().values() {
            *status_counts
                .entry(record.status.as_str().to_owned())
                .or_insert(0) += 1;
        }

        let my_workflows = self
            .table
            .records()
            .values()
            .filter(|record| record.assigned_peer.as_ref() == Some(&self.peer_id))
            .count();

        CoordinatorStats {
            peer_id: self.peer_id.clone(),
            total_workflows: self.table.len(),
            queue_size: self.queue.len(),
            peer_count: self.roster.len(),
            // Deliberately the author-local counter, not the node count:
            // merges raise it to the pairwise max, so it tracks this peer's
            // view of history depth rather than global event totals.
            merkle_clock_height: self.clock.logical_clock,
            status_counts,
            my_workflows,
            clock_verified: self.clock_verified,
        }
    }

    /// Re-runs full chain verification and records the result for stats.
    pub(crate) fn verify_clock(&mut self) -> bool {
        self.clock_verified = self.clock.verify();
        if !self.clock_verified {
            warn!("merkle clock failed verification");
        }
        self.clock_verified
    }
}

fn unix_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
}

fn unix_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0.0, |d| d.as_secs_f64())
}
