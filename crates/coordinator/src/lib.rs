//! Peer-to-peer workflow coordination.
//!
//! A [`Coordinator`] glues the Merkle clock, the priority queue and the
//! workflow table together: it ingests workflow definitions, keeps the
//! peer roster, deterministically assigns pending workflows to peers
//! (Hamming distance between the combined clock/task hash and each peer's
//! id hash), and persists every state change as an atomic snapshot.
//!
//! ## Concurrency model
//!
//! One reader-writer lock over the whole state. Mutating handlers take it
//! exclusively, read handlers share it, and nothing outside this crate can
//! touch the clock, queue or table directly: the lock discipline is
//! enforceable because the internals never leak.
//!
//! The only blocking sections are reading a workflow file during
//! submission and writing the snapshot; the latter runs on the blocking
//! pool under a wall-clock budget.

use core::time::Duration;

use camino::Utf8PathBuf;
use meshkit_clock::MerkleClock;
use meshkit_config::{ConfigFile, DEFAULT_SAVE_TIMEOUT};
use meshkit_primitives::{PeerId, WorkflowId, WorkflowRecord, WorkflowStatus};
use meshkit_store::{SnapshotStore, StoreError};
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tokio::task::spawn_blocking;
use tokio::time::timeout;
use tracing::{error, info};

pub mod api;
pub mod errors;
pub mod stats;
pub mod workflow_file;

mod events;
mod state;
mod table;

pub use api::{ApiRequest, ApiResponse};
pub use errors::CoordinatorError;
pub use stats::CoordinatorStats;
pub use workflow_file::WorkflowTags;

use state::CoordinatorState;

/// A peer's workflow coordinator.
///
/// Fully owned by whoever constructs it; there are no process-wide
/// singletons. Construction takes the peer identity and the data
/// directory for snapshots.
#[derive(Debug)]
pub struct Coordinator {
    state: RwLock<CoordinatorState>,
    store: SnapshotStore,
    save_timeout: Duration,
}

impl Coordinator {
    /// Creates a coordinator, restoring any snapshot found in `data_dir`.
    ///
    /// A missing snapshot is a normal first start. A snapshot that exists
    /// but does not parse is fatal here: wiping coordination history
    /// silently is not an option.
    pub fn new(
        peer_id: PeerId,
        data_dir: impl Into<Utf8PathBuf>,
    ) -> Result<Self, CoordinatorError> {
        Self::with_save_timeout(peer_id, data_dir, DEFAULT_SAVE_TIMEOUT)
    }

    pub fn from_config(config: &ConfigFile) -> Result<Self, CoordinatorError> {
        Self::with_save_timeout(
            PeerId::from(config.peer_id.as_str()),
            config.data_dir.clone(),
            config.save_timeout,
        )
    }

    pub fn with_save_timeout(
        peer_id: PeerId,
        data_dir: impl Into<Utf8PathBuf>,
        save_timeout: Duration,
    ) -> Result<Self, CoordinatorError> {
        let store = SnapshotStore::new(data_dir);

        let state = match store.load(&peer_id)? {
            Some(snapshot) => CoordinatorState::from_snapshot(peer_id.clone(), snapshot),
            None => CoordinatorState::new(peer_id.clone()),
        };

        info!(peer_id = %peer_id, dir = %store.dir(), "coordinator initialized");

        Ok(Self {
            state: RwLock::new(state),
            store,
            save_timeout,
        })
    }

    /// Submits a workflow for coordinated execution and returns its id.
    ///
    /// If `source_ref` names a readable YAML file its name and labels are
    /// extracted; otherwise it is kept as an opaque reference. Parse
    /// failures do not fail the submission: the record carries the error.
    pub async fn submit_workflow(
        &self,
        source_ref: &str,
        name: Option<String>,
        inputs: Option<Map<String, Value>>,
        priority: Option<f64>,
    ) -> Result<WorkflowId, CoordinatorError> {
        let mut state = self.state.write().await;
        let id = state.submit(source_ref, name, inputs, priority)?;
        self.save(&state).await?;
        Ok(id)
    }

    /// Assigns every pending workflow to a peer.
    ///
    /// Selection is anchored on the clock head captured at entry, so the
    /// whole batch sees one consistent view of (head, pending set, roster).
    /// Returns the assigned ids; a partial result still saves.
    pub async fn assign_workflows(&self) -> Result<Vec<WorkflowId>, CoordinatorError> {
        let mut state = self.state.write().await;
        let assigned = state.assign_pending();

        if !assigned.is_empty() {
            self.save(&state).await?;
        }

        Ok(assigned)
    }

    pub async fn get_workflow_status(
        &self,
        id: &WorkflowId,
    ) -> Result<WorkflowRecord, CoordinatorError> {
        let state = self.state.read().await;
        state.get(id).cloned()
    }

    pub async fn list_workflows(
        &self,
        status: Option<WorkflowStatus>,
        peer: Option<&PeerId>,
    ) -> Vec<WorkflowRecord> {
        let state = self.state.read().await;
        state.list(status, peer)
    }

    /// Workflows assigned to this peer.
    pub async fn my_workflows(&self) -> Vec<WorkflowRecord> {
        let state = self.state.read().await;
        state.my_workflows()
    }

    /// Applies a status update under the state machine.
    ///
    /// Returns whether the call changed anything; repeating a terminal (or
    /// any identical) status is an idempotent no-op.
    pub async fn update_workflow_status(
        &self,
        id: &WorkflowId,
        status: WorkflowStatus,
        result: Option<Map<String, Value>>,
        error: Option<String>,
    ) -> Result<bool, CoordinatorError> {
        let mut state = self.state.write().await;
        let changed = state.update_status(id, status, result, error)?;

        if changed {
            self.save(&state).await?;
        }

        Ok(changed)
    }

    /// Adds a peer to the roster; idempotent.
    pub async fn add_peer(&self, peer: PeerId) -> Result<bool, CoordinatorError> {
        let mut state = self.state.write().await;
        let changed = state.add_peer(peer);

        if changed {
            self.save(&state).await?;
        }

        Ok(changed)
    }

    /// Removes a peer from the roster; idempotent, and the own peer is
    /// never removed.
    pub async fn remove_peer(&self, peer: &PeerId) -> Result<bool, CoordinatorError> {
        let mut state = self.state.write().await;
        let changed = state.remove_peer(peer);

        if changed {
            self.save(&state).await?;
        }

        Ok(changed)
    }

    /// Adopts coordination history from another peer's clock.
    ///
    /// The incoming clock is verified first; a clock that fails
    /// verification is rejected wholesale and local state stays untouched.
    pub async fn merge_clock(&self, other: &MerkleClock) -> Result<usize, CoordinatorError> {
        let mut state = self.state.write().await;

        let adopted = match state.merge_clock(other) {
            Ok(adopted) => adopted,
            Err(e) => {
                error!(peer = %other.peer_id, error = %e, "rejected clock merge");
                return Ok(0);
            }
        };

        if adopted > 0 {
            self.save(&state).await?;
        }

        Ok(adopted)
    }

    pub async fn stats(&self) -> CoordinatorStats {
        let state = self.state.read().await;
        state.stats()
    }

    /// Re-verifies the clock chain and records the result for stats.
    pub async fn verify_clock(&self) -> bool {
        let mut state = self.state.write().await;
        state.verify_clock()
    }

    /// Read-only tag extraction from a workflow source, without submitting.
    #[must_use]
    pub fn parse_workflow_tags(source_ref: &str) -> WorkflowTags {
        workflow_file::parse_source(source_ref)
    }

    /// Persists the current state, bounded by the save budget.
    ///
    /// Runs on the blocking pool; past the budget the handler fails with a
    /// persistence error and the previous snapshot remains authoritative.
    async fn save(&self, state: &CoordinatorState) -> Result<(), CoordinatorError> {
        let snapshot = state.to_snapshot();
        let store = self.store.clone();

        let outcome = timeout(self.save_timeout, spawn_blocking(move || store.save(&snapshot)));

        match outcome.await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(e))) => {
                error!(error = %e, "snapshot save failed");
                Err(e.into())
            }
            Ok(Err(join_error)) => {
                error!(error = %join_error, "snapshot save task failed");
                Err(StoreError::PersistenceFailed(std::io::Error::other(
                    join_error.to_string(),
                ))
                .into())
            }
            Err(_elapsed) => {
                error!(budget = ?self.save_timeout, "snapshot save exceeded budget");
                Err(StoreError::PersistenceFailed(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    format!("snapshot save exceeded {:?} budget", self.save_timeout),
                ))
                .into())
            }
        }
    }
}
