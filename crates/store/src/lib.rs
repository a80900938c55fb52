//! Durable snapshot store for coordinator state.
//!
//! One JSON document per peer, written atomically: serialize to a sibling
//! temporary file, fsync it, rename over the official name, fsync the
//! directory. A crash at any point leaves either the previous snapshot or
//! the new one on disk under the official name, never a torn file.

use std::fs::{create_dir_all, rename, File};
use std::io::{ErrorKind, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use meshkit_clock::MerkleClock;
use meshkit_primitives::{PeerId, WorkflowId, WorkflowRecord};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// Saving failed. The previously persisted snapshot, if any, is intact.
    #[error("failed to persist snapshot: {0}")]
    PersistenceFailed(#[from] std::io::Error),

    /// The on-disk snapshot exists but does not parse. Deliberately fatal
    /// at startup; silently truncating coordination history would be worse.
    #[error("snapshot at {path} is corrupt: {source}")]
    SnapshotCorrupt {
        path: Utf8PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Full on-disk image of a coordinator's state.
///
/// The workflow map is an `IndexMap` so the table's insertion order, which
/// the assignment engine iterates in, survives a save/load round trip.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub peer_id: PeerId,
    pub peer_list: Vec<PeerId>,
    pub merkle_clock: MerkleClock,
    pub workflows: IndexMap<WorkflowId, WorkflowRecord>,
    /// Unix seconds at save time.
    pub saved_at: f64,
}

impl Snapshot {
    #[must_use]
    pub fn new(
        peer_id: PeerId,
        peer_list: Vec<PeerId>,
        merkle_clock: MerkleClock,
        workflows: IndexMap<WorkflowId, WorkflowRecord>,
    ) -> Self {
        Self {
            peer_id,
            peer_list,
            merkle_clock,
            workflows,
            saved_at: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map_or(0.0, |d| d.as_secs_f64()),
        }
    }
}

/// Snapshot persistence rooted at a data directory.
#[derive(Clone, Debug)]
pub struct SnapshotStore {
    dir: Utf8PathBuf,
}

impl SnapshotStore {
    #[must_use]
    pub fn new(dir: impl Into<Utf8PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Utf8Path {
        &self.dir
    }

    /// Official path of a peer's snapshot.
    #[must_use]
    pub fn snapshot_path(&self, peer_id: &PeerId) -> Utf8PathBuf {
        self.dir.join(format!("coordinator_state_{peer_id}.json"))
    }

    /// Writes the snapshot atomically.
    ///
    /// Serialize -> `.tmp` sibling -> fsync file -> rename -> fsync directory.
    /// Any failure surfaces as [`StoreError::PersistenceFailed`] and leaves
    /// the previous snapshot untouched.
    pub fn save(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        create_dir_all(&self.dir)?;

        let path = self.snapshot_path(&snapshot.peer_id);
        let tmp_path = path.with_extension("tmp");

        let bytes = serde_json::to_vec_pretty(snapshot)
            .map_err(|e| StoreError::PersistenceFailed(e.into()))?;

        {
            let mut tmp = File::create(&tmp_path)?;
            tmp.write_all(&bytes)?;
            tmp.sync_all()?;
        }

        rename(&tmp_path, &path)?;

        // The rename itself must survive power loss, so the directory entry
        // is flushed as well.
        File::open(&self.dir)?.sync_all()?;

        debug!(%path, bytes = bytes.len(), "snapshot saved");
        Ok(())
    }

    /// Loads a peer's snapshot.
    ///
    /// A missing file is a normal first start (`Ok(None)`); an unparseable
    /// file is [`StoreError::SnapshotCorrupt`].
    pub fn load(&self, peer_id: &PeerId) -> Result<Option<Snapshot>, StoreError> {
        let path = self.snapshot_path(peer_id);

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(%path, "no snapshot found, starting empty");
                return Ok(None);
            }
            Err(e) => return Err(StoreError::PersistenceFailed(e)),
        };

        let snapshot: Snapshot = serde_json::from_str(&content)
            .map_err(|source| StoreError::SnapshotCorrupt { path: path.clone(), source })?;

        info!(%path, workflows = snapshot.workflows.len(), "snapshot loaded");
        Ok(Some(snapshot))
    }
}
