use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::id::{PeerId, WorkflowId};

/// Reserved tag marking a workflow as eligible for mesh execution.
pub const P2P_TAG: &str = "p2p-workflow";
/// Reserved tag marking a workflow as eligible for offline mesh execution.
pub const OFFLINE_TAG: &str = "offline-workflow";

/// Default priority assigned to workflows submitted without one.
/// Lower values dequeue first.
pub const DEFAULT_PRIORITY: f64 = 5.0;

#[derive(Debug, Error)]
#[error("invalid workflow status: {0:?}")]
pub struct StatusParseError(pub String);

/// Lifecycle status of a workflow.
///
/// Legal transitions:
///
/// ```text
///   pending ──► assigned ──► in_progress ──► completed
///      │           │              │       └► failed
///      │           │              └► failed
///      │           └► cancelled
///      └► cancelled
/// ```
///
/// `completed`, `failed` and `cancelled` are terminal.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Pending,
    Assigned,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl WorkflowStatus {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Whether the state machine permits moving from `self` to `to`.
    ///
    /// Self-edges are not part of the machine; callers treat a repeated
    /// status as a no-op before consulting this.
    #[must_use]
    pub const fn can_transition(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Pending, Self::Assigned | Self::Cancelled)
                | (Self::Assigned, Self::InProgress | Self::Cancelled)
                | (Self::InProgress, Self::Completed | Self::Failed)
        )
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Assigned => "assigned",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl core::str::FromStr for WorkflowStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "assigned" => Ok(Self::Assigned),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(StatusParseError(other.to_owned())),
        }
    }
}

impl core::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A submitted unit of work and its full coordination history.
///
/// Records are never deleted; terminal workflows stay in the table so the
/// Merkle clock's audit trail always has something to point at.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRecord {
    pub workflow_id: WorkflowId,
    pub name: String,
    pub source_ref: String,
    #[serde(default)]
    pub inputs: Map<String, Value>,
    pub priority: f64,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    pub status: WorkflowStatus,
    pub assigned_peer: Option<PeerId>,
    /// Unix nanoseconds at submission.
    pub created_at: u64,
    /// Unix nanoseconds of the first transition into `in_progress`.
    pub started_at: Option<u64>,
    /// Unix nanoseconds of the first arrival at `completed` or `failed`.
    pub completed_at: Option<u64>,
    pub result: Option<Map<String, Value>>,
    pub error: Option<String>,
}

impl WorkflowRecord {
    #[must_use]
    pub fn new(
        workflow_id: WorkflowId,
        name: String,
        source_ref: String,
        created_at: u64,
    ) -> Self {
        Self {
            workflow_id,
            name,
            source_ref,
            inputs: Map::new(),
            priority: DEFAULT_PRIORITY,
            tags: BTreeSet::new(),
            status: WorkflowStatus::Pending,
            assigned_peer: None,
            created_at,
            started_at: None,
            completed_at: None,
            result: None,
            error: None,
        }
    }

    /// Whether the record carries one of the reserved mesh-execution tags.
    #[must_use]
    pub fn is_mesh_eligible(&self) -> bool {
        self.tags.contains(P2P_TAG) || self.tags.contains(OFFLINE_TAG)
    }
}
