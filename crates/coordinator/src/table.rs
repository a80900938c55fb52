//! In-memory workflow table.
//!
//! An insertion-ordered map of workflow records. The order matters: the
//! assignment engine enumerates pending workflows in submission order, so
//! two peers replaying the same history examine them identically.

use indexmap::IndexMap;
use meshkit_primitives::{PeerId, WorkflowId, WorkflowRecord, WorkflowStatus};
use serde_json::{Map, Value};

use crate::errors::CoordinatorError;

/// Outcome of a status update.
#[derive(Copy, Clone, Debug)]
pub(crate) struct StatusChange {
    /// Whether the call mutated the record. Repeating an update with the
    /// record's current status is a no-op, not an error.
    pub changed: bool,
    pub old_status: WorkflowStatus,
}

#[derive(Clone, Debug, Default)]
pub(crate) struct WorkflowTable {
    records: IndexMap<WorkflowId, WorkflowRecord>,
}

impl WorkflowTable {
    pub(crate) fn new() -> Self {
        Self {
            records: IndexMap::new(),
        }
    }

    pub(crate) fn from_records(records: IndexMap<WorkflowId, WorkflowRecord>) -> Self {
        Self { records }
    }

    pub(crate) fn records(&self) -> &IndexMap<WorkflowId, WorkflowRecord> {
        &self.records
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    /// Inserts a new record; a duplicate id is a conflict.
    pub(crate) fn insert(&mut self, record: WorkflowRecord) -> Result<(), CoordinatorError> {
        let id = record.workflow_id.clone();

        if self.records.contains_key(&id) {
            return Err(CoordinatorError::Conflict(id));
        }

        let _previous = self.records.insert(id, record);
        Ok(())
    }

    pub(crate) fn get(&self, id: &WorkflowId) -> Result<&WorkflowRecord, CoordinatorError> {
        self.records
            .get(id)
            .ok_or_else(|| CoordinatorError::NotFound(id.clone()))
    }

    /// Ids of pending workflows, in submission order.
    pub(crate) fn pending_ids(&self) -> Vec<WorkflowId> {
        self.records
            .iter()
            .filter(|(_, record)| record.status == WorkflowStatus::Pending)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Marks a pending workflow as assigned to `peer`.
    ///
    /// The assignment engine's fast path; equivalent to the pending ->
    /// assigned edge of the state machine, with the peer recorded.
    pub(crate) fn assign(
        &mut self,
        id: &WorkflowId,
        peer: PeerId,
    ) -> Result<(), CoordinatorError> {
        let record = self
            .records
            .get_mut(id)
            .ok_or_else(|| CoordinatorError::NotFound(id.clone()))?;

        if record.status != WorkflowStatus::Pending {
            return Err(CoordinatorError::IllegalTransition {
                from: record.status,
                to: WorkflowStatus::Assigned,
            });
        }

        record.status = WorkflowStatus::Assigned;
        record.assigned_peer = Some(peer);
        Ok(())
    }

    /// Applies the status state machine.
    ///
    /// `started_at` is stamped on the first arrival at `in_progress`,
    /// `completed_at` on the first arrival at `completed` or `failed`;
    /// neither is ever cleared or overwritten. A repeated identical status
    /// reports `changed: false` and leaves the record byte-identical.
    pub(crate) fn update_status(
        &mut self,
        id: &WorkflowId,
        status: WorkflowStatus,
        result: Option<Map<String, Value>>,
        error: Option<String>,
        now_nanos: u64,
    ) -> Result<StatusChange, CoordinatorError> {
        let record = self
            .records
            .get_mut(id)
            .ok_or_else(|| CoordinatorError::NotFound(id.clone()))?;

        let old_status = record.status;

        if status == old_status {
            return Ok(StatusChange {
                changed: false,
                old_status,
            });
        }

        if !old_status.can_transition(status) {
            return Err(CoordinatorError::IllegalTransition {
                from: old_status,
                to: status,
            });
        }

        record.status = status;

        // Cancelled workflows carry no owner.
        if status == WorkflowStatus::Cancelled {
            record.assigned_peer = None;
        }

        if status == WorkflowStatus::InProgress && record.started_at.is_none() {
            record.started_at = Some(now_nanos);
        }

        if matches!(status, WorkflowStatus::Completed | WorkflowStatus::Failed) {
            if record.completed_at.is_none() {
                record.completed_at = Some(now_nanos);
            }
            if let Some(result) = result {
                record.result = Some(result);
            }
            if let Some(error) = error {
                record.error = Some(error);
            }
        }

        Ok(StatusChange {
            changed: true,
            old_status,
        })
    }

    /// Filtered listing; both filters are conjunctive.
    pub(crate) fn list(
        &self,
        status: Option<WorkflowStatus>,
        peer: Option<&PeerId>,
    ) -> Vec<WorkflowRecord> {
        self.records
            .values()
            .filter(|record| status.is_none_or(|s| record.status == s))
            .filter(|record| peer.is_none_or(|p| record.assigned_peer.as_ref() == Some(p)))
            .cloned()
            .collect()
    }
}
