use meshkit_crypto::SelectionError;
use meshkit_primitives::{StatusParseError, WorkflowId, WorkflowStatus};
use meshkit_queue::QueueError;
use meshkit_store::StoreError;
use thiserror::Error;

/// Errors surfaced by coordinator operations.
///
/// Everything here is recoverable by the caller except
/// [`CoordinatorError::Store`] carrying `SnapshotCorrupt` at construction
/// time; a handler never takes the process down.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CoordinatorError {
    #[error("workflow not found: {0}")]
    NotFound(WorkflowId),

    #[error("workflow already submitted: {0}")]
    Conflict(WorkflowId),

    #[error("illegal status transition: {from} -> {to}")]
    IllegalTransition {
        from: WorkflowStatus,
        to: WorkflowStatus,
    },

    #[error(transparent)]
    InvalidStatus(#[from] StatusParseError),

    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
