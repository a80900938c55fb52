//! Shared primitive types for the meshkit coordination core.
//!
//! Everything here is plain data: identifiers, the workflow record and its
//! status machine, and the peer roster. No IO, no locking: those concerns
//! live in the crates that own them.

pub mod id;
pub mod roster;
pub mod workflow;

pub use id::{PeerId, WorkflowId};
pub use roster::PeerRoster;
pub use workflow::{
    StatusParseError, WorkflowRecord, WorkflowStatus, DEFAULT_PRIORITY, OFFLINE_TAG, P2P_TAG,
};
