//! Clock event payloads.
//!
//! Every coordination event appended to the Merkle clock goes through one
//! of these constructors so payload shapes stay uniform across peers (the
//! node hash covers the payload, so shape drift would desynchronise
//! verification tooling).

use meshkit_primitives::{PeerId, WorkflowId, WorkflowStatus};
use serde_json::{json, Map, Value};

fn payload(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

pub(crate) fn workflow_submitted(
    workflow_id: &WorkflowId,
    peer_id: &PeerId,
    timestamp: f64,
) -> Map<String, Value> {
    payload(json!({
        "event": "workflow_submitted",
        "workflow_id": workflow_id,
        "peer_id": peer_id,
        "timestamp": timestamp,
    }))
}

pub(crate) fn workflow_assigned(
    workflow_id: &WorkflowId,
    peer_id: &PeerId,
    hamming_distance: usize,
    timestamp: f64,
) -> Map<String, Value> {
    payload(json!({
        "event": "workflow_assigned",
        "workflow_id": workflow_id,
        "peer_id": peer_id,
        "hamming_distance": hamming_distance,
        "timestamp": timestamp,
    }))
}

pub(crate) fn workflow_status_changed(
    workflow_id: &WorkflowId,
    old_status: WorkflowStatus,
    new_status: WorkflowStatus,
    peer_id: &PeerId,
    timestamp: f64,
) -> Map<String, Value> {
    payload(json!({
        "event": "workflow_status_changed",
        "workflow_id": workflow_id,
        "old_status": old_status.as_str(),
        "new_status": new_status.as_str(),
        "peer_id": peer_id,
        "timestamp": timestamp,
    }))
}

pub(crate) fn peer_added(peer_id: &PeerId, timestamp: f64) -> Map<String, Value> {
    payload(json!({
        "event": "peer_added",
        "peer_id": peer_id,
        "timestamp": timestamp,
    }))
}

pub(crate) fn peer_removed(peer_id: &PeerId, timestamp: f64) -> Map<String, Value> {
    payload(json!({
        "event": "peer_removed",
        "peer_id": peer_id,
        "timestamp": timestamp,
    }))
}
