//! Transport-agnostic RPC surface.
//!
//! CLI, HTTP and MCP collaborators all speak this envelope: a serde
//! request enum, a serde response enum, and one dispatcher. Status values
//! cross the boundary as strings so an unknown status surfaces as
//! `InvalidStatus` here rather than as a deserialization failure in the
//! transport.

use core::str::FromStr;

use meshkit_primitives::{PeerId, WorkflowId, WorkflowRecord, WorkflowStatus};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::CoordinatorError;
use crate::stats::CoordinatorStats;
use crate::workflow_file::WorkflowTags;
use crate::Coordinator;

#[derive(Serialize, Deserialize, Debug)]
pub enum ApiRequest {
    SubmitWorkflow {
        source_ref: String,
        name: Option<String>,
        inputs: Option<Map<String, Value>>,
        priority: Option<f64>,
    },
    AssignWorkflows,
    GetWorkflowStatus {
        workflow_id: String,
    },
    ListWorkflows {
        status: Option<String>,
        peer: Option<String>,
    },
    UpdateWorkflowStatus {
        workflow_id: String,
        status: String,
        result: Option<Map<String, Value>>,
        error: Option<String>,
    },
    AddPeer {
        peer_id: String,
    },
    RemovePeer {
        peer_id: String,
    },
    GetMyWorkflows,
    GetStats,
    ParseWorkflowTags {
        source_ref: String,
    },
}

#[derive(Serialize, Deserialize, Debug)]
pub enum ApiResponse {
    WorkflowSubmitted { workflow_id: WorkflowId },
    WorkflowsAssigned { workflow_ids: Vec<WorkflowId> },
    WorkflowStatus(Box<WorkflowRecord>),
    Workflows(Vec<WorkflowRecord>),
    StatusUpdated { changed: bool },
    PeerAdded { changed: bool },
    PeerRemoved { changed: bool },
    Stats(CoordinatorStats),
    WorkflowTags(WorkflowTags),
}

impl Coordinator {
    /// Dispatches one envelope request. Transports wrap exactly this.
    pub async fn handle(&self, request: ApiRequest) -> Result<ApiResponse, CoordinatorError> {
        match request {
            ApiRequest::SubmitWorkflow {
                source_ref,
                name,
                inputs,
                priority,
            } => {
                let workflow_id = self
                    .submit_workflow(&source_ref, name, inputs, priority)
                    .await?;
                Ok(ApiResponse::WorkflowSubmitted { workflow_id })
            }
            ApiRequest::AssignWorkflows => {
                let workflow_ids = self.assign_workflows().await?;
                Ok(ApiResponse::WorkflowsAssigned { workflow_ids })
            }
            ApiRequest::GetWorkflowStatus { workflow_id } => {
                let record = self
                    .get_workflow_status(&WorkflowId::new(workflow_id))
                    .await?;
                Ok(ApiResponse::WorkflowStatus(Box::new(record)))
            }
            ApiRequest::ListWorkflows { status, peer } => {
                let status = status
                    .as_deref()
                    .map(WorkflowStatus::from_str)
                    .transpose()?;
                let peer = peer.map(PeerId::from);
                Ok(ApiResponse::Workflows(
                    self.list_workflows(status, peer.as_ref()).await,
                ))
            }
            ApiRequest::UpdateWorkflowStatus {
                workflow_id,
                status,
                result,
                error,
            } => {
                let status = WorkflowStatus::from_str(&status)?;
                let changed = self
                    .update_workflow_status(&WorkflowId::new(workflow_id), status, result, error)
                    .await?;
                Ok(ApiResponse::StatusUpdated { changed })
            }
            ApiRequest::AddPeer { peer_id } => {
                let changed = self.add_peer(PeerId::from(peer_id)).await?;
                Ok(ApiResponse::PeerAdded { changed })
            }
            ApiRequest::RemovePeer { peer_id } => {
                let changed = self.remove_peer(&PeerId::from(peer_id)).await?;
                Ok(ApiResponse::PeerRemoved { changed })
            }
            ApiRequest::GetMyWorkflows => Ok(ApiResponse::Workflows(self.my_workflows().await)),
            ApiRequest::GetStats => Ok(ApiResponse::Stats(self.stats().await)),
            ApiRequest::ParseWorkflowTags { source_ref } => Ok(ApiResponse::WorkflowTags(
                Self::parse_workflow_tags(&source_ref),
            )),
        }
    }
}
