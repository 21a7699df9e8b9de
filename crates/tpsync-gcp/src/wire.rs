//! JSON shapes of the container and compute REST resources.
//!
//! Only the fields the reconciler reads are modelled; everything else in
//! the responses is ignored.

use serde::{Deserialize, Serialize};

use tpsync_core::{
    InstanceGroupManagerState, InstanceGroupRef, NodePool, OperationErrorDetail, OperationWarning,
    SetTargetPoolsResponse,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NodePoolList {
    #[serde(default)]
    pub node_pools: Vec<NodePoolResource>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NodePoolResource {
    pub name: String,
    #[serde(default)]
    pub instance_group_urls: Vec<String>,
}

impl From<NodePoolResource> for NodePool {
    fn from(np: NodePoolResource) -> Self {
        NodePool::new(
            np.name,
            np.instance_group_urls
                .into_iter()
                .map(InstanceGroupRef::new)
                .collect(),
        )
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TargetPoolResource {
    pub self_link: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InstanceGroupManagerResource {
    #[serde(default)]
    pub target_pools: Vec<String>,
}

impl From<InstanceGroupManagerResource> for InstanceGroupManagerState {
    fn from(igm: InstanceGroupManagerResource) -> Self {
        InstanceGroupManagerState::new(igm.target_pools)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SetTargetPoolsRequest<'a> {
    pub target_pools: &'a [String],
}

/// A compute `Operation`, trimmed to its error and warning payloads.
#[derive(Debug, Deserialize)]
pub(crate) struct Operation {
    #[serde(default)]
    pub error: Option<OperationError>,
    #[serde(default)]
    pub warnings: Vec<Message>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OperationError {
    #[serde(default)]
    pub errors: Vec<Message>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Message {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

impl From<Operation> for SetTargetPoolsResponse {
    fn from(op: Operation) -> Self {
        let errors = op
            .error
            .map(|e| e.errors)
            .unwrap_or_default()
            .into_iter()
            .map(|m| OperationErrorDetail {
                code: m.code,
                message: m.message,
            })
            .collect();
        let warnings = op
            .warnings
            .into_iter()
            .map(|m| OperationWarning {
                code: m.code,
                message: m.message,
            })
            .collect();
        SetTargetPoolsResponse { errors, warnings }
    }
}

/// Google API error envelope: `{"error": {"code": 404, "message": "..."}}`.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub message: String,
}
