//! Cycle error types.

use thiserror::Error;

use tpsync_core::{ApiError, OperationErrorDetail};

pub type CycleResult<T> = Result<T, CycleError>;

/// The single error that aborted a reconciliation cycle.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("discovery failed: {0}")]
    Discovery(#[source] ApiError),

    #[error("failed to read instance group {group} (node pool {node_pool}): {source}")]
    Fetch {
        node_pool: String,
        group: String,
        source: ApiError,
    },

    #[error("failed to update instance group {group} (node pool {node_pool}): {source}")]
    Update {
        node_pool: String,
        group: String,
        source: ApiError,
    },

    #[error("set target pools on {group} (node pool {node_pool}) reported errors: {}", join_details(.errors))]
    OperationFailed {
        node_pool: String,
        group: String,
        errors: Vec<OperationErrorDetail>,
    },
}

impl CycleError {
    /// Short label for structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Discovery(_) => "discovery",
            Self::Fetch { .. } => "fetch",
            Self::Update { .. } | Self::OperationFailed { .. } => "update",
        }
    }
}

fn join_details(errors: &[OperationErrorDetail]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
