//! Log and error context for the instance group being reconciled.

use tpsync_core::ApiError;

use crate::error::CycleError;

/// The node pool and instance group a reconciler step is acting on.
///
/// Passed down explicitly so every log event and error names the group
/// it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupContext<'a> {
    pub node_pool: &'a str,
    pub instance_group: &'a str,
}

impl<'a> GroupContext<'a> {
    pub fn new(node_pool: &'a str, instance_group: &'a str) -> Self {
        Self {
            node_pool,
            instance_group,
        }
    }

    pub fn fetch_error(&self, source: ApiError) -> CycleError {
        CycleError::Fetch {
            node_pool: self.node_pool.to_string(),
            group: self.instance_group.to_string(),
            source,
        }
    }

    pub fn update_error(&self, source: ApiError) -> CycleError {
        CycleError::Update {
            node_pool: self.node_pool.to_string(),
            group: self.instance_group.to_string(),
            source,
        }
    }
}
