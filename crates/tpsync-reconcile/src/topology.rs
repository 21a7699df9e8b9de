//! Topology discovery: node pools, their instance groups and the
//! target pool self link.
//!
//! Read-only. Any failure aborts the cycle before a single write is
//! issued.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, trace};

use tpsync_core::{ClusterIdentity, ControlPlane, NodePool, TargetPoolIdentity};

use crate::deadline::with_deadline;
use crate::error::{CycleError, CycleResult};

/// What one cycle reconciles against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    pub node_pools: Vec<NodePool>,
    pub target_pool: TargetPoolIdentity,
}

impl Topology {
    /// Total number of instance groups across all node pools.
    pub fn group_count(&self) -> usize {
        self.node_pools.iter().map(|np| np.instance_groups.len()).sum()
    }
}

pub struct TopologyReader {
    control_plane: Arc<dyn ControlPlane>,
    call_timeout: Duration,
}

impl TopologyReader {
    pub fn new(control_plane: Arc<dyn ControlPlane>, call_timeout: Duration) -> Self {
        Self {
            control_plane,
            call_timeout,
        }
    }

    /// List node pools, then resolve the target pool self link.
    ///
    /// The self link is resolved fresh on every call so that a target
    /// pool recreated out-of-band is picked up by the next cycle.
    pub async fn discover(
        &self,
        cluster: &ClusterIdentity,
        target_pool: &str,
    ) -> CycleResult<Topology> {
        trace!(cluster = %cluster.cluster_id, "listing node pools");
        let node_pools = with_deadline(
            "list_node_pools",
            self.call_timeout,
            self.control_plane.list_node_pools(
                &cluster.project_id,
                &cluster.zone,
                &cluster.cluster_id,
            ),
        )
        .await
        .map_err(CycleError::Discovery)?;

        trace!(%target_pool, region = %cluster.region, "getting target pool self link");
        let target_pool = with_deadline(
            "get_target_pool",
            self.call_timeout,
            self.control_plane
                .get_target_pool(&cluster.project_id, &cluster.region, target_pool),
        )
        .await
        .map_err(CycleError::Discovery)?;

        let topology = Topology {
            node_pools,
            target_pool,
        };

        debug!(
            node_pools = topology.node_pools.len(),
            instance_groups = topology.group_count(),
            target_pool = %topology.target_pool,
            "topology discovered"
        );

        Ok(topology)
    }
}
