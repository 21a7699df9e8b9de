//! One reconciliation cycle: discover, then reconcile each group in order.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use tpsync_core::{ClusterIdentity, ControlPlane, SyncConfig, TargetPoolIdentity};

use crate::context::GroupContext;
use crate::error::CycleResult;
use crate::membership::{GroupReport, MembershipReconciler};
use crate::topology::TopologyReader;

/// Result of a cycle that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub target_pool: TargetPoolIdentity,
    pub node_pools: usize,
    /// One entry per instance group, in processing order.
    pub groups: Vec<GroupReport>,
}

impl CycleReport {
    pub fn groups_checked(&self) -> usize {
        self.groups.len()
    }

    pub fn groups_updated(&self) -> usize {
        self.groups.iter().filter(|g| g.was_updated()).count()
    }

    pub fn warnings(&self) -> usize {
        self.groups.iter().map(|g| g.warnings.len()).sum()
    }

    pub fn converged(&self) -> bool {
        self.groups_updated() == 0
    }
}

/// The cycle body. Holds no state between runs.
pub struct ReconciliationCycle {
    cluster: ClusterIdentity,
    target_pool: String,
    topology: TopologyReader,
    membership: MembershipReconciler,
}

impl ReconciliationCycle {
    pub fn new(
        control_plane: Arc<dyn ControlPlane>,
        cluster: ClusterIdentity,
        target_pool: impl Into<String>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            cluster,
            target_pool: target_pool.into(),
            topology: TopologyReader::new(control_plane.clone(), call_timeout),
            membership: MembershipReconciler::new(control_plane, call_timeout),
        }
    }

    pub fn from_config(control_plane: Arc<dyn ControlPlane>, config: &SyncConfig) -> Self {
        Self::new(
            control_plane,
            config.cluster.clone(),
            config.target_pool.clone(),
            config.call_timeout,
        )
    }

    pub fn cluster(&self) -> &ClusterIdentity {
        &self.cluster
    }

    /// Run one cycle. Stops at the first error; groups after the failing
    /// one are not touched.
    pub async fn run(&self) -> CycleResult<CycleReport> {
        info!(
            project = %self.cluster.project_id,
            cluster = %self.cluster.cluster_id,
            target_pool = %self.target_pool,
            "running update"
        );

        let topology = self.topology.discover(&self.cluster, &self.target_pool).await?;

        let mut groups = Vec::with_capacity(topology.group_count());
        for node_pool in &topology.node_pools {
            for group in &node_pool.instance_groups {
                let ctx = GroupContext::new(&node_pool.name, group.short_name());
                let report = self
                    .membership
                    .reconcile(&self.cluster, ctx, &topology.target_pool)
                    .await?;
                groups.push(report);
            }
        }

        let report = CycleReport {
            target_pool: topology.target_pool,
            node_pools: topology.node_pools.len(),
            groups,
        };

        info!(
            node_pools = report.node_pools,
            checked = report.groups_checked(),
            updated = report.groups_updated(),
            warnings = report.warnings(),
            "update complete"
        );

        Ok(report)
    }
}
