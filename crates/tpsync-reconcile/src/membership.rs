//! Per-instance-group membership reconciliation.
//!
//! ```text
//! Unchecked ──fetch──▶ Member              (no-op)
//!     │
//!     ├──fetch──▶ Absent ──write──▶ Updated
//!     │
//!     └── error ─────────────────▶ cycle aborts
//! ```
//!
//! The group's current pool list is fetched immediately before the
//! decision and never cached.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, trace, warn};

use tpsync_core::{
    ClusterIdentity, ControlPlane, InstanceGroupManagerState, OperationWarning, TargetPoolIdentity,
};

use crate::context::GroupContext;
use crate::deadline::with_deadline;
use crate::error::{CycleError, CycleResult};

/// What to do with one instance group's target pool list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MembershipPlan {
    /// Desired pool is already attached.
    Keep,
    /// Write this list: the existing entries, in order, plus the desired pool.
    Replace(Vec<String>),
}

/// Decide whether a write is needed. Membership is exact string equality.
pub fn plan_membership(
    state: &InstanceGroupManagerState,
    desired: &TargetPoolIdentity,
) -> MembershipPlan {
    if state.contains(desired) {
        MembershipPlan::Keep
    } else {
        MembershipPlan::Replace(state.with_appended(desired))
    }
}

/// Terminal state of one instance group in one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupOutcome {
    AlreadyMember,
    Updated { target_pools: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupReport {
    pub node_pool: String,
    pub instance_group: String,
    pub outcome: GroupOutcome,
    /// Warnings attached to the write, if one was issued.
    pub warnings: Vec<OperationWarning>,
}

impl GroupReport {
    pub fn was_updated(&self) -> bool {
        matches!(self.outcome, GroupOutcome::Updated { .. })
    }
}

pub struct MembershipReconciler {
    control_plane: Arc<dyn ControlPlane>,
    call_timeout: Duration,
}

impl MembershipReconciler {
    pub fn new(control_plane: Arc<dyn ControlPlane>, call_timeout: Duration) -> Self {
        Self {
            control_plane,
            call_timeout,
        }
    }

    /// Make sure `desired` is attached to the group named in `ctx`.
    ///
    /// Issues at most one write. An operation error payload in the write
    /// response is returned as [`CycleError::OperationFailed`]; warnings
    /// are logged and reported but do not fail the group.
    pub async fn reconcile(
        &self,
        cluster: &ClusterIdentity,
        ctx: GroupContext<'_>,
        desired: &TargetPoolIdentity,
    ) -> CycleResult<GroupReport> {
        info!(
            node_pool = ctx.node_pool,
            instance_group = ctx.instance_group,
            "processing instance group"
        );

        trace!(
            node_pool = ctx.node_pool,
            instance_group = ctx.instance_group,
            "reading instance group manager"
        );
        let state = with_deadline(
            "get_instance_group_manager",
            self.call_timeout,
            self.control_plane.get_instance_group_manager(
                &cluster.project_id,
                &cluster.zone,
                ctx.instance_group,
            ),
        )
        .await
        .map_err(|e| ctx.fetch_error(e))?;

        let target_pools = match plan_membership(&state, desired) {
            MembershipPlan::Keep => {
                debug!(
                    node_pool = ctx.node_pool,
                    instance_group = ctx.instance_group,
                    target_pool = %desired,
                    "instance group manager already has target pool"
                );
                return Ok(report(ctx, GroupOutcome::AlreadyMember, Vec::new()));
            }
            MembershipPlan::Replace(pools) => pools,
        };

        debug!(
            node_pool = ctx.node_pool,
            instance_group = ctx.instance_group,
            new_pools = ?target_pools,
            "computed new target pools"
        );
        info!(
            node_pool = ctx.node_pool,
            instance_group = ctx.instance_group,
            target_pool = %desired,
            "updating instance group manager target pools"
        );

        let resp = with_deadline(
            "set_target_pools",
            self.call_timeout,
            self.control_plane.set_target_pools(
                &cluster.project_id,
                &cluster.zone,
                ctx.instance_group,
                &target_pools,
            ),
        )
        .await
        .map_err(|e| ctx.update_error(e))?;

        for warning in &resp.warnings {
            warn!(
                node_pool = ctx.node_pool,
                instance_group = ctx.instance_group,
                code = %warning.code,
                message = %warning.message,
                "set target pools returned a warning"
            );
        }

        if resp.has_errors() {
            return Err(CycleError::OperationFailed {
                node_pool: ctx.node_pool.to_string(),
                group: ctx.instance_group.to_string(),
                errors: resp.errors,
            });
        }

        Ok(report(
            ctx,
            GroupOutcome::Updated { target_pools },
            resp.warnings,
        ))
    }
}

fn report(
    ctx: GroupContext<'_>,
    outcome: GroupOutcome,
    warnings: Vec<OperationWarning>,
) -> GroupReport {
    GroupReport {
        node_pool: ctx.node_pool.to_string(),
        instance_group: ctx.instance_group.to_string(),
        outcome,
        warnings,
    }
}
