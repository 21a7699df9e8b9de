//! The control plane capability consumed by the reconciler.
//!
//! Implementations are injected so the reconciliation cycle can run
//! against the real cloud APIs or an in-memory backend.

use std::future::Future;
use std::pin::Pin;

use crate::error::ApiResult;
use crate::types::{InstanceGroupManagerState, NodePool, SetTargetPoolsResponse, TargetPoolIdentity};

/// Boxed future returned by every [`ControlPlane`] call.
pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = ApiResult<T>> + Send + 'a>>;

/// Read and write surface of the cloud control plane.
///
/// One implementation is built at startup and shared read-only by every
/// cycle.
pub trait ControlPlane: Send + Sync {
    /// List the node pools of a cluster, in control plane order.
    fn list_node_pools<'a>(
        &'a self,
        project: &'a str,
        zone: &'a str,
        cluster: &'a str,
    ) -> ApiFuture<'a, Vec<NodePool>>;

    /// Resolve the self link of a regional target pool.
    fn get_target_pool<'a>(
        &'a self,
        project: &'a str,
        region: &'a str,
        target_pool: &'a str,
    ) -> ApiFuture<'a, TargetPoolIdentity>;

    /// Read the target pools currently attached to an instance group manager.
    fn get_instance_group_manager<'a>(
        &'a self,
        project: &'a str,
        zone: &'a str,
        group: &'a str,
    ) -> ApiFuture<'a, InstanceGroupManagerState>;

    /// Replace the target pool list of an instance group manager.
    fn set_target_pools<'a>(
        &'a self,
        project: &'a str,
        zone: &'a str,
        group: &'a str,
        target_pools: &'a [String],
    ) -> ApiFuture<'a, SetTargetPoolsResponse>;
}
