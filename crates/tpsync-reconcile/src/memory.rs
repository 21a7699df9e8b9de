//! In-memory control plane.
//!
//! Applies writes to its own state so repeated cycles observe earlier
//! corrections, records every call, and can be told to fail or hang on a
//! given call. Used to exercise the reconciler without a cloud project.
//!
//! Only built for tests, or with the `test-util` feature.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tpsync_core::{
    ApiError, ApiFuture, ApiResult, ControlPlane, InstanceGroupManagerState, InstanceGroupRef,
    NodePool, OperationErrorDetail, OperationWarning, SetTargetPoolsResponse, TargetPoolIdentity,
};

/// Prefix used to build instance group URLs from short names.
pub const GROUP_URL_PREFIX: &str =
    "https://www.googleapis.com/compute/v1/projects/test/zones/test-a/instanceGroupManagers/";

/// A control plane call, as recorded by [`InMemoryControlPlane::calls`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Call {
    ListNodePools,
    GetTargetPool,
    GetInstanceGroupManager,
    SetTargetPools,
}

/// One `set_target_pools` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRecord {
    pub group: String,
    pub target_pools: Vec<String>,
}

#[derive(Default)]
struct Inner {
    node_pools: Vec<NodePool>,
    target_pools: HashMap<String, TargetPoolIdentity>,
    groups: HashMap<String, Vec<String>>,
    operation_errors: HashMap<String, Vec<OperationErrorDetail>>,
    operation_warnings: Vec<OperationWarning>,
    failing: Vec<Call>,
    hanging: Vec<Call>,
    calls: Vec<Call>,
    writes: Vec<WriteRecord>,
}

#[derive(Default)]
pub struct InMemoryControlPlane {
    inner: Mutex<Inner>,
}

impl InMemoryControlPlane {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a node pool backed by the named groups. Groups not yet known
    /// start with no target pools.
    pub fn with_node_pool(self, name: &str, groups: &[&str]) -> Self {
        {
            let mut inner = self.lock();
            let refs = groups
                .iter()
                .map(|g| InstanceGroupRef::new(format!("{GROUP_URL_PREFIX}{g}")))
                .collect();
            for g in groups {
                inner.groups.entry((*g).to_string()).or_default();
            }
            inner.node_pools.push(NodePool::new(name, refs));
        }
        self
    }

    pub fn with_target_pool(self, name: &str, self_link: &str) -> Self {
        self.set_target_pool(name, self_link);
        self
    }

    pub fn with_group(self, group: &str, target_pools: &[&str]) -> Self {
        self.set_group_pools(group, target_pools);
        self
    }

    pub fn failing(self, call: Call) -> Self {
        self.fail(call);
        self
    }

    pub fn hanging(self, call: Call) -> Self {
        self.lock().hanging.push(call);
        self
    }

    /// Overwrite a group's pools, as an out-of-band edit would.
    pub fn set_group_pools(&self, group: &str, target_pools: &[&str]) {
        self.lock().groups.insert(
            group.to_string(),
            target_pools.iter().map(|p| (*p).to_string()).collect(),
        );
    }

    /// Point `name` at a new self link, as recreating the pool would.
    pub fn set_target_pool(&self, name: &str, self_link: &str) {
        self.lock()
            .target_pools
            .insert(name.to_string(), TargetPoolIdentity::new(self_link));
    }

    pub fn group_pools(&self, group: &str) -> Option<Vec<String>> {
        self.lock().groups.get(group).cloned()
    }

    /// Make every subsequent `call` fail with a transport error.
    pub fn fail(&self, call: Call) {
        self.lock().failing.push(call);
    }

    pub fn clear_failures(&self) {
        let mut inner = self.lock();
        inner.failing.clear();
        inner.hanging.clear();
    }

    /// Errors returned in the operation for writes to `group`. A write
    /// that reports errors leaves the group unchanged.
    pub fn set_operation_errors(&self, group: &str, errors: Vec<OperationErrorDetail>) {
        self.lock().operation_errors.insert(group.to_string(), errors);
    }

    /// Warnings returned in every write operation.
    pub fn set_operation_warnings(&self, warnings: Vec<OperationWarning>) {
        self.lock().operation_warnings = warnings;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn writes(&self) -> Vec<WriteRecord> {
        self.lock().writes.clone()
    }

    pub fn write_count(&self) -> usize {
        self.lock().writes.len()
    }

    /// Record `call` and report whether it should fail or hang.
    fn begin(&self, call: Call) -> (Option<ApiError>, bool) {
        let mut inner = self.lock();
        inner.calls.push(call);
        let failure = inner
            .failing
            .contains(&call)
            .then(|| ApiError::Transport(format!("injected {call:?} failure")));
        (failure, inner.hanging.contains(&call))
    }

    fn respond<'a, T: Send + 'a>(hang: bool, result: ApiResult<T>) -> ApiFuture<'a, T> {
        Box::pin(async move {
            if hang {
                std::future::pending::<()>().await;
            }
            result
        })
    }
}

impl ControlPlane for InMemoryControlPlane {
    fn list_node_pools<'a>(
        &'a self,
        _project: &'a str,
        _zone: &'a str,
        _cluster: &'a str,
    ) -> ApiFuture<'a, Vec<NodePool>> {
        let (failure, hang) = self.begin(Call::ListNodePools);
        let result = match failure {
            Some(e) => Err(e),
            None => Ok(self.lock().node_pools.clone()),
        };
        Self::respond(hang, result)
    }

    fn get_target_pool<'a>(
        &'a self,
        _project: &'a str,
        _region: &'a str,
        target_pool: &'a str,
    ) -> ApiFuture<'a, TargetPoolIdentity> {
        let (failure, hang) = self.begin(Call::GetTargetPool);
        let result = match failure {
            Some(e) => Err(e),
            None => self
                .lock()
                .target_pools
                .get(target_pool)
                .cloned()
                .ok_or_else(|| ApiError::not_found(format!("target pool {target_pool}"))),
        };
        Self::respond(hang, result)
    }

    fn get_instance_group_manager<'a>(
        &'a self,
        _project: &'a str,
        _zone: &'a str,
        group: &'a str,
    ) -> ApiFuture<'a, InstanceGroupManagerState> {
        let (failure, hang) = self.begin(Call::GetInstanceGroupManager);
        let result = match failure {
            Some(e) => Err(e),
            None => self
                .lock()
                .groups
                .get(group)
                .cloned()
                .map(InstanceGroupManagerState::new)
                .ok_or_else(|| ApiError::not_found(format!("instance group manager {group}"))),
        };
        Self::respond(hang, result)
    }

    fn set_target_pools<'a>(
        &'a self,
        _project: &'a str,
        _zone: &'a str,
        group: &'a str,
        target_pools: &'a [String],
    ) -> ApiFuture<'a, SetTargetPoolsResponse> {
        let (failure, hang) = self.begin(Call::SetTargetPools);
        let result = match failure {
            Some(e) => Err(e),
            None => {
                let mut inner = self.lock();
                inner.writes.push(WriteRecord {
                    group: group.to_string(),
                    target_pools: target_pools.to_vec(),
                });
                let errors = inner.operation_errors.get(group).cloned().unwrap_or_default();
                if errors.is_empty() {
                    inner
                        .groups
                        .insert(group.to_string(), target_pools.to_vec());
                }
                Ok(SetTargetPoolsResponse {
                    errors,
                    warnings: inner.operation_warnings.clone(),
                })
            }
        };
        Self::respond(hang, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_are_applied_and_recorded() {
        let cp = InMemoryControlPlane::new().with_node_pool("pool-1", &["g1"]);
        let pools = vec!["poolX".to_string()];

        cp.set_target_pools("p", "z", "g1", &pools).await.unwrap();

        assert_eq!(cp.group_pools("g1").unwrap(), pools);
        assert_eq!(
            cp.writes(),
            vec![WriteRecord {
                group: "g1".into(),
                target_pools: pools
            }]
        );
    }

    #[tokio::test]
    async fn node_pool_groups_use_full_urls() {
        let cp = InMemoryControlPlane::new().with_node_pool("pool-1", &["g1"]);
        let pools = cp.list_node_pools("p", "z", "c").await.unwrap();

        let group = &pools[0].instance_groups[0];
        assert!(group.url().starts_with("https://"));
        assert_eq!(group.short_name(), "g1");
    }

    #[tokio::test]
    async fn injected_failures_can_be_cleared() {
        let cp = InMemoryControlPlane::new().failing(Call::ListNodePools);
        assert!(cp.list_node_pools("p", "z", "c").await.is_err());

        cp.clear_failures();
        assert!(cp.list_node_pools("p", "z", "c").await.is_ok());
        assert_eq!(cp.calls(), vec![Call::ListNodePools, Call::ListNodePools]);
    }
}
