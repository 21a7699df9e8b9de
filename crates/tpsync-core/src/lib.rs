//! tpsync-core: shared vocabulary for the target-pool reconciler.
//!
//! Holds the transient data model rebuilt on every reconciliation cycle,
//! the process configuration (flags + optional `tpsync.toml`), the error
//! types, and the [`ControlPlane`] capability the reconciler consumes.
//!
//! ```text
//! ClusterIdentity ─┐
//!                  ├─ ControlPlane::list_node_pools      → [NodePool]
//! target pool id ──┤  ControlPlane::get_target_pool      → TargetPoolIdentity
//!                  ├─ ControlPlane::get_instance_group_manager → InstanceGroupManagerState
//!                  └─ ControlPlane::set_target_pools     → SetTargetPoolsResponse
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod types;

pub use api::{ApiFuture, ControlPlane};
pub use config::{ConfigFile, SyncConfig};
pub use error::{ApiError, ApiResult, ConfigError, ConfigResult};
pub use types::*;
