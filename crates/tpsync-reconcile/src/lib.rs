//! tpsync-reconcile: keeps a target pool attached to every instance group
//! of a cluster.
//!
//! # Cycle
//!
//! ```text
//! ReconciliationCycle::run()
//!   ├── TopologyReader::discover()
//!   │     ├── list_node_pools(project, zone, cluster)
//!   │     └── get_target_pool(project, region, pool)   → self link
//!   └── for each node pool, for each instance group (listed order):
//!         MembershipReconciler::reconcile()
//!           ├── get_instance_group_manager()           → existing pools
//!           ├── member?  → no-op
//!           └── absent   → set_target_pools(existing ++ [self link])
//! ```
//!
//! The first error aborts the cycle. Nothing is retried inside a cycle;
//! the next tick of the [`Ticker`] is the retry. Every control plane call
//! runs under a per-call deadline.
//!
//! Membership changes are additive only: pools attached out-of-band are
//! never removed or reordered.

pub mod context;
pub mod cycle;
mod deadline;
pub mod error;
pub mod membership;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod schedule;
pub mod topology;

pub use context::GroupContext;
pub use cycle::{CycleReport, ReconciliationCycle};
pub use error::{CycleError, CycleResult};
pub use membership::{
    GroupOutcome, GroupReport, MembershipPlan, MembershipReconciler, plan_membership,
};
#[cfg(any(test, feature = "test-util"))]
pub use memory::{Call, InMemoryControlPlane, WriteRecord};
pub use schedule::{FixedDelay, LoopStats, TickFuture, Ticker, run_loop};
pub use topology::{Topology, TopologyReader};
