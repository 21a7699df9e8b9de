//! tpsync-gcp: Google Cloud implementation of the control plane.
//!
//! Talks JSON over HTTPS to two APIs:
//!
//! | API | Call | Path |
//! |---|---|---|
//! | container v1beta1 | list node pools | `GET /v1beta1/projects/{p}/zones/{z}/clusters/{c}/nodePools` |
//! | compute v1 | get target pool | `GET /compute/v1/projects/{p}/regions/{r}/targetPools/{t}` |
//! | compute v1 | get instance group manager | `GET /compute/v1/projects/{p}/zones/{z}/instanceGroupManagers/{g}` |
//! | compute v1 | set target pools | `POST /compute/v1/projects/{p}/zones/{z}/instanceGroupManagers/{g}/setTargetPools` |
//!
//! Requests carry a bearer token from a [`TokenSource`]. The client is
//! built once at startup with [`GcpControlPlane::connect`], which fetches
//! a first token so that credential problems surface before the
//! reconciliation loop starts.

pub mod auth;
pub mod client;
mod wire;

pub use auth::{
    AuthError, CLOUD_PLATFORM_SCOPE, COMPUTE_SCOPE, MetadataServer, StaticToken, TokenSource,
};
pub use client::{Endpoints, GcpControlPlane};
