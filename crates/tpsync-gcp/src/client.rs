//! REST client for the container and compute APIs.

use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::trace;
use url::Url;

use tpsync_core::{
    ApiError, ApiFuture, ApiResult, ControlPlane, InstanceGroupManagerState, NodePool,
    SetTargetPoolsResponse, TargetPoolIdentity,
};

use crate::auth::{AuthError, TokenSource};
use crate::wire::{
    ErrorEnvelope, InstanceGroupManagerResource, NodePoolList, Operation, SetTargetPoolsRequest,
    TargetPoolResource,
};

const USER_AGENT: &str = concat!("tpsync/", env!("CARGO_PKG_VERSION"));

/// Base URLs of the two APIs. Overridable for emulators and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub container: Url,
    pub compute: Url,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            container: Url::parse("https://container.googleapis.com/")
                .expect("valid static URL"),
            compute: Url::parse("https://compute.googleapis.com/").expect("valid static URL"),
        }
    }
}

/// Authenticated client shared by every reconciliation cycle.
#[derive(Clone)]
pub struct GcpControlPlane {
    http: reqwest::Client,
    tokens: Arc<dyn TokenSource>,
    endpoints: Endpoints,
}

impl GcpControlPlane {
    /// Build the client and fetch a first token to prove the credentials
    /// work.
    ///
    /// `request_timeout` is a transport-level ceiling; the reconciler
    /// applies its own per-call deadline on top.
    pub async fn connect(
        tokens: Arc<dyn TokenSource>,
        endpoints: Endpoints,
        request_timeout: Duration,
    ) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| AuthError::Client(e.to_string()))?;

        tokens.token().await?;

        Ok(Self {
            http,
            tokens,
            endpoints,
        })
    }

    async fn get<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        resource: String,
        url: Url,
    ) -> ApiResult<T> {
        trace!(%url, operation, "GET");
        self.send(operation, resource, self.http.get(url)).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        resource: String,
        request: reqwest::RequestBuilder,
    ) -> ApiResult<T> {
        let token = self
            .tokens
            .token()
            .await
            .map_err(|e| ApiError::Auth(e.to_string()))?;

        let resp = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ApiError::not_found(resource));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|env| env.error.message)
                .unwrap_or(body);
            return Err(ApiError::Status {
                operation,
                status: status.as_u16(),
                message,
            });
        }

        resp.json::<T>()
            .await
            .map_err(|e| ApiError::Decode(format!("{operation}: {e}")))
    }
}

impl std::fmt::Debug for GcpControlPlane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcpControlPlane")
            .field("endpoints", &self.endpoints)
            .finish_non_exhaustive()
    }
}

/// Append path segments to a base URL, percent-encoding each one.
fn endpoint_url(base: &Url, segments: &[&str]) -> ApiResult<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| ApiError::Transport(format!("endpoint {base} cannot be a base URL")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

impl ControlPlane for GcpControlPlane {
    fn list_node_pools<'a>(
        &'a self,
        project: &'a str,
        zone: &'a str,
        cluster: &'a str,
    ) -> ApiFuture<'a, Vec<NodePool>> {
        Box::pin(async move {
            let url = endpoint_url(
                &self.endpoints.container,
                &[
                    "v1beta1", "projects", project, "zones", zone, "clusters", cluster, "nodePools",
                ],
            )?;
            let list: NodePoolList = self
                .get(
                    "list_node_pools",
                    format!("cluster {project}/{zone}/{cluster}"),
                    url,
                )
                .await?;
            Ok(list.node_pools.into_iter().map(NodePool::from).collect())
        })
    }

    fn get_target_pool<'a>(
        &'a self,
        project: &'a str,
        region: &'a str,
        target_pool: &'a str,
    ) -> ApiFuture<'a, TargetPoolIdentity> {
        Box::pin(async move {
            let url = endpoint_url(
                &self.endpoints.compute,
                &[
                    "compute", "v1", "projects", project, "regions", region, "targetPools",
                    target_pool,
                ],
            )?;
            let pool: TargetPoolResource = self
                .get(
                    "get_target_pool",
                    format!("target pool {project}/{region}/{target_pool}"),
                    url,
                )
                .await?;
            if pool.self_link.is_empty() {
                return Err(ApiError::Decode(format!(
                    "target pool {target_pool} has an empty selfLink"
                )));
            }
            Ok(TargetPoolIdentity::new(pool.self_link))
        })
    }

    fn get_instance_group_manager<'a>(
        &'a self,
        project: &'a str,
        zone: &'a str,
        group: &'a str,
    ) -> ApiFuture<'a, InstanceGroupManagerState> {
        Box::pin(async move {
            let url = endpoint_url(
                &self.endpoints.compute,
                &[
                    "compute",
                    "v1",
                    "projects",
                    project,
                    "zones",
                    zone,
                    "instanceGroupManagers",
                    group,
                ],
            )?;
            let igm: InstanceGroupManagerResource = self
                .get(
                    "get_instance_group_manager",
                    format!("instance group manager {project}/{zone}/{group}"),
                    url,
                )
                .await?;
            Ok(igm.into())
        })
    }

    fn set_target_pools<'a>(
        &'a self,
        project: &'a str,
        zone: &'a str,
        group: &'a str,
        target_pools: &'a [String],
    ) -> ApiFuture<'a, SetTargetPoolsResponse> {
        Box::pin(async move {
            let url = endpoint_url(
                &self.endpoints.compute,
                &[
                    "compute",
                    "v1",
                    "projects",
                    project,
                    "zones",
                    zone,
                    "instanceGroupManagers",
                    group,
                    "setTargetPools",
                ],
            )?;
            trace!(%url, operation = "set_target_pools", "POST");
            let request = self
                .http
                .post(url)
                .json(&SetTargetPoolsRequest { target_pools });
            let op: Operation = self
                .send(
                    "set_target_pools",
                    format!("instance group manager {project}/{zone}/{group}"),
                    request,
                )
                .await?;
            Ok(op.into())
        })
    }
}
