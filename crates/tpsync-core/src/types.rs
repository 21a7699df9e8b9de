//! Data model for one reconciliation cycle.
//!
//! Nothing here is persisted. Every value is rebuilt from the control
//! plane at the start of a cycle and dropped at its end.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

// ── Cluster ────────────────────────────────────────────────────────

/// Coordinates of the cluster whose node pools feed the target pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterIdentity {
    pub project_id: String,
    pub region: String,
    pub zone: String,
    pub cluster_id: String,
}

impl ClusterIdentity {
    /// Build an identity, deriving the region from the zone when it is
    /// not supplied.
    ///
    /// Returns the identity and whether the region was inferred.
    pub fn new(
        project_id: &str,
        region: Option<&str>,
        zone: &str,
        cluster_id: &str,
    ) -> ConfigResult<(Self, bool)> {
        if project_id.is_empty() {
            return Err(ConfigError::Missing("project"));
        }
        if zone.is_empty() {
            return Err(ConfigError::Missing("zone"));
        }
        let zone_region = region_from_zone(zone)?;
        let (region, inferred) = match region.filter(|r| !r.is_empty()) {
            Some(r) => (r.to_string(), false),
            None => (zone_region.to_string(), true),
        };
        if cluster_id.is_empty() {
            return Err(ConfigError::Missing("cluster"));
        }

        Ok((
            Self {
                project_id: project_id.to_string(),
                region,
                zone: zone.to_string(),
                cluster_id: cluster_id.to_string(),
            },
            inferred,
        ))
    }
}

/// Derive a region from a zone by cutting at the last hyphen.
///
/// `us-central1-a` → `us-central1`.
pub fn region_from_zone(zone: &str) -> ConfigResult<&str> {
    match zone.rfind('-') {
        Some(idx) if idx > 0 => Ok(&zone[..idx]),
        _ => Err(ConfigError::InvalidZone(zone.to_string())),
    }
}

// ── Topology ───────────────────────────────────────────────────────

/// Resource URL of one instance group manager backing a node pool.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceGroupRef(String);

impl InstanceGroupRef {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    /// Full resource URL as returned by the control plane.
    pub fn url(&self) -> &str {
        &self.0
    }

    /// Last path segment of the URL, used to address per-group APIs.
    pub fn short_name(&self) -> &str {
        match self.0.rfind('/') {
            Some(idx) => &self.0[idx + 1..],
            None => &self.0,
        }
    }
}

impl fmt::Display for InstanceGroupRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A node pool and the instance groups that back it, in listed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodePool {
    pub name: String,
    pub instance_groups: Vec<InstanceGroupRef>,
}

impl NodePool {
    pub fn new(name: impl Into<String>, instance_groups: Vec<InstanceGroupRef>) -> Self {
        Self {
            name: name.into(),
            instance_groups,
        }
    }
}

/// Self link of the target pool, compared by exact string equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetPoolIdentity(String);

impl TargetPoolIdentity {
    pub fn new(self_link: impl Into<String>) -> Self {
        Self(self_link.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetPoolIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Instance group manager ─────────────────────────────────────────

/// Target pools currently attached to an instance group manager.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceGroupManagerState {
    pub target_pools: Vec<String>,
}

impl InstanceGroupManagerState {
    pub fn new(target_pools: Vec<String>) -> Self {
        Self { target_pools }
    }

    /// Exact, order-independent membership test.
    pub fn contains(&self, target_pool: &TargetPoolIdentity) -> bool {
        self.target_pools.iter().any(|p| p == target_pool.as_str())
    }

    /// Existing pools with `target_pool` appended. Never drops or
    /// reorders an existing entry.
    pub fn with_appended(&self, target_pool: &TargetPoolIdentity) -> Vec<String> {
        let mut pools = Vec::with_capacity(self.target_pools.len() + 1);
        pools.extend(self.target_pools.iter().cloned());
        pools.push(target_pool.as_str().to_string());
        pools
    }
}

/// One entry of an operation's error payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationErrorDetail {
    pub code: String,
    pub message: String,
}

impl fmt::Display for OperationErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// A non-fatal condition reported alongside a write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationWarning {
    pub code: String,
    pub message: String,
}

impl fmt::Display for OperationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// What the control plane reported for a `set_target_pools` write.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetTargetPoolsResponse {
    pub errors: Vec<OperationErrorDetail>,
    pub warnings: Vec<OperationWarning>,
}

impl SetTargetPoolsResponse {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_is_inferred_from_zone() {
        assert_eq!(region_from_zone("us-central1-a").unwrap(), "us-central1");
        assert_eq!(region_from_zone("europe-west4-b").unwrap(), "europe-west4");
    }

    #[test]
    fn zone_without_hyphen_is_rejected() {
        assert!(matches!(
            region_from_zone("uscentral1"),
            Err(ConfigError::InvalidZone(_))
        ));
        assert!(matches!(
            region_from_zone("-a"),
            Err(ConfigError::InvalidZone(_))
        ));
    }

    #[test]
    fn cluster_identity_infers_region() {
        let (id, inferred) =
            ClusterIdentity::new("proj", None, "us-central1-a", "prod").unwrap();
        assert!(inferred);
        assert_eq!(id.region, "us-central1");

        let (id, inferred) =
            ClusterIdentity::new("proj", Some("us-east1"), "us-central1-a", "prod").unwrap();
        assert!(!inferred);
        assert_eq!(id.region, "us-east1");
    }

    #[test]
    fn malformed_zone_is_rejected_even_with_explicit_region() {
        assert!(matches!(
            ClusterIdentity::new("p", Some("us-east1"), "uscentral1", "c"),
            Err(ConfigError::InvalidZone(z)) if z == "uscentral1"
        ));
    }

    #[test]
    fn cluster_identity_requires_fields_in_order() {
        assert!(matches!(
            ClusterIdentity::new("", None, "", ""),
            Err(ConfigError::Missing("project"))
        ));
        assert!(matches!(
            ClusterIdentity::new("p", None, "", "c"),
            Err(ConfigError::Missing("zone"))
        ));
        assert!(matches!(
            ClusterIdentity::new("p", Some(""), "us-central1-a", ""),
            Err(ConfigError::Missing("cluster"))
        ));
    }

    #[test]
    fn short_name_is_last_segment() {
        let group = InstanceGroupRef::new(
            "https://www.googleapis.com/compute/v1/projects/p/zones/us-central1-a/instanceGroupManagers/gke-prod-pool-1-abc",
        );
        assert_eq!(group.short_name(), "gke-prod-pool-1-abc");
        assert_eq!(InstanceGroupRef::new("bare").short_name(), "bare");
    }

    #[test]
    fn append_preserves_existing_order() {
        let state = InstanceGroupManagerState::new(vec!["poolB".into(), "poolA".into()]);
        let desired = TargetPoolIdentity::new("poolX");

        assert!(!state.contains(&desired));
        assert_eq!(state.with_appended(&desired), vec!["poolB", "poolA", "poolX"]);
    }

    #[test]
    fn membership_uses_exact_match() {
        let state = InstanceGroupManagerState::new(vec!["poolX/".into(), "POOLX".into()]);
        assert!(!state.contains(&TargetPoolIdentity::new("poolX")));
    }
}
