//! tpsync.toml configuration and flag overlay.
//!
//! Every field is optional in the file so that flags can supply the rest.
//! [`ConfigFile::resolve`] validates the merged result into a
//! [`SyncConfig`], failing on the first missing required parameter.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::types::ClusterIdentity;

/// Delay between the end of one cycle and the start of the next.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

/// Deadline applied to each individual control plane call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub project: Option<String>,
    pub region: Option<String>,
    pub zone: Option<String>,
    pub cluster: Option<String>,
    pub target_pool: Option<String>,
    /// e.g. "60s", "5m".
    pub interval: Option<String>,
    /// e.g. "30s".
    pub call_timeout: Option<String>,
}

/// Validated configuration for the reconciler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    pub cluster: ClusterIdentity,
    pub target_pool: String,
    pub interval: Duration,
    pub call_timeout: Duration,
    /// Set when `cluster.region` was derived from the zone.
    pub region_inferred: bool,
}

impl ConfigFile {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Layer `overrides` on top of `self`. Any value set in `overrides`
    /// wins, including an empty string.
    pub fn overlay(self, overrides: ConfigFile) -> Self {
        Self {
            project: overrides.project.or(self.project),
            region: overrides.region.or(self.region),
            zone: overrides.zone.or(self.zone),
            cluster: overrides.cluster.or(self.cluster),
            target_pool: overrides.target_pool.or(self.target_pool),
            interval: overrides.interval.or(self.interval),
            call_timeout: overrides.call_timeout.or(self.call_timeout),
        }
    }

    /// Validate into a [`SyncConfig`].
    ///
    /// Required parameters are checked in the order project, zone,
    /// cluster, target pool.
    pub fn resolve(&self) -> ConfigResult<SyncConfig> {
        let (cluster, region_inferred) = ClusterIdentity::new(
            self.project.as_deref().unwrap_or_default(),
            self.region.as_deref(),
            self.zone.as_deref().unwrap_or_default(),
            self.cluster.as_deref().unwrap_or_default(),
        )?;

        let target_pool = match self.target_pool.as_deref() {
            Some(tp) if !tp.is_empty() => tp.to_string(),
            _ => return Err(ConfigError::Missing("target pool")),
        };

        let interval = duration_field("interval", self.interval.as_deref(), DEFAULT_INTERVAL)?;
        let call_timeout = duration_field(
            "call_timeout",
            self.call_timeout.as_deref(),
            DEFAULT_CALL_TIMEOUT,
        )?;

        Ok(SyncConfig {
            cluster,
            target_pool,
            interval,
            call_timeout,
            region_inferred,
        })
    }
}

fn duration_field(
    field: &'static str,
    value: Option<&str>,
    default: Duration,
) -> ConfigResult<Duration> {
    match value {
        None => Ok(default),
        Some(raw) => match parse_duration(raw) {
            Some(d) if !d.is_zero() => Ok(d),
            _ => Err(ConfigError::InvalidDuration {
                field,
                value: raw.to_string(),
            }),
        },
    }
}

/// Parse a duration string like "500ms", "30s", "5m", "1h". A bare number
/// is taken as seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        ms.trim().parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.trim().parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.trim()
            .parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else if let Some(hours) = s.strip_suffix('h') {
        hours
            .trim()
            .parse::<u64>()
            .ok()
            .and_then(|h| h.checked_mul(3600))
            .map(Duration::from_secs)
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> ConfigFile {
        ConfigFile {
            project: Some("acme-prod".into()),
            zone: Some("us-central1-a".into()),
            cluster: Some("edge".into()),
            target_pool: Some("edge-ingress".into()),
            ..Default::default()
        }
    }

    #[test]
    fn resolve_applies_defaults() {
        let cfg = complete().resolve().unwrap();
        assert_eq!(cfg.cluster.region, "us-central1");
        assert!(cfg.region_inferred);
        assert_eq!(cfg.interval, DEFAULT_INTERVAL);
        assert_eq!(cfg.call_timeout, DEFAULT_CALL_TIMEOUT);
        assert_eq!(cfg.target_pool, "edge-ingress");
    }

    #[test]
    fn resolve_rejects_missing_target_pool() {
        let mut file = complete();
        file.target_pool = Some(String::new());
        assert!(matches!(
            file.resolve(),
            Err(ConfigError::Missing("target pool"))
        ));
    }

    #[test]
    fn resolve_rejects_zero_interval() {
        let mut file = complete();
        file.interval = Some("0s".into());
        assert!(matches!(
            file.resolve(),
            Err(ConfigError::InvalidDuration { field: "interval", .. })
        ));
    }

    #[test]
    fn flags_override_file_values() {
        let file = ConfigFile::from_toml_str(
            r#"
project = "from-file"
zone = "europe-west1-b"
cluster = "edge"
target_pool = "edge-ingress"
interval = "5m"
"#,
        )
        .unwrap();

        let flags = ConfigFile {
            project: Some("from-flag".into()),
            region: Some("europe-west1".into()),
            ..Default::default()
        };

        let cfg = file.overlay(flags).resolve().unwrap();
        assert_eq!(cfg.cluster.project_id, "from-flag");
        assert_eq!(cfg.cluster.region, "europe-west1");
        assert!(!cfg.region_inferred);
        assert_eq!(cfg.interval, Duration::from_secs(300));
    }

    #[test]
    fn from_file_reads_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tpsync.toml");
        std::fs::write(&path, "project = \"p\"\ncall_timeout = \"10s\"\n").unwrap();

        let file = ConfigFile::from_file(&path).unwrap();
        assert_eq!(file.project.as_deref(), Some("p"));
        assert_eq!(file.call_timeout.as_deref(), Some("10s"));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        assert!(matches!(
            ConfigFile::from_toml_str("project = "),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn parse_duration_values() {
        assert_eq!(parse_duration("30s"), Some(Duration::from_secs(30)));
        assert_eq!(parse_duration("5m"), Some(Duration::from_secs(300)));
        assert_eq!(parse_duration("1h"), Some(Duration::from_secs(3600)));
        assert_eq!(parse_duration("250ms"), Some(Duration::from_millis(250)));
        assert_eq!(parse_duration("90"), Some(Duration::from_secs(90)));
        assert_eq!(parse_duration("soon"), None);
    }
}
