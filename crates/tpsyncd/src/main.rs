//! tpsyncd: keeps a target pool attached to every instance group of a
//! GKE cluster.
//!
//! Resolves its configuration (file overlaid with flags), connects to the
//! compute and container APIs, then runs a reconciliation cycle every
//! `--interval` until SIGINT/SIGTERM.
//!
//! # Usage
//!
//! ```text
//! tpsyncd --project acme --zone us-central1-a --cluster edge --target-pool edge-lb
//! tpsyncd --config /etc/tpsync/tpsync.toml --once
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use tpsync_core::{ConfigFile, ConfigResult, SyncConfig};
use tpsync_gcp::{
    CLOUD_PLATFORM_SCOPE, COMPUTE_SCOPE, Endpoints, GcpControlPlane, MetadataServer, StaticToken,
    TokenSource,
};
use tpsync_reconcile::{FixedDelay, ReconciliationCycle, run_loop};

const DEFAULT_FILTER: &str = "info,tpsyncd=debug,tpsync_gcp=debug,tpsync_reconcile=trace";

#[derive(Parser, Debug)]
#[command(
    name = "tpsyncd",
    about = "Attach a target pool to every instance group of a GKE cluster",
    version
)]
struct Cli {
    /// GCP project of the cluster.
    #[arg(long)]
    project: Option<String>,

    /// Region of the target pool. Derived from --zone when omitted.
    #[arg(long)]
    region: Option<String>,

    /// Zone of the cluster, e.g. us-central1-a.
    #[arg(long)]
    zone: Option<String>,

    /// Cluster name.
    #[arg(long)]
    cluster: Option<String>,

    /// Name of the target pool to attach.
    #[arg(long)]
    target_pool: Option<String>,

    /// Delay between cycles, e.g. "60s" or "5m".
    #[arg(long)]
    interval: Option<String>,

    /// Deadline for each API call, e.g. "30s".
    #[arg(long)]
    call_timeout: Option<String>,

    /// TOML config file. Flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run a single cycle and exit; a failed cycle exits non-zero.
    #[arg(long)]
    once: bool,

    /// OAuth access token. Without it, tokens come from the metadata server.
    #[arg(long, env = "TPSYNC_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

impl Cli {
    /// Flag values as a config layer.
    fn overrides(&self) -> ConfigFile {
        ConfigFile {
            project: self.project.clone(),
            region: self.region.clone(),
            zone: self.zone.clone(),
            cluster: self.cluster.clone(),
            target_pool: self.target_pool.clone(),
            interval: self.interval.clone(),
            call_timeout: self.call_timeout.clone(),
        }
    }

    fn load_config(&self) -> ConfigResult<SyncConfig> {
        let base = match &self.config {
            Some(path) => ConfigFile::from_file(path)?,
            None => ConfigFile::default(),
        };
        base.overlay(self.overrides()).resolve()
    }

    fn token_source(&self) -> anyhow::Result<Arc<dyn TokenSource>> {
        Ok(match self.access_token.as_deref() {
            Some(token) => Arc::new(StaticToken::new(token)),
            None => Arc::new(
                MetadataServer::new(&[COMPUTE_SCOPE, CLOUD_PLATFORM_SCOPE])
                    .context("setting up metadata server token source")?,
            ),
        })
    }
}

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let config = cli.load_config().context("invalid configuration")?;

    if config.region_inferred {
        warn!(
            zone = %config.cluster.zone,
            region = %config.cluster.region,
            "region not set, inferring it from the zone"
        );
    }

    info!(
        project = %config.cluster.project_id,
        zone = %config.cluster.zone,
        cluster = %config.cluster.cluster_id,
        target_pool = %config.target_pool,
        interval = ?config.interval,
        call_timeout = ?config.call_timeout,
        "tpsyncd starting"
    );

    let control_plane =
        GcpControlPlane::connect(cli.token_source()?, Endpoints::default(), config.call_timeout)
            .await
            .context("creating compute client")?;

    let cycle = ReconciliationCycle::from_config(Arc::new(control_plane), &config);

    if cli.once {
        return match cycle.run().await {
            Ok(report) => {
                info!(
                    updated = report.groups_updated(),
                    checked = report.groups_checked(),
                    "single cycle finished"
                );
                Ok(())
            }
            Err(e) => {
                error!(kind = e.kind(), error = %e, "update failed");
                Err(e.into())
            }
        };
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut ticker = FixedDelay::new(config.interval);

    let loop_handle = tokio::spawn(async move { run_loop(&cycle, &mut ticker, shutdown_rx).await });

    shutdown_signal().await;
    let _ = shutdown_tx.send(true);

    let stats = loop_handle.await.context("reconciliation loop panicked")?;
    info!(cycles = stats.cycles, failed = stats.failed, "tpsyncd stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install CTRL+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("interrupt received, stopping after the current cycle"),
        _ = terminate => info!("terminate received, stopping after the current cycle"),
    }
}
