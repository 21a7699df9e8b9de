//! run_loop driven by FixedDelay under paused tokio time.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use tpsync_core::ClusterIdentity;
use tpsync_reconcile::{
    Call, FixedDelay, InMemoryControlPlane, ReconciliationCycle, TickFuture, Ticker, run_loop,
};

const INTERVAL: Duration = Duration::from_secs(60);

fn cycle_for(cp: &Arc<InMemoryControlPlane>) -> Arc<ReconciliationCycle> {
    let cluster = ClusterIdentity::new("acme", None, "us-central1-a", "edge")
        .unwrap()
        .0;
    Arc::new(ReconciliationCycle::new(
        cp.clone(),
        cluster,
        "edge",
        Duration::from_secs(30),
    ))
}

/// Fires a fixed number of times, then ends the sequence.
struct Limited(u32);

impl Ticker for Limited {
    fn tick(&mut self) -> TickFuture<'_> {
        Box::pin(async move {
            if self.0 == 0 {
                return false;
            }
            self.0 -= 1;
            true
        })
    }

    fn reset(&mut self) {}
}

#[tokio::test(start_paused = true)]
async fn failed_cycles_do_not_stop_the_loop() {
    let cp = Arc::new(
        InMemoryControlPlane::new()
            .with_node_pool("pool-1", &["g1"])
            .with_target_pool("edge", "poolX")
            .failing(Call::ListNodePools),
    );
    let cycle = cycle_for(&cp);
    let (tx, rx) = watch::channel(false);

    let handle = tokio::spawn(async move {
        let mut ticker = FixedDelay::new(INTERVAL);
        run_loop(&cycle, &mut ticker, rx).await
    });

    // Cycles at t=0, 60s, 120s.
    tokio::time::sleep(Duration::from_secs(150)).await;
    tx.send(true).unwrap();
    let stats = handle.await.unwrap();

    assert_eq!(stats.cycles, 3);
    assert_eq!(stats.failed, 3);
    assert_eq!(cp.write_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn next_cycle_retries_after_a_failure() {
    let cp = Arc::new(
        InMemoryControlPlane::new()
            .with_node_pool("pool-1", &["g1"])
            .with_group("g1", &["poolA"])
            .with_target_pool("edge", "poolX")
            .failing(Call::GetInstanceGroupManager),
    );
    let cycle = cycle_for(&cp);
    let (tx, rx) = watch::channel(false);

    let handle = tokio::spawn(async move {
        let mut ticker = FixedDelay::new(INTERVAL);
        run_loop(&cycle, &mut ticker, rx).await
    });

    tokio::time::sleep(Duration::from_secs(30)).await;
    cp.clear_failures();
    tokio::time::sleep(Duration::from_secs(120)).await;
    tx.send(true).unwrap();
    let stats = handle.await.unwrap();

    assert_eq!(stats.cycles, 3);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.writes, 1);
    assert_eq!(
        cp.group_pools("g1").unwrap(),
        vec!["poolA".to_string(), "poolX".to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn shutdown_before_start_runs_nothing() {
    let cp = Arc::new(InMemoryControlPlane::new().with_target_pool("edge", "poolX"));
    let cycle = cycle_for(&cp);
    let (_tx, rx) = watch::channel(true);

    let mut ticker = FixedDelay::new(INTERVAL);
    let stats = run_loop(&cycle, &mut ticker, rx).await;

    assert_eq!(stats.cycles, 0);
    assert!(cp.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn dropped_shutdown_sender_stops_the_loop() {
    let cp = Arc::new(InMemoryControlPlane::new().with_target_pool("edge", "poolX"));
    let cycle = cycle_for(&cp);
    let (tx, rx) = watch::channel(false);
    drop(tx);

    let mut ticker = FixedDelay::new(INTERVAL);
    let stats = tokio::time::timeout(
        Duration::from_secs(600),
        run_loop(&cycle, &mut ticker, rx),
    )
    .await
    .unwrap();

    assert!(stats.cycles <= 1);
}

#[tokio::test]
async fn ended_ticker_ends_the_loop() {
    let cp = Arc::new(
        InMemoryControlPlane::new()
            .with_node_pool("pool-1", &["g1"])
            .with_target_pool("edge", "poolX"),
    );
    let cycle = cycle_for(&cp);
    let (_tx, rx) = watch::channel(false);

    let stats = run_loop(&cycle, &mut Limited(2), rx).await;

    assert_eq!(stats.cycles, 2);
    assert_eq!(stats.failed, 0);
    assert_eq!(stats.writes, 1);
}
