//! Cycle scheduling.
//!
//! A [`Ticker`] produces "run now" signals; [`run_loop`] runs one cycle
//! per signal until shutdown. The cycle itself never sees the clock, so
//! tests can drive it with paused tokio time.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info};

use crate::cycle::ReconciliationCycle;

/// Boxed future returned by [`Ticker::tick`].
pub type TickFuture<'a> = Pin<Box<dyn Future<Output = bool> + Send + 'a>>;

/// Source of "run now" signals.
pub trait Ticker: Send {
    /// Wait for the next signal. `false` ends the sequence.
    fn tick(&mut self) -> TickFuture<'_>;

    /// Make the next [`tick`](Ticker::tick) fire immediately.
    fn reset(&mut self);
}

/// Fires immediately, then `delay` after each subsequent call to
/// [`tick`](Ticker::tick).
///
/// The delay starts when `tick` is called, i.e. after the previous cycle
/// finished, so the period is cycle duration plus delay. No jitter.
#[derive(Debug, Clone)]
pub struct FixedDelay {
    delay: Duration,
    immediate: bool,
}

impl FixedDelay {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            immediate: true,
        }
    }
}

impl Ticker for FixedDelay {
    fn tick(&mut self) -> TickFuture<'_> {
        Box::pin(async move {
            if std::mem::take(&mut self.immediate) {
                return true;
            }
            tokio::time::sleep(self.delay).await;
            true
        })
    }

    fn reset(&mut self) {
        self.immediate = true;
    }
}

/// Counters kept by [`run_loop`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub cycles: u64,
    pub failed: u64,
    pub writes: u64,
}

/// Run `cycle` on every tick until `shutdown` flips to `true` (or its
/// sender is dropped) or the ticker ends.
///
/// Cycle errors are logged and never stop the loop. Shutdown is only
/// observed while waiting for a tick; a cycle in flight runs to
/// completion.
pub async fn run_loop<T: Ticker + ?Sized>(
    cycle: &ReconciliationCycle,
    ticker: &mut T,
    mut shutdown: watch::Receiver<bool>,
) -> LoopStats {
    let mut stats = LoopStats::default();

    info!(cluster = %cycle.cluster().cluster_id, "reconciliation loop started");

    loop {
        if *shutdown.borrow_and_update() {
            break;
        }

        tokio::select! {
            more = ticker.tick() => {
                if !more {
                    break;
                }
                stats.cycles += 1;
                match cycle.run().await {
                    Ok(report) => {
                        stats.writes += report.groups_updated() as u64;
                    }
                    Err(e) => {
                        stats.failed += 1;
                        error!(kind = e.kind(), error = %e, "update failed");
                    }
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    info!(
        cycles = stats.cycles,
        failed = stats.failed,
        writes = stats.writes,
        "reconciliation loop stopped"
    );

    stats
}
