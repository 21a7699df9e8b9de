//! Structured events emitted while reconciling, captured with a
//! recording tracing layer.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::field::{Field, Visit};
use tracing::{Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

use tpsync_core::ClusterIdentity;
use tpsync_reconcile::{InMemoryControlPlane, ReconciliationCycle};

#[derive(Debug, Clone)]
struct Recorded {
    level: Level,
    message: String,
    fields: HashMap<String, String>,
}

#[derive(Clone, Default)]
struct Recorder(Arc<Mutex<Vec<Recorded>>>);

impl Recorder {
    fn events(&self) -> Vec<Recorded> {
        self.0.lock().unwrap().clone()
    }
}

#[derive(Default)]
struct Fields {
    message: String,
    fields: HashMap<String, String>,
}

impl Visit for Fields {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.fields.insert(field.name().to_string(), value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.fields
                .insert(field.name().to_string(), format!("{value:?}"));
        }
    }
}

impl<S: Subscriber> Layer<S> for Recorder {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = Fields::default();
        event.record(&mut visitor);
        self.0.lock().unwrap().push(Recorded {
            level: *event.metadata().level(),
            message: visitor.message,
            fields: visitor.fields,
        });
    }
}

fn run_cycle_recording(cp: Arc<InMemoryControlPlane>) -> Vec<Recorded> {
    let recorder = Recorder::default();
    let subscriber = tracing_subscriber::registry().with(recorder.clone());

    tracing::subscriber::with_default(subscriber, || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let cluster = ClusterIdentity::new("acme", None, "us-central1-a", "edge")
            .unwrap()
            .0;
        let cycle = ReconciliationCycle::new(cp, cluster, "edge", Duration::from_secs(30));
        rt.block_on(cycle.run()).unwrap();
    });

    recorder.events()
}

#[test]
fn converged_group_logs_already_member_at_debug() {
    let cp = Arc::new(
        InMemoryControlPlane::new()
            .with_node_pool("pool-1", &["g2"])
            .with_group("g2", &["poolA", "poolX"])
            .with_target_pool("edge", "poolX"),
    );

    let events = run_cycle_recording(cp.clone());

    let already: Vec<&Recorded> = events
        .iter()
        .filter(|e| e.message == "instance group manager already has target pool")
        .collect();
    assert_eq!(already.len(), 1);
    assert_eq!(already[0].level, Level::DEBUG);
    assert_eq!(already[0].fields["instance_group"], "g2");
    assert_eq!(already[0].fields["node_pool"], "pool-1");
    assert_eq!(cp.write_count(), 0);
}

#[test]
fn absent_pool_logs_the_update_at_info() {
    let cp = Arc::new(
        InMemoryControlPlane::new()
            .with_node_pool("pool-1", &["g1"])
            .with_group("g1", &["poolA"])
            .with_target_pool("edge", "poolX"),
    );

    let events = run_cycle_recording(cp);

    let update = events
        .iter()
        .find(|e| e.message == "updating instance group manager target pools")
        .unwrap();
    assert_eq!(update.level, Level::INFO);
    assert_eq!(update.fields["instance_group"], "g1");
    assert!(
        !events
            .iter()
            .any(|e| e.message == "instance group manager already has target pool")
    );
}
