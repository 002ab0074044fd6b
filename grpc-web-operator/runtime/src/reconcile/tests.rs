use super::*;
use crate::{
    controller::Kind,
    index::{Index, APP_LABEL, RELATION_ID_LABEL, RELATION_LABEL},
};
use chrono::{DateTime, Utc};
use grpc_web_operator_components::Bag;
use k8s_openapi::{api::core::v1::ConfigMap, apimachinery::pkg::apis::meta::v1::ObjectMeta};
use kubert::index::IndexNamespacedResource;
use maplit::btreemap;
use pretty_assertions::assert_eq;
use prometheus_client::registry::Registry;

const UNIT: &str = "envoy-0";

struct Fixture {
    reconciler: Reconciler,
    index: SharedIndex,
    claims: watch::Sender<Arc<Claim>>,
    triggers: mpsc::Receiver<Trigger>,
    updates: mpsc::Receiver<Update>,
}

fn claim(holder: &str) -> Arc<Claim> {
    Arc::new(Claim {
        holder: holder.to_string(),
        expiry: DateTime::<Utc>::MAX_UTC,
    })
}

fn fixture(holder: &str) -> Fixture {
    let (claims_tx, claims_rx) = watch::channel(claim(holder));
    let (triggers_tx, triggers_rx) = mpsc::channel(1);
    let (updates_tx, updates_rx) = mpsc::channel(100);
    let index = Index::shared("envoy", triggers_tx);
    let reconciler = Reconciler::new(
        grpc_web_operator_components::engine().expect("engine must build"),
        Identity {
            app: "envoy".to_string(),
            model: "kubeflow".to_string(),
            unit: UNIT.to_string(),
        },
        Config::default(),
        index.clone(),
        claims_rx,
        updates_tx,
        ReconcileMetrics::register(&mut Registry::default()),
    );
    Fixture {
        reconciler,
        index,
        claims: claims_tx,
        triggers: triggers_rx,
        updates: updates_rx,
    }
}

fn relation_bag(name: &str, endpoint: &str, id: u32, app: &str, data: Bag) -> ConfigMap {
    ConfigMap {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels: Some(btreemap! {
                RELATION_LABEL.to_string() => endpoint.to_string(),
                RELATION_ID_LABEL.to_string() => id.to_string(),
                APP_LABEL.to_string() => app.to_string(),
            }),
            ..Default::default()
        },
        data: Some(data),
        ..Default::default()
    }
}

fn add_upstream(index: &SharedIndex) {
    index.write().apply(relation_bag(
        "mlmd-grpc-1",
        "grpc",
        1,
        "mlmd",
        btreemap! {
            "name".to_string() => "svc-a".to_string(),
            "port".to_string() => "8080".to_string(),
        },
    ));
}

fn unit_status(update: &Update) -> serde_json::Value {
    assert_eq!(update.kind, Kind::Status);
    let data = update.config_map.data.as_ref().unwrap();
    serde_json::from_str(&data[UNIT]).unwrap()
}

fn kinds(updates: &[Update]) -> Vec<Kind> {
    updates.iter().map(|u| u.kind).collect()
}

#[test]
fn leader_with_upstream() {
    let mut f = fixture(UNIT);
    add_upstream(&f.index);

    let updates = f.reconciler.reconcile(Trigger::Start);
    assert_eq!(kinds(&updates), vec![Kind::Workload, Kind::Status]);
    assert_eq!(updates[0].name(), "envoy-workload");

    let data = updates[0].config_map.data.as_ref().unwrap();
    let config: serde_json::Value = serde_json::from_str(&data["envoy.json"]).unwrap();
    assert_eq!(config["static_resources"]["clusters"][0]["name"], "svc-a");
    assert!(data.contains_key("layer.yaml"));

    assert_eq!(
        unit_status(&updates[1]),
        serde_json::json!({"status": "active", "message": ""})
    );
}

#[test]
fn follower_only_reports_status() {
    let mut f = fixture("envoy-1");
    add_upstream(&f.index);

    let updates = f.reconciler.reconcile(Trigger::Start);
    assert_eq!(kinds(&updates), vec![Kind::Status]);
    assert_eq!(
        unit_status(&updates[0]),
        serde_json::json!({"status": "blocked", "message": "Waiting for leadership"})
    );
}

#[test]
fn expired_claim_is_not_leadership() {
    let f = fixture(UNIT);
    f.claims
        .send(Arc::new(Claim {
            holder: UNIT.to_string(),
            expiry: DateTime::<Utc>::MIN_UTC,
        }))
        .unwrap();

    assert!(!f.reconciler.snapshot().leader);
}

#[test]
fn unchanged_updates_are_not_resent() {
    let mut f = fixture(UNIT);
    add_upstream(&f.index);

    assert_eq!(f.reconciler.reconcile(Trigger::Start).len(), 2);
    assert!(f.reconciler.reconcile(Trigger::Relations).is_empty());

    // A resync reapplies everything so that failed patches are retried.
    assert_eq!(f.reconciler.reconcile(Trigger::Resync).len(), 2);
}

#[test]
fn ingress_relation_data() {
    let mut f = fixture(UNIT);
    f.index.write().apply(relation_bag(
        "ambassador-ingress-3",
        "ingress",
        3,
        "ambassador",
        Bag::new(),
    ));

    let updates = f.reconciler.reconcile(Trigger::Relations);
    assert_eq!(kinds(&updates), vec![Kind::RelationData, Kind::Status]);
    assert_eq!(updates[0].name(), "envoy-ingress-3");
    assert_eq!(
        updates[0].config_map.data,
        Some(btreemap! {
            "prefix".to_string() => "/ml_metadata".to_string(),
            "rewrite".to_string() => "/ml_metadata".to_string(),
            "service".to_string() => "envoy".to_string(),
            "port".to_string() => "9090".to_string(),
        })
    );
    assert_eq!(
        unit_status(&updates[1])["status"],
        "blocked",
        "the upstream relation is still missing"
    );
}

#[test]
fn losing_leadership_reports_blocked() {
    let mut f = fixture(UNIT);
    add_upstream(&f.index);
    f.reconciler.reconcile(Trigger::Start);

    f.claims.send(claim("envoy-1")).unwrap();
    let updates = f.reconciler.reconcile(Trigger::Leadership);
    assert_eq!(kinds(&updates), vec![Kind::Status]);
    assert_eq!(unit_status(&updates[0])["message"], "Waiting for leadership");
}

#[tokio::test]
async fn run_reacts_to_triggers() {
    let Fixture {
        reconciler,
        index,
        claims: _claims,
        triggers,
        mut updates,
    } = fixture(UNIT);
    let (signal, drain) = drain::channel();
    let task = tokio::spawn(reconciler.run(triggers, time::Duration::from_secs(3600), drain));

    // Without an upstream, only the status is written on start.
    let update = updates.recv().await.unwrap();
    assert_eq!(unit_status(&update)["status"], "blocked");

    add_upstream(&index);
    let update = updates.recv().await.unwrap();
    assert_eq!(update.kind, Kind::Workload);
    let update = updates.recv().await.unwrap();
    assert_eq!(unit_status(&update)["status"], "active");

    signal.drain().await;
    task.await.unwrap();
}
