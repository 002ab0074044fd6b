use super::*;
use grpc_web_operator_relation::service_info::ServiceDescriptor;
use maplit::btreemap;
use pretty_assertions::assert_eq;
use rstest::rstest;

const MISSING_UPSTREAM: &str =
    "Missing relation with a gRPC service provider. Please add the missing relation.";

fn snapshot() -> Snapshot {
    Snapshot {
        leader: true,
        app: "envoy".to_string(),
        model: "kubeflow".to_string(),
        config: Config::default(),
        relations: Relations::default(),
    }
}

fn with_upstream(mut snapshot: Snapshot, name: &str, port: &str) -> Snapshot {
    snapshot.relations = snapshot.relations.with_remote(
        GRPC_RELATION,
        1,
        "mlmd",
        ServiceDescriptor::new(name, port).to_bag(),
    );
    snapshot
}

fn related(mut snapshot: Snapshot, endpoint: &str, id: u32, app: &str, bag: Bag) -> Snapshot {
    snapshot.relations = snapshot.relations.with_remote(endpoint, id, app, bag);
    snapshot
}

fn reconcile(snapshot: &Snapshot) -> Pass<Effect> {
    engine()
        .expect("engine must build")
        .reconcile(snapshot)
        .expect("pass must complete")
}

fn rendered(pass: &Pass<Effect>) -> serde_json::Value {
    let content = pass
        .effects
        .iter()
        .find_map(|effect| match effect {
            Effect::PushFile { content, .. } => Some(content),
            _ => None,
        })
        .expect("config must be pushed");
    serde_json::from_str(content).expect("config must be JSON")
}

#[test]
fn registration_order() {
    let engine = engine().unwrap();
    assert_eq!(
        engine.names().collect::<Vec<_>>(),
        vec![
            "leadership-gate",
            "istio-relations-conflict-detector",
            "grpc",
            "ingress",
            "istio-ingress-route",
            "metrics-endpoint",
            "envoy-config",
            "envoy-service",
        ]
    );
}

#[test]
fn active_with_upstream() {
    let pass = reconcile(&with_upstream(snapshot(), "svc-a", "8080"));
    assert_eq!(pass.status(), Status::Ready);

    let kinds = pass.effects.iter().map(Effect::kind).collect::<Vec<_>>();
    assert_eq!(kinds, vec!["push_file", "layer"]);

    let doc = rendered(&pass);
    let clusters = doc["static_resources"]["clusters"].as_array().unwrap();
    assert_eq!(clusters.len(), 1);
    assert_eq!(clusters[0]["name"], "svc-a");
    assert_eq!(
        clusters[0]["hosts"][0]["socket_address"],
        serde_json::json!({"address": "svc-a", "port_value": 8080})
    );
    assert_eq!(
        doc["static_resources"]["listeners"][0]["address"]["socket_address"]["port_value"],
        9090
    );
    assert_eq!(doc["admin"]["address"]["socket_address"]["port_value"], 9901);
}

#[test]
fn workload_effects() {
    let mut snapshot = with_upstream(snapshot(), "svc-a", "8080");
    snapshot.config.config_path = "/etc/envoy/envoy.json".to_string();
    let pass = reconcile(&snapshot);

    match &pass.effects[..] {
        [Effect::PushFile { path, content }, Effect::Layer { label, layer }] => {
            assert_eq!(path, "/etc/envoy/envoy.json");
            assert_eq!(*content, EnvoyConfig::get_config(&snapshot).unwrap());
            assert_eq!(label, "envoy");
            assert_eq!(*layer, Layer::envoy("/etc/envoy/envoy.json"));
            assert_eq!(
                layer.services["envoy"].command,
                "/usr/local/bin/envoy -c /etc/envoy/envoy.json"
            );
        }
        effects => panic!("unexpected effects: {effects:?}"),
    }
}

#[test]
fn follower_does_nothing() {
    let mut snapshot = with_upstream(snapshot(), "svc-a", "8080");
    snapshot.leader = false;
    let pass = reconcile(&snapshot);

    assert_eq!(pass.status(), Status::blocked("Waiting for leadership"));
    assert!(pass.effects.is_empty());
    assert_eq!(
        pass.outcome(GRPC_RELATION),
        Some(&Outcome::Skipped {
            blocked_on: LEADERSHIP_GATE.to_string()
        })
    );
}

#[test]
fn missing_upstream() {
    let pass = reconcile(&snapshot());

    assert_eq!(pass.status(), Status::blocked(MISSING_UPSTREAM));
    assert!(pass.effects.is_empty());
    assert_eq!(
        pass.outcome(ENVOY_SERVICE),
        Some(&Outcome::Skipped {
            blocked_on: ENVOY_CONFIG.to_string()
        })
    );
}

#[test]
fn empty_upstream_bag_waits() {
    let snapshot = related(snapshot(), GRPC_RELATION, 1, "mlmd", Bag::default());
    let pass = reconcile(&snapshot);

    assert_eq!(
        pass.status(),
        Status::waiting(
            "Empty or missing data in grpc relation. This may be transient, but if it persists it is likely an error."
        )
    );
    assert!(pass.effects.is_empty());
}

#[rstest]
#[case(btreemap! { "name".to_string() => "svc-a".to_string() })]
#[case(btreemap! { "port".to_string() => "8080".to_string() })]
#[case(btreemap! { "name".to_string() => "".to_string(), "port".to_string() => "8080".to_string() })]
fn partial_upstream_bag_waits(#[case] bag: Bag) {
    let pass = reconcile(&related(snapshot(), GRPC_RELATION, 1, "mlmd", bag));
    assert!(matches!(pass.status(), Status::Waiting(_)));
}

#[test]
fn too_many_upstreams() {
    let snapshot = with_upstream(snapshot(), "svc-a", "8080");
    let snapshot = related(
        snapshot,
        GRPC_RELATION,
        2,
        "other",
        ServiceDescriptor::new("svc-b", 8081).to_bag(),
    );
    let pass = reconcile(&snapshot);

    match pass.status() {
        Status::Blocked(msg) => {
            assert!(msg.contains("Too many related applications"), "{msg}");
            assert!(msg.contains('2'), "{msg}");
        }
        status => panic!("unexpected status: {status}"),
    }
    assert!(pass.effects.is_empty());
}

#[rstest]
#[case::with_upstream(true)]
#[case::without_upstream(false)]
fn conflicting_ingress_relations(#[case] upstream: bool) {
    let mut snapshot = snapshot();
    if upstream {
        snapshot = with_upstream(snapshot, "svc-a", "8080");
    }
    let snapshot = related(snapshot, INGRESS_RELATION, 3, "ambassador", Bag::default());
    let snapshot = related(snapshot, MESH_RELATION, 4, "istio-pilot", Bag::default());
    let pass = reconcile(&snapshot);

    assert_eq!(
        pass.status(),
        Status::blocked(
            "Both 'ingress' and 'istio-ingress-route' relations found. Please choose one."
        )
    );
    assert!(!pass.effects.iter().any(|e| matches!(e, Effect::RelationData { .. })));
}

#[test]
fn ingress_is_broadcast_without_upstream() {
    let snapshot = related(snapshot(), INGRESS_RELATION, 3, "ambassador", Bag::default());
    let pass = reconcile(&snapshot);

    // The broadcaster does not depend on the upstream.
    assert_eq!(pass.status(), Status::blocked(MISSING_UPSTREAM));
    assert_eq!(
        pass.effects,
        vec![Effect::RelationData {
            relation: Key::new(INGRESS_RELATION, 3),
            data: btreemap! {
                "prefix".to_string() => "/ml_metadata".to_string(),
                "rewrite".to_string() => "/ml_metadata".to_string(),
                "service".to_string() => "envoy".to_string(),
                "port".to_string() => "9090".to_string(),
            },
        }]
    );
}

#[test]
fn mesh_route_submitted_when_ready() {
    let snapshot = with_upstream(snapshot(), "svc-a", "8080");
    let snapshot = related(
        snapshot,
        MESH_RELATION,
        5,
        "istio-pilot",
        btreemap! { "version".to_string() => "v0".to_string() },
    );
    let pass = reconcile(&snapshot);
    assert_eq!(pass.status(), Status::Ready);

    let Effect::RelationData { relation, data } = &pass.effects[0] else {
        panic!("unexpected effects: {:?}", pass.effects);
    };
    assert_eq!(*relation, Key::new(MESH_RELATION, 5));
    let config: serde_json::Value = serde_json::from_str(&data["config"]).unwrap();
    assert_eq!(config["model"], "kubeflow");
    assert_eq!(
        config["http_routes"][0]["matches"][0]["path"]["value"],
        "/ml_metadata.MetadataStoreService/"
    );
    assert_eq!(
        config["http_routes"][0]["backends"],
        serde_json::json!([{"service": "envoy", "port": 9090}])
    );
}

#[test]
fn mesh_not_ready_is_a_noop() {
    let snapshot = with_upstream(snapshot(), "svc-a", "8080");
    let snapshot = related(snapshot, MESH_RELATION, 5, "istio-pilot", Bag::default());
    let pass = reconcile(&snapshot);

    assert_eq!(pass.status(), Status::Ready);
    assert!(!pass.effects.iter().any(|e| matches!(e, Effect::RelationData { .. })));
}

#[test]
fn scrape_jobs_published_to_every_scraper() {
    let snapshot = related(snapshot(), METRICS_RELATION, 6, "prometheus", Bag::default());
    let snapshot = related(snapshot, METRICS_RELATION, 8, "scrape-config", Bag::default());
    let pass = reconcile(&snapshot);

    // Scraping does not wait for the upstream.
    assert_eq!(pass.status(), Status::blocked(MISSING_UPSTREAM));
    assert_eq!(
        pass.outcome(METRICS_RELATION),
        Some(&Outcome::Evaluated(Status::Ready))
    );

    let writes = pass
        .effects
        .iter()
        .map(|effect| match effect {
            Effect::RelationData { relation, data } => (relation.clone(), data),
            effect => panic!("unexpected effect: {effect:?}"),
        })
        .collect::<Vec<_>>();
    assert_eq!(
        writes.iter().map(|(key, _)| key.clone()).collect::<Vec<_>>(),
        vec![Key::new(METRICS_RELATION, 6), Key::new(METRICS_RELATION, 8)]
    );
    for (_, data) in writes {
        let jobs: serde_json::Value = serde_json::from_str(&data["scrape_jobs"]).unwrap();
        assert_eq!(
            jobs,
            serde_json::json!([{
                "metrics_path": "/stats/prometheus",
                "static_configs": [{"targets": ["*:9901"]}],
            }])
        );
        let metadata: serde_json::Value =
            serde_json::from_str(&data["scrape_metadata"]).unwrap();
        assert_eq!(
            metadata,
            serde_json::json!({"model": "kubeflow", "application": "envoy"})
        );
    }
}

#[test]
fn scrape_target_follows_admin_port() {
    let mut snapshot = with_upstream(snapshot(), "svc-a", "8080");
    snapshot.config.admin_port = 19901;
    let snapshot = related(snapshot, METRICS_RELATION, 6, "prometheus", Bag::default());
    let pass = reconcile(&snapshot);
    assert_eq!(pass.status(), Status::Ready);

    let Effect::RelationData { relation, data } = &pass.effects[0] else {
        panic!("unexpected effects: {:?}", pass.effects);
    };
    assert_eq!(*relation, Key::new(METRICS_RELATION, 6));
    assert!(data["scrape_jobs"].contains("\"*:19901\""), "{data:?}");
}

#[test]
fn follower_publishes_no_scrape_jobs() {
    let mut snapshot = related(snapshot(), METRICS_RELATION, 6, "prometheus", Bag::default());
    snapshot.leader = false;
    let pass = reconcile(&snapshot);

    assert!(pass.effects.is_empty());
    assert_eq!(
        pass.outcome(METRICS_RELATION),
        Some(&Outcome::Skipped {
            blocked_on: LEADERSHIP_GATE.to_string()
        })
    );
}

#[rstest]
#[case("grpc")]
#[case("70000")]
fn invalid_upstream_port_blocks_rendering(#[case] port: &str) {
    let pass = reconcile(&with_upstream(snapshot(), "svc-a", port));

    assert_eq!(
        pass.status(),
        Status::blocked("Failed to process inputs. See logs")
    );
    assert!(pass.effects.is_empty());
    assert_eq!(
        pass.outcome(ENVOY_SERVICE),
        Some(&Outcome::Skipped {
            blocked_on: ENVOY_CONFIG.to_string()
        })
    );
}

#[test]
fn identical_snapshots_produce_identical_effects() {
    let snapshot = with_upstream(snapshot(), "svc-a", "8080");
    let snapshot = related(snapshot, INGRESS_RELATION, 3, "ambassador", Bag::default());

    let a = reconcile(&snapshot);
    let b = reconcile(&snapshot.clone());
    assert_eq!(a.effects, b.effects);
    assert_eq!(a.evaluations, b.evaluations);
}

#[test]
fn skipped_components_explain_themselves() {
    let mut snapshot = with_upstream(snapshot(), "svc-a", "nope");
    snapshot.leader = false;
    let engine = engine().unwrap();

    assert_eq!(
        engine.status_of(ENVOY_CONFIG, &snapshot),
        Some(Status::blocked("Failed to process inputs. See logs"))
    );
}
