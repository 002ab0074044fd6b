#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

//! The components that make up the operator and the graph connecting them.
//!
//! ```text
//! leadership-gate
//! ├── istio-relations-conflict-detector
//! │   ├── ingress
//! │   └── istio-ingress-route
//! ├── metrics-endpoint
//! └── grpc
//!     └── envoy-config
//!         └── envoy-service
//! ```

mod conflict;
mod envoy_config;
mod ingress;
mod leadership;
mod mesh;
mod metrics_endpoint;
mod service_info;
mod workload;

#[cfg(test)]
mod tests;

pub use self::{
    conflict::ConflictDetector,
    envoy_config::EnvoyConfig,
    ingress::IngressBroadcaster,
    leadership::LeadershipGate,
    mesh::MeshRequirer,
    metrics_endpoint::MetricsEndpointProvider,
    service_info::ServiceInfoReceiver,
    workload::{EnvoyService, Layer, Override, Service, Startup},
};
pub use grpc_web_operator_core::{Evaluation, Outcome, Pass, Status};
pub use grpc_web_operator_relation::{
    self as relation, Bag, Key, Relation, RelationStore, Relations, TooManyRelations,
};

pub type Engine = grpc_web_operator_core::Engine<Snapshot, Effect>;

pub const GRPC_RELATION: &str = "grpc";
pub const INGRESS_RELATION: &str = "ingress";
pub const MESH_RELATION: &str = "istio-ingress-route";
pub const METRICS_RELATION: &str = "metrics-endpoint";

pub const LEADERSHIP_GATE: &str = "leadership-gate";
pub const CONFLICT_DETECTOR: &str = "istio-relations-conflict-detector";
pub const ENVOY_CONFIG: &str = "envoy-config";
pub const ENVOY_SERVICE: &str = "envoy-service";

/// Static configuration of the application.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub admin_port: u16,
    pub http_port: u16,

    /// The path prefix broadcast to legacy ingress controllers.
    pub ingress_prefix: String,

    /// The path prefix submitted to the mesh ingress.
    pub mesh_path_prefix: String,

    /// Where the rendered Envoy configuration is placed in the workload.
    pub config_path: String,
}

/// The external state a reconciliation pass is computed from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot {
    pub leader: bool,
    pub app: String,
    pub model: String,
    pub config: Config,
    pub relations: Relations,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Effect {
    /// Replace this application's bag on a relation.
    RelationData { relation: Key, data: Bag },

    /// Place a file in the workload.
    PushFile { path: String, content: String },

    /// Declare a service layer in the workload.
    Layer { label: String, layer: Layer },
}

/// Builds the component graph.
pub fn engine() -> Result<Engine, grpc_web_operator_core::Error> {
    Engine::new()
        .with(LEADERSHIP_GATE, LeadershipGate, &[])
        .and_then(|e| e.with(CONFLICT_DETECTOR, ConflictDetector, &[LEADERSHIP_GATE]))
        .and_then(|e| {
            e.with(
                GRPC_RELATION,
                ServiceInfoReceiver::new(GRPC_RELATION),
                &[LEADERSHIP_GATE],
            )
        })
        .and_then(|e| {
            e.with(
                INGRESS_RELATION,
                IngressBroadcaster,
                &[LEADERSHIP_GATE, CONFLICT_DETECTOR],
            )
        })
        .and_then(|e| {
            e.with(
                MESH_RELATION,
                MeshRequirer,
                &[LEADERSHIP_GATE, CONFLICT_DETECTOR],
            )
        })
        .and_then(|e| e.with(METRICS_RELATION, MetricsEndpointProvider, &[LEADERSHIP_GATE]))
        .and_then(|e| e.with(ENVOY_CONFIG, EnvoyConfig, &[GRPC_RELATION]))
        .and_then(|e| e.with(ENVOY_SERVICE, EnvoyService, &[ENVOY_CONFIG]))
}

// === impl Config ===

impl Default for Config {
    fn default() -> Self {
        Self {
            admin_port: 9901,
            http_port: 9090,
            ingress_prefix: "/ml_metadata".to_string(),
            mesh_path_prefix: "/ml_metadata.MetadataStoreService/".to_string(),
            config_path: "/envoy/envoy.json".to_string(),
        }
    }
}

// === impl Effect ===

impl Effect {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RelationData { .. } => "relation_data",
            Self::PushFile { .. } => "push_file",
            Self::Layer { .. } => "layer",
        }
    }
}
