use crate::{
    index::{APP_LABEL, RELATION_ID_LABEL, RELATION_LABEL},
    metrics::ControllerMetrics,
};
use grpc_web_operator_components::{Bag, Key, Layer, Status};
use k8s_openapi::{api::core::v1::ConfigMap, apimachinery::pkg::apis::meta::v1::ObjectMeta};
use kube::{
    api::{Api, Patch, PatchParams},
    ResourceExt,
};
use kubert::lease::Claim;
use std::{collections::BTreeMap, path::Path, sync::Arc};
use tokio::{
    sync::{mpsc, watch},
    time,
};

pub const FIELD_MANAGER: &str = "grpc-web-operator";
pub const LAYER_KEY: &str = "layer.yaml";
pub const LAYER_ANNOTATION: &str = "grpc-web-operator.io/layer";
const PATH_ANNOTATION_PREFIX: &str = "grpc-web-operator.io/path.";

/// Applies ConfigMaps on behalf of the reconciler.
///
/// Updates that write shared state are only applied while this unit holds
/// the lease; status updates are always applied.
pub struct Controller {
    claims: watch::Receiver<Arc<Claim>>,
    client: kube::Client,
    namespace: String,
    name: String,
    updates: mpsc::Receiver<Update>,
    patch_timeout: time::Duration,
    metrics: ControllerMetrics,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Update {
    pub kind: Kind,
    pub config_map: ConfigMap,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Kind {
    RelationData,
    Workload,
    Status,
}

/// The files and the service layer a pass declared for the workload.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Workload {
    files: BTreeMap<String, String>,
    layer: Option<(String, Layer)>,
}

// === impl Controller ===

impl Controller {
    pub fn new(
        claims: watch::Receiver<Arc<Claim>>,
        client: kube::Client,
        namespace: String,
        name: String,
        updates: mpsc::Receiver<Update>,
        patch_timeout: time::Duration,
        metrics: ControllerMetrics,
    ) -> Self {
        Self {
            claims,
            client,
            namespace,
            name,
            updates,
            patch_timeout,
            metrics,
        }
    }

    pub async fn run(mut self) {
        let api = Api::<ConfigMap>::namespaced(self.client.clone(), &self.namespace);

        while let Some(Update { kind, config_map }) = self.updates.recv().await {
            let name = config_map.name_unchecked();
            if kind.requires_leadership() && !self.claims.borrow().is_current_for(&self.name) {
                tracing::debug!(%name, kind = kind.as_str(), "Not the leader; dropping update");
                self.metrics.patched(kind.as_str(), "skipped");
                continue;
            }

            let params = kind.patch_params(&self.name);
            let patch = Patch::Apply(config_map);
            let result =
                match time::timeout(self.patch_timeout, api.patch(&name, &params, &patch)).await {
                    Ok(Ok(_)) => {
                        tracing::debug!(%name, kind = kind.as_str(), "Applied ConfigMap");
                        "ok"
                    }
                    Ok(Err(error)) => {
                        tracing::error!(%name, %error, "Failed to apply ConfigMap");
                        "error"
                    }
                    Err(_) => {
                        tracing::error!(
                            %name,
                            timeout = ?self.patch_timeout,
                            "Timed out applying ConfigMap"
                        );
                        "timeout"
                    }
                };
            self.metrics.patched(kind.as_str(), result);
        }
        tracing::debug!("Reconciler has stopped");
    }
}

// === impl Update ===

impl Update {
    /// This application's bag on `relation`.
    pub fn relation_data(app: &str, relation: &Key, data: Bag) -> Self {
        let labels = [
            (RELATION_LABEL, relation.endpoint.clone()),
            (RELATION_ID_LABEL, relation.id.to_string()),
            (APP_LABEL, app.to_string()),
        ];
        Self {
            kind: Kind::RelationData,
            config_map: ConfigMap {
                metadata: ObjectMeta {
                    name: Some(format!("{app}-{}-{}", relation.endpoint, relation.id)),
                    labels: Some(
                        labels
                            .into_iter()
                            .map(|(k, v)| (k.to_string(), v))
                            .collect(),
                    ),
                    ..Default::default()
                },
                data: Some(data),
                ..Default::default()
            },
        }
    }

    pub fn workload(app: &str, workload: &Workload) -> Result<Self, serde_yaml::Error> {
        let mut data = BTreeMap::new();
        let mut annotations = BTreeMap::new();
        for (path, content) in &workload.files {
            let file = Path::new(path)
                .file_name()
                .map(|f| f.to_string_lossy().into_owned())
                .unwrap_or_else(|| "config".to_string());
            annotations.insert(format!("{PATH_ANNOTATION_PREFIX}{file}"), path.clone());
            data.insert(file, content.clone());
        }
        if let Some((label, layer)) = &workload.layer {
            annotations.insert(LAYER_ANNOTATION.to_string(), label.clone());
            data.insert(LAYER_KEY.to_string(), serde_yaml::to_string(layer)?);
        }

        Ok(Self {
            kind: Kind::Workload,
            config_map: ConfigMap {
                metadata: ObjectMeta {
                    name: Some(format!("{app}-workload")),
                    labels: Some(app_labels(app)),
                    annotations: Some(annotations),
                    ..Default::default()
                },
                data: Some(data),
                ..Default::default()
            },
        })
    }

    /// The unit's status, stored under the unit's name.
    pub fn status(app: &str, unit: &str, status: &Status) -> Self {
        let value = serde_json::json!({
            "status": status.kind(),
            "message": status.message(),
        });
        Self {
            kind: Kind::Status,
            config_map: ConfigMap {
                metadata: ObjectMeta {
                    name: Some(format!("{app}-status")),
                    labels: Some(app_labels(app)),
                    ..Default::default()
                },
                data: Some(BTreeMap::from([(unit.to_string(), value.to_string())])),
                ..Default::default()
            },
        }
    }

    pub fn name(&self) -> &str {
        self.config_map.metadata.name.as_deref().unwrap_or_default()
    }
}

fn app_labels(app: &str) -> BTreeMap<String, String> {
    BTreeMap::from([(APP_LABEL.to_string(), app.to_string())])
}

// === impl Kind ===

impl Kind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RelationData => "relation_data",
            Self::Workload => "workload",
            Self::Status => "status",
        }
    }

    /// Shared state is owned by a single field manager so that a new leader
    /// takes over the fields its predecessor applied. Each unit owns only its
    /// own key in the status ConfigMap.
    fn patch_params(&self, unit: &str) -> PatchParams {
        match self {
            Self::Status => PatchParams::apply(&format!("{FIELD_MANAGER}/{unit}")),
            Self::RelationData | Self::Workload => PatchParams::apply(FIELD_MANAGER),
        }
    }

    fn requires_leadership(&self) -> bool {
        !matches!(self, Self::Status)
    }
}

// === impl Workload ===

impl Workload {
    pub fn push_file(&mut self, path: String, content: String) {
        self.files.insert(path, content);
    }

    pub fn set_layer(&mut self, label: String, layer: Layer) {
        self.layer = Some((label, layer));
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.layer.is_none()
    }
}
