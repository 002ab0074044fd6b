use crate::reconcile::Trigger;
use grpc_web_operator_components::{Bag, Key, Relation, Relations};
use k8s_openapi::api::core::v1::ConfigMap;
use kube::ResourceExt;
use parking_lot::RwLock;
use std::{collections::BTreeMap, sync::Arc};
use tokio::sync::mpsc;


/// Names the relation endpoint a bag belongs to.
pub const RELATION_LABEL: &str = "grpc-web-operator.io/relation";

/// Distinguishes relations on the same endpoint.
pub const RELATION_ID_LABEL: &str = "grpc-web-operator.io/relation-id";

/// Names the application that owns, and is the only writer of, a bag.
pub const APP_LABEL: &str = "grpc-web-operator.io/app";

pub type SharedIndex = Arc<RwLock<Index>>;

/// Holds the relation bags published in the namespace, keyed by ConfigMap
/// name.
#[derive(Debug)]
pub struct Index {
    app: String,
    bags: BTreeMap<String, RelationBag>,
    triggers: mpsc::Sender<Trigger>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct RelationBag {
    key: Key,
    app: String,
    data: Bag,
}

#[derive(Debug, thiserror::Error)]
enum InvalidBag {
    #[error("missing label {0}")]
    MissingLabel(&'static str),

    #[error("invalid relation id {0:?}")]
    InvalidId(String),
}

// === impl Index ===

impl Index {
    pub fn shared(app: impl ToString, triggers: mpsc::Sender<Trigger>) -> SharedIndex {
        Arc::new(RwLock::new(Self {
            app: app.to_string(),
            bags: BTreeMap::new(),
            triggers,
        }))
    }

    /// Assembles the relations this application takes part in.
    ///
    /// A relation exists once another application has published a bag for
    /// it, even an empty one. Applications claiming the same relation are
    /// kept as distinct relations. This application's own bags are attached
    /// to the relations they belong to and are otherwise ignored.
    pub fn relations(&self) -> Relations {
        let mut relations = Relations::default();
        for bag in self.bags.values().filter(|b| b.app != self.app) {
            match relations.get_mut(&bag.key, &bag.app) {
                Some(relation) => relation.remote.extend(bag.data.clone()),
                None => {
                    let mut relation = Relation::new(bag.key.clone(), bag.app.clone());
                    relation.remote = bag.data.clone();
                    relations.insert(relation);
                    if relations.iter().filter(|r| r.key == bag.key).count() > 1 {
                        tracing::warn!(
                            relation = %bag.key,
                            app = %bag.app,
                            "Relation claimed by multiple applications"
                        );
                    }
                }
            }
        }

        for bag in self.bags.values().filter(|b| b.app == self.app) {
            for relation in relations.by_key_mut(&bag.key) {
                relation.local = bag.data.clone();
            }
        }

        relations
    }

    fn notify(&self) {
        match self.triggers.try_send(Trigger::Relations) {
            Ok(()) => {}
            // A pass is already pending and will observe this change.
            Err(mpsc::error::TrySendError::Full(_)) => {}
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!("Reconciler has stopped");
            }
        }
    }
}

impl kubert::index::IndexNamespacedResource<ConfigMap> for Index {
    fn apply(&mut self, config_map: ConfigMap) {
        let name = config_map.name_unchecked();
        let bag = match RelationBag::from_config_map(config_map) {
            Ok(bag) => bag,
            Err(error) => {
                tracing::info!(%name, %error, "Ignoring ConfigMap");
                if self.bags.remove(&name).is_some() {
                    self.notify();
                }
                return;
            }
        };

        if self.bags.get(&name) == Some(&bag) {
            return;
        }
        tracing::debug!(%name, relation = %bag.key, app = %bag.app, "Updated relation bag");
        self.bags.insert(name, bag);
        self.notify();
    }

    fn delete(&mut self, _namespace: String, name: String) {
        if let Some(bag) = self.bags.remove(&name) {
            tracing::debug!(%name, relation = %bag.key, app = %bag.app, "Removed relation bag");
            self.notify();
        }
    }
}

// === impl RelationBag ===

impl RelationBag {
    fn from_config_map(config_map: ConfigMap) -> Result<Self, InvalidBag> {
        let labels = config_map.metadata.labels.unwrap_or_default();
        let label = |name: &'static str| {
            labels
                .get(name)
                .filter(|v| !v.is_empty())
                .ok_or(InvalidBag::MissingLabel(name))
        };

        let endpoint = label(RELATION_LABEL)?;
        let id = label(RELATION_ID_LABEL)?;
        let id = id.parse().map_err(|_| InvalidBag::InvalidId(id.clone()))?;
        let app = label(APP_LABEL)?;

        Ok(Self {
            key: Key::new(endpoint.clone(), id),
            app: app.clone(),
            data: config_map.data.unwrap_or_default(),
        })
    }
}
