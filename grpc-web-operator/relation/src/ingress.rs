//! The legacy ingress interface: this application broadcasts a fixed route
//! descriptor that an ingress controller turns into routing rules.

use crate::{Bag, Key, RelationStore};
use serde::{Deserialize, Serialize};

/// A route to this application as consumed by an ingress controller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressRoute {
    pub prefix: String,
    pub rewrite: String,
    pub service: String,
    pub port: u16,
}

// === impl IngressRoute ===

impl IngressRoute {
    /// Routes `prefix` to `service:port` without rewriting the path.
    pub fn new(prefix: impl Into<String>, service: impl Into<String>, port: u16) -> Self {
        let prefix = prefix.into();
        Self {
            rewrite: prefix.clone(),
            prefix,
            service: service.into(),
            port,
        }
    }

    pub fn to_bag(&self) -> Bag {
        [
            ("prefix", self.prefix.clone()),
            ("rewrite", self.rewrite.clone()),
            ("service", self.service.clone()),
            ("port", self.port.to_string()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }
}

/// The bags to write so that every application related on `endpoint` sees
/// `route`. Nothing is written when no application is related.
pub fn publish<S>(store: &S, endpoint: &str, route: &IngressRoute) -> Vec<(Key, Bag)>
where
    S: RelationStore + ?Sized,
{
    let bag = route.to_bag();
    store
        .relations(endpoint)
        .into_iter()
        .map(|relation| (relation.key.clone(), bag.clone()))
        .collect()
}
