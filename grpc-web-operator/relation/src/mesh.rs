//! The mesh ingress route interface: this application submits a structured
//! route configuration to a mesh ingress once the ingress signals it is ready.

use crate::{Bag, Key, RelationStore};
use serde::{Deserialize, Serialize};

/// The bag key carrying the serialized [`RouteConfig`].
pub const CONFIG: &str = "config";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteConfig {
    pub model: String,
    pub listeners: Vec<Listener>,
    pub http_routes: Vec<HttpRoute>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listener {
    pub port: u16,
    pub protocol: Protocol,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    Http,
    Grpc,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpRoute {
    pub name: String,
    pub listener: Listener,
    pub matches: Vec<RouteMatch>,
    pub backends: Vec<Backend>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteMatch {
    pub path: PathMatch,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathMatch {
    #[serde(rename = "type")]
    pub kind: PathMatchKind,
    pub value: String,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PathMatchKind {
    PathPrefix,
    Exact,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Backend {
    pub service: String,
    pub port: u16,
}

// === impl RouteConfig ===

impl RouteConfig {
    /// A single plain-HTTP listener on port 80 routing `prefix` to
    /// `service:port`.
    pub fn http_prefix(
        model: impl Into<String>,
        prefix: impl Into<String>,
        service: impl Into<String>,
        port: u16,
    ) -> Self {
        let listener = Listener {
            port: 80,
            protocol: Protocol::Http,
        };
        Self {
            model: model.into(),
            listeners: vec![listener],
            http_routes: vec![HttpRoute {
                name: "http-ingress".to_string(),
                listener,
                matches: vec![RouteMatch {
                    path: PathMatch {
                        kind: PathMatchKind::PathPrefix,
                        value: prefix.into(),
                    },
                }],
                backends: vec![Backend {
                    service: service.into(),
                    port,
                }],
            }],
        }
    }
}

/// A mesh relation is ready once the ingress has published anything on it,
/// which is how it signals that it speaks this interface.
pub fn is_ready<S>(store: &S, endpoint: &str) -> bool
where
    S: RelationStore + ?Sized,
{
    store
        .relations(endpoint)
        .into_iter()
        .any(|relation| !relation.remote.is_empty())
}

/// The bags to write to submit `config` on every ready relation.
pub fn submit<S>(
    store: &S,
    endpoint: &str,
    config: &RouteConfig,
) -> Result<Vec<(Key, Bag)>, serde_json::Error>
where
    S: RelationStore + ?Sized,
{
    let bag = Bag::from([(CONFIG.to_string(), serde_json::to_string(config)?)]);
    Ok(store
        .relations(endpoint)
        .into_iter()
        .filter(|relation| !relation.remote.is_empty())
        .map(|relation| (relation.key.clone(), bag.clone()))
        .collect())
}
