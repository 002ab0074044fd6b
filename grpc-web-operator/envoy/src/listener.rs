use crate::{Address, Duration, BIND_ADDRESS};
use serde::Serialize;

const LISTENER_NAME: &str = "listener_0";
const MAX_GRPC_TIMEOUT: Duration = Duration::from_secs(60);

const ALLOW_METHODS: &[&str] = &["GET", "PUT", "DELETE", "POST", "OPTIONS"];

/// Request headers a gRPC-Web client may send.
const ALLOW_HEADERS: &[&str] = &[
    "cache-control",
    "content-transfer-encoding",
    "content-type",
    "grpc-timeout",
    "keep-alive",
    "user-agent",
    "x-accept-content-transfer-encoding",
    "x-accept-response-streaming",
    "x-grpc-web",
    "x-user-agent",
    "custom-header-1",
];

const EXPOSE_HEADERS: &[&str] = &["grpc-status", "grpc-message", "custom-header-1"];

/// Preflight responses may be cached for 20 days.
const CORS_MAX_AGE: &str = "1728000";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Listener {
    pub name: String,
    pub address: Address,
    pub filter_chains: Vec<FilterChain>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FilterChain {
    pub filters: Vec<Filter>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Filter {
    pub name: String,
    pub config: HttpConnectionManager,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HttpConnectionManager {
    pub codec_type: CodecType,
    pub stat_prefix: String,
    pub route_config: RouteConfiguration,
    pub http_filters: Vec<HttpFilter>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CodecType {
    Auto,
    Http1,
    Http2,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RouteConfiguration {
    pub name: String,
    pub virtual_hosts: Vec<VirtualHost>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VirtualHost {
    pub name: String,
    pub domains: Vec<String>,
    pub routes: Vec<Route>,
    pub cors: CorsPolicy,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Route {
    #[serde(rename = "match")]
    pub matches: RouteMatch,
    pub route: RouteAction,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RouteMatch {
    pub prefix: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RouteAction {
    pub cluster: String,
    pub max_grpc_timeout: Duration,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CorsPolicy {
    pub allow_origin: Vec<String>,
    pub allow_methods: String,
    pub allow_headers: String,
    pub max_age: String,
    pub expose_headers: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HttpFilter {
    pub name: String,
}

// === impl Listener ===

impl Listener {
    /// Accepts gRPC-Web (and CORS preflight) requests on `port` and forwards
    /// every path to `cluster` as gRPC.
    pub fn grpc_web(cluster: &str, port: u16) -> Self {
        let virtual_host = VirtualHost {
            name: "local_service".to_string(),
            domains: vec!["*".to_string()],
            routes: vec![Route {
                matches: RouteMatch {
                    prefix: "/".to_string(),
                },
                route: RouteAction {
                    cluster: cluster.to_string(),
                    max_grpc_timeout: MAX_GRPC_TIMEOUT,
                },
            }],
            cors: CorsPolicy::grpc_web(),
        };

        let hcm = HttpConnectionManager {
            codec_type: CodecType::Auto,
            stat_prefix: "ingress_http".to_string(),
            route_config: RouteConfiguration {
                name: "local_route".to_string(),
                virtual_hosts: vec![virtual_host],
            },
            http_filters: ["envoy.grpc_web", "envoy.cors", "envoy.router"]
                .into_iter()
                .map(|name| HttpFilter {
                    name: name.to_string(),
                })
                .collect(),
        };

        Self {
            name: LISTENER_NAME.to_string(),
            address: Address::socket(BIND_ADDRESS, port),
            filter_chains: vec![FilterChain {
                filters: vec![Filter {
                    name: "envoy.http_connection_manager".to_string(),
                    config: hcm,
                }],
            }],
        }
    }
}

// === impl CorsPolicy ===

impl CorsPolicy {
    fn grpc_web() -> Self {
        Self {
            allow_origin: vec!["*".to_string()],
            allow_methods: ALLOW_METHODS.join(","),
            allow_headers: ALLOW_HEADERS.join(","),
            max_age: CORS_MAX_AGE.to_string(),
            expose_headers: EXPOSE_HEADERS.join(","),
        }
    }
}
