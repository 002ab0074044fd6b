#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

//! The subset of Envoy's bootstrap configuration needed to translate
//! gRPC-Web requests to a single upstream gRPC service.
//!
//! Rendering is a pure function of [`Inputs`]: the same inputs always produce
//! byte-identical output.

mod bootstrap;
mod cluster;
mod duration;
mod listener;

pub use self::{
    bootstrap::{Address, Admin, Bootstrap, SocketAddress, StaticResources},
    cluster::{Cluster, DiscoveryType, Http2ProtocolOptions, LbPolicy},
    duration::Duration,
    listener::{
        CodecType, CorsPolicy, Filter, FilterChain, HttpConnectionManager, HttpFilter, Listener,
        Route, RouteAction, RouteConfiguration, RouteMatch, VirtualHost,
    },
};

/// Where Envoy writes its admin access log.
pub const ADMIN_ACCESS_LOG_PATH: &str = "/tmp/admin_access.log";

/// The address every listener binds.
pub const BIND_ADDRESS: &str = "0.0.0.0";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Inputs {
    pub admin_port: u16,
    pub http_port: u16,
    pub upstream_service: String,
    pub upstream_port: u16,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid upstream port {port:?}: {source}")]
    InvalidUpstreamPort {
        port: String,
        #[source]
        source: std::num::ParseIntError,
    },

    #[error("upstream service name is empty")]
    EmptyUpstreamService,

    #[error("failed to serialize bootstrap configuration: {0}")]
    Serialize(#[from] serde_json::Error),
}

// === impl Inputs ===

impl Inputs {
    /// Builds inputs from an upstream whose port is still in text form.
    pub fn parse(
        admin_port: u16,
        http_port: u16,
        upstream_service: &str,
        upstream_port: &str,
    ) -> Result<Self, Error> {
        if upstream_service.is_empty() {
            return Err(Error::EmptyUpstreamService);
        }
        let upstream_port =
            upstream_port
                .trim()
                .parse()
                .map_err(|source| Error::InvalidUpstreamPort {
                    port: upstream_port.to_string(),
                    source,
                })?;
        Ok(Self {
            admin_port,
            http_port,
            upstream_service: upstream_service.to_string(),
            upstream_port,
        })
    }

    pub fn bootstrap(&self) -> Bootstrap {
        Bootstrap {
            admin: Admin {
                access_log_path: ADMIN_ACCESS_LOG_PATH.to_string(),
                address: Address::socket(BIND_ADDRESS, self.admin_port),
            },
            static_resources: StaticResources {
                listeners: vec![Listener::grpc_web(&self.upstream_service, self.http_port)],
                clusters: vec![Cluster::logical_dns(
                    &self.upstream_service,
                    self.upstream_port,
                )],
            },
        }
    }

    /// Renders the bootstrap document as pretty-printed JSON.
    pub fn render(&self) -> Result<String, Error> {
        Ok(serde_json::to_string_pretty(&self.bootstrap())?)
    }
}
