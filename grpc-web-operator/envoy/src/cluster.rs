use crate::{Address, Duration};
use serde::Serialize;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Cluster {
    pub name: String,
    pub connect_timeout: Duration,
    #[serde(rename = "type")]
    pub discovery: DiscoveryType,
    pub http2_protocol_options: Http2ProtocolOptions,
    pub lb_policy: LbPolicy,
    pub hosts: Vec<Address>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscoveryType {
    Static,
    StrictDns,
    LogicalDns,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LbPolicy {
    RoundRobin,
    LeastRequest,
    Random,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Http2ProtocolOptions {
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub stream_error_on_invalid_http_messaging: bool,
}

impl Cluster {
    /// An HTTP/2 cluster resolving `service` through DNS and balancing
    /// round-robin across its addresses. The cluster is named after the
    /// service.
    pub fn logical_dns(service: &str, port: u16) -> Self {
        Self {
            name: service.to_string(),
            connect_timeout: CONNECT_TIMEOUT,
            discovery: DiscoveryType::LogicalDns,
            http2_protocol_options: Http2ProtocolOptions::default(),
            lb_policy: LbPolicy::RoundRobin,
            hosts: vec![Address::socket(service, port)],
        }
    }
}
