use crate::{Cluster, Listener};
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Bootstrap {
    pub admin: Admin,
    pub static_resources: StaticResources,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Admin {
    pub access_log_path: String,
    pub address: Address,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StaticResources {
    pub listeners: Vec<Listener>,
    pub clusters: Vec<Cluster>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Address {
    pub socket_address: SocketAddress,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SocketAddress {
    pub address: String,
    pub port_value: u16,
}

impl Address {
    pub fn socket(address: impl Into<String>, port_value: u16) -> Self {
        Self {
            socket_address: SocketAddress {
                address: address.into(),
                port_value,
            },
        }
    }
}
