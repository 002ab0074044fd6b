use crate::{Effect, EnvoyConfig, Snapshot, Status};
use grpc_web_operator_core::Component;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const LAYER_LABEL: &str = "envoy";
pub const SERVICE_NAME: &str = "envoy";
pub const ENVOY_BIN: &str = "/usr/local/bin/envoy";

/// A declarative description of the services the workload runs.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layer {
    pub summary: String,
    pub description: String,
    pub services: BTreeMap<String, Service>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    #[serde(rename = "override")]
    pub override_: Override,
    pub summary: String,
    pub command: String,
    pub startup: Startup,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Override {
    Merge,
    Replace,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Startup {
    Enabled,
    Disabled,
}

/// Pushes the rendered configuration into the workload and declares the
/// proxy service reading it.
#[derive(Clone, Debug, Default)]
pub struct EnvoyService;

// === impl Layer ===

impl Layer {
    pub fn envoy(config_path: &str) -> Self {
        let service = Service {
            override_: Override::Replace,
            summary: "envoy service".to_string(),
            command: format!("{ENVOY_BIN} -c {config_path}"),
            startup: Startup::Enabled,
        };
        Self {
            summary: "envoy layer".to_string(),
            description: "gRPC-Web proxy".to_string(),
            services: BTreeMap::from([(SERVICE_NAME.to_string(), service)]),
        }
    }
}

// === impl EnvoyService ===

impl Component<Snapshot, Effect> for EnvoyService {
    fn status(&self, _: &Snapshot) -> Status {
        Status::Ready
    }

    fn configure(&self, ctx: &Snapshot, effects: &mut Vec<Effect>) -> anyhow::Result<()> {
        let path = ctx.config.config_path.clone();
        let content = EnvoyConfig::get_config(ctx)?;
        effects.push(Effect::PushFile {
            path: path.clone(),
            content,
        });
        effects.push(Effect::Layer {
            label: LAYER_LABEL.to_string(),
            layer: Layer::envoy(&path),
        });
        Ok(())
    }
}
