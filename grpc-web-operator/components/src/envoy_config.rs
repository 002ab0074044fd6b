use crate::{Effect, Snapshot, Status, GRPC_RELATION};
use grpc_web_operator_core::Component;
use grpc_web_operator_envoy::Inputs;
use grpc_web_operator_relation::service_info;

/// Renders the Envoy bootstrap document for the upstream service.
#[derive(Clone, Debug, Default)]
pub struct EnvoyConfig;

impl EnvoyConfig {
    pub fn inputs(ctx: &Snapshot) -> anyhow::Result<Inputs> {
        let upstream = service_info::get(&ctx.relations, GRPC_RELATION)?;
        let inputs = Inputs::parse(
            ctx.config.admin_port,
            ctx.config.http_port,
            &upstream.name,
            &upstream.port,
        )?;
        Ok(inputs)
    }

    /// The rendered document. Identical snapshots render identical bytes.
    pub fn get_config(ctx: &Snapshot) -> anyhow::Result<String> {
        Ok(Self::inputs(ctx)?.render()?)
    }
}

impl Component<Snapshot, Effect> for EnvoyConfig {
    fn status(&self, ctx: &Snapshot) -> Status {
        match Self::inputs(ctx) {
            Ok(_) => Status::Ready,
            Err(error) => {
                tracing::error!(%error, "Failed to process inputs");
                Status::blocked("Failed to process inputs. See logs")
            }
        }
    }
}
