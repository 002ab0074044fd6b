use crate::{Effect, Snapshot, Status, MESH_RELATION};
use anyhow::Context;
use grpc_web_operator_core::Component;
use grpc_web_operator_relation::mesh::{self, RouteConfig};

/// Requests a route from the mesh ingress once the mesh has answered on the
/// relation.
#[derive(Clone, Debug, Default)]
pub struct MeshRequirer;

impl MeshRequirer {
    pub fn route_config(ctx: &Snapshot) -> RouteConfig {
        RouteConfig::http_prefix(
            ctx.model.clone(),
            ctx.config.mesh_path_prefix.clone(),
            ctx.app.clone(),
            ctx.config.http_port,
        )
    }
}

impl Component<Snapshot, Effect> for MeshRequirer {
    fn status(&self, _: &Snapshot) -> Status {
        Status::Ready
    }

    fn configure(&self, ctx: &Snapshot, effects: &mut Vec<Effect>) -> anyhow::Result<()> {
        if !mesh::is_ready(&ctx.relations, MESH_RELATION) {
            tracing::debug!(endpoint = MESH_RELATION, "Mesh relation not ready");
            return Ok(());
        }

        let writes = mesh::submit(&ctx.relations, MESH_RELATION, &Self::route_config(ctx))
            .context("failed to serialize mesh route config")?;
        effects.extend(
            writes
                .into_iter()
                .map(|(relation, data)| Effect::RelationData { relation, data }),
        );
        Ok(())
    }
}
