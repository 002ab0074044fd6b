use crate::{Effect, Snapshot, Status, INGRESS_RELATION, MESH_RELATION};
use grpc_web_operator_core::Component;
use grpc_web_operator_relation::{
    ingress::{self, IngressRoute},
    RelationStore,
};

/// Broadcasts the application's route to every legacy ingress controller.
#[derive(Clone, Debug, Default)]
pub struct IngressBroadcaster;

impl IngressBroadcaster {
    pub fn route(ctx: &Snapshot) -> IngressRoute {
        IngressRoute::new(
            ctx.config.ingress_prefix.clone(),
            ctx.app.clone(),
            ctx.config.http_port,
        )
    }
}

impl Component<Snapshot, Effect> for IngressBroadcaster {
    fn status(&self, _: &Snapshot) -> Status {
        Status::Ready
    }

    fn configure(&self, ctx: &Snapshot, effects: &mut Vec<Effect>) -> anyhow::Result<()> {
        let writes = ingress::publish(&ctx.relations, INGRESS_RELATION, &Self::route(ctx));
        if writes.is_empty() {
            // Routing through the mesh is just as valid.
            if !ctx.relations.is_related(MESH_RELATION) {
                tracing::warn!("No ingress relation established; the application is not routable");
            }
            return Ok(());
        }

        effects.extend(
            writes
                .into_iter()
                .map(|(relation, data)| Effect::RelationData { relation, data }),
        );
        Ok(())
    }
}
