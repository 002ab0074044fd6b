use crate::{Effect, Snapshot, Status, INGRESS_RELATION, MESH_RELATION};
use grpc_web_operator_core::Component;
use grpc_web_operator_relation::RelationStore;

/// Blocks when both the legacy ingress relation and the mesh ingress relation
/// are established. Only one of them may route to the application.
#[derive(Clone, Debug, Default)]
pub struct ConflictDetector;

impl Component<Snapshot, Effect> for ConflictDetector {
    fn status(&self, ctx: &Snapshot) -> Status {
        if ctx.relations.is_related(INGRESS_RELATION) && ctx.relations.is_related(MESH_RELATION) {
            tracing::warn!(
                ingress = INGRESS_RELATION,
                mesh = MESH_RELATION,
                "Both ingress relations found; only one may be related at a time"
            );
            return Status::blocked(format!(
                "Both '{INGRESS_RELATION}' and '{MESH_RELATION}' relations found. Please choose one."
            ));
        }

        Status::Ready
    }
}
