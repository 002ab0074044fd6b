use crate::{Effect, Snapshot, Status};
use grpc_web_operator_core::Component;

/// Ready only on the leader unit. Everything that writes shared state depends
/// on this gate.
#[derive(Clone, Debug, Default)]
pub struct LeadershipGate;

impl Component<Snapshot, Effect> for LeadershipGate {
    fn status(&self, ctx: &Snapshot) -> Status {
        if ctx.leader {
            Status::Ready
        } else {
            Status::blocked("Waiting for leadership")
        }
    }
}
