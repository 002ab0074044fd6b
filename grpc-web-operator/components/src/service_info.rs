use crate::{Effect, Snapshot, Status};
use grpc_web_operator_core::Component;
use grpc_web_operator_relation::service_info::{self, Error, ServiceDescriptor};

/// Reads the upstream service descriptor from a relation limited to a single
/// provider.
#[derive(Clone, Debug)]
pub struct ServiceInfoReceiver {
    endpoint: &'static str,
}

impl ServiceInfoReceiver {
    pub fn new(endpoint: &'static str) -> Self {
        Self { endpoint }
    }

    pub fn get_service_info(&self, ctx: &Snapshot) -> Result<ServiceDescriptor, Error> {
        service_info::get(&ctx.relations, self.endpoint)
    }
}

impl Component<Snapshot, Effect> for ServiceInfoReceiver {
    fn status(&self, ctx: &Snapshot) -> Status {
        match self.get_service_info(ctx) {
            Ok(_) => Status::Ready,
            Err(Error::RelationMissing { .. }) => Status::blocked(
                "Missing relation with a gRPC service provider. Please add the missing relation.",
            ),
            Err(Error::TooManyRelatedApplications { endpoint, count }) => Status::blocked(format!(
                "Too many related applications on '{endpoint}' ({count}). Please remove the extra relations."
            )),
            Err(error @ Error::RelationDataMissing { .. }) => {
                tracing::error!(%error, "Empty or missing relation data");
                Status::waiting(format!(
                    "Empty or missing data in {} relation. This may be transient, but if it persists it is likely an error.",
                    self.endpoint
                ))
            }
        }
    }
}
