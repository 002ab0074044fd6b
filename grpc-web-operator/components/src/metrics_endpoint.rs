use crate::{Effect, Snapshot, Status, METRICS_RELATION};
use anyhow::Context;
use grpc_web_operator_core::Component;
use grpc_web_operator_relation::metrics_endpoint::{
    self, ScrapeJob, ScrapeMetadata, ENVOY_METRICS_PATH,
};

/// Tells every related scraper to collect Envoy's admin metrics from each
/// unit.
#[derive(Clone, Debug, Default)]
pub struct MetricsEndpointProvider;

impl MetricsEndpointProvider {
    pub fn jobs(ctx: &Snapshot) -> Vec<ScrapeJob> {
        vec![ScrapeJob::all_units(ctx.config.admin_port, ENVOY_METRICS_PATH)]
    }

    pub fn metadata(ctx: &Snapshot) -> ScrapeMetadata {
        ScrapeMetadata {
            model: ctx.model.clone(),
            application: ctx.app.clone(),
        }
    }
}

impl Component<Snapshot, Effect> for MetricsEndpointProvider {
    fn status(&self, _: &Snapshot) -> Status {
        Status::Ready
    }

    fn configure(&self, ctx: &Snapshot, effects: &mut Vec<Effect>) -> anyhow::Result<()> {
        let writes = metrics_endpoint::publish(
            &ctx.relations,
            METRICS_RELATION,
            &Self::jobs(ctx),
            &Self::metadata(ctx),
        )
        .context("failed to serialize scrape jobs")?;
        if writes.is_empty() {
            tracing::debug!(endpoint = METRICS_RELATION, "No scraper related");
        }

        effects.extend(
            writes
                .into_iter()
                .map(|(relation, data)| Effect::RelationData { relation, data }),
        );
        Ok(())
    }
}
