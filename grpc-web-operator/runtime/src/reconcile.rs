use crate::{
    controller::{Update, Workload},
    index::SharedIndex,
    metrics::ReconcileMetrics,
};
use ahash::AHashMap as HashMap;
use grpc_web_operator_components::{Config, Effect, Engine, Snapshot};
use kubert::lease::Claim;
use std::{fmt, sync::Arc};
use tokio::{
    sync::{mpsc, watch},
    time,
};

#[cfg(test)]
mod tests;

/// Why a pass was requested. Every trigger results in the same pass.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Trigger {
    Start,
    Relations,
    Leadership,
    Resync,
}

/// Names this unit and the application it belongs to.
#[derive(Clone, Debug)]
pub struct Identity {
    pub app: String,
    pub model: String,
    pub unit: String,
}

/// Owns the engine and runs one pass per trigger. Passes never overlap.
pub struct Reconciler {
    engine: Engine,
    identity: Identity,
    config: Config,
    index: SharedIndex,
    claims: watch::Receiver<Arc<Claim>>,
    updates: mpsc::Sender<Update>,
    metrics: ReconcileMetrics,

    leader: bool,
    applied: HashMap<String, Update>,
}

// === impl Reconciler ===

impl Reconciler {
    pub fn new(
        engine: Engine,
        identity: Identity,
        config: Config,
        index: SharedIndex,
        claims: watch::Receiver<Arc<Claim>>,
        updates: mpsc::Sender<Update>,
        metrics: ReconcileMetrics,
    ) -> Self {
        Self {
            engine,
            identity,
            config,
            index,
            claims,
            updates,
            metrics,
            leader: false,
            applied: HashMap::new(),
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        let leader = self.claims.borrow().is_current_for(&self.identity.unit);
        Snapshot {
            leader,
            app: self.identity.app.clone(),
            model: self.identity.model.clone(),
            config: self.config.clone(),
            relations: self.index.read().relations(),
        }
    }

    /// Runs a pass and returns the updates that differ from what was last
    /// sent to the controller.
    pub fn reconcile(&mut self, trigger: Trigger) -> Vec<Update> {
        let snapshot = self.snapshot();
        if trigger == Trigger::Resync || snapshot.leader != self.leader {
            self.applied.clear();
        }
        self.leader = snapshot.leader;

        let pass = match self.engine.reconcile(&snapshot) {
            Ok(pass) => pass,
            Err(error) => {
                tracing::error!(%trigger, %error, "Reconciliation failed");
                self.metrics.pass_failed();
                return Vec::new();
            }
        };
        self.metrics.observe(&pass);

        let status = pass.status();
        tracing::debug!(%trigger, %status, effects = pass.effects.len(), "Reconciled");

        let app = self.identity.app.as_str();
        let mut updates = Vec::with_capacity(pass.effects.len() + 1);
        let mut workload = Workload::default();
        for effect in pass.effects {
            match effect {
                Effect::RelationData { relation, data } => {
                    updates.push(Update::relation_data(app, &relation, data))
                }
                Effect::PushFile { path, content } => workload.push_file(path, content),
                Effect::Layer { label, layer } => workload.set_layer(label, layer),
            }
        }
        if !workload.is_empty() {
            match Update::workload(app, &workload) {
                Ok(update) => updates.push(update),
                Err(error) => tracing::error!(%error, "Failed to serialize workload layer"),
            }
        }
        updates.push(Update::status(app, &self.identity.unit, &status));

        updates
            .into_iter()
            .filter(|update| self.record(update))
            .collect()
    }

    pub async fn run(
        mut self,
        mut triggers: mpsc::Receiver<Trigger>,
        period: time::Duration,
        drain: drain::Watch,
    ) {
        let shutdown = drain.signaled();
        tokio::pin!(shutdown);

        let mut claims = self.claims.clone();
        let mut resync = time::interval_at(time::Instant::now() + period, period);
        resync.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        let mut trigger = Trigger::Start;
        loop {
            for update in self.reconcile(trigger) {
                if self.updates.send(update).await.is_err() {
                    tracing::debug!("Controller has stopped");
                    return;
                }
            }

            trigger = tokio::select! {
                biased;
                _ = &mut shutdown => {
                    tracing::debug!("Shutdown");
                    return;
                }
                res = claims.changed() => match res {
                    Ok(()) => Trigger::Leadership,
                    Err(_) => return,
                },
                res = triggers.recv() => match res {
                    Some(trigger) => trigger,
                    None => return,
                },
                _ = resync.tick() => Trigger::Resync,
            };
        }
    }

    fn record(&mut self, update: &Update) -> bool {
        let name = update.name();
        if self.applied.get(name) == Some(update) {
            return false;
        }
        self.applied.insert(name.to_string(), update.clone());
        true
    }
}

// === impl Trigger ===

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Start => "start",
            Self::Relations => "relations",
            Self::Leadership => "leadership",
            Self::Resync => "resync",
        })
    }
}
