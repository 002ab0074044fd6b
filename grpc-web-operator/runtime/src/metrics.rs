use grpc_web_operator_components::{Effect, Outcome, Pass};
use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family, gauge::Gauge},
    registry::Registry,
};

const STATUSES: [&str; 5] = ["active", "blocked", "waiting", "maintenance", "skipped"];

#[derive(Clone, Debug)]
pub struct ReconcileMetrics {
    passes: Family<PassLabels, Counter>,
    effects: Family<EffectLabels, Counter>,
    component_status: Family<ComponentLabels, Gauge>,
}

#[derive(Clone, Debug)]
pub struct ControllerMetrics {
    patches: Family<PatchLabels, Counter>,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct PassLabels {
    result: &'static str,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct EffectLabels {
    kind: &'static str,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct ComponentLabels {
    component: String,
    status: &'static str,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct PatchLabels {
    kind: &'static str,
    result: &'static str,
}

// === impl ReconcileMetrics ===

impl ReconcileMetrics {
    pub fn register(prom: &mut Registry) -> Self {
        let passes = Family::default();
        prom.register(
            "passes",
            "Count of reconciliation passes by aggregate status",
            passes.clone(),
        );

        let effects = Family::default();
        prom.register(
            "effects",
            "Count of side effects emitted by reconciliation passes",
            effects.clone(),
        );

        let component_status = Family::default();
        prom.register(
            "component_status",
            "Set to 1 for the status each component reported in the last pass",
            component_status.clone(),
        );

        Self {
            passes,
            effects,
            component_status,
        }
    }

    pub fn observe(&self, pass: &Pass<Effect>) {
        self.passes
            .get_or_create(&PassLabels {
                result: pass.status().kind(),
            })
            .inc();

        for effect in &pass.effects {
            self.effects
                .get_or_create(&EffectLabels {
                    kind: effect.kind(),
                })
                .inc();
        }

        for evaluation in &pass.evaluations {
            let current = match &evaluation.outcome {
                Outcome::Evaluated(status) => status.kind(),
                Outcome::Skipped { .. } => "skipped",
            };
            for status in STATUSES {
                self.component_status
                    .get_or_create(&ComponentLabels {
                        component: evaluation.component.clone(),
                        status,
                    })
                    .set((status == current) as i64);
            }
        }
    }

    pub fn pass_failed(&self) {
        self.passes
            .get_or_create(&PassLabels { result: "failed" })
            .inc();
    }
}

// === impl ControllerMetrics ===

impl ControllerMetrics {
    pub fn register(prom: &mut Registry) -> Self {
        let patches = Family::default();
        prom.register(
            "patches",
            "Count of ConfigMap patches by kind and result",
            patches.clone(),
        );
        Self { patches }
    }

    pub fn patched(&self, kind: &'static str, result: &'static str) {
        self.patches
            .get_or_create(&PatchLabels { kind, result })
            .inc();
    }
}
