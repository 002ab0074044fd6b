use crate::Status;
use ahash::AHashMap as HashMap;


/// A unit of reconciliation logic evaluated against a snapshot of type `C`,
/// emitting side effects of type `E`.
pub trait Component<C, E>: Send + Sync {
    /// Computes the component's status from the snapshot.
    fn status(&self, ctx: &C) -> Status;

    /// Emits the component's side effects.
    ///
    /// Only called when the component reports [`Status::Ready`] and every one
    /// of its dependencies was ready in the same pass. An error aborts the
    /// whole pass.
    fn configure(&self, _ctx: &C, _effects: &mut Vec<E>) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Holds components in registration order.
///
/// A component may only depend on components registered before it, so the
/// registration order is always a topological order of the dependency graph
/// and no cycle can be expressed.
pub struct Engine<C, E> {
    components: Vec<Registered<C, E>>,
    by_name: HashMap<String, usize>,
}

struct Registered<C, E> {
    name: String,
    dependencies: Vec<usize>,
    inner: Box<dyn Component<C, E>>,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("component {0} is already registered")]
    Duplicate(String),

    #[error("component {component} depends on unregistered component {dependency}")]
    UnknownDependency {
        component: String,
        dependency: String,
    },

    #[error("failed to configure {component}: {source}")]
    Configure {
        component: String,
        #[source]
        source: anyhow::Error,
    },
}

/// What happened to a single component during a pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Evaluated(Status),

    /// A dependency was not ready, so the component was neither evaluated nor
    /// configured.
    Skipped { blocked_on: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Evaluation {
    pub component: String,
    pub outcome: Outcome,
}

/// The result of a reconciliation pass.
#[derive(Debug)]
pub struct Pass<E> {
    pub evaluations: Vec<Evaluation>,
    pub effects: Vec<E>,
}

// === impl Engine ===

impl<C, E> Default for Engine<C, E> {
    fn default() -> Self {
        Self {
            components: Vec::new(),
            by_name: HashMap::new(),
        }
    }
}

impl<C, E> Engine<C, E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a component after all of the components it depends on.
    pub fn add(
        &mut self,
        name: impl Into<String>,
        component: impl Component<C, E> + 'static,
        depends_on: &[&str],
    ) -> Result<(), Error> {
        let name = name.into();
        if self.by_name.contains_key(&name) {
            return Err(Error::Duplicate(name));
        }

        let dependencies = depends_on
            .iter()
            .map(|dep| {
                self.by_name
                    .get(*dep)
                    .copied()
                    .ok_or_else(|| Error::UnknownDependency {
                        component: name.clone(),
                        dependency: dep.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        self.by_name.insert(name.clone(), self.components.len());
        self.components.push(Registered {
            name,
            dependencies,
            inner: Box::new(component),
        });
        Ok(())
    }

    /// Builder-style [`Engine::add`].
    pub fn with(
        mut self,
        name: impl Into<String>,
        component: impl Component<C, E> + 'static,
        depends_on: &[&str],
    ) -> Result<Self, Error> {
        self.add(name, component, depends_on)?;
        Ok(self)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.components.iter().map(|c| c.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Runs one pass over the snapshot.
    ///
    /// Components are visited in registration order. A component is skipped
    /// if any of its dependencies was not ready earlier in this pass. Effects
    /// are only returned if the pass completes.
    pub fn reconcile(&self, ctx: &C) -> Result<Pass<E>, Error> {
        let mut ready = vec![false; self.components.len()];
        let mut evaluations = Vec::with_capacity(self.components.len());
        let mut effects = Vec::new();

        for (idx, component) in self.components.iter().enumerate() {
            if let Some(&dep) = component.dependencies.iter().find(|&&dep| !ready[dep]) {
                let blocked_on = self.components[dep].name.clone();
                tracing::debug!(component = %component.name, %blocked_on, "Skipping component");
                evaluations.push(Evaluation {
                    component: component.name.clone(),
                    outcome: Outcome::Skipped { blocked_on },
                });
                continue;
            }

            let status = component.inner.status(ctx);
            if status.is_ready() {
                let before = effects.len();
                component
                    .inner
                    .configure(ctx, &mut effects)
                    .map_err(|source| Error::Configure {
                        component: component.name.clone(),
                        source,
                    })?;
                tracing::trace!(
                    component = %component.name,
                    effects = effects.len() - before,
                    "Configured component"
                );
                ready[idx] = true;
            } else {
                tracing::debug!(component = %component.name, %status, "Component is not ready");
            }

            evaluations.push(Evaluation {
                component: component.name.clone(),
                outcome: Outcome::Evaluated(status),
            });
        }

        Ok(Pass {
            evaluations,
            effects,
        })
    }

    /// Computes a single component's status outside of a pass, ignoring its
    /// dependencies. Useful to explain why a skipped component is not ready.
    pub fn status_of(&self, name: &str, ctx: &C) -> Option<Status> {
        let idx = *self.by_name.get(name)?;
        Some(self.components[idx].inner.status(ctx))
    }
}

// === impl Pass ===

impl<E> Pass<E> {
    /// The aggregate status: the first component in order that is not ready,
    /// or ready if all of them are.
    pub fn status(&self) -> Status {
        for Evaluation { outcome, .. } in &self.evaluations {
            match outcome {
                Outcome::Evaluated(status) if status.is_ready() => {}
                Outcome::Evaluated(status) => return status.clone(),
                Outcome::Skipped { blocked_on } => {
                    debug_assert!(false, "skipped on {blocked_on}, which reported ready");
                    return Status::waiting(format!("Waiting for {blocked_on}"));
                }
            }
        }
        Status::Ready
    }

    pub fn outcome(&self, component: &str) -> Option<&Outcome> {
        self.evaluations
            .iter()
            .find(|e| e.component == component)
            .map(|e| &e.outcome)
    }
}
