#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

//! A dependency-ordered reconciliation engine.
//!
//! Components are registered once, each naming the components it depends on.
//! Every lifecycle event results in a single [`Engine::reconcile`] pass over
//! an immutable snapshot of external state. The pass computes every
//! component's [`Status`] and collects the side effects of the components
//! whose dependencies were all ready.

mod engine;
mod status;

pub use self::{
    engine::{Component, Engine, Error, Evaluation, Outcome, Pass},
    status::Status,
};
