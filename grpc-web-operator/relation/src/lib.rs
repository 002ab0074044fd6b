#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

//! Relation data bags and the data exchanged over them.
//!
//! A relation is a named channel between this application and one remote
//! application. Each side owns a flat string map (a "bag") that only it
//! writes. The submodules describe what the operator reads from and writes
//! to each of its endpoints.

pub mod ingress;
pub mod mesh;
pub mod metrics_endpoint;
pub mod service_info;
mod store;

pub use self::store::{Bag, Key, Relation, RelationStore, Relations, TooManyRelations};
