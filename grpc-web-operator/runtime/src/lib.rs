#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use grpc_web_operator_components as components;

mod args;
mod controller;
mod index;
mod lease;
mod metrics;
mod reconcile;

pub use self::args::Args;
