#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use rpaas_slo_controller_core as core;
pub use rpaas_slo_controller_k8s_api as k8s;

mod admission;
mod args;
mod controller;
mod desired;
mod lease;
mod metrics;
mod reconcile;
mod store;
mod templates;

pub use self::{
    admission::Admission,
    args::Args,
    metrics::Metrics,
    reconcile::{Changes, Error, Outcome, Reconciled, Reconciler, WriteOp},
    store::{KubeStore, Store, StoreError},
    templates::AlertTemplates,
};
