#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod instance;
pub mod labels;
pub mod prometheus_rule;

pub use self::{
    instance::{RpaasInstance, RpaasInstanceSpec},
    labels::Labels,
    prometheus_rule::{PrometheusRule, PrometheusRuleSpec, Rule, RuleGroup},
};
pub use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
pub use kube::{Resource, ResourceExt};
