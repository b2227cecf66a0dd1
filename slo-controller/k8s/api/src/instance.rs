use crate::labels;
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// An rpaas instance managed by the rpaas operator.
///
/// Only the metadata is meaningful to this controller: labels identify the
/// instance's rules and the tags annotation carries its SLO classification.
#[derive(Clone, Debug, Default, PartialEq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "extensions.tsuru.io",
    version = "v1alpha1",
    kind = "RpaasInstance",
    derive = "PartialEq",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct RpaasInstanceSpec {
    pub plan_name: Option<String>,
    pub flavors: Option<Vec<String>>,
    pub replicas: Option<i32>,
}

// === impl RpaasInstance ===

impl RpaasInstance {
    /// Returns the raw, comma-separated tags annotation, if set.
    pub fn tags(&self) -> Option<&str> {
        self.annotations()
            .get(labels::TAGS_ANNOTATION)
            .map(String::as_str)
    }

    /// Returns the value of `key` in the instance's labels, or an empty string
    /// when the label is not set.
    pub fn label(&self, key: &str) -> &str {
        self.labels().get(key).map(String::as_str).unwrap_or_default()
    }
}
