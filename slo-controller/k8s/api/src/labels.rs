//! Well-known metadata keys and label selector rendering.

use std::collections::BTreeMap;

/// Comma-separated free-form tags set on an instance.
pub const TAGS_ANNOTATION: &str = "rpaas.extensions.tsuru.io/tags";

pub const TEAM_OWNER: &str = "rpaas.extensions.tsuru.io/team-owner";
pub const INSTANCE_NAME: &str = "rpaas.extensions.tsuru.io/instance-name";
pub const SERVICE_NAME: &str = "rpaas.extensions.tsuru.io/service-name";

/// Set on rules stored in a shared per-pool namespace.
pub const POOL: &str = "tsuru.io/pool";

pub type Map = BTreeMap<String, String>;

/// An equality-based label set, rendered as a Kubernetes label selector.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Labels(Map);

// === impl Labels ===

impl Labels {
    /// Returns true if every label in this set is present with the same value
    /// in `labels`.
    pub fn matches(&self, labels: &Map) -> bool {
        self.0.iter().all(|(k, v)| labels.get(k) == Some(v))
    }

    /// Renders the set as a selector string, e.g. `a=b,c=d`.
    pub fn to_selector(&self) -> String {
        self.0
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl<K: ToString, V: ToString> FromIterator<(K, V)> for Labels {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }
}
