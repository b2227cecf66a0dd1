//! Placement of an instance's rules.
//!
//! Instances living in a pool namespace (`rpaasv2-fe-<pool>` or
//! `rpaasv2-be-<pool>`) have their rules stored in the shared `tsuru-<pool>`
//! namespace. All other instances keep their rules alongside themselves.

const POOL_NAMESPACE_PREFIXES: [&str; 2] = ["rpaasv2-be-", "rpaasv2-fe-"];
const POOL_RULES_NAMESPACE_PREFIX: &str = "tsuru-";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Route {
    /// The pool encoded in the instance namespace, if any.
    pub pool: Option<String>,
    /// The namespace in which the instance's rules are stored.
    pub namespace: String,
}

// === impl Route ===

impl Route {
    pub fn for_namespace(ns: &str) -> Self {
        let pool = POOL_NAMESPACE_PREFIXES
            .iter()
            .find_map(|prefix| ns.strip_prefix(prefix))
            .filter(|pool| !pool.is_empty())
            .map(str::to_string);
        let namespace = match pool {
            Some(ref pool) => format!("{POOL_RULES_NAMESPACE_PREFIX}{pool}"),
            None => ns.to_string(),
        };
        Self { pool, namespace }
    }

    /// Returns true when rules are stored in the instance's own namespace, i.e.
    /// when they may be owned by the instance.
    pub fn is_local_to(&self, ns: &str) -> bool {
        self.namespace == ns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_namespaces() {
        assert_eq!(
            Route::for_namespace("rpaasv2-fe-mypool"),
            Route {
                pool: Some("mypool".to_string()),
                namespace: "tsuru-mypool".to_string(),
            }
        );
        assert_eq!(
            Route::for_namespace("rpaasv2-be-other-pool"),
            Route {
                pool: Some("other-pool".to_string()),
                namespace: "tsuru-other-pool".to_string(),
            }
        );
        assert!(!Route::for_namespace("rpaasv2-fe-mypool").is_local_to("rpaasv2-fe-mypool"));
    }

    #[test]
    fn plain_namespaces() {
        for ns in ["default", "rpaasv2", "rpaasv2-fe", "rpaasv2-fe-", "x-rpaasv2-fe-pool"] {
            let route = Route::for_namespace(ns);
            assert_eq!(route.pool, None, "{ns}");
            assert_eq!(route.namespace, ns);
            assert!(route.is_local_to(ns));
        }
    }
}
