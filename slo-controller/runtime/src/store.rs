//! Access to instances and their rules in the cluster.

use kube::api::{Api, DeleteParams, ListParams, PostParams};
use rpaas_slo_controller_k8s_api::{Labels, PrometheusRule, ResourceExt, RpaasInstance};
use thiserror::Error;

/// The object store the reconciler reads instances from and writes rules to.
///
/// Updates must be rejected with [`StoreError::Conflict`] when the rule's
/// resource version is stale.
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    async fn get_instance(&self, ns: &str, name: &str) -> Result<RpaasInstance, StoreError>;

    async fn list_rules(
        &self,
        ns: &str,
        selector: &Labels,
    ) -> Result<Vec<PrometheusRule>, StoreError>;

    async fn create_rule(&self, rule: &PrometheusRule) -> Result<(), StoreError>;

    async fn update_rule(&self, rule: &PrometheusRule) -> Result<(), StoreError>;

    async fn delete_rule(&self, rule: &PrometheusRule) -> Result<(), StoreError>;
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Api(kube::Error),
}

/// A [`Store`] backed by the Kubernetes API.
#[derive(Clone)]
pub struct KubeStore {
    client: kube::Client,
}

// === impl StoreError ===

impl From<kube::Error> for StoreError {
    fn from(error: kube::Error) -> Self {
        match error {
            kube::Error::Api(rsp) if rsp.code == 404 => Self::NotFound,
            kube::Error::Api(rsp) if rsp.code == 409 => Self::Conflict(rsp.message),
            error => Self::Api(error),
        }
    }
}

// === impl KubeStore ===

impl KubeStore {
    pub fn new(client: kube::Client) -> Self {
        Self { client }
    }

    fn rules(&self, rule: &PrometheusRule) -> Api<PrometheusRule> {
        let ns = rule.namespace().unwrap_or_default();
        Api::namespaced(self.client.clone(), &ns)
    }
}

#[async_trait::async_trait]
impl Store for KubeStore {
    async fn get_instance(&self, ns: &str, name: &str) -> Result<RpaasInstance, StoreError> {
        let api = Api::<RpaasInstance>::namespaced(self.client.clone(), ns);
        Ok(api.get(name).await?)
    }

    async fn list_rules(
        &self,
        ns: &str,
        selector: &Labels,
    ) -> Result<Vec<PrometheusRule>, StoreError> {
        let api = Api::<PrometheusRule>::namespaced(self.client.clone(), ns);
        let params = ListParams::default().labels(&selector.to_selector());
        Ok(api.list(&params).await?.items)
    }

    async fn create_rule(&self, rule: &PrometheusRule) -> Result<(), StoreError> {
        self.rules(rule)
            .create(&PostParams::default(), rule)
            .await?;
        Ok(())
    }

    async fn update_rule(&self, rule: &PrometheusRule) -> Result<(), StoreError> {
        self.rules(rule)
            .replace(&rule.name_any(), &PostParams::default(), rule)
            .await?;
        Ok(())
    }

    async fn delete_rule(&self, rule: &PrometheusRule) -> Result<(), StoreError> {
        self.rules(rule)
            .delete(&rule.name_any(), &DeleteParams::default())
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(code: u16) -> kube::Error {
        kube::Error::Api(kube::core::ErrorResponse {
            status: "Failure".to_string(),
            message: format!("status {code}"),
            reason: "Test".to_string(),
            code,
        })
    }

    #[test]
    fn maps_api_errors() {
        assert!(matches!(StoreError::from(api_error(404)), StoreError::NotFound));
        assert!(matches!(
            StoreError::from(api_error(409)),
            StoreError::Conflict(msg) if msg == "status 409"
        ));
        assert!(matches!(
            StoreError::from(api_error(500)),
            StoreError::Api(kube::Error::Api(rsp)) if rsp.code == 500
        ));
    }
}
