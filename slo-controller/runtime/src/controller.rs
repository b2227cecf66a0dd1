//! Drives the reconciler from watches on instances and the rules they own.

use crate::{
    k8s::{PrometheusRule, ResourceExt, RpaasInstance},
    lease::Leader,
    reconcile::{self, Reconciler},
    store::{KubeStore, Store},
};
use futures::prelude::*;
use kube::{
    runtime::{controller::Action, watcher, Controller},
    Api, Client,
};
use std::sync::Arc;
use tokio::time::Duration;
use tracing::{debug, error, info};

pub struct Context<S = KubeStore> {
    reconciler: Reconciler<S>,
    leader: Option<Leader>,
    resync: Duration,
    error_requeue: Duration,
}

// === impl Context ===

impl<S> Context<S> {
    pub fn new(
        reconciler: Reconciler<S>,
        leader: Option<Leader>,
        resync: Duration,
        error_requeue: Duration,
    ) -> Self {
        Self {
            reconciler,
            leader,
            resync,
            error_requeue,
        }
    }

    fn is_leader(&self) -> bool {
        self.leader.as_ref().map_or(true, Leader::is_current)
    }
}

/// Runs the control loop until its watches terminate.
pub async fn run(client: Client, ctx: Context) {
    let instances = Api::<RpaasInstance>::all(client.clone());
    let rules = Api::<PrometheusRule>::all(client);

    Controller::new(instances, watcher::Config::default())
        .owns(rules, watcher::Config::default())
        .run(reconcile, error_policy, Arc::new(ctx))
        .for_each(|res| async move {
            match res {
                Ok((obj, _)) => debug!(ns = ?obj.namespace, name = %obj.name, "Reconciled"),
                Err(error) => debug!(%error, "Reconcile failed"),
            }
        })
        .await;
}

async fn reconcile<S: Store>(
    instance: Arc<RpaasInstance>,
    ctx: Arc<Context<S>>,
) -> Result<Action, reconcile::Error> {
    let ns = instance.namespace().unwrap_or_default();
    let name = instance.name_any();

    // Poll at the error delay so that a newly elected leader converges
    // without waiting for a full resync.
    if !ctx.is_leader() {
        debug!(%ns, %name, "Not the leader; skipping");
        return Ok(Action::requeue(ctx.error_requeue));
    }

    let reconciled = ctx.reconciler.reconcile(&ns, &name).await?;
    info!(
        %ns,
        %name,
        outcome = reconciled.outcome.as_str(),
        created = reconciled.changes.created.len(),
        updated = reconciled.changes.updated.len(),
        deleted = reconciled.changes.deleted.len(),
        "Reconciled RpaasInstance",
    );
    Ok(Action::requeue(ctx.resync))
}

fn error_policy<S>(
    instance: Arc<RpaasInstance>,
    error: &reconcile::Error,
    ctx: Arc<Context<S>>,
) -> Action {
    if error.is_stale_version() {
        debug!(name = %instance.name_any(), %error, "Rule changed during reconciliation");
    } else {
        error!(
            ns = %instance.namespace().unwrap_or_default(),
            name = %instance.name_any(),
            %error,
            "Failed to reconcile RpaasInstance",
        );
    }
    Action::requeue(ctx.error_requeue)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        core::Catalog,
        k8s::{Labels, ObjectMeta},
        store::StoreError,
    };
    use chrono::{DateTime, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::watch;

    const RESYNC: Duration = Duration::from_secs(300);
    const ERROR_REQUEUE: Duration = Duration::from_secs(5);

    /// A store in which every instance has been deleted.
    #[derive(Clone, Default)]
    struct Empty(Arc<AtomicUsize>);

    #[async_trait::async_trait]
    impl Store for Empty {
        async fn get_instance(&self, _: &str, _: &str) -> Result<RpaasInstance, StoreError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::NotFound)
        }

        async fn list_rules(
            &self,
            _: &str,
            _: &Labels,
        ) -> Result<Vec<PrometheusRule>, StoreError> {
            unreachable!("deleted instances have no rules to list")
        }

        async fn create_rule(&self, _: &PrometheusRule) -> Result<(), StoreError> {
            unreachable!("deleted instances have no rules to create")
        }

        async fn update_rule(&self, _: &PrometheusRule) -> Result<(), StoreError> {
            unreachable!("deleted instances have no rules to update")
        }

        async fn delete_rule(&self, _: &PrometheusRule) -> Result<(), StoreError> {
            unreachable!("deleted instances have no rules to delete")
        }
    }

    fn context(store: Empty, leader: Option<Leader>) -> Arc<Context<Empty>> {
        let reconciler = Reconciler::new(store, Arc::new(Catalog::default()));
        Arc::new(Context::new(reconciler, leader, RESYNC, ERROR_REQUEUE))
    }

    fn leader(holder: &str) -> Leader {
        let claim = kubert::lease::Claim {
            holder: holder.to_string(),
            expiry: DateTime::<Utc>::MAX_UTC,
        };
        let (_claims_tx, claims_rx) = watch::channel(Arc::new(claim));
        Leader::new(claims_rx, "pod-a")
    }

    fn instance() -> Arc<RpaasInstance> {
        Arc::new(RpaasInstance {
            metadata: ObjectMeta {
                namespace: Some("default".to_string()),
                name: Some("instance1".to_string()),
                ..Default::default()
            },
            spec: Default::default(),
        })
    }

    #[tokio::test(flavor = "current_thread")]
    async fn resyncs_after_success() {
        let store = Empty::default();
        let action = reconcile(instance(), context(store.clone(), None))
            .await
            .unwrap();
        assert_eq!(action, Action::requeue(RESYNC));
        assert_eq!(store.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn leader_reconciles() {
        let store = Empty::default();
        let action = reconcile(instance(), context(store.clone(), Some(leader("pod-a"))))
            .await
            .unwrap();
        assert_eq!(action, Action::requeue(RESYNC));
        assert_eq!(store.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn follower_polls_for_leadership() {
        let store = Empty::default();
        let action = reconcile(instance(), context(store.clone(), Some(leader("pod-b"))))
            .await
            .unwrap();
        assert_eq!(action, Action::requeue(ERROR_REQUEUE));
        assert_eq!(store.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn retries_errors_quickly() {
        let error = reconcile::Error::GetInstance {
            namespace: "default".to_string(),
            name: "instance1".to_string(),
            source: StoreError::Conflict("test".to_string()),
        };
        let action = error_policy(instance(), &error, context(Empty::default(), None));
        assert_eq!(action, Action::requeue(ERROR_REQUEUE));
    }
}
