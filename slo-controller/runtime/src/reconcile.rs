//! Convergence of an instance's PrometheusRules to its SLO classification.
//!
//! Each pass is level-triggered: the desired rules are recomputed from the
//! instance as it is now and the rules currently stored for it are created,
//! updated or deleted to match. A failed pass leaves whatever it already wrote
//! in place; the next pass picks up from the stored state.

use crate::{
    desired,
    metrics::Metrics,
    store::{Store, StoreError},
    templates::AlertTemplates,
};
use rpaas_slo_controller_core::{self as core, Catalog, GenerateRules, MultiWindow, Route, Slo};
use rpaas_slo_controller_k8s_api::{labels, Labels, PrometheusRule, ResourceExt, RpaasInstance};
use std::{collections::BTreeMap, fmt, sync::Arc};
use thiserror::Error;
use tracing::{debug, info};


pub struct Reconciler<S, G = MultiWindow> {
    store: S,
    catalog: Arc<Catalog>,
    generator: G,
    templates: AlertTemplates,
    metrics: Metrics,
}

/// The classification an instance was reconciled against.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The instance declares a known class; its rules were converged.
    Classified,
    /// The instance declares no class; its rules were removed.
    Unclassified,
    /// The instance declares a class missing from the catalog; its rules were
    /// removed.
    UnknownClass,
    /// The instance no longer exists.
    Deleted,
}

/// The rule names written during a successful pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Changes {
    pub created: Vec<String>,
    pub updated: Vec<String>,
    pub deleted: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reconciled {
    pub outcome: Outcome,
    pub changes: Changes,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WriteOp {
    Create,
    Update,
    Delete,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to get RpaasInstance {namespace}/{name}: {source}")]
    GetInstance {
        namespace: String,
        name: String,
        #[source]
        source: StoreError,
    },

    #[error("failed to list PrometheusRules in {namespace} matching {selector}: {source}")]
    ListRules {
        namespace: String,
        selector: String,
        #[source]
        source: StoreError,
    },

    #[error("failed to {op} PrometheusRule {namespace}/{name}: {source}")]
    Write {
        op: WriteOp,
        namespace: String,
        name: String,
        #[source]
        source: StoreError,
    },
}

// === impl Reconciler ===

impl<S: Store> Reconciler<S> {
    pub fn new(store: S, catalog: Arc<Catalog>) -> Self {
        Self {
            store,
            catalog,
            generator: MultiWindow::default(),
            templates: AlertTemplates::default(),
            metrics: Metrics::default(),
        }
    }
}

impl<S, G> Reconciler<S, G>
where
    S: Store,
    G: GenerateRules + Send + Sync,
{
    pub fn with_generator<H: GenerateRules>(self, generator: H) -> Reconciler<S, H> {
        Reconciler {
            store: self.store,
            catalog: self.catalog,
            generator,
            templates: self.templates,
            metrics: self.metrics,
        }
    }

    pub fn with_templates(self, templates: AlertTemplates) -> Self {
        Self { templates, ..self }
    }

    pub fn with_metrics(self, metrics: Metrics) -> Self {
        Self { metrics, ..self }
    }

    /// Converges the rules of the instance `ns`/`name`.
    ///
    /// Store errors abort the pass and are returned for the caller to log and
    /// retry; classification problems are not errors and remove the instance's
    /// rules.
    pub async fn reconcile(&self, ns: &str, name: &str) -> Result<Reconciled, Error> {
        let res = self.converge(ns, name).await;
        match &res {
            Ok(reconciled) => self.metrics.reconciled(reconciled.outcome.as_str()),
            Err(_) => self.metrics.reconciled("error"),
        }
        res
    }

    async fn converge(&self, ns: &str, name: &str) -> Result<Reconciled, Error> {
        let instance = match self.store.get_instance(ns, name).await {
            Ok(instance) => instance,
            Err(StoreError::NotFound) => {
                // The labels selecting the instance's rules were only known to
                // the instance itself. Rules in its own namespace are garbage
                // collected through their owner reference.
                debug!(%ns, %name, "RpaasInstance not found");
                return Ok(Reconciled::new(Outcome::Deleted, Changes::default()));
            }
            Err(source) => {
                return Err(Error::GetInstance {
                    namespace: ns.to_string(),
                    name: name.to_string(),
                    source,
                })
            }
        };

        let route = Route::for_namespace(ns);
        let mut actual = self.actual_rules(&instance, &route).await?;

        let class = match core::classify(instance.tags(), &self.catalog) {
            Ok(Some(class)) => class,
            Ok(None) => {
                debug!(%ns, %name, "Could not find an SLO class");
                let changes = self.delete_stale(actual, Changes::default()).await?;
                return Ok(Reconciled::new(Outcome::Unclassified, changes));
            }
            Err(error) => {
                info!(%ns, %name, %error, "Invalid SLO class");
                let changes = self.delete_stale(actual, Changes::default()).await?;
                return Ok(Reconciled::new(Outcome::UnknownClass, changes));
            }
        };

        let slo = Slo::for_instance(ns, name, class)
            .with_team_owner(instance.label(labels::TEAM_OWNER))
            .with_annotations(self.templates.render(&instance));

        let mut changes = Changes::default();
        for rule in self.generator.generate(&slo) {
            let mut rule = desired::stamp(rule, &instance, &route);
            let rule_name = rule.name_any();
            match actual.remove(&rule_name) {
                None => {
                    self.write(WriteOp::Create, &rule).await?;
                    changes.created.push(rule_name);
                }
                Some(existing) => {
                    rule.metadata.resource_version = existing.metadata.resource_version;
                    self.write(WriteOp::Update, &rule).await?;
                    changes.updated.push(rule_name);
                }
            }
        }

        let changes = self.delete_stale(actual, changes).await?;
        Ok(Reconciled {
            outcome: Outcome::Classified,
            changes,
        })
    }

    /// Lists the rules stored for `instance`, keyed by name.
    ///
    /// Rules are selected by instance and service name only, so that a change of
    /// team owner does not orphan them.
    async fn actual_rules(
        &self,
        instance: &RpaasInstance,
        route: &Route,
    ) -> Result<BTreeMap<String, PrometheusRule>, Error> {
        let selector = Labels::from_iter(
            [labels::INSTANCE_NAME, labels::SERVICE_NAME].map(|key| (key, instance.label(key))),
        );
        match self.store.list_rules(&route.namespace, &selector).await {
            Ok(rules) => Ok(rules
                .into_iter()
                .map(|rule| (rule.name_any(), rule))
                .collect()),
            Err(source) => Err(Error::ListRules {
                namespace: route.namespace.clone(),
                selector: selector.to_selector(),
                source,
            }),
        }
    }

    /// Deletes every rule in `stale`, stopping at the first failure.
    async fn delete_stale(
        &self,
        stale: BTreeMap<String, PrometheusRule>,
        mut changes: Changes,
    ) -> Result<Changes, Error> {
        for (name, rule) in stale {
            self.write(WriteOp::Delete, &rule).await?;
            changes.deleted.push(name);
        }
        Ok(changes)
    }

    async fn write(&self, op: WriteOp, rule: &PrometheusRule) -> Result<(), Error> {
        let res = match op {
            WriteOp::Create => self.store.create_rule(rule).await,
            WriteOp::Update => self.store.update_rule(rule).await,
            WriteOp::Delete => match self.store.delete_rule(rule).await {
                Err(StoreError::NotFound) => Ok(()),
                res => res,
            },
        };

        let ns = rule.namespace().unwrap_or_default();
        let name = rule.name_any();
        self.metrics.wrote(op.as_str(), res.is_ok());
        match res {
            Ok(()) => {
                info!(%ns, %name, "{} PrometheusRule", op.past_tense());
                Ok(())
            }
            Err(source) => Err(Error::Write {
                op,
                namespace: ns,
                name,
                source,
            }),
        }
    }
}

// === impl Outcome ===

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Classified => "classified",
            Self::Unclassified => "unclassified",
            Self::UnknownClass => "unknown_class",
            Self::Deleted => "deleted",
        }
    }
}

// === impl Reconciled ===

impl Reconciled {
    fn new(outcome: Outcome, changes: Changes) -> Self {
        Self { outcome, changes }
    }
}

// === impl WriteOp ===

impl WriteOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    fn past_tense(&self) -> &'static str {
        match self {
            Self::Create => "Created",
            Self::Update => "Updated",
            Self::Delete => "Deleted",
        }
    }
}

impl fmt::Display for WriteOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// === impl Error ===

impl Error {
    /// Returns true if the pass failed because a rule changed since it was read.
    pub fn is_stale_version(&self) -> bool {
        matches!(
            self,
            Self::Write {
                op: WriteOp::Update,
                source: StoreError::Conflict(_),
                ..
            }
        )
    }
}
