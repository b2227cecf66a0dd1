//! Placement, labeling and ownership of generated rules.

use rpaas_slo_controller_core::Route;
use rpaas_slo_controller_k8s_api::{
    labels, OwnerReference, PrometheusRule, Resource, ResourceExt, RpaasInstance,
};

/// Places a generated rule in the instance's rules namespace and stamps the
/// instance's identifying labels on it.
///
/// Rules stored alongside the instance are owned by it so that they are garbage
/// collected with it. Rules routed to a pool namespace cannot reference an owner
/// in another namespace and must be deleted explicitly.
pub fn stamp(mut rule: PrometheusRule, instance: &RpaasInstance, route: &Route) -> PrometheusRule {
    rule.metadata.namespace = Some(route.namespace.clone());

    let rule_labels = rule.labels_mut();
    if let Some(pool) = &route.pool {
        rule_labels.insert(labels::POOL.to_string(), pool.clone());
    }
    for key in [labels::TEAM_OWNER, labels::INSTANCE_NAME, labels::SERVICE_NAME] {
        rule_labels.insert(key.to_string(), instance.label(key).to_string());
    }
    if rule.metadata.annotations.is_none() {
        rule.metadata.annotations = Some(Default::default());
    }

    let ns = instance.namespace().unwrap_or_default();
    if route.is_local_to(&ns) {
        rule.owner_references_mut().push(owner_reference(instance));
    }

    rule
}

/// A controller reference to `instance` that blocks its deletion until the
/// owned object is removed.
pub fn owner_reference(instance: &RpaasInstance) -> OwnerReference {
    OwnerReference {
        api_version: RpaasInstance::api_version(&()).to_string(),
        kind: RpaasInstance::kind(&()).to_string(),
        name: instance.name_any(),
        uid: instance.uid().unwrap_or_default(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    }
}
