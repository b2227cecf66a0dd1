use crate::k8s::ObjectMeta;
use anyhow::Result;
use k8s_openapi::api::coordination::v1 as coordv1;
use kube::api::{Api, Patch, PatchParams};
use std::sync::Arc;
use tokio::{sync::watch, time};

const LEASE_DURATION: time::Duration = time::Duration::from_secs(30);
const LEASE_NAME: &str = "rpaas-slo-controller";
const RENEW_GRACE_PERIOD: time::Duration = time::Duration::from_secs(1);
const FIELD_MANAGER: &str = "rpaas-slo-controller";

/// The lease claims observed by a replica, and the identity it claims with.
#[derive(Clone)]
pub struct Leader {
    claims: watch::Receiver<Arc<kubert::lease::Claim>>,
    claimant: String,
}

pub async fn init<T>(runtime: &kubert::Runtime<T>, ns: &str, claimant: &str) -> Result<Leader> {
    let lease = coordv1::Lease {
        metadata: ObjectMeta {
            name: Some(LEASE_NAME.to_string()),
            namespace: Some(ns.to_string()),
            // Specifying a resource version of "0" means that we will
            // only create the Lease if it does not already exist.
            resource_version: Some("0".to_string()),
            labels: Some(
                [(
                    "app.kubernetes.io/name".to_string(),
                    "rpaas-slo-controller".to_string(),
                )]
                .into_iter()
                .collect(),
            ),
            ..Default::default()
        },
        spec: None,
    };
    let api = Api::<coordv1::Lease>::namespaced(runtime.client(), ns);
    let created = api
        .patch(
            LEASE_NAME,
            &PatchParams {
                field_manager: Some(FIELD_MANAGER.to_string()),
                ..Default::default()
            },
            &Patch::Apply(lease),
        )
        .await;
    ensure_created(created)?;

    let params = kubert::lease::ClaimParams {
        lease_duration: LEASE_DURATION,
        renew_grace_period: RENEW_GRACE_PERIOD,
    };
    let (claims, _task) = kubert::lease::LeaseManager::init(api, LEASE_NAME)
        .await?
        .spawn(claimant, params)
        .await?;
    Ok(Leader::new(claims, claimant))
}

/// Accepts a Lease that was created or already existed.
fn ensure_created(res: Result<coordv1::Lease, kube::Error>) -> Result<(), kube::Error> {
    match res {
        Ok(lease) => tracing::info!(?lease, "Created Lease resource"),
        Err(kube::Error::Api(rsp)) if rsp.code == 409 => {
            tracing::debug!("Lease already exists, no need to create it")
        }
        Err(error) => return Err(error),
    }
    Ok(())
}

// === impl Leader ===

impl Leader {
    pub(crate) fn new(
        claims: watch::Receiver<Arc<kubert::lease::Claim>>,
        claimant: impl ToString,
    ) -> Self {
        Self {
            claims,
            claimant: claimant.to_string(),
        }
    }

    /// Returns true if this replica currently holds the lease.
    pub fn is_current(&self) -> bool {
        self.claims.borrow().is_current_for(&self.claimant)
    }
}
