use crate::{
    admission::Admission,
    controller::{self, Context},
    core::Catalog,
    lease,
    metrics::Metrics,
    reconcile::Reconciler,
    store::KubeStore,
    templates::AlertTemplates,
};
use anyhow::{bail, Context as _, Result};
use clap::Parser;
use prometheus_client::registry::Registry;
use std::sync::Arc;
use tokio::time::Duration;
use tracing::{info, info_span, Instrument};

#[derive(Debug, Parser)]
#[clap(
    name = "rpaas-slo-controller",
    about = "Maintains SLO alerting rules for rpaas instances"
)]
pub struct Args {
    #[clap(
        long,
        default_value = "rpaas_slo=info,warn",
        env = "RPAAS_SLO_CONTROLLER_LOG"
    )]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(flatten)]
    server: kubert::ServerArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,

    /// Disables the admission controller server.
    #[clap(long)]
    admission_controller_disabled: bool,

    /// Template for the `link` annotation of generated alerts.
    #[clap(long, env = "ALERT_LINK_TEMPLATE")]
    alert_link_template: Option<String>,

    /// Template for the `message` annotation of generated alerts.
    #[clap(long, env = "ALERT_MESSAGE_TEMPLATE")]
    alert_message_template: Option<String>,

    /// Seconds between periodic reconciliations of each instance.
    #[clap(long, default_value = "300")]
    resync_interval: u64,

    /// Seconds to wait before retrying a failed reconciliation.
    #[clap(long, default_value = "5")]
    error_requeue: u64,

    /// Only reconcile while holding the controller Lease.
    #[clap(long)]
    leader_election: bool,

    #[clap(long, default_value = "tsuru-system")]
    lease_namespace: String,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            admin,
            client,
            log_level,
            log_format,
            server,
            admission_controller_disabled,
            alert_link_template,
            alert_message_template,
            resync_interval,
            error_requeue,
            leader_election,
            lease_namespace,
        } = self;

        let server = if admission_controller_disabled {
            None
        } else {
            Some(server)
        };

        let templates = AlertTemplates::new(alert_link_template, alert_message_template)
            .context("invalid alert template")?;
        let catalog = Arc::new(Catalog::default());

        let mut prom = <Registry>::default();
        let metrics = Metrics::register(prom.sub_registry_with_prefix("rpaas_slo"));
        let rt_metrics = kubert::RuntimeMetrics::register(prom.sub_registry_with_prefix("kube"));

        let runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_metrics(rt_metrics)
            .with_admin(admin.into_builder().with_prometheus(prom))
            .with_client(client)
            .with_optional_server(server)
            .build()
            .await?;

        let leader = if leader_election {
            let hostname = std::env::var("HOSTNAME")
                .context("failed to fetch `HOSTNAME` environment variable")?;
            let leader = lease::init(&runtime, &lease_namespace, &hostname).await?;
            info!(%hostname, ns = %lease_namespace, "Leader election enabled");
            Some(leader)
        } else {
            None
        };

        let reconciler = Reconciler::new(KubeStore::new(runtime.client()), catalog.clone())
            .with_templates(templates)
            .with_metrics(metrics);
        let ctx = Context::new(
            reconciler,
            leader,
            Duration::from_secs(resync_interval),
            Duration::from_secs(error_requeue),
        );

        // Stop the control loop once shutdown is signaled; dropping the
        // release handle lets the runtime complete.
        let client = runtime.client();
        let shutdown = runtime.shutdown_handle();
        tokio::spawn(
            async move {
                tokio::select! {
                    _ = controller::run(client, ctx) => {}
                    _release = shutdown.signaled() => {
                        info!("Shutting down");
                    }
                }
            }
            .instrument(info_span!("controller")),
        );

        let runtime = runtime.spawn_server(move || Admission::new(catalog.clone()));

        // Block the main thread on the shutdown signal. Once it fires, wait for the background tasks to
        // complete before exiting.
        if runtime.run().await.is_err() {
            bail!("Aborted");
        }

        Ok(())
    }
}
