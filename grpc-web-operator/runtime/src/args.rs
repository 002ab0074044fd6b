use crate::{
    components::{self, Config},
    controller::Controller,
    index::{Index, RELATION_LABEL},
    lease,
    metrics::{ControllerMetrics, ReconcileMetrics},
    reconcile::{Identity, Reconciler},
};
use anyhow::{bail, Result};
use clap::Parser;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::runtime::watcher;
use prometheus_client::registry::Registry;
use tokio::{sync::mpsc, time::Duration};
use tracing::{info_span, Instrument};

// The maximum number of ConfigMap updates to buffer. A pass produces at most
// a handful of updates, so this comfortably holds several passes.
const UPDATE_QUEUE_SIZE: usize = 100;

#[derive(Debug, Parser)]
#[clap(
    name = "grpc-web-operator",
    about = "Runs an Envoy gRPC-Web proxy for a related gRPC service"
)]
pub struct Args {
    #[clap(
        long,
        default_value = "grpc_web_operator=info,warn",
        env = "GRPC_WEB_OPERATOR_LOG"
    )]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,

    /// The name of the application this unit belongs to.
    #[clap(long, default_value = "grpc-web", env = "GRPC_WEB_OPERATOR_APP")]
    app_name: String,

    /// The namespace the application and its relations live in.
    #[clap(long, default_value = "kubeflow", env = "POD_NAMESPACE")]
    namespace: String,

    /// The Deployment owning the leader election Lease. Defaults to the
    /// application name.
    #[clap(long)]
    deployment_name: Option<String>,

    /// The port of Envoy's admin interface.
    #[clap(long, default_value = "9901")]
    admin_port: u16,

    /// The port Envoy serves gRPC-Web on.
    #[clap(long, default_value = "9090")]
    http_port: u16,

    #[clap(long, default_value = "/ml_metadata")]
    ingress_prefix: String,

    #[clap(long, default_value = "/ml_metadata.MetadataStoreService/")]
    mesh_path_prefix: String,

    /// Where the workload reads the rendered Envoy configuration from.
    #[clap(long, default_value = "/envoy/envoy.json")]
    config_path: String,

    #[clap(
        long,
        default_value = "10",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    reconcile_period_secs: u64,

    #[clap(long, default_value = "5000")]
    patch_timeout_ms: u64,

    #[clap(
        long,
        default_value = "30",
        value_parser = clap::value_parser!(u64).range(2..)
    )]
    lease_duration_secs: u64,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            log_level,
            log_format,
            client,
            admin,
            app_name,
            namespace,
            deployment_name,
            admin_port,
            http_port,
            ingress_prefix,
            mesh_path_prefix,
            config_path,
            reconcile_period_secs,
            patch_timeout_ms,
            lease_duration_secs,
        } = self;

        let config = Config {
            admin_port,
            http_port,
            ingress_prefix,
            mesh_path_prefix,
            config_path,
        };
        let engine = components::engine()?;

        let mut prom = <Registry>::default();
        let reconcile_metrics =
            ReconcileMetrics::register(prom.sub_registry_with_prefix("reconcile"));
        let controller_metrics = ControllerMetrics::register(&mut prom);
        let rt_metrics = kubert::RuntimeMetrics::register(prom.sub_registry_with_prefix("kube"));

        let mut runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_metrics(rt_metrics)
            .with_admin(admin.into_builder().with_prometheus(prom))
            .with_client(client)
            .build()
            .await?;

        let hostname =
            std::env::var("HOSTNAME").expect("Failed to fetch `HOSTNAME` environment variable");

        let deployment_name = deployment_name.unwrap_or_else(|| app_name.clone());
        let claims = lease::init(
            &runtime,
            &namespace,
            &app_name,
            &deployment_name,
            &hostname,
            Duration::from_secs(lease_duration_secs),
        )
        .await?;

        // Relation bags are indexed as they change. Each change requests a
        // pass; requests coalesce while one is pending.
        let (triggers_tx, triggers_rx) = mpsc::channel(1);
        let index = Index::shared(app_name.clone(), triggers_tx);
        let config_maps = runtime.watch_namespaced::<ConfigMap>(
            namespace.clone(),
            watcher::Config::default().labels(RELATION_LABEL),
        );
        tokio::spawn(
            kubert::index::namespaced(index.clone(), config_maps)
                .instrument(info_span!("relations")),
        );

        let (updates_tx, updates_rx) = mpsc::channel(UPDATE_QUEUE_SIZE);
        let reconciler = Reconciler::new(
            engine,
            Identity {
                app: app_name,
                model: namespace.clone(),
                unit: hostname.clone(),
            },
            config,
            index,
            claims.clone(),
            updates_tx,
            reconcile_metrics,
        );
        tokio::spawn(
            reconciler
                .run(
                    triggers_rx,
                    Duration::from_secs(reconcile_period_secs),
                    runtime.shutdown_handle(),
                )
                .instrument(info_span!("reconciler")),
        );

        let controller = Controller::new(
            claims,
            runtime.client(),
            namespace,
            hostname,
            updates_rx,
            Duration::from_millis(patch_timeout_ms),
            controller_metrics,
        );
        tokio::spawn(controller.run().instrument(info_span!("controller")));

        // Wait for the shutdown signal, then for the reconciler to drain.
        if runtime.run().await.is_err() {
            bail!("Aborted");
        }

        Ok(())
    }
}
