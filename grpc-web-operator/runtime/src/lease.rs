use anyhow::Result;
use k8s_openapi::{
    api::{apps::v1::Deployment, coordination::v1 as coordv1},
    apimachinery::pkg::apis::meta::v1::ObjectMeta,
};
use kube::{
    api::{Api, Patch, PatchParams},
    Resource,
};
use std::sync::Arc;
use tokio::{sync::watch, time};

const RENEW_GRACE_PERIOD: time::Duration = time::Duration::from_secs(1);

/// Ensures the application's Lease exists and starts contending for it.
///
/// The Lease is owned by the operator's Deployment when it can be found, so
/// that it is removed along with the application.
pub async fn init<T>(
    runtime: &kubert::Runtime<T>,
    ns: &str,
    app: &str,
    deployment_name: &str,
    hostname: &str,
    lease_duration: time::Duration,
) -> Result<watch::Receiver<Arc<kubert::lease::Claim>>> {
    let lease_name = format!("{app}-leader");

    let owner_references = match Api::<Deployment>::namespaced(runtime.client(), ns)
        .get_opt(deployment_name)
        .await?
    {
        Some(deployment) => deployment.controller_owner_ref(&()).map(|r| vec![r]),
        None => {
            tracing::info!(
                deployment = %deployment_name,
                "Deployment not found; Lease will not be owned"
            );
            None
        }
    };

    let lease = coordv1::Lease {
        metadata: ObjectMeta {
            name: Some(lease_name.clone()),
            namespace: Some(ns.to_string()),
            // Specifying a resource version of "0" means that we will
            // only create the Lease if it does not already exist.
            resource_version: Some("0".to_string()),
            owner_references,
            labels: Some(
                [
                    ("app.kubernetes.io/name".to_string(), app.to_string()),
                    (
                        "app.kubernetes.io/managed-by".to_string(),
                        crate::controller::FIELD_MANAGER.to_string(),
                    ),
                ]
                .into_iter()
                .collect(),
            ),
            ..Default::default()
        },
        spec: None,
    };
    let api = Api::<coordv1::Lease>::namespaced(runtime.client(), ns);
    match api
        .patch(
            &lease_name,
            &PatchParams::apply(crate::controller::FIELD_MANAGER),
            &Patch::Apply(lease),
        )
        .await
    {
        Ok(lease) => tracing::info!(?lease, "Created Lease resource"),
        Err(kube::Error::Api(_)) => tracing::debug!("Lease already exists, no need to create it"),
        Err(error) => return Err(error.into()),
    };

    let params = kubert::lease::ClaimParams {
        lease_duration,
        renew_grace_period: RENEW_GRACE_PERIOD,
    };
    let (claims, _task) = kubert::lease::LeaseManager::init(api, lease_name)
        .await?
        .spawn(hostname, params)
        .await?;
    Ok(claims)
}
