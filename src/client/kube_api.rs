//! [`ClusterApi`] backed by a real kube-rs client

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment as K8sDeployment;
use k8s_openapi::api::core::v1::{Namespace as K8sNamespace, Service as K8sService};
use k8s_openapi::api::networking::v1::Ingress as K8sIngress;
use kube::api::{Api, Patch, PatchParams, PostParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::{ApiError, ClusterApi};
use crate::descriptor::{ResourceDescriptor, ResourceKind, ResourceRef};
use crate::Error;

/// Real Kubernetes client implementation
pub struct KubeClusterApi {
    client: Client,
    field_manager: String,
}

impl KubeClusterApi {
    /// Create a new KubeClusterApi wrapping the given kube Client
    pub fn new(client: Client) -> Self {
        Self {
            client,
            field_manager: crate::FIELD_MANAGER.to_string(),
        }
    }

    fn post_params(&self) -> PostParams {
        PostParams {
            field_manager: Some(self.field_manager.clone()),
            ..Default::default()
        }
    }

    fn patch_params(&self) -> PatchParams {
        PatchParams {
            field_manager: Some(self.field_manager.clone()),
            ..Default::default()
        }
    }

    /// Typed API handle for a resource, scoped to its namespace when it has one
    fn api<K>(&self, namespace: Option<&str>) -> Api<K>
    where
        K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>,
        <K as kube::Resource>::DynamicType: Default,
    {
        match namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::default_namespaced(self.client.clone()),
        }
    }

    fn namespaces(&self) -> Api<K8sNamespace> {
        Api::all(self.client.clone())
    }
}

/// Convert a descriptor into the corresponding k8s-openapi type
fn to_k8s<T: Serialize, K: DeserializeOwned>(descriptor: &T) -> Result<K, ApiError> {
    serde_json::to_value(descriptor)
        .and_then(serde_json::from_value)
        .map_err(|e| ApiError::permanent("SerializationError", e.to_string()))
}

#[async_trait]
impl ClusterApi for KubeClusterApi {
    async fn read(&self, target: &ResourceRef) -> Result<(), ApiError> {
        let ns = target.namespace.as_deref();
        match target.kind {
            ResourceKind::Namespace => {
                self.namespaces().get(&target.name).await?;
            }
            ResourceKind::Workload => {
                self.api::<K8sDeployment>(ns).get(&target.name).await?;
            }
            ResourceKind::Service => {
                self.api::<K8sService>(ns).get(&target.name).await?;
            }
            ResourceKind::IngressRoute => {
                self.api::<K8sIngress>(ns).get(&target.name).await?;
            }
        }
        debug!(resource = %target, "Resource exists");
        Ok(())
    }

    async fn create(&self, descriptor: &ResourceDescriptor) -> Result<(), ApiError> {
        let pp = self.post_params();
        let ns = descriptor.namespace();
        match descriptor {
            ResourceDescriptor::Namespace(r) => {
                let obj: K8sNamespace = to_k8s(r)?;
                self.namespaces().create(&pp, &obj).await?;
            }
            ResourceDescriptor::Workload(r) => {
                let obj: K8sDeployment = to_k8s(r)?;
                self.api::<K8sDeployment>(ns).create(&pp, &obj).await?;
            }
            ResourceDescriptor::Service(r) => {
                let obj: K8sService = to_k8s(r)?;
                self.api::<K8sService>(ns).create(&pp, &obj).await?;
            }
            ResourceDescriptor::IngressRoute(r) => {
                let obj: K8sIngress = to_k8s(r)?;
                self.api::<K8sIngress>(ns).create(&pp, &obj).await?;
            }
        }
        Ok(())
    }

    async fn merge_patch(&self, descriptor: &ResourceDescriptor) -> Result<(), ApiError> {
        let params = self.patch_params();
        let ns = descriptor.namespace();
        let name = descriptor.name();
        let patch = descriptor
            .to_json()
            .map_err(|e| ApiError::permanent("SerializationError", e.to_string()))?;
        let patch = Patch::Merge(&patch);

        match descriptor.kind() {
            ResourceKind::Namespace => {
                self.namespaces().patch(name, &params, &patch).await?;
            }
            ResourceKind::Workload => {
                self.api::<K8sDeployment>(ns)
                    .patch(name, &params, &patch)
                    .await?;
            }
            ResourceKind::Service => {
                self.api::<K8sService>(ns).patch(name, &params, &patch).await?;
            }
            ResourceKind::IngressRoute => {
                self.api::<K8sIngress>(ns).patch(name, &params, &patch).await?;
            }
        }
        Ok(())
    }
}

/// Create a kube client from an optional kubeconfig path with explicit timeouts
///
/// Without a kubeconfig the configuration is inferred (in-cluster service account
/// first, then the local kubeconfig).
pub async fn create_client(
    kubeconfig: Option<&Path>,
    connect_timeout: Duration,
    read_timeout: Duration,
) -> Result<Client, Error> {
    let mut config = match kubeconfig {
        Some(path) => {
            let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
                Error::internal_with_context(
                    "create_client",
                    format!("failed to read kubeconfig: {}", e),
                )
            })?;
            Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .map_err(|e| {
                    Error::internal_with_context(
                        "create_client",
                        format!("failed to load kubeconfig: {}", e),
                    )
                })?
        }
        None => Config::infer().await.map_err(|e| {
            Error::internal_with_context("create_client", format!("failed to infer config: {}", e))
        })?,
    };
    config.connect_timeout = Some(connect_timeout);
    config.read_timeout = Some(read_timeout);

    Client::try_from(config).map_err(|e| {
        Error::internal_with_context("create_client", format!("failed to create client: {}", e))
    })
}
