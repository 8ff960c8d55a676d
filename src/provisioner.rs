//! Provisioning orchestrator
//!
//! Validates input, builds the four descriptors and applies them in dependency
//! order: namespace, workload, service, ingress. The first fatal failure stops
//! the sequence and is returned as-is. Resources created before the failure are
//! kept; resubmitting the same request completes the remaining steps.
//!
//! Provisioning returns as soon as the objects are accepted by the API server.
//! It does not wait for the workload to become ready.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::applier::{Applier, DEFAULT_CALL_TIMEOUT};
use crate::client::ClusterApi;
use crate::descriptor::{DescriptorBuilder, IngressSettings};
use crate::request::{ProvisionRequest, TenantId};
use crate::Error;

/// Result of a successful provisioning run
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProvisionResult {
    /// Always true for a successful run
    pub ok: bool,
    /// Public hostname routed to the tenant workload
    pub host: String,
}

impl ProvisionResult {
    fn success(host: String) -> Self {
        Self { ok: true, host }
    }
}

/// Orchestrator settings
#[derive(Clone, Debug)]
pub struct ProvisionerConfig {
    /// Ingress settings (base domain, issuer, class)
    pub ingress: IngressSettings,
    /// Bound on each Kubernetes API call
    pub call_timeout: Duration,
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            ingress: IngressSettings::default(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }
}

/// Provisions tenant runtimes against a cluster
///
/// Holds no per-request state, so one instance is shared by all requests.
#[derive(Clone)]
pub struct Provisioner {
    applier: Applier,
    builder: DescriptorBuilder,
}

impl Provisioner {
    /// Create a provisioner using the given cluster API handle
    pub fn new(api: Arc<dyn ClusterApi>, config: ProvisionerConfig) -> Self {
        Self {
            applier: Applier::new(api, config.call_timeout),
            builder: DescriptorBuilder::new(config.ingress),
        }
    }

    /// Provision (or converge) the runtime for `tenant`
    ///
    /// Fails with [`Error::Validation`] before any API call if the tenant id or
    /// request is invalid, and with [`Error::Apply`] naming the failed stage otherwise.
    #[instrument(skip(self, request), fields(image = %request.image))]
    pub async fn provision(
        &self,
        tenant: &str,
        request: &ProvisionRequest,
    ) -> Result<ProvisionResult, Error> {
        let tenant = TenantId::parse(tenant)?;
        let request = request.validate()?;

        let resources = self.builder.build(&tenant, &request)?;
        let host = resources.host.clone();
        let namespace = tenant.namespace();

        for descriptor in resources.into_ordered() {
            if let Err(e) = self.applier.apply(&descriptor).await {
                warn!(
                    namespace = %namespace,
                    stage = %e.kind,
                    error = %e.source,
                    "Provisioning stopped; earlier resources are left in place"
                );
                return Err(e.into());
            }
        }

        info!(namespace = %namespace, host = %host, "Tenant runtime provisioned");
        Ok(ProvisionResult::success(host))
    }
}
