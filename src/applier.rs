//! Idempotent resource applier
//!
//! Each resource kind has a named convergence policy:
//!
//! | Kind         | Policy          | On existing object                 |
//! |--------------|-----------------|------------------------------------|
//! | Namespace    | `ReadOrCreate`  | left as is                         |
//! | Workload     | `CreateOrPatch` | merge-patched with the new spec    |
//! | Service      | `CreateOnly`    | left as is                         |
//! | IngressRoute | `CreateOnly`    | left as is                         |
//!
//! Service and Ingress are not converged: a redeploy that changes `port` or
//! `subdomain` does not update them. Only the Deployment is expected to change
//! between deployments (new image).
//!
//! Concurrent applies for the same object rely on the API server's atomic create:
//! the loser of a create race sees `Conflict` and falls through to its policy.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info};

use crate::client::{ApiError, ClusterApi};
use crate::descriptor::{ResourceDescriptor, ResourceKind};

/// Default bound on a single Kubernetes API call
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// How an apply converges a resource that may already exist
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConvergencePolicy {
    /// Read first; create only if absent
    ReadOrCreate,
    /// Create; on conflict merge-patch the existing object
    CreateOrPatch,
    /// Create; on conflict keep the existing object untouched
    CreateOnly,
}

impl ResourceKind {
    /// Convergence policy for this kind
    pub fn policy(&self) -> ConvergencePolicy {
        match self {
            Self::Namespace => ConvergencePolicy::ReadOrCreate,
            Self::Workload => ConvergencePolicy::CreateOrPatch,
            Self::Service => ConvergencePolicy::CreateOnly,
            Self::IngressRoute => ConvergencePolicy::CreateOnly,
        }
    }
}

/// What an apply did to the cluster
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The object did not exist and was created
    Created,
    /// The object existed and was merge-patched
    Patched,
    /// The object existed and was left untouched
    AlreadyPresent,
}

impl std::fmt::Display for ApplyOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Patched => write!(f, "patched"),
            Self::AlreadyPresent => write!(f, "already-present"),
        }
    }
}

/// Fatal failure applying one resource
#[derive(Debug, Error)]
#[error("failed to apply {kind} '{name}': {source}")]
pub struct ApplyError {
    /// Kind of the resource that failed
    pub kind: ResourceKind,
    /// Name of the resource that failed
    pub name: String,
    /// Classified API failure
    #[source]
    pub source: ApiError,
}

impl ApplyError {
    /// Create an apply error for a resource
    pub fn new(kind: ResourceKind, name: impl Into<String>, source: ApiError) -> Self {
        Self {
            kind,
            name: name.into(),
            source,
        }
    }
}

/// Applies descriptors to the cluster according to their kind's policy
#[derive(Clone)]
pub struct Applier {
    api: Arc<dyn ClusterApi>,
    call_timeout: Duration,
}

impl Applier {
    /// Create an applier with the given per-call timeout
    pub fn new(api: Arc<dyn ClusterApi>, call_timeout: Duration) -> Self {
        Self { api, call_timeout }
    }

    /// Ensure the descriptor's resource exists, converging it per its policy
    ///
    /// Conflicts are resolved by policy and never returned. Every other API failure
    /// (including a timeout) is returned without retrying.
    pub async fn apply(&self, descriptor: &ResourceDescriptor) -> Result<ApplyOutcome, ApplyError> {
        let kind = descriptor.kind();
        let policy = kind.policy();
        debug!(kind = %kind, name = %descriptor.name(), ?policy, "Applying resource");

        let result = match policy {
            ConvergencePolicy::ReadOrCreate => self.read_or_create(descriptor).await,
            ConvergencePolicy::CreateOrPatch => self.create_or_patch(descriptor).await,
            ConvergencePolicy::CreateOnly => self.create_only(descriptor).await,
        };

        let outcome = result.map_err(|e| ApplyError::new(kind, descriptor.name(), e))?;
        info!(
            kind = %kind,
            name = %descriptor.name(),
            namespace = descriptor.namespace().unwrap_or_default(),
            outcome = %outcome,
            "Applied resource"
        );
        Ok(outcome)
    }

    async fn read_or_create(
        &self,
        descriptor: &ResourceDescriptor,
    ) -> Result<ApplyOutcome, ApiError> {
        let target = descriptor.to_ref();
        match self.bounded("read", self.api.read(&target)).await {
            Ok(()) => return Ok(ApplyOutcome::AlreadyPresent),
            Err(ApiError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }

        match self.bounded("create", self.api.create(descriptor)).await {
            Ok(()) => Ok(ApplyOutcome::Created),
            // Another request created it between our read and create
            Err(ApiError::Conflict(_)) => Ok(ApplyOutcome::AlreadyPresent),
            Err(e) => Err(e),
        }
    }

    async fn create_or_patch(
        &self,
        descriptor: &ResourceDescriptor,
    ) -> Result<ApplyOutcome, ApiError> {
        match self.bounded("create", self.api.create(descriptor)).await {
            Ok(()) => Ok(ApplyOutcome::Created),
            Err(ApiError::Conflict(_)) => {
                self.bounded("merge_patch", self.api.merge_patch(descriptor))
                    .await?;
                Ok(ApplyOutcome::Patched)
            }
            Err(e) => Err(e),
        }
    }

    async fn create_only(
        &self,
        descriptor: &ResourceDescriptor,
    ) -> Result<ApplyOutcome, ApiError> {
        match self.bounded("create", self.api.create(descriptor)).await {
            Ok(()) => Ok(ApplyOutcome::Created),
            Err(ApiError::Conflict(_)) => Ok(ApplyOutcome::AlreadyPresent),
            Err(e) => Err(e),
        }
    }

    /// Run one API call under the per-call timeout; an elapsed timeout is transient
    async fn bounded<F>(&self, operation: &str, call: F) -> Result<(), ApiError>
    where
        F: Future<Output = Result<(), ApiError>>,
    {
        tokio::time::timeout(self.call_timeout, call)
            .await
            .map_err(|_| {
                ApiError::transient(format!(
                    "{operation} timed out after {}ms",
                    self.call_timeout.as_millis()
                ))
            })?
    }
}
