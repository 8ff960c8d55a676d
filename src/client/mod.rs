//! Kubernetes API abstraction
//!
//! The provisioner talks to the cluster only through [`ClusterApi`], which lets tests
//! substitute a mock or an in-memory cluster. Failures are classified exactly once, at
//! this boundary, into [`ApiError`]; callers match on the variant instead of
//! inspecting status codes or reason strings.

mod kube_api;

use async_trait::async_trait;
use thiserror::Error;

#[cfg(test)]
use mockall::automock;

use crate::descriptor::{ResourceDescriptor, ResourceRef};

pub use kube_api::{create_client, KubeClusterApi};

/// Classified failure of a single Kubernetes API call
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApiError {
    /// The object already exists (HTTP 409 AlreadyExists)
    #[error("already exists: {0}")]
    Conflict(String),

    /// The object does not exist (HTTP 404)
    #[error("not found: {0}")]
    NotFound(String),

    /// Network, availability, throttling or timeout failure; may succeed later
    #[error("transient API failure: {0}")]
    Transient(String),

    /// The request was rejected and will not succeed unchanged
    #[error("API rejected request ({reason}): {message}")]
    Permanent {
        /// Machine-readable reason (e.g. "Forbidden", "Invalid")
        reason: String,
        /// Human-readable message from the API server
        message: String,
    },
}

impl ApiError {
    /// Create a transient error
    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    /// Create a permanent error
    pub fn permanent(reason: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Permanent {
            reason: reason.into(),
            message: msg.into(),
        }
    }

    /// Returns true for [`ApiError::Transient`]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Classify an API server status response
    pub fn from_status(code: u16, reason: &str, message: &str) -> Self {
        match code {
            409 if reason == "AlreadyExists" => Self::Conflict(message.to_string()),
            // 409 Conflict on a resourceVersion mismatch resolves on retry
            409 => Self::Transient(message.to_string()),
            404 => Self::NotFound(message.to_string()),
            408 | 429 => Self::Transient(message.to_string()),
            500..=599 => Self::Transient(message.to_string()),
            _ => Self::permanent(reason, message),
        }
    }
}

impl From<kube::Error> for ApiError {
    fn from(e: kube::Error) -> Self {
        match e {
            kube::Error::Api(ae) => Self::from_status(ae.code, &ae.reason, &ae.message),
            kube::Error::HyperError(e) => Self::Transient(e.to_string()),
            kube::Error::Service(e) => Self::Transient(e.to_string()),
            other => Self::permanent("ClientError", other.to_string()),
        }
    }
}

/// Operations the provisioner needs from the Kubernetes API
///
/// All operations are namespaced except those on Namespace resources.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Read a resource, returning `NotFound` if it does not exist
    async fn read(&self, target: &ResourceRef) -> Result<(), ApiError>;

    /// Create a resource, returning `Conflict` if it already exists
    async fn create(&self, descriptor: &ResourceDescriptor) -> Result<(), ApiError>;

    /// JSON merge-patch an existing resource with the descriptor's fields
    async fn merge_patch(&self, descriptor: &ResourceDescriptor) -> Result<(), ApiError>;
}
