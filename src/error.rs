//! Error types for tenant provisioning
//!
//! Errors carry enough structure for the HTTP boundary to pick a status code:
//! validation failures are the caller's fault, apply failures name the stage that
//! failed and keep the classified API cause.

use thiserror::Error;

use crate::applier::ApplyError;
use crate::client::ApiError;
use crate::descriptor::ResourceKind;

/// Main error type for provisioning operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Request input failed validation; no API call was made
    #[error("validation error for {field}: {message}")]
    Validation {
        /// Name of the offending input field
        field: String,
        /// Description of what's invalid
        message: String,
    },

    /// A resource could not be applied; provisioning stopped at this stage
    #[error(transparent)]
    Apply(#[from] ApplyError),

    /// Invalid startup configuration
    #[error("configuration error: {message}")]
    Config {
        /// Description of what's invalid
        message: String,
    },

    /// Internal/operational error
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Description of what failed
        message: String,
        /// Context where the error occurred (e.g. "create_client")
        context: String,
    },
}

impl Error {
    /// Create a validation error for the given input field
    pub fn validation(field: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: msg.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create an internal error with context
    pub fn internal_with_context(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: context.into(),
        }
    }

    /// The input field that failed validation, if this is a validation error
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Validation { field, .. } => Some(field),
            _ => None,
        }
    }

    /// The resource kind whose apply failed, if provisioning got that far
    pub fn stage(&self) -> Option<ResourceKind> {
        match self {
            Self::Apply(e) => Some(e.kind),
            _ => None,
        }
    }

    /// The classified API cause of an apply failure
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            Self::Apply(e) => Some(&e.source),
            _ => None,
        }
    }

    /// Returns true if retrying the same request later may succeed
    pub fn is_transient(&self) -> bool {
        self.api_error().is_some_and(ApiError::is_transient)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_names_the_field() {
        let err = Error::validation("subdomain", "subdomain 'a.b' is not a valid DNS label");
        assert_eq!(err.field(), Some("subdomain"));
        assert!(err.stage().is_none());
        assert!(!err.is_transient());
        assert!(err.to_string().contains("validation error for subdomain"));
    }

    #[test]
    fn test_apply_error_exposes_stage_and_cause() {
        let err: Error = ApplyError::new(
            ResourceKind::Service,
            "app-svc",
            ApiError::transient("connection reset"),
        )
        .into();

        assert_eq!(err.stage(), Some(ResourceKind::Service));
        assert!(err.is_transient());
        assert!(err.to_string().contains("app-svc"));
        assert!(err.to_string().contains("connection reset"));
    }

    #[test]
    fn test_permanent_apply_error_is_not_transient() {
        let err: Error = ApplyError::new(
            ResourceKind::Namespace,
            "tenant-alice",
            ApiError::permanent("Forbidden", "namespaces is forbidden"),
        )
        .into();

        assert_eq!(err.stage(), Some(ResourceKind::Namespace));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_internal_error_carries_context() {
        let err = Error::internal_with_context("create_client", "failed to infer config");
        assert_eq!(
            err.to_string(),
            "internal error [create_client]: failed to infer config"
        );
    }
}
