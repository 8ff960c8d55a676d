//! Tenant Provisioner - per-tenant application runtimes on Kubernetes
//!
//! Given a container image, a port and a public subdomain, the provisioner creates an
//! isolated namespace for the tenant together with a Deployment, a ClusterIP Service
//! and a TLS-terminated Ingress, then reports the public hostname.
//!
//! # Architecture
//!
//! - Descriptors are built fresh for every request from validated input (pure, no I/O)
//! - Each descriptor is applied through a per-kind convergence policy
//! - The four resources are applied in dependency order, stopping at the first failure
//!
//! # Modules
//!
//! - [`request`] - Request payload, tenant identity and input validation
//! - [`descriptor`] - Kubernetes resource descriptors and the descriptor builder
//! - [`client`] - Kubernetes API abstraction with typed error classification
//! - [`applier`] - Idempotent per-resource apply with convergence policies
//! - [`provisioner`] - Orchestrates validation, building and ordered apply
//! - [`server`] - HTTP boundary (`POST /deploy`)
//! - [`config`] - Command-line / environment configuration
//! - [`telemetry`] - Tracing subscriber setup
//! - [`error`] - Error types for provisioning

#![deny(missing_docs)]

pub mod applier;
pub mod client;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod provisioner;
pub mod request;
pub mod server;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod testing;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

// =============================================================================
// Default Configuration Constants
// =============================================================================

/// Container port used when the request does not specify one
pub const DEFAULT_APP_PORT: u16 = 3000;

/// Subdomain used when the request does not specify one
pub const DEFAULT_SUBDOMAIN: &str = "user-service";

/// Base domain used to compose public hostnames when none is configured
pub const DEFAULT_BASE_DOMAIN: &str = "0rca.fun";

/// Prefix for tenant namespace names (`tenant-<id>`)
pub const NAMESPACE_PREFIX: &str = "tenant-";

/// Field manager recorded on every object this service creates or patches
pub const FIELD_MANAGER: &str = "tenant-provisioner";

/// Label key recording which controller manages a resource
pub const LABEL_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

/// Label key recording the owning tenant on the namespace
pub const LABEL_TENANT: &str = "provisioner.dev/tenant";
