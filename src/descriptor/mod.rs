//! Kubernetes resource descriptors for a tenant runtime
//!
//! This module defines the declarative resources the provisioner applies:
//! - Namespace: Tenant isolation boundary
//! - Deployment: The tenant workload
//! - Service: Cluster-internal endpoint for the workload
//! - Ingress: Public HTTPS routing to the Service
//!
//! Descriptors are plain serde types serialized in Kubernetes wire format. They are
//! built fresh for every request by [`DescriptorBuilder`] and never mutated.

mod builder;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub use builder::{DescriptorBuilder, IngressSettings, ResourceSet};
pub use builder::{
    APP_LABEL_KEY, APP_LABEL_VALUE, CONTAINER_NAME, INGRESS_NAME, SERVICE_NAME, SERVICE_PORT,
    WORKLOAD_NAME,
};

// =============================================================================
// API version/kind constants
// =============================================================================

/// Types with a compile-time known apiVersion and kind
pub trait HasApiResource {
    /// API version (e.g. `apps/v1`)
    const API_VERSION: &'static str;
    /// Resource kind (e.g. `Deployment`)
    const KIND: &'static str;
}

/// Implements `new(metadata, spec)` plus serde defaults for apiVersion/kind.
macro_rules! impl_api_resource {
    ($type:ty, $spec:ty, $api_version:expr, $kind:expr) => {
        impl HasApiResource for $type {
            const API_VERSION: &'static str = $api_version;
            const KIND: &'static str = $kind;
        }

        impl $type {
            /// Create the resource with apiVersion and kind filled in
            pub fn new(metadata: ObjectMeta, spec: $spec) -> Self {
                Self {
                    api_version: Self::default_api_version(),
                    kind: Self::default_kind(),
                    metadata,
                    spec,
                }
            }

            fn default_api_version() -> String {
                <Self as HasApiResource>::API_VERSION.to_string()
            }

            fn default_kind() -> String {
                <Self as HasApiResource>::KIND.to_string()
            }
        }
    };
}

// =============================================================================
// Resource kinds
// =============================================================================

/// The four resource kinds that make up a tenant runtime, in apply order
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    /// Tenant namespace
    Namespace,
    /// Tenant Deployment
    Workload,
    /// ClusterIP Service fronting the workload
    Service,
    /// Public Ingress
    IngressRoute,
}

impl ResourceKind {
    /// All kinds in dependency order
    pub const APPLY_ORDER: [ResourceKind; 4] = [
        ResourceKind::Namespace,
        ResourceKind::Workload,
        ResourceKind::Service,
        ResourceKind::IngressRoute,
    ];

    /// Stable lowercase name used in logs and error payloads
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Namespace => "namespace",
            Self::Workload => "workload",
            Self::Service => "service",
            Self::IngressRoute => "ingress",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Metadata
// =============================================================================

/// Standard Kubernetes ObjectMeta (the subset we set)
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    /// Resource name
    pub name: String,
    /// Resource namespace (absent for cluster-scoped resources)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Labels
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    /// Annotations
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl ObjectMeta {
    /// Metadata for a namespaced resource, labelled as managed by the provisioner
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self::cluster_scoped(name).with_namespace(namespace)
    }

    /// Metadata for a cluster-scoped resource, labelled as managed by the provisioner
    pub fn cluster_scoped(name: impl Into<String>) -> Self {
        let mut labels = BTreeMap::new();
        labels.insert(
            crate::LABEL_MANAGED_BY.to_string(),
            crate::FIELD_MANAGER.to_string(),
        );
        Self {
            name: name.into(),
            namespace: None,
            labels,
            annotations: BTreeMap::new(),
        }
    }

    fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Add a label
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Add an annotation
    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }
}

// =============================================================================
// Namespace
// =============================================================================

/// Kubernetes Namespace
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Namespace {
    /// API version
    #[serde(default = "Namespace::default_api_version")]
    pub api_version: String,
    /// Kind
    #[serde(default = "Namespace::default_kind")]
    pub kind: String,
    /// Metadata
    pub metadata: ObjectMeta,
    /// Spec (always empty; kept so the type shares the descriptor shape)
    #[serde(default, skip_serializing)]
    pub spec: NamespaceSpec,
}

/// Namespace spec (no fields are set by the provisioner)
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct NamespaceSpec {}

impl_api_resource!(Namespace, NamespaceSpec, "v1", "Namespace");

// =============================================================================
// Deployment
// =============================================================================

/// Kubernetes Deployment
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    /// API version
    #[serde(default = "Deployment::default_api_version")]
    pub api_version: String,
    /// Kind
    #[serde(default = "Deployment::default_kind")]
    pub kind: String,
    /// Metadata
    pub metadata: ObjectMeta,
    /// Spec
    pub spec: DeploymentSpec,
}

impl_api_resource!(Deployment, DeploymentSpec, "apps/v1", "Deployment");

/// Deployment spec
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentSpec {
    /// Number of replicas
    pub replicas: u32,
    /// Label selector
    pub selector: LabelSelector,
    /// Pod template
    pub template: PodTemplateSpec,
}

/// Label selector
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelector {
    /// Match labels
    pub match_labels: BTreeMap<String, String>,
}

/// Pod template spec
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PodTemplateSpec {
    /// Pod metadata
    pub metadata: PodMeta,
    /// Pod spec
    pub spec: PodSpec,
}

/// Pod metadata (subset of ObjectMeta)
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PodMeta {
    /// Labels
    pub labels: BTreeMap<String, String>,
}

/// Pod spec
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PodSpec {
    /// Containers
    pub containers: Vec<Container>,
}

/// Container spec
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    /// Container name
    pub name: String,
    /// Image
    pub image: String,
    /// Ports
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<ContainerPort>,
}

/// Container port
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContainerPort {
    /// Port name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Port number
    pub container_port: u16,
    /// Protocol
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
}

// =============================================================================
// Service
// =============================================================================

/// Kubernetes Service
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    /// API version
    #[serde(default = "Service::default_api_version")]
    pub api_version: String,
    /// Kind
    #[serde(default = "Service::default_kind")]
    pub kind: String,
    /// Metadata
    pub metadata: ObjectMeta,
    /// Spec
    pub spec: ServiceSpec,
}

impl_api_resource!(Service, ServiceSpec, "v1", "Service");

/// Service spec
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSpec {
    /// Selector
    pub selector: BTreeMap<String, String>,
    /// Ports
    pub ports: Vec<ServicePort>,
    /// Service type
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
}

/// Service port
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServicePort {
    /// Port name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Port number
    pub port: u16,
    /// Target port
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_port: Option<u16>,
    /// Protocol
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
}

// =============================================================================
// Ingress
// =============================================================================

/// Kubernetes Ingress (networking.k8s.io/v1)
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Ingress {
    /// API version
    #[serde(default = "Ingress::default_api_version")]
    pub api_version: String,
    /// Kind
    #[serde(default = "Ingress::default_kind")]
    pub kind: String,
    /// Metadata
    pub metadata: ObjectMeta,
    /// Spec
    pub spec: IngressSpec,
}

impl_api_resource!(Ingress, IngressSpec, "networking.k8s.io/v1", "Ingress");

/// Ingress spec
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IngressSpec {
    /// IngressClass name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingress_class_name: Option<String>,
    /// TLS blocks
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tls: Vec<IngressTls>,
    /// Host rules
    pub rules: Vec<IngressRule>,
}

/// TLS configuration for a set of hosts
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IngressTls {
    /// Hosts covered by the certificate
    pub hosts: Vec<String>,
    /// Secret the certificate is stored in
    pub secret_name: String,
}

/// Routing rule for one host
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IngressRule {
    /// Host
    pub host: String,
    /// HTTP paths
    pub http: HttpIngressRuleValue,
}

/// HTTP paths of a rule
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HttpIngressRuleValue {
    /// Paths
    pub paths: Vec<HttpIngressPath>,
}

/// A single path routed to a backend
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HttpIngressPath {
    /// Path
    pub path: String,
    /// Path match type (Prefix, Exact, ImplementationSpecific)
    pub path_type: String,
    /// Backend
    pub backend: IngressBackend,
}

/// Ingress backend
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IngressBackend {
    /// Service backend
    pub service: IngressServiceBackend,
}

/// Service reference of an ingress backend
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IngressServiceBackend {
    /// Service name
    pub name: String,
    /// Service port
    pub port: ServiceBackendPort,
}

/// Port of a service backend
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceBackendPort {
    /// Port number
    pub number: u16,
}

// =============================================================================
// Resource descriptor
// =============================================================================

/// One resource of a tenant runtime, tagged by kind
#[derive(Clone, Debug, PartialEq)]
pub enum ResourceDescriptor {
    /// Tenant namespace
    Namespace(Namespace),
    /// Tenant Deployment
    Workload(Deployment),
    /// ClusterIP Service
    Service(Service),
    /// Public Ingress
    IngressRoute(Ingress),
}

impl ResourceDescriptor {
    /// Kind of this resource
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Namespace(_) => ResourceKind::Namespace,
            Self::Workload(_) => ResourceKind::Workload,
            Self::Service(_) => ResourceKind::Service,
            Self::IngressRoute(_) => ResourceKind::IngressRoute,
        }
    }

    /// Metadata of this resource
    pub fn metadata(&self) -> &ObjectMeta {
        match self {
            Self::Namespace(r) => &r.metadata,
            Self::Workload(r) => &r.metadata,
            Self::Service(r) => &r.metadata,
            Self::IngressRoute(r) => &r.metadata,
        }
    }

    /// Resource name
    pub fn name(&self) -> &str {
        &self.metadata().name
    }

    /// Owning namespace (`None` for the Namespace itself)
    pub fn namespace(&self) -> Option<&str> {
        self.metadata().namespace.as_deref()
    }

    /// Reference identifying this resource on the cluster
    pub fn to_ref(&self) -> ResourceRef {
        ResourceRef {
            kind: self.kind(),
            namespace: self.namespace().map(str::to_string),
            name: self.name().to_string(),
        }
    }

    /// Serialize to Kubernetes wire-format JSON
    pub fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            Self::Namespace(r) => serde_json::to_value(r),
            Self::Workload(r) => serde_json::to_value(r),
            Self::Service(r) => serde_json::to_value(r),
            Self::IngressRoute(r) => serde_json::to_value(r),
        }
    }
}

/// Kind, namespace and name of a resource on the cluster
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceRef {
    /// Resource kind
    pub kind: ResourceKind,
    /// Namespace (`None` for cluster-scoped resources)
    pub namespace: Option<String>,
    /// Resource name
    pub name: String,
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{} {}/{}", self.kind, ns, self.name),
            None => write!(f, "{} {}", self.kind, self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_serializes_without_spec_or_namespace() {
        let ns = Namespace::new(ObjectMeta::cluster_scoped("tenant-alice"), NamespaceSpec {});
        let json = serde_json::to_value(&ns).unwrap();

        assert_eq!(json["apiVersion"], "v1");
        assert_eq!(json["kind"], "Namespace");
        assert_eq!(json["metadata"]["name"], "tenant-alice");
        assert!(json["metadata"].get("namespace").is_none());
        assert!(json.get("spec").is_none());
    }

    #[test]
    fn test_service_port_uses_kubernetes_field_names() {
        let svc = Service::new(
            ObjectMeta::new("app-svc", "tenant-alice"),
            ServiceSpec {
                selector: BTreeMap::from([("app".to_string(), "app".to_string())]),
                ports: vec![ServicePort {
                    name: None,
                    port: 80,
                    target_port: Some(3000),
                    protocol: None,
                }],
                type_: None,
            },
        );
        let json = serde_json::to_value(&svc).unwrap();

        assert_eq!(json["spec"]["ports"][0]["targetPort"], 3000);
        assert!(json["spec"].get("type").is_none());
    }

    #[test]
    fn test_resource_ref_display_includes_namespace_when_present() {
        let ns = ResourceRef {
            kind: ResourceKind::Namespace,
            namespace: None,
            name: "tenant-alice".to_string(),
        };
        let svc = ResourceRef {
            kind: ResourceKind::Service,
            namespace: Some("tenant-alice".to_string()),
            name: "app-svc".to_string(),
        };
        assert_eq!(ns.to_string(), "namespace tenant-alice");
        assert_eq!(svc.to_string(), "service tenant-alice/app-svc");
    }

    #[test]
    fn test_apply_order_starts_with_namespace_and_ends_with_ingress() {
        assert_eq!(ResourceKind::APPLY_ORDER[0], ResourceKind::Namespace);
        assert_eq!(ResourceKind::APPLY_ORDER[3], ResourceKind::IngressRoute);
    }
}
