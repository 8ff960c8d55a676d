//! Descriptor builder: tenant + validated request -> the four runtime resources
//!
//! The builder is pure. All names other than the namespace are fixed, so repeated
//! requests for the same tenant always target the same objects.

use std::collections::BTreeMap;

use super::{
    Container, ContainerPort, Deployment, DeploymentSpec, HttpIngressPath,
    HttpIngressRuleValue, Ingress, IngressBackend, IngressRule, IngressServiceBackend,
    IngressSpec, IngressTls, LabelSelector, Namespace, NamespaceSpec, ObjectMeta, PodMeta,
    PodSpec, PodTemplateSpec, ResourceDescriptor, Service, ServiceBackendPort, ServicePort,
    ServiceSpec,
};
use crate::request::{Subdomain, TenantId, ValidatedRequest, MAX_DNS_NAME_LEN};
use crate::Error;

/// Name of the tenant Deployment
pub const WORKLOAD_NAME: &str = "app";
/// Name of the single container in the Deployment
pub const CONTAINER_NAME: &str = "app";
/// Name of the tenant Service
pub const SERVICE_NAME: &str = "app-svc";
/// Name of the tenant Ingress
pub const INGRESS_NAME: &str = "app-ingress";
/// Port the Service listens on
pub const SERVICE_PORT: u16 = 80;
/// Key of the label tying pods, selector and Service together
pub const APP_LABEL_KEY: &str = "app";
/// Value of the label tying pods, selector and Service together
pub const APP_LABEL_VALUE: &str = "app";

const INGRESS_CLASS_ANNOTATION: &str = "kubernetes.io/ingress.class";
const CLUSTER_ISSUER_ANNOTATION: &str = "cert-manager.io/cluster-issuer";

/// Ingress settings injected from configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IngressSettings {
    /// Public domain suffix (`<subdomain>.<base_domain>`)
    pub base_domain: String,
    /// cert-manager ClusterIssuer that issues the TLS certificate
    pub cluster_issuer: String,
    /// Ingress class handling the route
    pub ingress_class: String,
}

impl Default for IngressSettings {
    fn default() -> Self {
        Self {
            base_domain: crate::DEFAULT_BASE_DOMAIN.to_string(),
            cluster_issuer: "letsencrypt-staging".to_string(),
            ingress_class: "nginx".to_string(),
        }
    }
}

/// The four descriptors for one tenant runtime
#[derive(Clone, Debug, PartialEq)]
pub struct ResourceSet {
    /// Tenant namespace
    pub namespace: Namespace,
    /// Tenant Deployment
    pub workload: Deployment,
    /// ClusterIP Service
    pub service: Service,
    /// Public Ingress
    pub ingress: Ingress,
    /// Public hostname routed by the Ingress
    pub host: String,
}

impl ResourceSet {
    /// Descriptors in apply order: namespace, workload, service, ingress
    pub fn into_ordered(self) -> [ResourceDescriptor; 4] {
        [
            ResourceDescriptor::Namespace(self.namespace),
            ResourceDescriptor::Workload(self.workload),
            ResourceDescriptor::Service(self.service),
            ResourceDescriptor::IngressRoute(self.ingress),
        ]
    }
}

/// Builds the resource descriptors for a tenant runtime
#[derive(Clone, Debug, Default)]
pub struct DescriptorBuilder {
    settings: IngressSettings,
}

impl DescriptorBuilder {
    /// Create a builder with the given ingress settings
    pub fn new(settings: IngressSettings) -> Self {
        Self { settings }
    }

    /// Public hostname for a subdomain
    ///
    /// Fails with a validation error on `subdomain` when the composed name exceeds
    /// the DNS name length limit.
    pub fn host_for(&self, subdomain: &Subdomain) -> Result<String, Error> {
        let host = format!("{}.{}", subdomain, self.settings.base_domain);
        if host.len() > MAX_DNS_NAME_LEN {
            return Err(Error::validation(
                "subdomain",
                format!(
                    "host '{host}' is {} characters, over the {MAX_DNS_NAME_LEN} allowed",
                    host.len()
                ),
            ));
        }
        Ok(host)
    }

    /// Build all four descriptors
    pub fn build(
        &self,
        tenant: &TenantId,
        request: &ValidatedRequest,
    ) -> Result<ResourceSet, Error> {
        let namespace = tenant.namespace();
        let host = self.host_for(&request.subdomain)?;

        Ok(ResourceSet {
            namespace: Self::build_namespace(tenant, &namespace),
            workload: Self::build_workload(&namespace, request),
            service: Self::build_service(&namespace, request.port),
            ingress: self.build_ingress(&namespace, &host),
            host,
        })
    }

    /// Pod labels, Deployment selector and Service selector all come from here
    fn app_labels() -> BTreeMap<String, String> {
        BTreeMap::from([(APP_LABEL_KEY.to_string(), APP_LABEL_VALUE.to_string())])
    }

    fn build_namespace(tenant: &TenantId, name: &str) -> Namespace {
        Namespace::new(
            ObjectMeta::cluster_scoped(name).with_label(crate::LABEL_TENANT, tenant.as_str()),
            NamespaceSpec {},
        )
    }

    fn build_workload(namespace: &str, request: &ValidatedRequest) -> Deployment {
        let container = Container {
            name: CONTAINER_NAME.to_string(),
            image: request.image.clone(),
            ports: vec![ContainerPort {
                name: Some("http".to_string()),
                container_port: request.port,
                protocol: Some("TCP".to_string()),
            }],
        };

        Deployment::new(
            ObjectMeta::new(WORKLOAD_NAME, namespace),
            DeploymentSpec {
                replicas: 1,
                selector: LabelSelector {
                    match_labels: Self::app_labels(),
                },
                template: PodTemplateSpec {
                    metadata: PodMeta {
                        labels: Self::app_labels(),
                    },
                    spec: PodSpec {
                        containers: vec![container],
                    },
                },
            },
        )
    }

    fn build_service(namespace: &str, target_port: u16) -> Service {
        Service::new(
            ObjectMeta::new(SERVICE_NAME, namespace),
            ServiceSpec {
                selector: Self::app_labels(),
                ports: vec![ServicePort {
                    name: Some("http".to_string()),
                    port: SERVICE_PORT,
                    target_port: Some(target_port),
                    protocol: Some("TCP".to_string()),
                }],
                type_: None,
            },
        )
    }

    fn build_ingress(&self, namespace: &str, host: &str) -> Ingress {
        let metadata = ObjectMeta::new(INGRESS_NAME, namespace)
            .with_annotation(INGRESS_CLASS_ANNOTATION, &self.settings.ingress_class)
            .with_annotation(CLUSTER_ISSUER_ANNOTATION, &self.settings.cluster_issuer);

        Ingress::new(
            metadata,
            IngressSpec {
                ingress_class_name: Some(self.settings.ingress_class.clone()),
                tls: vec![IngressTls {
                    hosts: vec![host.to_string()],
                    secret_name: format!("{namespace}-tls"),
                }],
                rules: vec![IngressRule {
                    host: host.to_string(),
                    http: HttpIngressRuleValue {
                        paths: vec![HttpIngressPath {
                            path: "/".to_string(),
                            path_type: "Prefix".to_string(),
                            backend: IngressBackend {
                                service: IngressServiceBackend {
                                    name: SERVICE_NAME.to_string(),
                                    port: ServiceBackendPort {
                                        number: SERVICE_PORT,
                                    },
                                },
                            },
                        }],
                    },
                }],
            },
        )
    }
}
