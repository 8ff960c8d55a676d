//! Provisioning request payload and input validation
//!
//! Every user-controlled string that ends up in a resource name or hostname passes
//! through an allow-list check here before any descriptor is built. Invalid input
//! fails fast with [`Error::Validation`] instead of being rejected by the API server.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Error, DEFAULT_APP_PORT, DEFAULT_SUBDOMAIN, NAMESPACE_PREFIX};

/// Maximum length of a DNS-1123 label
pub const MAX_DNS_LABEL_LEN: usize = 63;

/// Maximum length of a full DNS name
pub const MAX_DNS_NAME_LEN: usize = 253;

/// Longest tenant id that still yields a valid namespace name
pub const MAX_TENANT_ID_LEN: usize = MAX_DNS_LABEL_LEN - NAMESPACE_PREFIX.len();

/// Returns true if `value` is a DNS-1123 label: lowercase alphanumerics and `-`,
/// starting and ending with an alphanumeric, at most 63 characters.
pub fn is_dns_label(value: &str) -> bool {
    let bytes = value.as_bytes();
    if bytes.is_empty() || bytes.len() > MAX_DNS_LABEL_LEN {
        return false;
    }
    let valid_char = |b: &u8| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-';
    bytes.iter().all(valid_char) && bytes[0] != b'-' && bytes[bytes.len() - 1] != b'-'
}

/// Returns true if `value` is a dotted sequence of DNS labels (e.g. `example.com`)
pub fn is_dns_name(value: &str) -> bool {
    !value.is_empty() && value.len() <= MAX_DNS_NAME_LEN && value.split('.').all(is_dns_label)
}

// =============================================================================
// Tenant identity
// =============================================================================

/// Validated tenant identifier
///
/// The identity arrives as an opaque string from the auth layer; it is only used to
/// derive the namespace name, so it has to be a valid resource-name fragment.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TenantId(String);

impl TenantId {
    /// Validate a raw tenant identity
    pub fn parse(raw: &str) -> Result<Self, Error> {
        if raw.len() > MAX_TENANT_ID_LEN {
            return Err(Error::validation(
                "tenant",
                format!("tenant id must be at most {MAX_TENANT_ID_LEN} characters"),
            ));
        }
        if !is_dns_label(raw) {
            return Err(Error::validation(
                "tenant",
                format!("tenant id '{raw}' must be lowercase alphanumeric or '-'"),
            ));
        }
        Ok(Self(raw.to_string()))
    }

    /// The raw identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Namespace owned by this tenant (`tenant-<id>`)
    pub fn namespace(&self) -> String {
        format!("{NAMESPACE_PREFIX}{}", self.0)
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Subdomain
// =============================================================================

/// Validated public subdomain (a single DNS label)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Subdomain(String);

impl Subdomain {
    /// Validate a raw subdomain
    pub fn parse(raw: &str) -> Result<Self, Error> {
        if !is_dns_label(raw) {
            return Err(Error::validation(
                "subdomain",
                format!("subdomain '{raw}' is not a valid DNS label"),
            ));
        }
        Ok(Self(raw.to_string()))
    }

    /// The subdomain label
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Subdomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Request payload
// =============================================================================

/// Body of a provisioning request
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ProvisionRequest {
    /// Container image reference
    pub image: String,
    /// Container port; defaults to 3000
    #[serde(default = "default_port")]
    pub port: u32,
    /// Public subdomain; defaults to `user-service`
    #[serde(default = "default_subdomain")]
    pub subdomain: String,
}

fn default_port() -> u32 {
    u32::from(DEFAULT_APP_PORT)
}

fn default_subdomain() -> String {
    DEFAULT_SUBDOMAIN.to_string()
}

impl ProvisionRequest {
    /// Create a request for `image` with default port and subdomain
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            port: default_port(),
            subdomain: default_subdomain(),
        }
    }

    /// Set the container port
    pub fn with_port(mut self, port: u32) -> Self {
        self.port = port;
        self
    }

    /// Set the public subdomain
    pub fn with_subdomain(mut self, subdomain: impl Into<String>) -> Self {
        self.subdomain = subdomain.into();
        self
    }

    /// Validate every field, producing the input the descriptor builder accepts
    pub fn validate(&self) -> Result<ValidatedRequest, Error> {
        let image = self.image.trim();
        if image.is_empty() {
            return Err(Error::validation("image", "image must not be empty"));
        }
        if image.len() != self.image.len() || image.chars().any(char::is_whitespace) {
            return Err(Error::validation(
                "image",
                "image reference must not contain whitespace",
            ));
        }

        let port = u16::try_from(self.port)
            .ok()
            .filter(|p| *p != 0)
            .ok_or_else(|| {
                Error::validation(
                    "port",
                    format!("port {} is outside 1-65535", self.port),
                )
            })?;

        Ok(ValidatedRequest {
            image: image.to_string(),
            port,
            subdomain: Subdomain::parse(&self.subdomain)?,
        })
    }
}

/// A provisioning request whose fields have all been validated
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidatedRequest {
    /// Container image reference
    pub image: String,
    /// Container port
    pub port: u16,
    /// Public subdomain
    pub subdomain: Subdomain,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::simple("alice")]
    #[case::digits("42")]
    #[case::hyphenated("team-7")]
    fn test_valid_tenant_ids_map_to_prefixed_namespace(#[case] raw: &str) {
        let tenant = TenantId::parse(raw).unwrap();
        assert_eq!(tenant.namespace(), format!("tenant-{raw}"));
        assert!(is_dns_label(&tenant.namespace()));
    }

    #[rstest]
    #[case::empty("")]
    #[case::uppercase("Alice")]
    #[case::leading_hyphen("-alice")]
    #[case::trailing_hyphen("alice-")]
    #[case::dot("alice.bob")]
    #[case::slash("../kube-system")]
    #[case::underscore("alice_bob")]
    fn test_invalid_tenant_ids_are_rejected(#[case] raw: &str) {
        let err = TenantId::parse(raw).unwrap_err();
        assert_eq!(err.field(), Some("tenant"));
    }

    #[test]
    fn test_tenant_id_length_keeps_namespace_within_label_limit() {
        let longest = "a".repeat(MAX_TENANT_ID_LEN);
        assert_eq!(TenantId::parse(&longest).unwrap().namespace().len(), 63);

        let too_long = "a".repeat(MAX_TENANT_ID_LEN + 1);
        assert!(TenantId::parse(&too_long).is_err());
    }

    #[test]
    fn test_distinct_tenants_never_share_a_namespace() {
        let a = TenantId::parse("ab").unwrap();
        let b = TenantId::parse("a-b").unwrap();
        assert_ne!(a.namespace(), b.namespace());
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let request: ProvisionRequest =
            serde_json::from_str(r#"{"image": "nginx:1.27"}"#).unwrap();
        assert_eq!(request.port, 3000);
        assert_eq!(request.subdomain, "user-service");

        let validated = request.validate().unwrap();
        assert_eq!(validated.port, 3000);
        assert_eq!(validated.subdomain.as_str(), "user-service");
    }

    #[rstest]
    #[case::zero(0)]
    #[case::too_large(65536)]
    fn test_out_of_range_ports_are_rejected(#[case] port: u32) {
        let err = ProvisionRequest::new("nginx").with_port(port).validate().unwrap_err();
        assert_eq!(err.field(), Some("port"));
    }

    #[rstest]
    #[case::empty("")]
    #[case::blank("   ")]
    #[case::embedded_space("nginx latest")]
    fn test_bad_images_are_rejected(#[case] image: &str) {
        let err = ProvisionRequest::new(image).validate().unwrap_err();
        assert_eq!(err.field(), Some("image"));
    }

    #[rstest]
    #[case::dotted("foo.bar")]
    #[case::uppercase("Foo")]
    #[case::wildcard("*")]
    fn test_subdomain_must_be_single_dns_label(#[case] subdomain: &str) {
        let err = ProvisionRequest::new("nginx")
            .with_subdomain(subdomain)
            .validate()
            .unwrap_err();
        assert_eq!(err.field(), Some("subdomain"));
    }

    #[test]
    fn test_dns_name_accepts_dotted_labels() {
        assert!(is_dns_name("example.com"));
        assert!(is_dns_name("apps.eu-1.example.com"));
        assert!(!is_dns_name("example..com"));
        assert!(!is_dns_name(".example.com"));
        assert!(!is_dns_name(""));
    }
}
