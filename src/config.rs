//! Command-line and environment configuration
//!
//! Every flag has an environment fallback so the service can be configured from a
//! Deployment manifest without arguments.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use axum::http::HeaderName;
use clap::Parser;

use crate::descriptor::IngressSettings;
use crate::provisioner::ProvisionerConfig;
use crate::request::is_dns_name;
use crate::telemetry::LogFormat;
use crate::Error;

/// Tenant Provisioner - per-tenant application runtimes on Kubernetes
#[derive(Parser, Debug, Clone)]
#[command(name = "tenant-provisioner", version, about, long_about = None)]
pub struct Config {
    /// Domain under which tenant subdomains are published
    #[arg(long, env = "BASE_DOMAIN", default_value = crate::DEFAULT_BASE_DOMAIN)]
    pub base_domain: String,

    /// Address the HTTP server listens on
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Request header carrying the tenant identity
    #[arg(long, env = "TENANT_HEADER", default_value = "x-user-id")]
    pub tenant_header: String,

    /// cert-manager ClusterIssuer used for tenant certificates
    #[arg(long, env = "CLUSTER_ISSUER", default_value = "letsencrypt-staging")]
    pub cluster_issuer: String,

    /// Ingress class handling tenant ingresses
    #[arg(long, env = "INGRESS_CLASS", default_value = "nginx")]
    pub ingress_class: String,

    /// Upper bound in seconds on each Kubernetes API call
    #[arg(long, env = "API_TIMEOUT_SECS", default_value = "10")]
    pub api_timeout_secs: u64,

    /// Path to a kubeconfig file (in-cluster or inferred config otherwise)
    #[arg(long, env = "KUBECONFIG")]
    pub kubeconfig: Option<PathBuf>,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Json)]
    pub log_format: LogFormat,
}

impl Config {
    /// Check values clap cannot check on its own
    pub fn validate(&self) -> Result<(), Error> {
        if !is_dns_name(&self.base_domain.to_ascii_lowercase()) {
            return Err(Error::config(format!(
                "base domain '{}' is not a dotted sequence of DNS labels",
                self.base_domain
            )));
        }
        if self.api_timeout_secs == 0 {
            return Err(Error::config("api timeout must be at least 1 second"));
        }
        if self.cluster_issuer.trim().is_empty() {
            return Err(Error::config("cluster issuer cannot be empty"));
        }
        if !is_dns_name(&self.ingress_class) {
            return Err(Error::config(format!(
                "ingress class '{}' is not a valid DNS subdomain",
                self.ingress_class
            )));
        }
        self.tenant_header_name()?;
        Ok(())
    }

    /// Tenant header as an HTTP header name
    pub fn tenant_header_name(&self) -> Result<HeaderName, Error> {
        HeaderName::try_from(self.tenant_header.as_str()).map_err(|e| {
            Error::config(format!(
                "tenant header '{}' is not a valid header name: {}",
                self.tenant_header, e
            ))
        })
    }

    /// Bound on each Kubernetes API call
    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_secs)
    }

    /// Orchestrator settings derived from this configuration
    pub fn provisioner_config(&self) -> ProvisionerConfig {
        ProvisionerConfig {
            ingress: IngressSettings {
                base_domain: self.base_domain.to_ascii_lowercase(),
                cluster_issuer: self.cluster_issuer.clone(),
                ingress_class: self.ingress_class.clone(),
            },
            call_timeout: self.api_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn parse(args: &[&str]) -> Config {
        let mut argv = vec!["tenant-provisioner"];
        argv.extend_from_slice(args);
        Config::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_explicit_flags_are_applied() {
        let config = parse(&[
            "--base-domain",
            "example.com",
            "--listen",
            "127.0.0.1:9000",
            "--tenant-header",
            "x-tenant",
            "--cluster-issuer",
            "letsencrypt-prod",
            "--ingress-class",
            "traefik",
            "--api-timeout-secs",
            "3",
            "--log-format",
            "pretty",
        ]);

        assert_eq!(config.listen, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(config.api_timeout(), Duration::from_secs(3));
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert_eq!(config.tenant_header_name().unwrap().as_str(), "x-tenant");

        let provisioner = config.provisioner_config();
        assert_eq!(provisioner.ingress.base_domain, "example.com");
        assert_eq!(provisioner.ingress.cluster_issuer, "letsencrypt-prod");
        assert_eq!(provisioner.ingress.ingress_class, "traefik");
        assert_eq!(provisioner.call_timeout, Duration::from_secs(3));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_base_domain_is_lowercased_for_hosts() {
        let config = parse(&["--base-domain", "Example.COM"]);
        assert!(config.validate().is_ok());
        assert_eq!(config.provisioner_config().ingress.base_domain, "example.com");
    }

    #[rstest]
    #[case::empty("")]
    #[case::leading_dot(".example.com")]
    #[case::trailing_dot("example.com.")]
    #[case::underscore("my_domain.com")]
    #[case::scheme("https://example.com")]
    fn test_invalid_base_domain_is_rejected(#[case] domain: &str) {
        let config = parse(&["--base-domain", domain]);
        let err = config.validate().unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[rstest]
    #[case::spaces("Nginx Class")]
    #[case::uppercase("Nginx")]
    #[case::empty("")]
    #[case::trailing_dash("nginx-")]
    fn test_invalid_ingress_class_is_rejected(#[case] class: &str) {
        let config = parse(&["--ingress-class", class]);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("ingress class"));
    }

    #[rstest]
    #[case::plain("nginx")]
    #[case::dotted("internal.nginx.example")]
    fn test_dns_ingress_class_is_accepted(#[case] class: &str) {
        assert!(parse(&["--ingress-class", class]).validate().is_ok());
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let config = parse(&["--api-timeout-secs", "0"]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_tenant_header_is_rejected() {
        let config = parse(&["--tenant-header", "x user"]);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("tenant header"));
    }

    #[test]
    fn test_unknown_log_format_fails_to_parse() {
        let result = Config::try_parse_from(["tenant-provisioner", "--log-format", "xml"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_bad_listen_address_fails_to_parse() {
        let result = Config::try_parse_from(["tenant-provisioner", "--listen", "not-an-addr"]);
        assert!(result.is_err());
    }
}
