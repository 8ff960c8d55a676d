//! Tenant Provisioner - HTTP service provisioning per-tenant runtimes on Kubernetes

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use tenant_provisioner::client::{create_client, KubeClusterApi};
use tenant_provisioner::config::Config;
use tenant_provisioner::provisioner::Provisioner;
use tenant_provisioner::server::{router, AppState};
use tenant_provisioner::telemetry::init_telemetry;

/// Connect timeout for the Kubernetes client
const KUBE_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Read timeout for the Kubernetes client
const KUBE_READ_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // kube's rustls transport needs a process-wide crypto provider
    if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
        eprintln!(
            "CRITICAL: Failed to install crypto provider: {:?}. \
             The Kubernetes client cannot establish TLS connections without it.",
            e
        );
        std::process::exit(1);
    }

    let config = Config::parse();

    init_telemetry(config.log_format)
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;
    let tenant_header = config.tenant_header_name()?;

    let client = create_client(
        config.kubeconfig.as_deref(),
        KUBE_CONNECT_TIMEOUT,
        KUBE_READ_TIMEOUT,
    )
    .await
    .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {}", e))?;

    let provisioner = Provisioner::new(
        Arc::new(KubeClusterApi::new(client)),
        config.provisioner_config(),
    );
    let state = Arc::new(AppState::new(provisioner, tenant_header));

    let listener = TcpListener::bind(config.listen)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind {}: {}", config.listen, e))?;

    info!(
        listen = %config.listen,
        base_domain = %config.base_domain,
        tenant_header = %config.tenant_header,
        "Tenant provisioner listening"
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    info!("Tenant provisioner stopped");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
