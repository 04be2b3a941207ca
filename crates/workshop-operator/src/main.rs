//! Workshop Kubernetes Operator
//!
//! This operator manages Workshop custom resources in OpenShift, provisioning
//! the infrastructure components each workshop enables.

use anyhow::{Context, Result};
use clap::Parser;
use kube::Client;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;
use workshop_operator::config::{OperatorConfig, DEFAULT_OPERATION_TIMEOUT_SECS};
use workshop_operator::controller;
use workshop_operator::provisioner::DEFAULT_CONFLICT_RETRIES;

/// Workshop Kubernetes Operator
#[derive(Parser, Debug)]
#[command(name = "workshop-operator")]
#[command(about = "Kubernetes operator for multi-component workshop environments")]
#[command(version)]
struct Args {
    /// Metrics server address
    #[arg(long, env = "METRICS_ADDR", default_value = "0.0.0.0:8080")]
    metrics_addr: SocketAddr,

    /// Health probe address
    #[arg(long, env = "HEALTH_ADDR", default_value = "0.0.0.0:8081")]
    health_addr: SocketAddr,

    /// Wildcard application domain (empty to read it from the cluster ingress config)
    #[arg(long, env = "APPS_DOMAIN", default_value = "")]
    apps_domain: String,

    /// Timeout for a single cluster API call, in seconds
    #[arg(long, env = "OPERATION_TIMEOUT_SECS", default_value_t = DEFAULT_OPERATION_TIMEOUT_SECS)]
    operation_timeout_secs: u64,

    /// Re-merge attempts after a shared-policy version conflict
    #[arg(long, env = "CONFLICT_RETRIES", default_value_t = DEFAULT_CONFLICT_RETRIES)]
    conflict_retries: u32,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: Level,

    /// Enable JSON log format
    #[arg(long, env = "LOG_JSON", default_value = "false")]
    log_json: bool,

    /// Print CRD YAML and exit
    #[arg(long)]
    print_crd: bool,
}

impl Args {
    fn operator_config(&self) -> OperatorConfig {
        OperatorConfig::default()
            .with_apps_domain(self.apps_domain.as_str())
            .with_operation_timeout(Duration::from_secs(self.operation_timeout_secs))
            .with_conflict_retries(self.conflict_retries)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Handle CRD printing
    if args.print_crd {
        print_crd()?;
        return Ok(());
    }

    // Initialize logging
    init_logging(&args)?;

    let config = args.operator_config();
    config.validate().context("Invalid operator configuration")?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        operation_timeout_secs = args.operation_timeout_secs,
        "Starting Workshop Kubernetes Operator"
    );

    // Initialize metrics
    let metrics_addr = args.metrics_addr;
    tokio::spawn(async move {
        if let Err(e) = start_metrics_server(metrics_addr).await {
            tracing::error!(error = %e, "Metrics server failed");
        }
    });

    // Start health server
    let health_addr = args.health_addr;
    tokio::spawn(async move {
        if let Err(e) = start_health_server(health_addr).await {
            tracing::error!(error = %e, "Health server failed");
        }
    });

    // Create Kubernetes client
    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    // Run the controller
    controller::run_controller(client, config)
        .await
        .context("Controller failed")?;

    Ok(())
}

/// Initialize logging subsystem
fn init_logging(args: &Args) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(true)
        .with_thread_ids(false)
        .with_line_number(false);

    if args.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    Ok(())
}

/// Start the Prometheus metrics server
async fn start_metrics_server(addr: SocketAddr) -> Result<()> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    info!(address = %addr, "Starting metrics server");

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("Failed to install Prometheus exporter")?;

    // Keep the server running
    std::future::pending::<()>().await;

    Ok(())
}

/// Start the health probe server
async fn start_health_server(addr: SocketAddr) -> Result<()> {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    info!(address = %addr, "Starting health server");

    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind health server")?;

    loop {
        let (mut socket, _) = listener.accept().await?;

        tokio::spawn(async move {
            let mut buf = [0; 1024];
            if socket.read(&mut buf).await.is_ok() {
                let response = "HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nOK";
                let _ = socket.write_all(response.as_bytes()).await;
            }
        });
    }
}

/// Print the CRD YAML for installation
fn print_crd() -> Result<()> {
    use kube::CustomResourceExt;

    let crd = workshop_operator::crd::Workshop::crd();
    let yaml = serde_yaml::to_string(&crd)?;
    println!("{}", yaml);

    Ok(())
}
