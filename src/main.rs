//! Service health monitor with per-service circuit breakers.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌──────────────────────────────────────────────┐
//!                 │                HEALTH MONITOR                 │
//!                 │                                               │
//!   timer tick ──▶│  check_all_services                           │
//!                 │     │                                         │
//!                 │     ├──▶ CircuitBreaker(image-server) ──probe─┼──▶ GET /health
//!                 │     ├──▶ CircuitBreaker(file-system)  ──probe─┼──▶ GET /health
//!                 │     └──▶ CircuitBreaker(gateway)      ──probe─┼──▶ GET /health
//!                 │                     │                         │
//!                 │                     ▼                         │
//!                 │               HealthReport                    │
//!                 │        ┌──────────┼───────────┐               │
//!                 │     console     logs     admin API            │
//!                 └──────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use service_breaker::admin::{self, AdminState};
use service_breaker::config::{load_config, MonitorConfig};
use service_breaker::health::{
    ConsoleReporter, HealthMonitor, HealthReport, LatestReport, LogReporter, MetricsReporter,
};
use service_breaker::lifecycle::{signals, Shutdown};
use service_breaker::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "service-breaker")]
#[command(about = "Health monitor with per-service circuit breakers", long_about = None)]
struct Cli {
    /// TOML configuration file; built-in defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Check every service once, print the results and exit.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => MonitorConfig::default(),
    };

    logging::init_logging(&config.observability)?;

    tracing::info!(
        services = config.services.len(),
        failure_threshold = config.breaker.failure_threshold,
        reset_timeout_ms = config.breaker.reset_timeout_ms,
        monitoring_period_ms = config.breaker.monitoring_period_ms,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let monitor = Arc::new(HealthMonitor::from_config(&config)?);

    let initial = monitor.check_all_services().await;
    println!("Initial health check results:");
    print!("{}", ConsoleReporter::render(&initial));

    if cli.once {
        return Ok(ExitCode::from(once_exit_status(&initial)));
    }

    let shutdown = Shutdown::new();
    let latest = Arc::new(LatestReport::new());

    let admin_task = if config.admin.enabled {
        let listener = TcpListener::bind(&config.admin.bind_address).await?;
        let router = admin::setup_admin_router(
            AdminState {
                monitor: monitor.clone(),
                latest: latest.clone(),
                api_key: config.admin.api_key.as_str().into(),
            },
            Duration::from_secs(config.admin.request_timeout_secs),
        );
        Some(tokio::spawn(admin::serve(listener, router, shutdown.subscribe())))
    } else {
        None
    };

    let sink = (ConsoleReporter, (LogReporter, (MetricsReporter, latest)));
    let monitor_task = monitor.start_monitoring(sink, shutdown.subscribe())?;

    signals::shutdown_signal().await;
    tracing::info!("Shutting down");
    shutdown.trigger();

    monitor_task.await?;
    if let Some(task) = admin_task {
        task.await??;
    }

    tracing::info!("Shutdown complete");
    Ok(ExitCode::SUCCESS)
}

/// Exit status for `--once`: non-zero when any service is unavailable.
fn once_exit_status(report: &HealthReport) -> u8 {
    if report.all_available() {
        0
    } else {
        1
    }
}
