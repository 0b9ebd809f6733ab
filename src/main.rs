//! Proxy Balancer - Entry Point
//!
//! Loads a proxy pool, probes it, reports the best proxy and keeps the pool
//! fresh until shutdown.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};

use proxy_balancer::logging::init_logging;
use proxy_balancer::{BalancerError, Config, ProxyBalancer, ProxySource};

#[derive(Parser, Debug)]
#[command(name = "proxy-balancer", version, about = "Latency-ranked proxy pool")]
struct Args {
    /// File with one proxy address per line
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Run a single refresh cycle, print the report and exit
    #[arg(long)]
    once: bool,

    /// Proxy addresses (used when no file is given)
    addresses: Vec<String>,
}

impl Args {
    /// Command-line source, falling back to `PROXY_SOURCE`
    fn source(&self, config: &Config) -> proxy_balancer::Result<ProxySource> {
        if let Some(path) = &self.file {
            return Ok(ProxySource::File(path.clone()));
        }
        if !self.addresses.is_empty() {
            return Ok(ProxySource::List(self.addresses.clone()));
        }
        config.source.clone().ok_or_else(|| {
            BalancerError::InvalidSource(
                "pass --file, addresses, or set PROXY_SOURCE".to_string(),
            )
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = Config::from_env().context("failed to load configuration")?;
    init_logging(&config.log).context("failed to initialize logging")?;

    info!("Starting proxy balancer");

    let source = args.source(&config)?;
    let balancer = ProxyBalancer::new(source, config.balancer.clone()).await?;

    let report = balancer.refresh_proxies().await;
    info!(
        "Initial refresh: {} passed, {} failed",
        report.passed, report.failed
    );

    print_report(&balancer)?;

    if args.once {
        return Ok(());
    }

    let auto_refresh = balancer.start_auto_refresh();
    info!(
        "Auto refresh running every {}ms",
        config.balancer.refresh_interval.as_millis()
    );

    shutdown_signal().await;
    info!("Shutdown signal received");

    auto_refresh.shutdown();
    auto_refresh.wait().await;
    print_report(&balancer)?;

    info!("Proxy balancer stopped");
    Ok(())
}

fn print_report(balancer: &ProxyBalancer) -> anyhow::Result<()> {
    let summary = balancer.stats_summary();
    info!("Pool summary: {}", summary);

    match balancer.get_best_proxy() {
        Ok(best) => info!("Best proxy: {}", best.address),
        Err(e) if e.is_selection_error() => warn!("No usable proxy: {}", e),
        Err(e) => error!("Selection failed: {}", e),
    }

    let report = serde_json::json!({
        "summary": summary,
        "ranked": balancer.sort_by_latency(),
        "failed": balancer.failed_proxies(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
