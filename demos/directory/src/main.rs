use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use futures_util::StreamExt;
use service_directory::{DirectoryConfig, DirectoryServer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(name = "directory")]
#[clap(about = "Service directory: tracks live instances and pushes updates to dependents")]
struct Args {
    /// Address to listen on
    #[clap(long, default_value = "0.0.0.0:3000")]
    bind: SocketAddr,

    /// Path of the registration endpoint
    #[clap(long, default_value = "/services")]
    path: String,

    /// Timeout for pushing a patch to a dependent, in seconds
    #[clap(long, default_value = "10")]
    delivery_timeout: u64,

    /// Enable verbose logging
    #[clap(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let config = DirectoryConfig::default()
        .bind_addr(args.bind)
        .services_path(args.path)
        .request_timeout(Duration::from_secs(args.delivery_timeout));

    let guard = DirectoryServer::new(config).serve().await?;
    info!("Directory started at {}", guard.services_url());

    let mut failures = Box::pin(guard.directory().delivery_failures());
    tokio::spawn(async move {
        while let Some(failure) = failures.next().await {
            warn!(
                "Undelivered patch for {}: {} ({:?})",
                failure.target, failure.reason, failure.patch
            );
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("Directory shutting down...");
    guard.shutdown().await?;

    Ok(())
}
