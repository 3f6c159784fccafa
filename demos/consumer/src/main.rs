use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Result;
use axum::routing::get;
use axum::Router;
use clap::Parser;
use service_directory::{ClientConfig, Registration, ServiceHost, ServiceName};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(name = "consumer")]
#[clap(about = "A service that registers with the directory and looks up its dependencies")]
struct Args {
    /// Name this instance registers under
    #[clap(long, default_value = "GradingService")]
    name: String,

    /// Address to listen on
    #[clap(long, default_value = "127.0.0.1:6000")]
    bind: SocketAddr,

    /// Host other services use to reach this instance
    #[clap(long, default_value = "localhost")]
    host: String,

    /// Service kinds this instance depends on
    #[clap(long)]
    requires: Vec<String>,

    /// Registration endpoint of the directory
    #[clap(long, default_value = "http://localhost:3000/services")]
    directory: String,

    /// Seconds between provider lookups
    #[clap(long, default_value = "5")]
    interval: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let url = format!("http://{}:{}", args.host, args.bind.port());
    let mut reg = Registration::new(args.name.as_str(), url.clone(), format!("{url}/services"));
    for name in &args.requires {
        reg = reg.require(name.as_str());
    }

    let name = args.name.clone();
    let app = Router::new().route("/", get(move || async move { format!("{name} is up\n") }));

    let guard = ServiceHost::new(reg, ClientConfig::default().directory_url(args.directory))
        .routes(app)
        .start(args.bind)
        .await?;
    info!("{} registered at {}", args.name, url);

    let interval = Duration::from_secs(args.interval);
    let client = guard.client().clone();
    let required: Vec<ServiceName> = args.requires.iter().map(|r| ServiceName::from(r.as_str())).collect();
    let lookups = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            for dep in &required {
                match client.get_provider(dep) {
                    Ok(provider) => info!("{} -> {}", dep, provider),
                    Err(e) => warn!("{}", e),
                }
            }
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");
    lookups.abort();
    guard.shutdown().await?;

    Ok(())
}
