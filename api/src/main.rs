use clap::Parser;
use factcheck_relay::{RelayConfig, UploadRelay};
use tracing::info;
use tracing_subscriber::EnvFilter;

use factcheck_relay_api::{DEFAULT_RELAY_PATH, app};

#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// Route the relay is mounted on
    #[arg(long, env = "RELAY_PATH", default_value = DEFAULT_RELAY_PATH)]
    path: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    anyhow::ensure!(
        args.path.starts_with('/'),
        "relay path must start with '/', got {:?}",
        args.path
    );

    info!(
        "Starting fact-check upload relay v{}",
        env!("CARGO_PKG_VERSION")
    );

    let config = RelayConfig::from_env()?;
    info!(upstream = %config.upstream_url, path = %args.path, "Relay configured");
    let relay = UploadRelay::new(config)?;

    let addr = format!("0.0.0.0:{}", args.port);
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app(relay, &args.path)).await?;

    Ok(())
}
