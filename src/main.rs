// ABOUTME: Entry point for the bookstay binary.
// ABOUTME: Loads configuration, initializes tracing, restores marketplace state, and runs until Ctrl-C.

use std::path::PathBuf;

use bookstay_service::{MarketConfig, Marketplace};
use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "bookstay", about = "Booking marketplace state service")]
struct Args {
    /// Local snapshot file; overrides BOOKSTAY_DATA_FILE.
    #[arg(long)]
    data_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("bookstay=debug")),
        )
        .init();

    let args = Args::parse();
    let mut config = MarketConfig::from_env()?;
    if let Some(data_file) = args.data_file {
        config.data_file = data_file;
    }

    tracing::info!(
        data_file = %config.data_file.display(),
        remote = config.remote.is_some(),
        "bookstay starting up"
    );

    let market = Marketplace::open(&config).await?;
    let (users, listings, bookings) = market.counts().await?;
    tracing::info!(users, listings, bookings, "marketplace ready");

    tokio::signal::ctrl_c().await?;
    tracing::info!("bookstay shutting down");
    Ok(())
}
