//! Tunnels DNS seeder binary.
//!
//! Crawls the Tunnels P2P network and serves the healthy subset of peers
//! over DNS.

use tracing_subscriber::EnvFilter;

use tunnels_seeder::cli::Cli;
use tunnels_seeder::config::SeederConfig;
use tunnels_seeder::seeder::Seeder;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Set up logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    tracing::info!("Tunnels seeder v{}", env!("CARGO_PKG_VERSION"));

    // Build configuration
    let config = SeederConfig::from_cli(&cli);

    // Create and run seeder
    let seeder = Seeder::new(config).await?;
    seeder.run().await?;

    Ok(())
}
