//! Seeder orchestrator.
//!
//! Composes the node table, the crawler, the maintenance loop, and the DNS
//! front end into a running seeder.

use std::sync::Arc;

use crate::clock::SystemClock;
use crate::config::SeederConfig;
use crate::crawler;
use crate::dns::DnsServer;
use crate::manager::Manager;
use crate::seeds;
use crate::shutdown::{wait_for_signal, ShutdownToken};

/// The main seeder structure.
pub struct Seeder {
    /// Seeder configuration.
    config: SeederConfig,

    /// Shared node table.
    manager: Arc<Manager>,

    /// Shutdown token shared with every task.
    shutdown: ShutdownToken,
}

impl Seeder {
    /// Create a seeder, loading any previous snapshot from the data dir.
    pub async fn new(config: SeederConfig) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;
        tracing::info!("Data directory: {:?}", config.data_dir);

        let manager = Manager::new(
            &config.data_dir,
            config.threads,
            config.default_port,
            config.accept_unroutable,
            Arc::new(SystemClock),
        )
        .await;

        Ok(Self {
            config,
            manager,
            shutdown: ShutdownToken::new(),
        })
    }

    /// Run the seeder until SIGINT or SIGTERM.
    pub async fn run(&self) -> anyhow::Result<()> {
        tracing::info!("Starting Tunnels seeder...");
        tracing::info!("  Host: {}", self.config.host);
        tracing::info!("  DNS listen address: {}", self.config.listen);
        tracing::info!("  Probe workers: {}", self.config.threads);
        tracing::info!("  Known nodes: {}", self.manager.address_count());

        seeds::bootstrap(
            &self.manager,
            &self.config.seed_addrs,
            &self.config.dns_seeds,
            self.config.default_port,
        )
        .await;

        // A seeder that cannot answer queries has no job to do, so DNS bind
        // failures abort startup.
        let dns_server = DnsServer::bind(
            self.manager.clone(),
            self.config.listen,
            &self.config.host,
            &self.config.nameserver,
        )
        .await?;
        let dns_handle = tokio::spawn(dns_server.run(self.shutdown.clone()));

        let maintenance_handle = self.manager.spawn_maintenance(self.shutdown.clone());

        let crawler_handle = tokio::spawn(crawler::run(
            self.manager.clone(),
            self.config.crawler_config(),
            self.shutdown.clone(),
        ));

        wait_for_signal().await;

        tracing::info!("Shutting down seeder...");
        self.shutdown.trigger();

        let _ = crawler_handle.await;
        let _ = dns_handle.await;
        // The maintenance loop writes the final snapshot on its way out.
        let _ = maintenance_handle.await;

        tracing::info!("Seeder shutdown complete");
        Ok(())
    }

    /// Get the node table (for testing).
    pub fn manager(&self) -> &Arc<Manager> {
        &self.manager
    }

    /// Get a shutdown handle (for testing).
    pub fn shutdown_token(&self) -> ShutdownToken {
        self.shutdown.clone()
    }

    /// Get the seeder configuration.
    pub fn config(&self) -> &SeederConfig {
        &self.config
    }
}
