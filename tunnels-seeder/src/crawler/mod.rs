//! Probe worker pool.
//!
//! Converts stale nodes into either refreshed good nodes (with a fresh
//! subnetwork id and freshly gossiped addresses) or nodes whose attempt
//! time has been bumped so they fall out of the stale set until the next
//! timeout. Workers never retry within a cycle; retry is implicit via the
//! next stale window.

pub mod version_gate;

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tunnels_wire::{NetAddress, SeedConnection, WireConfig};

use crate::manager::Manager;
use crate::shutdown::ShutdownToken;

pub use version_gate::{check_version, VersionGateError};

/// Pause between crawl cycles when there is nothing stale to probe.
const IDLE_DELAY: Duration = Duration::from_secs(10);

/// Crawler settings.
#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    /// Maximum concurrent probes.
    pub threads: usize,
    /// Minimum acceptable peer user agent version; empty accepts all.
    pub min_ua_version: String,
    /// Wire-level client settings.
    pub wire: WireConfig,
}

/// Run the crawl loop until shutdown.
///
/// Each cycle pulls the current stale batch from the table and probes it
/// with at most `threads` connections in flight.
pub async fn run(manager: Arc<Manager>, config: CrawlerConfig, shutdown: ShutdownToken) {
    loop {
        let batch = manager.addresses();
        if batch.is_empty() {
            tokio::select! {
                _ = tokio::time::sleep(IDLE_DELAY) => {}
                _ = shutdown.wait() => break,
            }
            continue;
        }

        tracing::debug!(count = batch.len(), "Probing stale nodes");

        let manager_ref = &manager;
        let config_ref = &config;
        let probes = futures::stream::iter(batch).for_each_concurrent(
            config.threads.max(1),
            |addr| async move {
                probe(manager_ref, config_ref, addr).await;
            },
        );

        tokio::select! {
            _ = probes => {}
            _ = shutdown.wait() => break,
        }
    }
    tracing::info!("Crawler shutdown");
}

/// Probe a single node: handshake, version gate, address harvest.
///
/// Failures need no bookkeeping: the attempt time has already advanced
/// before the connection was opened, so even a hung probe does not keep the
/// node in the stale set.
pub async fn probe(manager: &Manager, config: &CrawlerConfig, addr: NetAddress) {
    manager.attempt(&addr);

    let (mut conn, version) = match SeedConnection::connect(addr.socket_addr(), &config.wire).await
    {
        Ok(ok) => ok,
        Err(e) => {
            tracing::debug!(addr = %addr, error = %e, "Probe failed");
            return;
        }
    };

    if let Err(e) = check_version(&config.min_ua_version, &version.user_agent) {
        tracing::debug!(
            addr = %addr,
            user_agent = %version.user_agent,
            error = %e,
            "Peer rejected by version gate"
        );
        return;
    }

    match conn.request_addresses().await {
        Ok(addrs) => {
            manager.good(&addr, version.subnetwork_id);
            let new = manager.add_addresses(&addrs);
            tracing::debug!(addr = %addr, received = addrs.len(), new, "Probe succeeded");
        }
        Err(e) => {
            tracing::debug!(addr = %addr, error = %e, "Address request failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use tempfile::tempdir;

    fn test_crawler_config() -> CrawlerConfig {
        CrawlerConfig {
            threads: 2,
            min_ua_version: String::new(),
            wire: WireConfig {
                connect_timeout: Duration::from_millis(500),
                step_timeout: Duration::from_millis(500),
                ..WireConfig::default()
            },
        }
    }

    #[tokio::test]
    async fn test_failed_probe_only_advances_attempt() {
        let dir = tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(1_700_000_000));
        let manager =
            Manager::new(dir.path(), 2, 9333, true, clock.clone() as Arc<dyn Clock>).await;

        // Nothing listens on this port; the connect is refused immediately.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let addr = NetAddress::new("127.0.0.1".parse().unwrap(), port);
        manager.add_addresses(&[addr]);

        probe(&manager, &test_crawler_config(), addr).await;

        let node = manager.lookup(&addr).unwrap();
        assert_eq!(node.last_attempt, clock.now());
        assert_eq!(node.last_success, 0);
    }
}
