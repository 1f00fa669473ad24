//! Bootstrap peer sources.
//!
//! Feeds the table from operator-supplied socket addresses and DNS seed
//! hostnames so a cold-started seeder has something to crawl.

use std::net::SocketAddr;

use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};
use trust_dns_resolver::TokioAsyncResolver;
use tunnels_wire::NetAddress;

use crate::manager::Manager;

/// Seed the table from configured bootstrap addresses and DNS seed hosts.
pub async fn bootstrap(
    manager: &Manager,
    seed_addrs: &[SocketAddr],
    dns_seeds: &[String],
    default_port: u16,
) {
    let mut addrs: Vec<NetAddress> = seed_addrs.iter().map(|a| NetAddress::from(*a)).collect();

    if !dns_seeds.is_empty() {
        let resolver = TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default());
        for host in dns_seeds {
            match resolver.lookup_ip(host.as_str()).await {
                Ok(response) => {
                    let before = addrs.len();
                    addrs.extend(
                        response
                            .iter()
                            .map(|ip| NetAddress::new(ip, default_port)),
                    );
                    tracing::info!(host = %host, count = addrs.len() - before, "Resolved DNS seed");
                }
                Err(e) => {
                    tracing::warn!(host = %host, error = %e, "Failed to resolve DNS seed");
                }
            }
        }
    }

    if addrs.is_empty() {
        return;
    }
    let new = manager.add_addresses(&addrs);
    tracing::info!(total = addrs.len(), new, "Bootstrapped addresses");
}
