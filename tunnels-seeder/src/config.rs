//! Seeder configuration.

use std::net::SocketAddr;
use std::path::PathBuf;

use tunnels_wire::{WireConfig, DEFAULT_P2P_PORT};

use crate::cli::Cli;
use crate::crawler::CrawlerConfig;

/// Complete seeder configuration.
#[derive(Debug, Clone)]
pub struct SeederConfig {
    /// Data directory for the node snapshot.
    pub data_dir: PathBuf,

    /// Hostname the seeder answers queries for.
    pub host: String,

    /// Nameserver host returned for NS queries.
    pub nameserver: String,

    /// DNS listen address.
    pub listen: SocketAddr,

    /// Known peer addresses to bootstrap from.
    pub seed_addrs: Vec<SocketAddr>,

    /// DNS seed hostnames to bootstrap from.
    pub dns_seeds: Vec<String>,

    /// Number of concurrent probe workers.
    pub threads: usize,

    /// Minimum peer user agent version; empty accepts all.
    pub min_ua_version: String,

    /// Keep unroutable addresses (testing only).
    pub accept_unroutable: bool,

    /// Canonical P2P port.
    pub default_port: u16,

    /// Log level.
    pub log_level: String,
}

impl SeederConfig {
    /// Create a seeder configuration from CLI arguments.
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            data_dir: cli.expanded_data_dir(),
            host: cli.host.clone(),
            nameserver: cli.nameserver.clone(),
            listen: cli.listen,
            seed_addrs: cli.seed.clone().unwrap_or_default(),
            dns_seeds: cli.dns_seed.clone().unwrap_or_default(),
            threads: cli.threads,
            min_ua_version: cli.min_ua_version.clone(),
            accept_unroutable: cli.accept_unroutable,
            default_port: cli.port,
            log_level: cli.log_level.clone(),
        }
    }

    /// Crawler settings derived from this configuration.
    pub fn crawler_config(&self) -> CrawlerConfig {
        CrawlerConfig {
            threads: self.threads,
            min_ua_version: self.min_ua_version.clone(),
            wire: WireConfig::default(),
        }
    }
}

impl Default for SeederConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("~/.tunnels-seeder"),
            host: "seed.tunnels.example".to_string(),
            nameserver: "ns.tunnels.example".to_string(),
            listen: "0.0.0.0:5354".parse().expect("static address"),
            seed_addrs: Vec::new(),
            dns_seeds: Vec::new(),
            threads: 8,
            min_ua_version: String::new(),
            accept_unroutable: false,
            default_port: DEFAULT_P2P_PORT,
            log_level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SeederConfig::default();
        assert_eq!(config.listen.port(), 5354);
        assert_eq!(config.threads, 8);
        assert_eq!(config.default_port, DEFAULT_P2P_PORT);
        assert!(config.min_ua_version.is_empty());
    }

    #[test]
    fn test_crawler_config_inherits_gate() {
        let config = SeederConfig {
            min_ua_version: "0.3.14".to_string(),
            threads: 4,
            ..SeederConfig::default()
        };

        let crawler = config.crawler_config();
        assert_eq!(crawler.threads, 4);
        assert_eq!(crawler.min_ua_version, "0.3.14");
    }
}
