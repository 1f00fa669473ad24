//! Command-line argument parsing.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tunnels_wire::DEFAULT_P2P_PORT;

/// Tunnels network DNS seeder.
#[derive(Parser, Debug, Clone)]
#[command(name = "tunnels-seeder")]
#[command(about = "DNS seeder for the Tunnels P2P network")]
#[command(version)]
pub struct Cli {
    /// Data directory for the node snapshot.
    #[arg(long, default_value = "~/.tunnels-seeder")]
    pub data_dir: PathBuf,

    /// Hostname the seeder answers queries for (the zone apex).
    #[arg(long)]
    pub host: String,

    /// Nameserver host returned for NS queries at the apex.
    #[arg(long)]
    pub nameserver: String,

    /// DNS listen address.
    #[arg(long, default_value = "0.0.0.0:5354")]
    pub listen: SocketAddr,

    /// Known peer addresses to bootstrap from (comma separated).
    #[arg(long, value_delimiter = ',')]
    pub seed: Option<Vec<SocketAddr>>,

    /// DNS seed hostnames to bootstrap from (comma separated).
    #[arg(long, value_delimiter = ',')]
    pub dns_seed: Option<Vec<String>>,

    /// Number of concurrent probe workers.
    #[arg(long, default_value_t = 8)]
    pub threads: usize,

    /// Minimum peer user agent version; older peers are not vetted.
    #[arg(long, default_value = "")]
    pub min_ua_version: String,

    /// Keep unroutable addresses (testing only).
    #[arg(long)]
    pub accept_unroutable: bool,

    /// Canonical P2P port; peers on other ports are never served.
    #[arg(long, default_value_t = DEFAULT_P2P_PORT)]
    pub port: u16,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Expand the data directory path (handle ~ for home).
    pub fn expanded_data_dir(&self) -> PathBuf {
        let path_str = self.data_dir.to_string_lossy();
        if let Some(stripped) = path_str.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(stripped);
            }
        }
        self.data_dir.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Vec<&'static str> {
        vec![
            "tunnels-seeder",
            "--host",
            "seed.tunnels.example",
            "--nameserver",
            "ns.tunnels.example",
        ]
    }

    #[test]
    fn test_default_values() {
        let cli = Cli::parse_from(base_args());
        assert_eq!(cli.listen.port(), 5354);
        assert_eq!(cli.threads, 8);
        assert_eq!(cli.port, DEFAULT_P2P_PORT);
        assert_eq!(cli.min_ua_version, "");
        assert!(!cli.accept_unroutable);
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn test_seed_list() {
        let mut args = base_args();
        args.extend(["--seed", "8.8.8.8:9333,1.1.1.1:9333"]);
        let cli = Cli::parse_from(args);
        assert_eq!(cli.seed.unwrap().len(), 2);
    }

    #[test]
    fn test_min_ua_version() {
        let mut args = base_args();
        args.extend(["--min-ua-version", "0.3.14"]);
        let cli = Cli::parse_from(args);
        assert_eq!(cli.min_ua_version, "0.3.14");
    }
}
