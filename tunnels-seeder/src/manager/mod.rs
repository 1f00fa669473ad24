//! The node table: the sole authority over the set of known peers.
//!
//! All mutation is serialized behind one read/write lock. Nothing performs
//! network or disk I/O while holding it; snapshots are serialized under the
//! shared lock and written outside it.

pub mod node;
pub mod snapshot;

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tunnels_wire::{NetAddress, SubnetworkId};

use crate::clock::Clock;
use crate::shutdown::ShutdownToken;

pub use node::{is_expired, is_good, is_stale, Node};

/// Maximum number of addresses returned by a single query.
pub const DEFAULT_MAX_ADDRESSES: usize = 16;

/// Interval between prune passes.
pub const PRUNE_INTERVAL: Duration = Duration::from_secs(60);

/// Interval between snapshot writes.
pub const SNAPSHOT_INTERVAL: Duration = Duration::from_secs(120);

/// IP family filter for address queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressFamily {
    V4,
    V6,
}

/// Shared table of known nodes.
pub struct Manager {
    nodes: RwLock<HashMap<String, Node>>,
    nodes_file: PathBuf,
    clock: Arc<dyn Clock>,
    threads: usize,
    default_port: u16,
    accept_unroutable: bool,
}

impl Manager {
    /// Create a manager, loading any existing snapshot from `data_dir`.
    pub async fn new(
        data_dir: &Path,
        threads: usize,
        default_port: u16,
        accept_unroutable: bool,
        clock: Arc<dyn Clock>,
    ) -> Arc<Self> {
        let nodes_file = data_dir.join(snapshot::NODES_FILENAME);
        let nodes = snapshot::load_nodes(&nodes_file).await;

        Arc::new(Self {
            nodes: RwLock::new(nodes),
            nodes_file,
            clock,
            threads,
            default_port,
            accept_unroutable,
        })
    }

    /// Insert fresh addresses, refreshing `last_seen` on already-known ones.
    /// Non-routable addresses are silently dropped. Returns how many were
    /// newly inserted.
    pub fn add_addresses(&self, addrs: &[NetAddress]) -> usize {
        let now = self.clock.now();
        let mut count = 0;

        let mut nodes = self.nodes.write();
        for addr in addrs {
            if !self.accept_unroutable && !is_routable(addr) {
                continue;
            }
            match nodes.entry(addr.key()) {
                Entry::Occupied(mut entry) => entry.get_mut().last_seen = now,
                Entry::Vacant(entry) => {
                    entry.insert(Node::new(*addr, now));
                    count += 1;
                }
            }
        }
        count
    }

    /// Addresses due for (re-)probing, at most three per probe worker so a
    /// worker whose first candidates fail still has work without another
    /// lock round-trip.
    pub fn addresses(&self) -> Vec<NetAddress> {
        let now = self.clock.now();
        let limit = self.threads * 3;

        let nodes = self.nodes.read();
        nodes
            .values()
            .filter(|node| is_stale(node, now))
            .take(limit)
            .map(|node| node.addr)
            .collect()
    }

    /// Number of known nodes.
    pub fn address_count(&self) -> usize {
        self.nodes.read().len()
    }

    /// Good nodes matching the requested family and subnetwork, capped at
    /// [`DEFAULT_MAX_ADDRESSES`]. This is the hot DNS path; it holds the
    /// shared lock only for the scan.
    pub fn good_addresses(
        &self,
        family: Option<AddressFamily>,
        include_all_subnetworks: bool,
        subnetwork_id: Option<SubnetworkId>,
    ) -> Vec<NetAddress> {
        let family = match family {
            Some(family) => family,
            None => return Vec::new(),
        };
        let now = self.clock.now();

        let nodes = self.nodes.read();
        nodes
            .values()
            .filter(|node| include_all_subnetworks || node.subnetwork_id == subnetwork_id)
            .filter(|node| match family {
                AddressFamily::V4 => node.addr.is_ipv4(),
                AddressFamily::V6 => !node.addr.is_ipv4(),
            })
            .filter(|node| is_good(node, now, self.default_port))
            .take(DEFAULT_MAX_ADDRESSES)
            .map(|node| node.addr)
            .collect()
    }

    /// Record a probe attempt against `addr`. Unknown addresses are a no-op.
    pub fn attempt(&self, addr: &NetAddress) {
        let now = self.clock.now();
        if let Some(node) = self.nodes.write().get_mut(&addr.key()) {
            node.last_attempt = now;
        }
    }

    /// Record a successful handshake with `addr`, rewriting its subnetwork.
    /// Unknown addresses are a no-op.
    pub fn good(&self, addr: &NetAddress, subnetwork_id: Option<SubnetworkId>) {
        let now = self.clock.now();
        if let Some(node) = self.nodes.write().get_mut(&addr.key()) {
            node.last_success = now;
            node.subnetwork_id = subnetwork_id;
        }
    }

    /// Current record for `addr`, if known.
    pub fn lookup(&self, addr: &NetAddress) -> Option<Node> {
        self.nodes.read().get(&addr.key()).cloned()
    }

    /// Drop expired nodes and log a census of the rest. This is the only
    /// place nodes are deleted.
    pub fn prune(&self) {
        let now = self.clock.now();
        let mut pruned = 0;
        let (mut good, mut stale, mut bad) = (0, 0, 0);
        let (mut ipv4, mut ipv6) = (0, 0);

        let total = {
            let mut nodes = self.nodes.write();
            nodes.retain(|_, node| {
                if is_expired(node, now) {
                    pruned += 1;
                    return false;
                }
                if is_good(node, now, self.default_port) {
                    good += 1;
                    if node.addr.is_ipv4() {
                        ipv4 += 1;
                    } else {
                        ipv6 += 1;
                    }
                } else if is_stale(node, now) {
                    stale += 1;
                } else {
                    bad += 1;
                }
                true
            });
            nodes.len()
        };

        tracing::info!("Pruned {pruned} addresses, {total} left");
        tracing::info!("Known nodes: good:{good} [4:{ipv4}, 6:{ipv6}] stale:{stale} bad:{bad}");
    }

    /// Write the current table to disk.
    ///
    /// The table is serialized under the shared lock; the write and rename
    /// happen outside it. Failures keep the previous snapshot and are
    /// retried on the next tick.
    pub async fn save(&self) {
        let contents = {
            let nodes = self.nodes.read();
            match serde_json::to_string(&*nodes) {
                Ok(contents) => contents,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to encode snapshot");
                    return;
                }
            }
        };

        if let Err(e) = snapshot::save_nodes(&self.nodes_file, &contents).await {
            tracing::error!(path = ?self.nodes_file, error = %e, "Failed to write snapshot");
        }
    }

    /// Spawn the maintenance loop: periodic prune, periodic snapshot, and a
    /// final snapshot on shutdown.
    pub fn spawn_maintenance(self: &Arc<Self>, shutdown: ShutdownToken) -> JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move {
            let mut prune_ticker = tokio::time::interval(PRUNE_INTERVAL);
            let mut snapshot_ticker = tokio::time::interval(SNAPSHOT_INTERVAL);
            // Intervals fire immediately on the first tick; consume those.
            prune_ticker.tick().await;
            snapshot_ticker.tick().await;

            loop {
                tokio::select! {
                    _ = prune_ticker.tick() => manager.prune(),
                    _ = snapshot_ticker.tick() => manager.save().await,
                    _ = shutdown.wait() => break,
                }
            }

            tracing::info!("Address manager: saving nodes");
            manager.save().await;
            tracing::info!("Address manager shutdown");
        })
    }
}

/// Whether an address may enter the table. Loopback, private, link-local,
/// unspecified and similar non-global ranges never make useful seeds.
pub fn is_routable(addr: &NetAddress) -> bool {
    if addr.port == 0 {
        return false;
    }
    match addr.ip {
        IpAddr::V4(ip) => {
            !(ip.is_loopback()
                || ip.is_private()
                || ip.is_link_local()
                || ip.is_broadcast()
                || ip.is_unspecified()
                || is_documentation_v4(ip))
        }
        IpAddr::V6(ip) => {
            !(ip.is_loopback()
                || ip.is_unspecified()
                || is_unicast_link_local_v6(ip)
                || is_unique_local_v6(ip))
        }
    }
}

/// Check if IPv4 address is in a documentation range.
fn is_documentation_v4(ip: Ipv4Addr) -> bool {
    let octets = ip.octets();
    // 192.0.2.0/24
    (octets[0] == 192 && octets[1] == 0 && octets[2] == 2)
    // 198.51.100.0/24
    || (octets[0] == 198 && octets[1] == 51 && octets[2] == 100)
    // 203.0.113.0/24
    || (octets[0] == 203 && octets[1] == 0 && octets[2] == 113)
}

/// Check if IPv6 address is link-local unicast (fe80::/10).
fn is_unicast_link_local_v6(ip: Ipv6Addr) -> bool {
    (ip.segments()[0] & 0xffc0) == 0xfe80
}

/// Check if IPv6 address is unique local (fc00::/7).
fn is_unique_local_v6(ip: Ipv6Addr) -> bool {
    (ip.segments()[0] & 0xfe00) == 0xfc00
}
