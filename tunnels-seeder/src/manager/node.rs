//! Node records and freshness classification.
//!
//! Every freshness decision in the seeder funnels through the three
//! predicates here, so the timeouts below are the single source of truth.

use serde::{Deserialize, Serialize};
use tunnels_wire::{NetAddress, SubnetworkId};

/// A previously reachable node is due for a re-probe after this long.
pub const STALE_GOOD_TIMEOUT_SECS: u64 = 60 * 60;

/// A previously unreachable node is due for a re-probe after this long.
pub const STALE_BAD_TIMEOUT_SECS: u64 = 2 * 60 * 60;

/// A node neither seen nor successfully probed for this long is dropped.
pub const EXPIRE_TIMEOUT_SECS: u64 = 8 * 60 * 60;

/// State tracked for a single known node.
///
/// Timestamps are unix seconds; zero means never.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// The node's advertised address.
    pub addr: NetAddress,
    /// Subnetwork reported in the last successful handshake.
    pub subnetwork_id: Option<SubnetworkId>,
    /// When an address referencing this node was last received, from any
    /// source including gossip.
    pub last_seen: u64,
    /// When the node was last probed, successfully or not.
    pub last_attempt: u64,
    /// When a handshake with the node last succeeded.
    pub last_success: u64,
}

impl Node {
    /// A freshly gossiped node: seen now, never probed.
    pub fn new(addr: NetAddress, now: u64) -> Self {
        Self {
            addr,
            subnetwork_id: None,
            last_seen: now,
            last_attempt: 0,
            last_success: 0,
        }
    }
}

/// A node worth serving: recently handshaken and on the canonical port.
pub fn is_good(node: &Node, now: u64, default_port: u16) -> bool {
    node.addr.port == default_port
        && node.last_success != 0
        && now.saturating_sub(node.last_success) < STALE_GOOD_TIMEOUT_SECS
}

/// A node eligible for (re-)probing.
///
/// A node that has never been probed at all counts as stale immediately, so
/// fresh inserts are picked up on the next crawl cycle.
pub fn is_stale(node: &Node, now: u64) -> bool {
    if node.last_attempt == 0 {
        return true;
    }
    let since_attempt = now.saturating_sub(node.last_attempt);
    (node.last_success != 0 && since_attempt > STALE_GOOD_TIMEOUT_SECS)
        || since_attempt > STALE_BAD_TIMEOUT_SECS
}

/// A node eligible for deletion: neither seen nor successfully probed
/// within the expiry window.
pub fn is_expired(node: &Node, now: u64) -> bool {
    now.saturating_sub(node.last_seen) > EXPIRE_TIMEOUT_SECS
        && (node.last_success == 0
            || now.saturating_sub(node.last_success) > EXPIRE_TIMEOUT_SECS)
}
