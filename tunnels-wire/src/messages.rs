//! P2P protocol messages used by the seeder.
//!
//! This is the seeder's view of the protocol: the version handshake, the
//! address exchange, and keepalive pings. Everything else a full node says
//! is dropped on the floor.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, SocketAddr};

/// A network address advertised over the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NetAddress {
    /// IP address in its original family.
    pub ip: IpAddr,
    /// Advertised P2P port.
    pub port: u16,
    /// Service flags advertised for this address.
    pub services: u64,
}

impl NetAddress {
    /// Create an address with no service flags.
    pub fn new(ip: IpAddr, port: u16) -> Self {
        Self {
            ip,
            port,
            services: 0,
        }
    }

    /// Stable identity of this address. Two entries with different ports
    /// are distinct.
    pub fn key(&self) -> String {
        format!("{}_{}", self.ip, self.port)
    }

    /// The address as a connectable socket address.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }

    /// Whether the underlying IP is v4.
    pub fn is_ipv4(&self) -> bool {
        self.ip.is_ipv4()
    }
}

impl From<SocketAddr> for NetAddress {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip(), addr.port())
    }
}

impl fmt::Display for NetAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.socket_addr())
    }
}

/// Identifier of the subnetwork a peer serves.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubnetworkId(pub [u8; 20]);

impl SubnetworkId {
    /// Byte length of a subnetwork id.
    pub const LEN: usize = 20;

    /// Parse from a lowercase hex string of exactly 40 characters.
    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        <[u8; Self::LEN]>::try_from(bytes.as_slice()).ok().map(Self)
    }

    /// Hex representation of the id.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for SubnetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubnetworkId({})", self.to_hex())
    }
}

impl fmt::Display for SubnetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Version information exchanged during handshake.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VersionMessage {
    /// Protocol version number.
    pub protocol_version: u32,
    /// Name of the network the sender is on.
    pub network: String,
    /// Service flags of the sender.
    pub services: u64,
    /// Timestamp when the message was created (unix seconds).
    pub timestamp: u64,
    /// Random identifier of the sending node.
    pub id: [u8; 16],
    /// User agent string.
    pub user_agent: String,
    /// Subnetwork the sender serves, if any.
    pub subnetwork_id: Option<SubnetworkId>,
}

/// Incoming routing channels. Each filters a fixed set of message kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// Version and VerAck.
    Handshake,
    /// RequestAddresses and Addresses.
    Addresses,
    /// Ping.
    Ping,
}

/// All protocol messages the seeder speaks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum Message {
    /// Version information sent at start of connection.
    Version(VersionMessage),
    /// Acknowledgment of a version message.
    VerAck,
    /// Request for known peer addresses.
    RequestAddresses {
        /// Whether addresses of every subnetwork are wanted.
        include_all_subnetworks: bool,
        /// Restrict to this subnetwork when not asking for all.
        subnetwork_id: Option<SubnetworkId>,
    },
    /// Response with known peer addresses.
    Addresses(Vec<NetAddress>),
    /// Ping with a nonce.
    Ping(u64),
    /// Pong echoing the nonce.
    Pong(u64),
}

impl Message {
    /// Get a human-readable name for the message type.
    pub fn name(&self) -> &'static str {
        match self {
            Message::Version(_) => "version",
            Message::VerAck => "verack",
            Message::RequestAddresses { .. } => "requestaddresses",
            Message::Addresses(_) => "addresses",
            Message::Ping(_) => "ping",
            Message::Pong(_) => "pong",
        }
    }

    /// The incoming route this message belongs to, if the seeder has a use
    /// for it at all.
    pub fn channel(&self) -> Option<Channel> {
        match self {
            Message::Version(_) | Message::VerAck => Some(Channel::Handshake),
            Message::RequestAddresses { .. } | Message::Addresses(_) => Some(Channel::Addresses),
            Message::Ping(_) => Some(Channel::Ping),
            Message::Pong(_) => None,
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Version(v) => write!(
                f,
                "Version(version={}, agent={})",
                v.protocol_version, v.user_agent
            ),
            Message::VerAck => write!(f, "VerAck"),
            Message::RequestAddresses {
                include_all_subnetworks,
                ..
            } => write!(f, "RequestAddresses(all={})", include_all_subnetworks),
            Message::Addresses(addrs) => write!(f, "Addresses(count={})", addrs.len()),
            Message::Ping(n) => write!(f, "Ping({})", n),
            Message::Pong(n) => write!(f, "Pong({})", n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_key() {
        let v4 = NetAddress::new("8.8.8.8".parse().unwrap(), 9333);
        assert_eq!(v4.key(), "8.8.8.8_9333");

        let v6 = NetAddress::new("2001:db8::1".parse().unwrap(), 9333);
        assert_eq!(v6.key(), "2001:db8::1_9333");

        // Different ports are distinct nodes.
        let other_port = NetAddress::new("8.8.8.8".parse().unwrap(), 9334);
        assert_ne!(v4.key(), other_port.key());
    }

    #[test]
    fn test_subnetwork_hex_roundtrip() {
        let id = SubnetworkId([0xab; 20]);
        let parsed = SubnetworkId::from_hex(&id.to_hex()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_subnetwork_rejects_bad_hex() {
        assert!(SubnetworkId::from_hex("xyz").is_none());
        assert!(SubnetworkId::from_hex("abcd").is_none()); // too short
    }

    #[test]
    fn test_message_names() {
        assert_eq!(Message::VerAck.name(), "verack");
        assert_eq!(Message::Ping(42).name(), "ping");
        assert_eq!(Message::Addresses(Vec::new()).name(), "addresses");
    }

    #[test]
    fn test_message_channels() {
        assert_eq!(Message::VerAck.channel(), Some(Channel::Handshake));
        assert_eq!(
            Message::Addresses(Vec::new()).channel(),
            Some(Channel::Addresses)
        );
        assert_eq!(Message::Ping(1).channel(), Some(Channel::Ping));
        assert_eq!(Message::Pong(1).channel(), None);
    }
}
