//! Wire protocol for the Tunnels P2P network, as used by the seeder.
//!
//! This crate provides:
//! - Protocol messages for the version handshake and address exchange
//! - Length-prefixed message framing
//! - A minimal outbound client: connect, handshake, ask for addresses once,
//!   answer pings, disconnect
//!
//! It deliberately implements only the slice of the protocol a crawler
//! needs; it never relays blocks or transactions.

pub mod client;
pub mod codec;
pub mod error;
pub mod messages;
pub mod serialization;

pub use client::{SeedConnection, WireConfig};
pub use codec::MessageCodec;
pub use error::{WireError, WireResult};
pub use messages::{Channel, Message, NetAddress, SubnetworkId, VersionMessage};

/// Network magic bytes identifying the Tunnels protocol.
pub const NETWORK_MAGIC: [u8; 4] = [0x54, 0x55, 0x4E, 0x4C]; // "TUNL"

/// Maximum message size in bytes (1 MB).
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Current protocol version.
pub const PROTOCOL_VERSION: u32 = 1;

/// Canonical P2P listening port for the Tunnels network.
pub const DEFAULT_P2P_PORT: u16 = 9333;

/// Network name advertised in version messages.
pub const NETWORK_NAME: &str = "tunnels-mainnet";
