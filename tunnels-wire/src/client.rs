//! Minimal outbound client for probing peers.
//!
//! The seeder connects, completes the version handshake, asks for addresses
//! once, answers pings, and disconnects. Incoming traffic is routed into
//! per-channel queues so each handshake step can wait for exactly the
//! message kinds it expects.

use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::codec::Framed;

use crate::codec::MessageCodec;
use crate::error::{WireError, WireResult};
use crate::messages::{Channel, Message, NetAddress, VersionMessage};
use crate::{NETWORK_NAME, PROTOCOL_VERSION};

/// Client-side wire settings.
#[derive(Debug, Clone)]
pub struct WireConfig {
    /// Timeout for establishing the TCP connection.
    pub connect_timeout: Duration,
    /// Timeout for each individual handshake step.
    pub step_timeout: Duration,
    /// User agent advertised in our version message.
    pub user_agent: String,
    /// Network name advertised in our version message.
    pub network: String,
}

impl Default for WireConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            step_timeout: Duration::from_secs(5),
            user_agent: format!("/tunnels-seeder:{}/", env!("CARGO_PKG_VERSION")),
            network: NETWORK_NAME.to_string(),
        }
    }
}

/// An established, handshaken connection to a peer.
///
/// Dropping the connection tears it down.
pub struct SeedConnection {
    addr: SocketAddr,
    outgoing: mpsc::UnboundedSender<Message>,
    handshake_rx: mpsc::UnboundedReceiver<Message>,
    addresses_rx: mpsc::UnboundedReceiver<Message>,
    step_timeout: Duration,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
    ping: JoinHandle<()>,
}

impl SeedConnection {
    /// Connect to a peer and complete the version handshake.
    ///
    /// Returns the connection together with the peer's version message.
    /// Pings arriving at any point during the life of the connection are
    /// answered with matching pongs; the client never originates pings.
    pub async fn connect(
        addr: SocketAddr,
        config: &WireConfig,
    ) -> WireResult<(Self, VersionMessage)> {
        let stream = match timeout(config.connect_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(WireError::Io(e)),
            Err(_) => return Err(WireError::ConnectionTimeout { addr }),
        };

        if let Err(e) = stream.set_nodelay(true) {
            tracing::warn!(addr = %addr, error = %e, "Failed to set TCP_NODELAY");
        }

        let framed = Framed::new(stream, MessageCodec::new());
        let (mut sink, mut messages) = framed.split();

        let (outgoing_tx, mut outgoing_rx) = mpsc::unbounded_channel::<Message>();
        let (handshake_tx, handshake_rx) = mpsc::unbounded_channel();
        let (addresses_tx, addresses_rx) = mpsc::unbounded_channel();
        let (ping_tx, mut ping_rx) = mpsc::unbounded_channel();

        let writer = tokio::spawn(async move {
            while let Some(message) = outgoing_rx.recv().await {
                if sink.send(message).await.is_err() {
                    break;
                }
            }
        });

        let reader = tokio::spawn(async move {
            while let Some(result) = messages.next().await {
                let message = match result {
                    Ok(message) => message,
                    Err(e) => {
                        tracing::debug!(error = %e, "Connection read failed");
                        break;
                    }
                };
                let delivered = match message.channel() {
                    Some(Channel::Handshake) => handshake_tx.send(message).is_ok(),
                    Some(Channel::Addresses) => addresses_tx.send(message).is_ok(),
                    Some(Channel::Ping) => ping_tx.send(message).is_ok(),
                    // Kinds the seeder has no use for.
                    None => true,
                };
                if !delivered {
                    break;
                }
            }
        });

        // Answer pings so the peer does not drop us as idle.
        let pong_tx = outgoing_tx.clone();
        let ping = tokio::spawn(async move {
            while let Some(message) = ping_rx.recv().await {
                if let Message::Ping(nonce) = message {
                    if pong_tx.send(Message::Pong(nonce)).is_err() {
                        break;
                    }
                }
            }
        });

        let mut conn = Self {
            addr,
            outgoing: outgoing_tx,
            handshake_rx,
            addresses_rx,
            step_timeout: config.step_timeout,
            reader,
            writer,
            ping,
        };

        match conn.handshake(config).await {
            Ok(version) => Ok((conn, version)),
            Err(e) => {
                conn.close();
                Err(e)
            }
        }
    }

    /// Run the handshake from the connecting side.
    ///
    /// The peer speaks first: its Version, then VerAck after ours, then its
    /// own address request, which is answered with an empty list.
    async fn handshake(&mut self, config: &WireConfig) -> WireResult<VersionMessage> {
        let version = match self.recv_handshake().await? {
            Message::Version(version) => version,
            other => return Err(unexpected("version", &other)),
        };

        self.send(Message::Version(VersionMessage {
            protocol_version: PROTOCOL_VERSION,
            network: config.network.clone(),
            services: version.services,
            timestamp: unix_now(),
            id: rand::random(),
            user_agent: config.user_agent.clone(),
            subnetwork_id: None,
        }))?;

        match self.recv_handshake().await? {
            Message::VerAck => {}
            other => return Err(unexpected("verack", &other)),
        }
        self.send(Message::VerAck)?;

        match self.recv_addresses().await? {
            Message::RequestAddresses { .. } => {}
            other => return Err(unexpected("requestaddresses", &other)),
        }
        self.send(Message::Addresses(Vec::new()))?;

        Ok(version)
    }

    /// Ask the peer for its known addresses.
    pub async fn request_addresses(&mut self) -> WireResult<Vec<NetAddress>> {
        self.send(Message::RequestAddresses {
            include_all_subnetworks: true,
            subnetwork_id: None,
        })?;
        match self.recv_addresses().await? {
            Message::Addresses(addrs) => Ok(addrs),
            other => Err(unexpected("addresses", &other)),
        }
    }

    /// Address of the connected peer.
    pub fn peer_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Tear the connection down.
    pub fn close(&self) {
        self.reader.abort();
        self.writer.abort();
        self.ping.abort();
    }

    async fn recv_handshake(&mut self) -> WireResult<Message> {
        recv_step(&mut self.handshake_rx, self.step_timeout, "handshake message").await
    }

    async fn recv_addresses(&mut self) -> WireResult<Message> {
        recv_step(&mut self.addresses_rx, self.step_timeout, "addresses message").await
    }

    fn send(&self, message: Message) -> WireResult<()> {
        self.outgoing
            .send(message)
            .map_err(|_| WireError::ConnectionClosed)
    }
}

impl Drop for SeedConnection {
    fn drop(&mut self) {
        self.close();
    }
}

async fn recv_step(
    rx: &mut mpsc::UnboundedReceiver<Message>,
    step_timeout: Duration,
    expected: &'static str,
) -> WireResult<Message> {
    match timeout(step_timeout, rx.recv()).await {
        Ok(Some(message)) => Ok(message),
        Ok(None) => Err(WireError::ConnectionClosed),
        Err(_) => Err(WireError::StepTimeout { expected }),
    }
}

fn unexpected(expected: &'static str, got: &Message) -> WireError {
    WireError::UnexpectedMessage {
        expected,
        actual: got.name(),
    }
}

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
