//! Wire protocol error types.

use std::io;
use std::net::SocketAddr;
use thiserror::Error;

/// Errors produced by the wire layer.
#[derive(Debug, Error)]
pub enum WireError {
    /// I/O error during network operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Failed to serialize or deserialize a message.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Message exceeds maximum allowed size.
    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// Invalid network magic bytes.
    #[error("Invalid network magic: expected {expected:?}, got {actual:?}")]
    InvalidMagic { expected: [u8; 4], actual: [u8; 4] },

    /// TCP connection could not be established in time.
    #[error("Connection timeout to {addr}")]
    ConnectionTimeout { addr: SocketAddr },

    /// A handshake step did not complete in time.
    #[error("Timed out waiting for {expected}")]
    StepTimeout { expected: &'static str },

    /// Peer sent a message of the wrong kind for the current step.
    #[error("Unexpected message: expected {expected}, got {actual}")]
    UnexpectedMessage {
        expected: &'static str,
        actual: &'static str,
    },

    /// Connection was closed by the peer or torn down locally.
    #[error("Connection closed")]
    ConnectionClosed,
}

/// Result type for wire operations.
pub type WireResult<T> = Result<T, WireError>;
