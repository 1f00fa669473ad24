//! Seeder error types.

use thiserror::Error;

/// Errors surfaced by the seeder's own components.
///
/// Table operations never fail; these cover the snapshot store and the DNS
/// front end.
#[derive(Debug, Error)]
pub enum SeederError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot could not be encoded or decoded.
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    /// DNS front end failure.
    #[error("DNS error: {0}")]
    Dns(String),
}

/// Result type for seeder operations.
pub type SeederResult<T> = Result<T, SeederError>;
