//! Minimum-version gate for probed peers.
//!
//! Peers advertise user agents like `/tunnelsd:1.2.3/extra:0.1.0/`. Only the
//! first `/`-delimited segment is considered; the first dotted version
//! triple found in it is compared against the configured minimum.

use regex::Regex;
use semver::Version;
use std::sync::OnceLock;
use thiserror::Error;

/// Why a peer's user agent was rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VersionGateError {
    /// The configured minimum is not a valid version.
    #[error("Invalid minimum version {0:?}")]
    InvalidMinimum(String),

    /// The user agent has no `/`-delimited segments.
    #[error("Invalid user agent format")]
    Malformed,

    /// The first segment carries no dotted version triple.
    #[error("No version found in user agent")]
    NoVersion,

    /// The peer's version is older than the minimum.
    #[error("User agent version {peer} is below minimum {min}")]
    BelowMinimum { peer: Version, min: Version },
}

fn version_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(\d+\.\d+\.\d+)\b").expect("static regex"))
}

/// Check a peer's advertised user agent against a minimum version.
///
/// An empty minimum accepts everything.
pub fn check_version(min_version: &str, user_agent: &str) -> Result<(), VersionGateError> {
    if min_version.is_empty() {
        return Ok(());
    }
    let min = Version::parse(min_version)
        .map_err(|_| VersionGateError::InvalidMinimum(min_version.to_string()))?;

    let trimmed = user_agent.strip_prefix('/').unwrap_or(user_agent);
    let first_segment = match trimmed.find('/') {
        Some(end) => &trimmed[..end],
        None => return Err(VersionGateError::Malformed),
    };

    let captures = version_regex()
        .captures(first_segment)
        .ok_or(VersionGateError::NoVersion)?;
    let peer = Version::parse(&captures[1]).map_err(|_| VersionGateError::NoVersion)?;

    if peer < min {
        return Err(VersionGateError::BelowMinimum { peer, min });
    }
    Ok(())
}
