//! PROXY Protocol Configuration
//!
//! Configuration types for accepting PROXY protocol v1/v2 headers.

use serde::Deserialize;
use std::time::Duration;

/// What to do with a PROXY header on an accepted connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Policy {
    /// Parse a header if one is present, otherwise treat every byte as payload
    #[default]
    Use,
    /// Fail the connection if no header is present
    Require,
    /// Fail the connection if a header is present
    Reject,
    /// Never look for a header
    Skip,
}

/// PROXY protocol configuration for a listener
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProxyProtocolConfig {
    /// Header acceptance policy
    pub policy: Policy,

    /// Timeout for reading PROXY header in seconds.
    /// Default: 5 seconds
    pub timeout: u64,
}

impl Default for ProxyProtocolConfig {
    fn default() -> Self {
        Self {
            policy: Policy::Use,
            timeout: 5,
        }
    }
}

impl ProxyProtocolConfig {
    /// Get timeout as Duration
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}
