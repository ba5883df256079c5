//! Outbound HTTP call policy.

use serde::Deserialize;
use std::time::Duration;

/// Timeout and retry policy for calls to external services.
///
/// Retries apply only to idempotent lookups (profile fetch, authorization
/// lookup), never to the one-shot authorization code exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct HttpPolicy {
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Additional attempts after a transient failure.
    #[serde(default)]
    pub retries: u32,
}

fn default_timeout_seconds() -> u64 {
    30
}

impl HttpPolicy {
    /// Returns the per-request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Returns the total number of attempts allowed.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }
}

impl Default for HttpPolicy {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout_seconds(),
            retries: 0,
        }
    }
}
