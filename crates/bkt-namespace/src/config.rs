use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tuning for snapshot refresh and checksum enrichment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamespaceConfig {
    /// Snapshot age after which the next access rebuilds it.
    pub ttl_ms: u64,
    /// Minimum gap between a failed rebuild and the next attempt.
    pub retry_backoff_ms: u64,
    /// Outstanding metadata calls allowed per listing.
    pub enrich_concurrency: usize,
    /// Deadline for a single metadata call.
    pub head_timeout_ms: u64,
    /// Maximum number of cached checksums.
    pub checksum_cache_capacity: u64,
    /// Drop cached checksums not read for this long.
    pub checksum_cache_idle_secs: Option<u64>,
}

impl Default for NamespaceConfig {
    fn default() -> Self {
        Self {
            ttl_ms: 15_000,
            retry_backoff_ms: 2_000,
            enrich_concurrency: 8,
            head_timeout_ms: 10_000,
            checksum_cache_capacity: 1_000_000,
            checksum_cache_idle_secs: None,
        }
    }
}

impl NamespaceConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn head_timeout(&self) -> Duration {
        Duration::from_millis(self.head_timeout_ms)
    }

    pub fn checksum_cache_idle(&self) -> Option<Duration> {
        self.checksum_cache_idle_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = NamespaceConfig::default();
        assert_eq!(c.ttl(), Duration::from_secs(15));
        assert_eq!(c.enrich_concurrency, 8);
        assert_eq!(c.head_timeout(), Duration::from_secs(10));
        assert!(c.checksum_cache_idle().is_none());
    }

    #[test]
    fn partial_override_keeps_defaults() {
        let c: NamespaceConfig = serde_json::from_str(r#"{"ttl_ms": 500}"#).unwrap();
        assert_eq!(c.ttl(), Duration::from_millis(500));
        assert_eq!(c.retry_backoff(), Duration::from_secs(2));
    }
}
