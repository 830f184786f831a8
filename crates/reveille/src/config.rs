// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use serde::Deserialize;

use crate::{Backoff, ClientOptions, MonitorOptions};

/// Deserializable settings of the client and the monitor.
///
/// Every field is optional; a missing field keeps the default of [`ClientOptions`] or
/// [`MonitorOptions`]. Durations are given in milliseconds. Unknown fields are rejected so
/// a misspelled setting does not go unnoticed.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use reveille::ReveilleConfig;
///
/// let config: ReveilleConfig = serde_json::from_str(r#"{
///     "cache_ttl_ms": 600000,
///     "cold_start_max_attempts": 18
/// }"#).unwrap();
///
/// assert_eq!(config.client_options().get_cache_ttl(), Duration::from_secs(600));
/// assert_eq!(config.monitor_options().get_cold_start_max_attempts(), 18);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
#[non_exhaustive]
pub struct ReveilleConfig {
    /// How long a cached response stays valid.
    pub cache_ttl_ms: Option<u64>,
    /// Bound on a single network attempt.
    pub per_attempt_timeout_ms: Option<u64>,
    /// Total number of attempts for retryable failures, including the first one.
    pub max_retries: Option<u32>,
    /// Base delay of the retry backoff.
    pub retry_base_delay_ms: Option<u64>,
    /// Shape of the retry backoff: `constant`, `linear` or `exponential`.
    pub backoff: Option<Backoff>,
    /// Cap on the delay between two attempts.
    pub max_retry_delay_ms: Option<u64>,
    /// Number of checks in one cold-start sequence.
    pub cold_start_max_attempts: Option<u32>,
    /// Delay between two cold-start checks.
    pub cold_start_interval_ms: Option<u64>,
    /// Background re-check interval while the backend is available.
    pub healthy_poll_interval_ms: Option<u64>,
    /// Bound on a single reachability check.
    pub probe_timeout_ms: Option<u64>,
}

impl ReveilleConfig {
    /// Returns the client options, with defaults for missing fields.
    #[must_use]
    pub fn client_options(&self) -> ClientOptions {
        let mut options = ClientOptions::default();

        if let Some(ttl) = millis(self.cache_ttl_ms) {
            options = options.cache_ttl(ttl);
        }
        if let Some(timeout) = millis(self.per_attempt_timeout_ms) {
            options = options.attempt_timeout(timeout);
        }
        if let Some(attempts) = self.max_retries {
            options = options.max_attempts(attempts);
        }
        if let Some(delay) = millis(self.retry_base_delay_ms) {
            options = options.retry_base_delay(delay);
        }
        if let Some(backoff) = self.backoff {
            options = options.backoff(backoff);
        }
        if let Some(delay) = millis(self.max_retry_delay_ms) {
            options = options.max_retry_delay(delay);
        }

        options
    }

    /// Returns the monitor options, with defaults for missing fields.
    #[must_use]
    pub fn monitor_options(&self) -> MonitorOptions {
        let mut options = MonitorOptions::default();

        if let Some(attempts) = self.cold_start_max_attempts {
            options = options.cold_start_max_attempts(attempts);
        }
        if let Some(interval) = millis(self.cold_start_interval_ms) {
            options = options.cold_start_interval(interval);
        }
        if let Some(interval) = millis(self.healthy_poll_interval_ms) {
            options = options.healthy_poll_interval(interval);
        }
        if let Some(timeout) = millis(self.probe_timeout_ms) {
            options = options.probe_timeout(timeout);
        }

        options
    }
}

fn millis(value: Option<u64>) -> Option<Duration> {
    value.map(Duration::from_millis)
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn empty_config_keeps_defaults() {
        let config: ReveilleConfig = serde_json::from_value(json!({})).unwrap();

        assert_eq!(config, ReveilleConfig::default());
        assert_eq!(config.client_options(), ClientOptions::default());
        assert_eq!(config.monitor_options(), MonitorOptions::default());
    }

    #[test]
    fn every_field() {
        let config: ReveilleConfig = serde_json::from_value(json!({
            "cache_ttl_ms": 600_000,
            "per_attempt_timeout_ms": 30_000,
            "max_retries": 5,
            "retry_base_delay_ms": 500,
            "backoff": "exponential",
            "max_retry_delay_ms": 4_000,
            "cold_start_max_attempts": 18,
            "cold_start_interval_ms": 10_000,
            "healthy_poll_interval_ms": 60_000,
            "probe_timeout_ms": 2_000,
        }))
        .unwrap();

        let client = config.client_options();
        assert_eq!(client.get_cache_ttl(), Duration::from_secs(600));
        assert_eq!(client.get_attempt_timeout(), Duration::from_secs(30));
        assert_eq!(client.get_max_attempts(), 5);
        assert_eq!(client.get_retry_base_delay(), Duration::from_millis(500));
        assert_eq!(client.get_backoff(), Backoff::Exponential);
        assert_eq!(client.get_max_retry_delay(), Some(Duration::from_secs(4)));

        let monitor = config.monitor_options();
        assert_eq!(monitor.get_cold_start_max_attempts(), 18);
        assert_eq!(monitor.get_cold_start_interval(), Duration::from_secs(10));
        assert_eq!(monitor.get_healthy_poll_interval(), Duration::from_secs(60));
        assert_eq!(monitor.get_probe_timeout(), Duration::from_secs(2));
    }

    #[test]
    fn unknown_field_is_rejected() {
        let result = serde_json::from_value::<ReveilleConfig>(json!({ "cache_ttl": 1 }));
        assert!(result.is_err());
    }
}
