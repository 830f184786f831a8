// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

/// Default time a cached response stays valid: 5 minutes.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// Default bound on a single network attempt: 15 seconds.
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(15);

/// Default number of attempts for retryable failures, including the first one.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default base delay between attempts: 1 second.
pub const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

/// Default number of reachability checks in one cold-start sequence.
pub const DEFAULT_COLD_START_MAX_ATTEMPTS: u32 = 3;

/// Default delay between cold-start checks: 5 seconds.
pub const DEFAULT_COLD_START_INTERVAL: Duration = Duration::from_secs(5);

/// Default background re-check interval while the backend is available: 30 seconds.
pub const DEFAULT_HEALTHY_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Default bound on a single reachability check: 10 seconds.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// The shape of the delay between retry attempts.
///
/// For retry number `n` (starting at 1) and base delay `b`:
///
/// | Backoff | Delay |
/// |---------|-------|
/// | [`Constant`][Backoff::Constant] | `b` |
/// | [`Linear`][Backoff::Linear] | `b × n` |
/// | [`Exponential`][Backoff::Exponential] | `b × 2ⁿ⁻¹` |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "config", derive(serde::Deserialize))]
#[cfg_attr(feature = "config", serde(rename_all = "snake_case"))]
#[non_exhaustive]
pub enum Backoff {
    /// The same delay before every retry.
    Constant,

    /// A delay that grows by the base delay with every retry.
    #[default]
    Linear,

    /// A delay that doubles with every retry.
    Exponential,
}

/// Settings of the request [`Client`][crate::Client].
///
/// # Defaults
///
/// | Setting | Default |
/// |---------|---------|
/// | [`cache_ttl`][ClientOptions::cache_ttl] | 5 minutes |
/// | [`attempt_timeout`][ClientOptions::attempt_timeout] | 15 seconds |
/// | [`max_attempts`][ClientOptions::max_attempts] | 3 |
/// | [`retry_base_delay`][ClientOptions::retry_base_delay] | 1 second |
/// | [`backoff`][ClientOptions::backoff] | [`Backoff::Linear`] |
/// | [`max_retry_delay`][ClientOptions::max_retry_delay] | none |
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use reveille::ClientOptions;
///
/// let options = ClientOptions::default()
///     .cache_ttl(Duration::from_secs(600))
///     .attempt_timeout(Duration::from_secs(30));
///
/// assert_eq!(options.get_max_attempts(), 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    cache_ttl: Duration,
    attempt_timeout: Duration,
    max_attempts: u32,
    retry_base_delay: Duration,
    backoff: Backoff,
    max_retry_delay: Option<Duration>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_CACHE_TTL,
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_base_delay: DEFAULT_RETRY_BASE_DELAY,
            backoff: Backoff::default(),
            max_retry_delay: None,
        }
    }
}

// Setters use plain names and getters use the `get_` prefix, matching how often each is used.
impl ClientOptions {
    /// Sets how long a cached response stays valid. Zero disables caching but keeps
    /// deduplication of concurrent calls.
    #[must_use]
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Sets the bound on a single network attempt.
    #[must_use]
    pub fn attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Sets the total number of attempts for retryable failures. Values below 1 are raised to 1.
    #[must_use]
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Sets the base delay of the retry backoff.
    #[must_use]
    pub fn retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    /// Sets the shape of the retry backoff.
    #[must_use]
    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Caps the delay between two attempts.
    #[must_use]
    pub fn max_retry_delay(mut self, delay: Duration) -> Self {
        self.max_retry_delay = Some(delay);
        self
    }

    /// Returns how long a cached response stays valid.
    #[must_use]
    pub fn get_cache_ttl(&self) -> Duration {
        self.cache_ttl
    }

    /// Returns the bound on a single network attempt.
    #[must_use]
    pub fn get_attempt_timeout(&self) -> Duration {
        self.attempt_timeout
    }

    /// Returns the total number of attempts for retryable failures.
    #[must_use]
    pub fn get_max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the base delay of the retry backoff.
    #[must_use]
    pub fn get_retry_base_delay(&self) -> Duration {
        self.retry_base_delay
    }

    /// Returns the shape of the retry backoff.
    #[must_use]
    pub fn get_backoff(&self) -> Backoff {
        self.backoff
    }

    /// Returns the cap on the delay between two attempts.
    #[must_use]
    pub fn get_max_retry_delay(&self) -> Option<Duration> {
        self.max_retry_delay
    }
}

/// Settings of the [`AvailabilityMonitor`][crate::monitor::AvailabilityMonitor].
///
/// Two cold-start budgets have been observed for the same kind of backend: a few quick
/// checks, and a long wait of about a minute and a half for hosts that suspend idle
/// instances. Both are available as presets; pick per deployment.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use reveille::MonitorOptions;
///
/// let quick = MonitorOptions::quick_wake();
/// assert_eq!(quick.get_cold_start_max_attempts(), 3);
///
/// let long = MonitorOptions::long_wake();
/// assert_eq!(long.get_cold_start_max_attempts(), 18);
/// assert_eq!(long.get_cold_start_interval(), Duration::from_secs(5));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorOptions {
    cold_start_max_attempts: u32,
    cold_start_interval: Duration,
    healthy_poll_interval: Duration,
    probe_timeout: Duration,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self::quick_wake()
    }
}

impl MonitorOptions {
    /// Three checks five seconds apart.
    #[must_use]
    pub fn quick_wake() -> Self {
        Self {
            cold_start_max_attempts: DEFAULT_COLD_START_MAX_ATTEMPTS,
            cold_start_interval: DEFAULT_COLD_START_INTERVAL,
            healthy_poll_interval: DEFAULT_HEALTHY_POLL_INTERVAL,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    /// Eighteen checks five seconds apart, about ninety seconds in total.
    #[must_use]
    pub fn long_wake() -> Self {
        Self::quick_wake().cold_start_max_attempts(18)
    }

    /// Sets the number of checks in one cold-start sequence, including the first one.
    /// Values below 1 are raised to 1.
    #[must_use]
    pub fn cold_start_max_attempts(mut self, attempts: u32) -> Self {
        self.cold_start_max_attempts = attempts.max(1);
        self
    }

    /// Sets the delay between two cold-start checks.
    #[must_use]
    pub fn cold_start_interval(mut self, interval: Duration) -> Self {
        self.cold_start_interval = interval;
        self
    }

    /// Sets the background re-check interval used while the backend is available.
    #[must_use]
    pub fn healthy_poll_interval(mut self, interval: Duration) -> Self {
        self.healthy_poll_interval = interval;
        self
    }

    /// Sets the bound on a single reachability check.
    #[must_use]
    pub fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Returns the number of checks in one cold-start sequence.
    #[must_use]
    pub fn get_cold_start_max_attempts(&self) -> u32 {
        self.cold_start_max_attempts
    }

    /// Returns the delay between two cold-start checks.
    #[must_use]
    pub fn get_cold_start_interval(&self) -> Duration {
        self.cold_start_interval
    }

    /// Returns the background re-check interval used while the backend is available.
    #[must_use]
    pub fn get_healthy_poll_interval(&self) -> Duration {
        self.healthy_poll_interval
    }

    /// Returns the bound on a single reachability check.
    #[must_use]
    pub fn get_probe_timeout(&self) -> Duration {
        self.probe_timeout
    }
}
