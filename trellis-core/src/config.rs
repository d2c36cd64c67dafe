//! Engine Configuration
//!
//! `EngineConfig` holds the tunables of a session: the rerun debounce
//! window, the per-node deadline, the default retry policy, the evaluator's
//! recursion limit, and whether the source transformer is used at all.
//!
//! Durations are (de)serialized as integer milliseconds so a host can pass
//! a plain JSON object:
//!
//! ```json
//! { "debounce": 50, "node_timeout": 2000, "retry": { "max_attempts": 3, "delay": 10, "backoff": 2.0 } }
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default minimum interval between two completed reruns.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);

/// Default maximum depth of user function calls.
pub const DEFAULT_RECURSION_LIMIT: usize = 64;

/// Session-level engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Reruns arriving within this interval of the last completed rerun are
    /// ignored by the runner.
    #[serde(with = "duration_ms")]
    pub debounce: Duration,

    /// Deadline for a single node body. `None` disables it.
    #[serde(with = "option_duration_ms")]
    pub node_timeout: Option<Duration>,

    /// Retry policy applied to nodes that do not carry their own.
    pub retry: Option<RetryPolicy>,

    /// Maximum depth of nested user function calls.
    pub recursion_limit: usize,

    /// When false, the transformer is skipped and every rerun reinterprets
    /// the whole script.
    pub incremental: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            node_timeout: None,
            retry: None,
            recursion_limit: DEFAULT_RECURSION_LIMIT,
            incremental: true,
        }
    }
}

impl EngineConfig {
    /// Parse a config from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn with_node_timeout(mut self, timeout: Duration) -> Self {
        self.node_timeout = Some(timeout);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn with_recursion_limit(mut self, limit: usize) -> Self {
        self.recursion_limit = limit;
        self
    }

    pub fn with_incremental(mut self, incremental: bool) -> Self {
        self.incremental = incremental;
        self
    }
}

/// How often, and how patiently, a failing node body is re-attempted.
///
/// Within one execution a failing body is retried inline until
/// `max_attempts` is reached, sleeping `delay * backoff^n` between attempts.
/// A node that still fails is re-attempted on later reruns even when its
/// inputs did not change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    #[serde(with = "duration_ms")]
    pub delay: Duration,
    pub backoff: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(0),
            backoff: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration, backoff: f64) -> Self {
        Self {
            max_attempts,
            delay,
            backoff,
        }
    }

    /// Sleep before the attempt following `failed_attempts` failures.
    pub fn delay_after(&self, failed_attempts: u32) -> Duration {
        let exponent = failed_attempts.saturating_sub(1) as i32;
        let factor = self.backoff.max(0.0).powi(exponent);
        self.delay.mul_f64(if factor.is_finite() { factor } else { 1.0 })
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

mod option_duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Option::<u64>::deserialize(deserializer).map(|ms| ms.map(Duration::from_millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.debounce, Duration::from_millis(100));
        assert_eq!(config.node_timeout, None);
        assert_eq!(config.recursion_limit, 64);
        assert!(config.incremental);
    }

    #[test]
    fn from_json_fills_missing_fields() {
        let config = EngineConfig::from_json(r#"{"debounce": 5, "node_timeout": 250}"#).unwrap();
        assert_eq!(config.debounce, Duration::from_millis(5));
        assert_eq!(config.node_timeout, Some(Duration::from_millis(250)));
        assert_eq!(config.recursion_limit, DEFAULT_RECURSION_LIMIT);
        assert!(config.retry.is_none());
    }

    #[test]
    fn retry_from_json() {
        let config =
            EngineConfig::from_json(r#"{"retry": {"max_attempts": 4, "delay": 10}}"#).unwrap();
        let retry = config.retry.unwrap();
        assert_eq!(retry.max_attempts, 4);
        assert_eq!(retry.delay, Duration::from_millis(10));
        assert_eq!(retry.backoff, 2.0);
    }

    #[test]
    fn backoff_grows_delay() {
        let policy = RetryPolicy::new(5, Duration::from_millis(10), 2.0);
        assert_eq!(policy.delay_after(1), Duration::from_millis(10));
        assert_eq!(policy.delay_after(2), Duration::from_millis(20));
        assert_eq!(policy.delay_after(3), Duration::from_millis(40));
    }

    #[test]
    fn builders_chain() {
        let config = EngineConfig::default()
            .with_debounce(Duration::ZERO)
            .with_incremental(false)
            .with_recursion_limit(8);
        assert_eq!(config.debounce, Duration::ZERO);
        assert!(!config.incremental);
        assert_eq!(config.recursion_limit, 8);
    }
}
