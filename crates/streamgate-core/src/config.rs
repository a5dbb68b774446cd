//! Typed access to runtime and consumer properties.
//!
//! Configuration arrives as flat `key=value` properties, the way the
//! underlying consumer runtime is configured. [`Properties`] wraps that map
//! with typed lookups and defaults; [`AutopilotConfig`] binds the
//! `autopilot.*` keys into one validated struct.
//!
//! ## Recognized keys
//!
//! | Key | Effect |
//! |---|---|
//! | `application.server` | `host:port` self endpoint; required for federated queries |
//! | `num.stream.threads` | desired (baseline) thread count |
//! | `max.poll.interval.ms`, `session.timeout.ms` | derive the generic timeout |
//! | `autopilot.enabled` | enables scheduled automation |
//! | `autopilot.lag.threshold` | messages per partition considered acceptable |
//! | `autopilot.stream-thread.limit` | max additional threads over the baseline |
//! | `autopilot.period.initial-delay` | ms before the first evaluation |
//! | `autopilot.period.between-runs` | ms between evaluations |
//! | `autopilot.exclusion-pattern` | regex of topics whose lag is ignored |

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use regex::Regex;

use crate::error::{Error, Result};
use crate::types::HostInfo;

pub const APPLICATION_SERVER: &str = "application.server";
pub const NUM_STREAM_THREADS: &str = "num.stream.threads";
pub const MAX_POLL_INTERVAL_MS: &str = "max.poll.interval.ms";
pub const SESSION_TIMEOUT_MS: &str = "session.timeout.ms";

pub const AUTOPILOT_ENABLED: &str = "autopilot.enabled";
pub const AUTOPILOT_LAG_THRESHOLD: &str = "autopilot.lag.threshold";
pub const AUTOPILOT_THREAD_LIMIT: &str = "autopilot.stream-thread.limit";
pub const AUTOPILOT_INITIAL_DELAY: &str = "autopilot.period.initial-delay";
pub const AUTOPILOT_BETWEEN_RUNS: &str = "autopilot.period.between-runs";
pub const AUTOPILOT_EXCLUSION_PATTERN: &str = "autopilot.exclusion-pattern";

const DEFAULT_MAX_POLL_INTERVAL_MS: u64 = 300_000;
const DEFAULT_SESSION_TIMEOUT_MS: u64 = 45_000;
const DEFAULT_LAG_THRESHOLD: i64 = 10_000;
const DEFAULT_THREAD_LIMIT: usize = 2;
const DEFAULT_INITIAL_DELAY_MS: u64 = 120_000;
const DEFAULT_BETWEEN_RUNS_MS: u64 = 300_000;

/// Internal topics (changelogs, repartition topics) are excluded from lag
/// accounting by default: their lag tracks restoration, not processing.
const DEFAULT_EXCLUSION_PATTERN: &str = r"-(changelog|repartition)$";

/// Flat `key=value` configuration with typed lookups.
#[derive(Debug, Clone, Default)]
pub struct Properties {
    values: HashMap<String, String>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Typed lookup. Absent keys are `Ok(None)`; present but unparseable
    /// values are an error, not a silent fallback.
    pub fn get_parsed<T: FromStr>(&self, key: &str) -> Result<Option<T>>
    where
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => raw
                .parse::<T>()
                .map(Some)
                .map_err(|e| Error::InvalidProperty {
                    key: key.to_string(),
                    reason: e.to_string(),
                }),
        }
    }

    /// Typed lookup with a default for absent or unparseable values.
    pub fn get_or<T: FromStr>(&self, key: &str, default: T) -> T {
        self.get(key)
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(default)
    }

    /// The advertised self endpoint, if configured. A malformed value is an
    /// error; an absent one is not (the instance simply does not participate
    /// in federated queries).
    pub fn application_server(&self) -> Result<Option<HostInfo>> {
        match self.get(APPLICATION_SERVER) {
            None => Ok(None),
            Some(endpoint) => HostInfo::from_endpoint(endpoint).map(Some),
        }
    }

    /// The user-configured baseline thread count.
    pub fn desired_thread_count(&self) -> usize {
        self.get_or(NUM_STREAM_THREADS, 1)
    }

    /// Timeout for suspending operations:
    /// `max(max.poll.interval.ms, session.timeout.ms)`.
    pub fn generic_timeout(&self) -> Duration {
        let max_poll = self.get_or(MAX_POLL_INTERVAL_MS, DEFAULT_MAX_POLL_INTERVAL_MS);
        let session = self.get_or(SESSION_TIMEOUT_MS, DEFAULT_SESSION_TIMEOUT_MS);
        Duration::from_millis(max_poll.max(session))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Properties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Bound and validated `autopilot.*` configuration.
#[derive(Debug, Clone)]
pub struct AutopilotConfig {
    pub enabled: bool,
    /// Acceptable accumulated lag per thread, in messages.
    pub lag_threshold: i64,
    /// Maximum additional threads over the baseline.
    pub thread_limit: usize,
    pub initial_delay: Duration,
    pub between_runs: Duration,
    /// Topics matching this pattern never contribute lag.
    pub exclusion_pattern: Regex,
}

impl AutopilotConfig {
    pub fn from_properties(properties: &Properties) -> Result<Self> {
        let pattern = properties
            .get(AUTOPILOT_EXCLUSION_PATTERN)
            .unwrap_or(DEFAULT_EXCLUSION_PATTERN);
        let exclusion_pattern = Regex::new(pattern).map_err(|e| Error::InvalidProperty {
            key: AUTOPILOT_EXCLUSION_PATTERN.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            enabled: properties.get_or(AUTOPILOT_ENABLED, false),
            lag_threshold: properties.get_or(AUTOPILOT_LAG_THRESHOLD, DEFAULT_LAG_THRESHOLD),
            thread_limit: properties.get_or(AUTOPILOT_THREAD_LIMIT, DEFAULT_THREAD_LIMIT),
            initial_delay: Duration::from_millis(
                properties.get_or(AUTOPILOT_INITIAL_DELAY, DEFAULT_INITIAL_DELAY_MS),
            ),
            between_runs: Duration::from_millis(
                properties.get_or(AUTOPILOT_BETWEEN_RUNS, DEFAULT_BETWEEN_RUNS_MS),
            ),
            exclusion_pattern,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_parsed_typed_lookup() {
        let props: Properties = [(NUM_STREAM_THREADS, "4")].into_iter().collect();
        assert_eq!(props.get_parsed::<usize>(NUM_STREAM_THREADS).unwrap(), Some(4));
        assert_eq!(props.get_parsed::<usize>("missing").unwrap(), None);
    }

    #[test]
    fn test_get_parsed_rejects_garbage() {
        let props: Properties = [(NUM_STREAM_THREADS, "four")].into_iter().collect();
        assert!(props.get_parsed::<usize>(NUM_STREAM_THREADS).is_err());
    }

    #[test]
    fn test_desired_thread_count_defaults_to_one() {
        assert_eq!(Properties::new().desired_thread_count(), 1);
        let props: Properties = [(NUM_STREAM_THREADS, "3")].into_iter().collect();
        assert_eq!(props.desired_thread_count(), 3);
    }

    #[test]
    fn test_generic_timeout_takes_the_larger() {
        let props: Properties = [(MAX_POLL_INTERVAL_MS, "60000"), (SESSION_TIMEOUT_MS, "90000")]
            .into_iter()
            .collect();
        assert_eq!(props.generic_timeout(), Duration::from_millis(90_000));

        // Defaults: max(300s, 45s)
        assert_eq!(
            Properties::new().generic_timeout(),
            Duration::from_millis(300_000)
        );
    }

    #[test]
    fn test_application_server_absent_vs_malformed() {
        assert_eq!(Properties::new().application_server().unwrap(), None);

        let props: Properties = [(APPLICATION_SERVER, "localhost:19099")].into_iter().collect();
        assert_eq!(
            props.application_server().unwrap(),
            Some(HostInfo::new("localhost", 19099))
        );

        let props: Properties = [(APPLICATION_SERVER, "nonsense")].into_iter().collect();
        assert!(props.application_server().is_err());
    }

    #[test]
    fn test_autopilot_config_defaults() {
        let config = AutopilotConfig::from_properties(&Properties::new()).unwrap();
        assert!(!config.enabled);
        assert_eq!(config.lag_threshold, 10_000);
        assert_eq!(config.thread_limit, 2);
        assert_eq!(config.initial_delay, Duration::from_millis(120_000));
        assert_eq!(config.between_runs, Duration::from_millis(300_000));
        assert!(config.exclusion_pattern.is_match("orders-store-changelog"));
        assert!(config.exclusion_pattern.is_match("join-repartition"));
        assert!(!config.exclusion_pattern.is_match("orders"));
    }

    #[test]
    fn test_autopilot_config_bound_values() {
        let props: Properties = [
            (AUTOPILOT_ENABLED, "true"),
            (AUTOPILOT_LAG_THRESHOLD, "500"),
            (AUTOPILOT_THREAD_LIMIT, "4"),
            (AUTOPILOT_INITIAL_DELAY, "1000"),
            (AUTOPILOT_BETWEEN_RUNS, "2000"),
            (AUTOPILOT_EXCLUSION_PATTERN, "^internal-"),
        ]
        .into_iter()
        .collect();

        let config = AutopilotConfig::from_properties(&props).unwrap();
        assert!(config.enabled);
        assert_eq!(config.lag_threshold, 500);
        assert_eq!(config.thread_limit, 4);
        assert_eq!(config.initial_delay, Duration::from_millis(1000));
        assert_eq!(config.between_runs, Duration::from_millis(2000));
        assert!(config.exclusion_pattern.is_match("internal-audit"));
    }

    #[test]
    fn test_autopilot_config_invalid_pattern_fails_fast() {
        let props: Properties = [(AUTOPILOT_EXCLUSION_PATTERN, "([unclosed")].into_iter().collect();
        assert!(AutopilotConfig::from_properties(&props).is_err());
    }
}
