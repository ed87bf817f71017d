//! PoolConfig - sizing and admission limits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Pool configuration. Immutable once the pool is built.
///
/// Deserializes from JSON with every field optional:
/// ```ignore
/// let cfg = PoolConfig::from_json_str(r#"{ "max_workers": 4, "max_backlog": 0 }"#)?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolConfig {
    /// Workers started up front and kept through scale-down.
    pub min_workers: usize,

    /// Hard cap on concurrently existing workers.
    pub max_workers: usize,

    /// Backlog bound. `None` means `max_workers²`; `Some(0)` disables queueing.
    pub max_backlog: Option<usize>,

    /// Tasks one worker may run at the same time.
    pub concurrency_per_worker: usize,

    /// How long a worker above `min_workers` may sit idle before it is reaped.
    pub idle_timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("max_workers must be at least 1")]
    NoWorkers,

    #[error("min_workers ({min}) exceeds max_workers ({max})")]
    MinAboveMax { min: usize, max: usize },

    #[error("concurrency_per_worker must be at least 1")]
    ZeroConcurrency,

    #[error("idle_timeout_ms must be greater than 0")]
    ZeroIdleTimeout,

    #[error("invalid config json: {0}")]
    Parse(String),
}

pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(10);

impl Default for PoolConfig {
    fn default() -> Self {
        let max_workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            min_workers: 0,
            max_workers,
            max_backlog: None,
            concurrency_per_worker: 1,
            idle_timeout_ms: DEFAULT_IDLE_TIMEOUT.as_millis() as u64,
        }
    }
}

impl PoolConfig {
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_workers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        if self.min_workers > self.max_workers {
            return Err(ConfigError::MinAboveMax {
                min: self.min_workers,
                max: self.max_workers,
            });
        }
        if self.concurrency_per_worker == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if self.idle_timeout_ms == 0 {
            return Err(ConfigError::ZeroIdleTimeout);
        }
        Ok(())
    }

    /// Effective backlog bound.
    pub fn max_backlog(&self) -> usize {
        self.max_backlog
            .unwrap_or_else(|| self.max_workers.saturating_mul(self.max_workers))
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    /// Stores `timeout` in whole milliseconds, rounding any sub-millisecond
    /// remainder up so a positive timeout never becomes 0.
    pub fn set_idle_timeout(&mut self, timeout: Duration) {
        let ms = timeout.as_nanos().div_ceil(1_000_000);
        self.idle_timeout_ms = u64::try_from(ms).unwrap_or(u64::MAX);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn cfg(min: usize, max: usize, conc: usize) -> PoolConfig {
        PoolConfig {
            min_workers: min,
            max_workers: max,
            max_backlog: Some(4),
            concurrency_per_worker: conc,
            idle_timeout_ms: 100,
        }
    }

    #[test]
    fn defaults_are_valid() {
        let cfg = PoolConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.min_workers, 0);
        assert_eq!(cfg.concurrency_per_worker, 1);
        assert!(cfg.max_backlog() > 0);
    }

    #[rstest]
    #[case(cfg(0, 0, 1), ConfigError::NoWorkers)]
    #[case(cfg(3, 2, 1), ConfigError::MinAboveMax { min: 3, max: 2 })]
    #[case(cfg(0, 2, 0), ConfigError::ZeroConcurrency)]
    fn rejects_invalid(#[case] cfg: PoolConfig, #[case] expected: ConfigError) {
        assert_eq!(cfg.validate().unwrap_err(), expected);
    }

    #[test]
    fn auto_backlog_is_max_workers_squared() {
        let mut c = cfg(0, 3, 1);
        c.max_backlog = None;
        assert_eq!(c.max_backlog(), 9);
        c.max_backlog = Some(0);
        assert_eq!(c.max_backlog(), 0);
    }

    #[rstest]
    #[case(Duration::from_millis(250), 250)]
    #[case(Duration::from_micros(500), 1)]
    #[case(Duration::from_micros(1_500), 2)]
    #[case(Duration::ZERO, 0)]
    #[case(Duration::MAX, u64::MAX)]
    fn idle_timeout_rounds_up_to_whole_millis(#[case] timeout: Duration, #[case] ms: u64) {
        let mut c = cfg(0, 1, 1);
        c.set_idle_timeout(timeout);
        assert_eq!(c.idle_timeout_ms, ms);
    }

    #[test]
    fn parses_partial_json() {
        let c = PoolConfig::from_json_str(r#"{ "max_workers": 2, "max_backlog": 0 }"#).unwrap();
        assert_eq!(c.max_workers, 2);
        assert_eq!(c.max_backlog(), 0);
        assert_eq!(c.idle_timeout(), DEFAULT_IDLE_TIMEOUT);
    }

    #[test]
    fn json_is_validated() {
        let err = PoolConfig::from_json_str(r#"{ "min_workers": 5, "max_workers": 1 }"#)
            .unwrap_err();
        assert_eq!(err, ConfigError::MinAboveMax { min: 5, max: 1 });
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = PoolConfig::from_json_str(r#"{ "workers": 5 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
