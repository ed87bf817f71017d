//! PoolBuilder - configuration, validation and startup.

use std::sync::Arc;
use std::time::Duration;

use super::config::{ConfigError, PoolConfig};
use super::pool::Pool;
use crate::domain::ExecutorError;
use crate::impls::FifoBacklog;
use crate::ports::{BacklogQueue, ExecutorFactory};

/// Builds a [`Pool`].
///
/// # Example
/// ```ignore
/// let pool = Pool::builder()
///     .min_workers(1)
///     .max_workers(4)
///     .max_backlog(32)
///     .build(Arc::new(InProcessExecutorFactory::new(handler)))
///     .await?;
/// ```
///
/// # Fail-fast
/// `build()` validates the configuration and waits for the `min_workers`
/// pre-warmed workers. A worker that cannot start fails the build.
pub struct PoolBuilder {
    config: PoolConfig,
    backlog: Option<Box<dyn BacklogQueue>>,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("pre-warmed worker failed to start: {0}")]
    WarmUp(#[source] ExecutorError),
}

impl PoolBuilder {
    pub fn new() -> Self {
        Self {
            config: PoolConfig::default(),
            backlog: None,
        }
    }

    /// Replace the whole configuration (e.g. one loaded from a file).
    /// Later setters still override individual fields.
    pub fn config(mut self, config: PoolConfig) -> Self {
        self.config = config;
        self
    }

    pub fn min_workers(mut self, n: usize) -> Self {
        self.config.min_workers = n;
        self
    }

    pub fn max_workers(mut self, n: usize) -> Self {
        self.config.max_workers = n;
        self
    }

    /// `0` disables queueing: saturated submissions fail with `NoQueueAvailable`.
    pub fn max_backlog(mut self, n: usize) -> Self {
        self.config.max_backlog = Some(n);
        self
    }

    pub fn concurrency_per_worker(mut self, n: usize) -> Self {
        self.config.concurrency_per_worker = n;
        self
    }

    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.set_idle_timeout(timeout);
        self
    }

    /// Use a custom backlog ordering instead of FIFO.
    pub fn backlog(mut self, backlog: Box<dyn BacklogQueue>) -> Self {
        self.backlog = Some(backlog);
        self
    }

    pub async fn build(self, factory: Arc<dyn ExecutorFactory>) -> Result<Pool, BuildError> {
        self.config.validate()?;
        let backlog = self
            .backlog
            .unwrap_or_else(|| Box::new(FifoBacklog::new()));
        Pool::start(self.config, backlog, factory).await
    }
}

impl Default for PoolBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PoolState;
    use crate::impls::testing::{Gate, GateHandler, TestFactory};

    #[tokio::test]
    async fn invalid_config_fails_before_spawning() {
        let factory = TestFactory::new(GateHandler::new(Gate::new()));
        let err = PoolBuilder::new()
            .min_workers(3)
            .max_workers(2)
            .build(factory.clone())
            .await
            .err()
            .unwrap();
        assert!(matches!(
            err,
            BuildError::Config(ConfigError::MinAboveMax { min: 3, max: 2 })
        ));
        assert_eq!(factory.created(), 0);
    }

    #[tokio::test]
    async fn build_waits_for_prewarmed_workers() {
        let factory = TestFactory::new(GateHandler::new(Gate::new()));
        let pool = PoolBuilder::new()
            .min_workers(2)
            .max_workers(4)
            .build(factory.clone())
            .await
            .unwrap();
        let status = pool.status().await;
        assert_eq!(status.state, PoolState::Ready);
        assert_eq!(status.worker_count, 2);
        assert_eq!(factory.created(), 2);
        pool.destroy().await;
    }

    #[tokio::test]
    async fn warm_up_failure_fails_the_build() {
        let factory = TestFactory::failing(GateHandler::new(Gate::new()), 1);
        let err = PoolBuilder::new()
            .min_workers(2)
            .max_workers(2)
            .build(factory.clone())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, BuildError::WarmUp(ExecutorError::Spawn(_))));
    }

    #[tokio::test]
    async fn sub_millisecond_idle_timeout_is_accepted() {
        let factory = TestFactory::new(GateHandler::new(Gate::new()));
        let pool = PoolBuilder::new()
            .max_workers(2)
            .idle_timeout(Duration::from_micros(500))
            .build(factory)
            .await
            .unwrap();
        assert_eq!(pool.config().idle_timeout_ms, 1);
        pool.destroy().await;
    }

    #[tokio::test]
    async fn config_then_setters_override() {
        let cfg = PoolConfig::from_json_str(r#"{ "max_workers": 8, "max_backlog": 3 }"#).unwrap();
        let factory = TestFactory::new(GateHandler::new(Gate::new()));
        let pool = PoolBuilder::new()
            .config(cfg)
            .max_workers(2)
            .build(factory)
            .await
            .unwrap();
        assert_eq!(pool.config().max_workers, 2);
        assert_eq!(pool.config().max_backlog(), 3);
        pool.destroy().await;
    }
}
