//! spindle-core
//!
//! An elastic task pool: a bounded set of workers, each running up to
//! `concurrency_per_worker` tasks on a pluggable executor, with a bounded
//! backlog in front of them.
//!
//! # Modules
//! - **domain**: ids, task envelope and settlement, pool/worker states, errors
//! - **ports**: `Executor`, `ExecutorFactory`, `BacklogQueue`
//! - **impls**: FIFO and priority backlogs, the in-process executor
//! - **app**: `Pool`, `PoolBuilder`, config, status and the scheduler
//! - **typed**: serde-typed tasks on top of JSON payloads

pub mod app;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod typed;

pub use app::{BuildError, ConfigError, Pool, PoolBuilder, PoolConfig, PoolStatus, TaskHandle};
pub use domain::{ExecutorError, PoolError, PoolState, TaskEnvelope, TaskId, TaskResult, WorkerId};
