//! App - the pool itself.
//!
//! # Components
//! - **PoolBuilder**: configuration, validation and pre-warming
//! - **Pool**: admission surface (`submit`, `run`, `cancel`, `destroy`)
//! - **Scheduler**: single-lock bookkeeping for workers and the backlog
//! - **Worker**: per-executor slots and in-flight tasks
//! - **ReaperLoop**: idle scale-down toward `min_workers`

pub mod builder;
pub mod config;
pub mod handle;
pub mod pool;
pub(crate) mod reaper_loop;
pub(crate) mod scheduler;
pub mod status;
pub(crate) mod worker;

pub use self::builder::{BuildError, PoolBuilder};
pub use self::config::{ConfigError, DEFAULT_IDLE_TIMEOUT, PoolConfig};
pub use self::handle::TaskHandle;
pub use self::pool::Pool;
pub use self::status::{PoolStatus, WorkerStatus};
