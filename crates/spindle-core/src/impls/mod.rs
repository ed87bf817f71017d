//! Impls - implementations of the ports.
//!
//! # Included
//! - **FifoBacklog**: default backlog (insertion order)
//! - **PriorityBacklog**: backlog ordered by `priority` in queue metadata
//! - **InProcessExecutorFactory**: runs a `TaskHandler` on the tokio runtime
//!
//! Process- or sandbox-backed executors live outside this crate and only
//! need to implement `ports::ExecutorFactory`.

pub mod fifo_backlog;
pub mod inprocess;
pub mod priority_backlog;

#[cfg(test)]
pub(crate) mod testing;

pub use self::fifo_backlog::FifoBacklog;
pub use self::inprocess::{InProcessExecutor, InProcessExecutorFactory, TaskHandler};
pub use self::priority_backlog::PriorityBacklog;
