//! Ports - seams the scheduler depends on.
//!
//! - **BacklogQueue**: ordering policy for waiting tasks (FIFO by default)
//! - **Executor / ExecutorFactory**: the backend that runs tasks

pub mod backlog;
pub mod executor;

pub use self::backlog::BacklogQueue;
pub use self::executor::{Executor, ExecutorFactory};
