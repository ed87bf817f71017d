//! Domain model (ids, tasks, errors, lifecycle states).

pub mod errors;
pub mod ids;
pub mod state;
pub mod task;

pub use self::errors::{ExecutorError, PoolError};
pub use self::ids::{TaskId, WorkerId};
pub use self::state::{PoolState, WorkerState};
pub use self::task::{Task, TaskEnvelope, TaskResult};
