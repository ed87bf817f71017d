//! Pool and worker lifecycle states.

use serde::{Deserialize, Serialize};

/// Pool lifecycle.
///
/// State transitions:
/// - Initializing -> Ready (pre-warmed workers are up)
/// - Ready <-> Scaling (at least one worker is starting)
/// - Ready | Scaling -> Destroying -> Destroyed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolState {
    Initializing,
    Ready,
    Scaling,
    Destroying,
    Destroyed,
}

impl PoolState {
    /// Does the pool take new submissions in this state?
    pub fn accepts_work(self) -> bool {
        matches!(
            self,
            PoolState::Initializing | PoolState::Ready | PoolState::Scaling
        )
    }

    /// Nothing happens after this state; `destroy` is a no-op here.
    pub fn is_terminal(self) -> bool {
        matches!(self, PoolState::Destroyed)
    }
}

/// Worker phase as seen from outside the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    /// Executor is being created; assigned tasks wait for it.
    Starting,
    /// Executor is up and running tasks.
    Ready,
}
