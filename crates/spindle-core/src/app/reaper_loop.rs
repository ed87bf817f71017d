//! ReaperLoop - shrinks the pool back toward `min_workers`.

use std::sync::{Arc, Weak};

use tokio::sync::watch;
use tokio::time::{Duration, MissedTickBehavior};

use super::pool::PoolShared;

const MIN_TICK: Duration = Duration::from_millis(10);

/// Periodically terminates workers that stayed idle for `idle_timeout`.
///
/// # Flow
/// 1. tick every `idle_timeout / 2`
/// 2. ask the scheduler for expired idle workers (above `min_workers` only)
/// 3. terminate their executors outside the lock
///
/// Holds only a `Weak` to the pool, so it never keeps a dropped pool alive.
pub(crate) struct ReaperLoop {
    shared: Weak<PoolShared>,
    idle_timeout: Duration,
}

impl ReaperLoop {
    pub(crate) fn spawn(
        shared: &Arc<PoolShared>,
        idle_timeout: Duration,
        shutdown_rx: watch::Receiver<bool>,
    ) {
        let reaper = Self {
            shared: Arc::downgrade(shared),
            idle_timeout,
        };
        tokio::spawn(reaper.run(shutdown_rx));
    }

    async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        let period = (self.idle_timeout / 2).max(MIN_TICK);
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *shutdown_rx.borrow() {
                break;
            }
            tokio::select! {
                // sender dropped counts as shutdown too
                changed = shutdown_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                _ = ticker.tick() => {}
            }

            let Some(shared) = self.shared.upgrade() else {
                break;
            };
            if !shared.reap_idle(self.idle_timeout).await {
                break;
            }
        }
        tracing::debug!("reaper loop stopped");
    }
}
