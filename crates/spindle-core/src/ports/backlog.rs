//! BacklogQueue port - ordering policy for admitted-but-waiting tasks.

use crate::domain::{Task, TaskId};

/// Holds tasks that were admitted while every worker slot was taken.
///
/// The scheduler only calls these four methods and never looks at queue
/// metadata, so an implementation is free to reorder by whatever policy it
/// reads from [`Task::metadata`]. Capacity (`max_backlog`) is enforced by the
/// scheduler before `push` is called.
///
/// # Example
/// ```ignore
/// let pool = Pool::builder()
///     .backlog(Box::new(PriorityBacklog::new()))
///     .build(factory)
///     .await?;
/// ```
pub trait BacklogQueue: Send {
    /// Number of tasks currently held.
    fn size(&self) -> usize;

    /// Admit a task.
    fn push(&mut self, task: Task);

    /// Remove and return the next task to dispatch.
    fn shift(&mut self) -> Option<Task>;

    /// Remove one specific task, keeping the relative order of the rest.
    fn remove(&mut self, task_id: TaskId) -> Option<Task>;

    fn is_empty(&self) -> bool {
        self.size() == 0
    }
}
