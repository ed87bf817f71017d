//! FifoBacklog - default backlog, strict insertion order.

use std::collections::VecDeque;

use crate::domain::{Task, TaskId};
use crate::ports::BacklogQueue;

/// First in, first out. `push`/`shift` are amortized O(1); `remove` scans.
#[derive(Debug, Default)]
pub struct FifoBacklog {
    tasks: VecDeque<Task>,
}

impl FifoBacklog {
    pub fn new() -> Self {
        Self {
            tasks: VecDeque::new(),
        }
    }
}

impl BacklogQueue for FifoBacklog {
    fn size(&self) -> usize {
        self.tasks.len()
    }

    fn push(&mut self, task: Task) {
        self.tasks.push_back(task);
    }

    fn shift(&mut self) -> Option<Task> {
        self.tasks.pop_front()
    }

    fn remove(&mut self, task_id: TaskId) -> Option<Task> {
        let idx = self.tasks.iter().position(|t| t.id() == task_id)?;
        // VecDeque::remove shifts the tail, order is kept
        self.tasks.remove(idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::task::test_task;
    use serde_json::json;

    #[test]
    fn shifts_in_insertion_order() {
        let mut q = FifoBacklog::new();
        for n in 0..3 {
            q.push(test_task(json!(n), None).0);
        }
        assert_eq!(q.size(), 3);

        let order: Vec<_> = std::iter::from_fn(|| q.shift())
            .map(|t| t.envelope().payload().clone())
            .collect();
        assert_eq!(order, vec![json!(0), json!(1), json!(2)]);
        assert!(q.is_empty());
    }

    #[test]
    fn remove_keeps_relative_order() {
        let mut q = FifoBacklog::new();
        let (a, _) = test_task(json!("a"), None);
        let (b, _) = test_task(json!("b"), None);
        let (c, _) = test_task(json!("c"), None);
        let b_id = b.id();
        q.push(a);
        q.push(b);
        q.push(c);

        let removed = q.remove(b_id).unwrap();
        assert_eq!(removed.id(), b_id);
        assert_eq!(q.size(), 2);
        assert_eq!(q.shift().unwrap().envelope().payload(), &json!("a"));
        assert_eq!(q.shift().unwrap().envelope().payload(), &json!("c"));
    }

    #[test]
    fn remove_unknown_is_none() {
        let mut q = FifoBacklog::new();
        q.push(test_task(json!(1), None).0);
        assert!(q.remove(TaskId::generate()).is_none());
        assert_eq!(q.size(), 1);
    }

    #[test]
    fn ignores_metadata() {
        let mut q = FifoBacklog::new();
        q.push(test_task(json!(1), Some(json!({"priority": 1}))).0);
        q.push(test_task(json!(2), Some(json!({"priority": 100}))).0);
        assert_eq!(q.shift().unwrap().envelope().payload(), &json!(1));
    }
}
