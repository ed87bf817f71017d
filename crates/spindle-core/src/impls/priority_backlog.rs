//! PriorityBacklog - orders waiting tasks by a `priority` read from queue
//! metadata.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::domain::{Task, TaskId};
use crate::ports::BacklogQueue;

/// Heap entry. Higher priority first, then lower sequence number (FIFO
/// among equal priorities).
#[derive(Debug)]
struct Entry {
    priority: i64,
    seq: u64,
    task: Task,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            // Reverse: earlier submissions win ties
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Reads `{"priority": <integer>}` from [`Task::metadata`]. Tasks without
/// metadata (or without an integer `priority`) get priority 0.
#[derive(Debug, Default)]
pub struct PriorityBacklog {
    heap: BinaryHeap<Entry>,
    next_seq: u64,
}

impl PriorityBacklog {
    pub fn new() -> Self {
        Self::default()
    }

    fn priority_of(task: &Task) -> i64 {
        task.metadata()
            .and_then(|m| m.get("priority"))
            .and_then(serde_json::Value::as_i64)
            .unwrap_or(0)
    }
}

impl BacklogQueue for PriorityBacklog {
    fn size(&self) -> usize {
        self.heap.len()
    }

    fn push(&mut self, task: Task) {
        let priority = Self::priority_of(&task);
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Entry {
            priority,
            seq,
            task,
        });
    }

    fn shift(&mut self) -> Option<Task> {
        self.heap.pop().map(|e| e.task)
    }

    fn remove(&mut self, task_id: TaskId) -> Option<Task> {
        if !self.heap.iter().any(|e| e.task.id() == task_id) {
            return None;
        }
        // O(n) rebuild; ordering keys of the remaining entries are untouched
        let mut found = None;
        let mut rest = Vec::with_capacity(self.heap.len());
        for entry in std::mem::take(&mut self.heap).into_vec() {
            if found.is_none() && entry.task.id() == task_id {
                found = Some(entry.task);
            } else {
                rest.push(entry);
            }
        }
        self.heap = BinaryHeap::from(rest);
        found
    }
}
