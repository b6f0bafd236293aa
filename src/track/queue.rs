// src/track/queue.rs

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use tracing::{debug, trace};

use crate::ident::{Ident, TaskName};
use crate::spec::DEFAULT_PRIORITY;

/// Priority queue of targets awaiting scheduler attention.
///
/// An entry stays *active* from the moment it is queued until the
/// scheduler resolves it, surviving any number of pops and re-pushes in
/// between. At most one heap entry exists per target; re-queueing an
/// already queued target is a no-op.
#[derive(Debug, Default)]
pub struct TrackQueue {
    heap: BinaryHeap<QueueEntry>,
    in_heap: HashSet<Ident>,
    active: HashSet<Ident>,
    from_user: HashSet<Ident>,
    priorities: HashMap<Ident, i32>,
    execution_trace: Vec<TaskName>,
    seq: u64,
}

/// Heap order: highest priority first, insertion order breaking ties.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct QueueEntry {
    priority: i32,
    seq: Reverse<u64>,
    target: Ident,
}

impl TrackQueue {
    pub fn new() -> Self {
        TrackQueue::default()
    }

    /// Adds a target. Returns false without touching anything when the
    /// target is already active.
    pub fn queue(&mut self, target: Ident, priority: i32, from_user: bool) -> bool {
        if from_user {
            self.from_user.insert(target.clone());
        }
        if self.active.contains(&target) {
            trace!(%target, "already queued, ignoring");
            return false;
        }
        debug!(%target, priority, "queueing");
        self.active.insert(target.clone());
        self.priorities.insert(target.clone(), priority);
        self.push(target, priority);
        true
    }

    /// Puts an already-known target back into the heap if it is not there,
    /// keeping any decayed priority it has accumulated.
    pub fn ensure_queued(&mut self, target: &Ident, priority: i32) {
        self.active.insert(target.clone());
        if self.in_heap.contains(target) {
            return;
        }
        let priority = *self.priorities.entry(target.clone()).or_insert(priority);
        self.push(target.clone(), priority);
    }

    fn push(&mut self, target: Ident, priority: i32) {
        self.in_heap.insert(target.clone());
        self.heap.push(QueueEntry {
            priority,
            seq: Reverse(self.seq),
            target,
        });
        self.seq += 1;
    }

    /// Pops the highest priority target. The target stays active until
    /// [`TrackQueue::deactivate`] is called for it.
    pub fn deque(&mut self) -> Option<Ident> {
        let entry = self.heap.pop()?;
        self.in_heap.remove(&entry.target);
        trace!(target = %entry.target, priority = entry.priority, "dequed");
        Some(entry.target)
    }

    /// Lowers a target's priority by one, returning the new value.
    pub fn decay(&mut self, target: &Ident) -> i32 {
        let slot = self
            .priorities
            .entry(target.clone())
            .or_insert(DEFAULT_PRIORITY);
        *slot -= 1;
        *slot
    }

    pub fn priority_of(&self, target: &Ident) -> i32 {
        self.priorities
            .get(target)
            .copied()
            .unwrap_or(DEFAULT_PRIORITY)
    }

    /// Removes a target from the active set once the scheduler has
    /// resolved it.
    pub fn deactivate(&mut self, target: &Ident) {
        self.active.remove(target);
    }

    pub fn is_active(&self, target: &Ident) -> bool {
        self.active.contains(target)
    }

    pub fn active(&self) -> impl Iterator<Item = &Ident> {
        self.active.iter()
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    /// Whether anything is waiting in the heap.
    pub fn has_pending(&self) -> bool {
        !self.heap.is_empty()
    }

    pub fn is_from_user(&self, target: &Ident) -> bool {
        self.from_user.contains(target)
    }

    pub fn user_requested(&self) -> impl Iterator<Item = &Ident> {
        self.from_user.iter()
    }

    /// Records a dispatched task in the execution trace.
    pub fn record_dispatch(&mut self, name: &TaskName) {
        self.execution_trace.push(name.clone());
    }

    /// Every dispatched task name, in dispatch order.
    pub fn execution_trace(&self) -> &[TaskName] {
        &self.execution_trace
    }

    /// Drops all pending and active entries. The execution trace and the
    /// record of user requests survive.
    pub fn clear(&mut self) {
        debug!(pending = self.heap.len(), "clearing queue");
        self.heap.clear();
        self.in_heap.clear();
        self.active.clear();
        self.priorities.clear();
    }
}
