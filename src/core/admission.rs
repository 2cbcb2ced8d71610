//! Delay-ordered admission queue with a soft capacity.
//!
//! Tasks are held in a min-heap keyed by `(ready_at, seq)`, so the earliest
//! ready task is always at the top and ties are broken in insertion order.
//! Removal by id is a linear `retain` over the heap. Cancellation is rare
//! compared to submission, so that is cheaper overall than tombstoning every
//! entry.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

use super::metrics::MetricsSink;
use super::task::{PendingTask, TaskInstanceId};

struct QueueEntry {
    ready_at: Instant,
    seq: u64,
    task: PendingTask,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.ready_at == other.ready_at && self.seq == other.seq
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap, earliest ready_at must win.
        other
            .ready_at
            .cmp(&self.ready_at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Default)]
struct QueueState {
    heap: BinaryHeap<QueueEntry>,
    next_seq: u64,
}

impl QueueState {
    /// Pop the head if it is ready; otherwise report when it will be (if any).
    fn pop_ready(&mut self, now: Instant) -> Result<PendingTask, Option<Instant>> {
        match self.heap.peek().map(|head| head.ready_at) {
            Some(ready_at) if ready_at <= now => self.heap.pop().map(|e| e.task).ok_or(None),
            next => Err(next),
        }
    }
}

/// Holding area for tasks accepted but not yet dispatched.
///
/// Safe for concurrent `offer` and `remove_by_instance_id` from any number of
/// threads; `take_earliest_ready*` is meant for the single dispatch loop.
pub struct AdmissionQueue {
    capacity: usize,
    backoff: Duration,
    state: Mutex<QueueState>,
    available: Condvar,
    metrics: Arc<dyn MetricsSink>,
}

impl AdmissionQueue {
    /// Create a queue with soft capacity `capacity` and the given grace backoff.
    pub fn new(capacity: usize, backoff: Duration, metrics: Arc<dyn MetricsSink>) -> Self {
        Self {
            capacity,
            backoff,
            state: Mutex::new(QueueState::default()),
            available: Condvar::new(),
            metrics,
        }
    }

    /// Try to admit `task`.
    ///
    /// When the queue holds more than `capacity` tasks the caller sleeps one
    /// backoff interval and checks again. If it is still over capacity the task
    /// is rejected and `false` is returned; the caller should retry later.
    pub fn offer(&self, task: PendingTask) -> bool {
        if self.len() > self.capacity {
            debug!(
                task_instance_id = task.task_instance_id(),
                queue_size = self.len(),
                capacity = self.capacity,
                "admission queue over capacity, waiting before retry"
            );
            thread::sleep(self.backoff);
            let size = self.len();
            if size > self.capacity {
                self.metrics.inc_admission_queue_full();
                warn!(
                    task_instance_id = task.task_instance_id(),
                    queue_size = size,
                    capacity = self.capacity,
                    "admission queue is full, task rejected"
                );
                return false;
            }
        }
        self.push(task);
        true
    }

    fn push(&self, task: PendingTask) {
        let mut state = self.state.lock();
        let seq = state.next_seq;
        state.next_seq += 1;
        state.heap.push(QueueEntry {
            ready_at: task.ready_at(),
            seq,
            task,
        });
        drop(state);
        // The new task may be earlier than the head the consumer is sleeping on.
        self.available.notify_all();
    }

    /// Block until the earliest task is ready, then remove and return it.
    pub fn take_earliest_ready(&self) -> PendingTask {
        let mut state = self.state.lock();
        loop {
            match state.pop_ready(Instant::now()) {
                Ok(task) => return task,
                Err(Some(ready_at)) => {
                    self.available.wait_until(&mut state, ready_at);
                }
                Err(None) => self.available.wait(&mut state),
            }
        }
    }

    /// Like [`Self::take_earliest_ready`], but give up after `timeout`.
    pub fn take_earliest_ready_timeout(&self, timeout: Duration) -> Option<PendingTask> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        loop {
            let now = Instant::now();
            match state.pop_ready(now) {
                Ok(task) => return Some(task),
                Err(next) => {
                    if now >= deadline {
                        return None;
                    }
                    let wake_at = next.map_or(deadline, |ready_at| ready_at.min(deadline));
                    self.available.wait_until(&mut state, wake_at);
                }
            }
        }
    }

    /// Remove every queued entry for `task_instance_id`.
    pub fn remove_by_instance_id(&self, task_instance_id: TaskInstanceId) -> bool {
        let mut state = self.state.lock();
        let before = state.heap.len();
        state
            .heap
            .retain(|entry| entry.task.task_instance_id() != task_instance_id);
        let removed = state.heap.len() != before;
        drop(state);
        if removed {
            self.available.notify_all();
        }
        removed
    }

    /// Current number of queued tasks. Advisory only.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().heap.len()
    }

    /// Whether the queue is empty. Advisory only.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Soft capacity used by `offer`.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}
