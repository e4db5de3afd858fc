//! Priority queue for decode jobs.
//!
//! Jobs are ordered by priority (higher values first), then by enqueue
//! order (FIFO within the same priority level). Priority only matters when
//! several distinct offsets are queued at once - the higher-priority one is
//! handed to a worker first.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::Instant;

use super::DecodeJob;
use crate::preview::RequestId;

/// Global sequence counter for FIFO ordering within priority levels.
static SEQUENCE_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_sequence() -> u64 {
    SEQUENCE_COUNTER.fetch_add(1, AtomicOrdering::Relaxed)
}

/// A decode job waiting for a worker.
#[derive(Debug)]
pub struct QueuedJob {
    /// The job to execute.
    pub job: DecodeJob,

    /// Sequence number for FIFO ordering within a priority level.
    sequence: u64,

    /// When the job was enqueued (for wait-time logging).
    pub enqueued_at: Instant,
}

impl QueuedJob {
    /// Wraps a job for queueing; the sequence number is assigned here.
    pub fn new(job: DecodeJob) -> Self {
        Self {
            job,
            sequence: next_sequence(),
            enqueued_at: Instant::now(),
        }
    }

    /// Returns how long this job has been waiting.
    pub fn wait_time(&self) -> std::time::Duration {
        self.enqueued_at.elapsed()
    }
}

// BinaryHeap is a max-heap: higher priority first, then lower sequence
// (older) first within a priority level.
impl PartialEq for QueuedJob {
    fn eq(&self, other: &Self) -> bool {
        self.job.priority == other.job.priority && self.sequence == other.sequence
    }
}

impl Eq for QueuedJob {}

impl PartialOrd for QueuedJob {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedJob {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.job.priority.cmp(&other.job.priority) {
            Ordering::Equal => other.sequence.cmp(&self.sequence),
            ordering => ordering,
        }
    }
}

/// Priority queue feeding the decode workers.
///
/// Not thread-safe on its own; the pool wraps it in a mutex held only
/// across single queue operations.
#[derive(Debug, Default)]
pub struct JobQueue {
    heap: BinaryHeap<QueuedJob>,
}

impl JobQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a job.
    pub fn push(&mut self, job: DecodeJob) {
        self.heap.push(QueuedJob::new(job));
    }

    /// Removes and returns the highest-priority job.
    pub fn pop(&mut self) -> Option<QueuedJob> {
        self.heap.pop()
    }

    /// Returns the number of queued jobs.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Returns true if no jobs are queued.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Removes all queued jobs.
    pub fn clear(&mut self) {
        self.heap.clear();
    }

    /// Cancels every queued job carrying the given request id.
    ///
    /// The jobs stay queued; workers skip them on pop. Returns the number
    /// of jobs cancelled.
    pub fn cancel(&mut self, request_id: RequestId) -> usize {
        let mut cancelled = 0;
        for queued in self.heap.iter() {
            if queued.job.request_id == request_id && !queued.job.cancellation.is_cancelled() {
                queued.job.cancellation.cancel();
                cancelled += 1;
            }
        }
        cancelled
    }
}
