//! Bounded decode worker pool.
//!
//! A small, fixed number of worker tasks pull jobs off a shared priority
//! queue and invoke the decoder off the interactive path. Workers are
//! reused across jobs rather than spawned per request - spawn/teardown
//! cost is significant relative to decode cost during a fast drag.
//!
//! # Architecture
//!
//! ```text
//! Coordinator ──Submit──► JobQueue (priority + FIFO)
//!                            │ pop
//!                     ┌──────┴──────┐
//!                  Worker 0      Worker 1      (fixed count)
//!                     │ decode       │ decode
//!                     └──────┬──────┘
//!                      DecodeOutcome ──channel──► Coordinator
//! ```
//!
//! Cancellation is cooperative: a queued job whose token is cancelled is
//! skipped on pop; a job already executing runs to completion (decoders
//! are opaque and not guaranteed to support interruption) and its result
//! is filtered by the coordinator instead.

mod queue;

pub use queue::{JobQueue, QueuedJob};

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cache::CacheKey;
use crate::decoder::{DecodeError, Decoder};
use crate::preview::{PreviewFrame, RequestId};

/// A single decode job.
#[derive(Debug)]
pub struct DecodeJob {
    /// Identity of this dispatch, echoed back on the outcome. Distinguishes
    /// an outcome from an earlier, cancelled job for the same key.
    pub job_id: u64,

    /// The request this job was created for (staleness filtering key).
    pub request_id: RequestId,

    /// Cache key identifying `(source, offset)`.
    pub key: CacheKey,

    /// Dispatch priority; higher values are dispatched first.
    pub priority: u8,

    /// Cooperative cancellation token.
    pub cancellation: CancellationToken,
}

/// Terminal state of a decode job.
#[derive(Debug)]
pub enum DecodeJobResult {
    /// The decoder produced a frame.
    Decoded(PreviewFrame),
    /// The decoder failed.
    Failed(DecodeError),
    /// The job was cancelled before a worker started it.
    Cancelled,
}

/// Completion message sent back to the coordinator.
#[derive(Debug)]
pub struct DecodeOutcome {
    /// Dispatch identity of the job that produced this outcome.
    pub job_id: u64,

    /// Id of the request the job was submitted under.
    pub request_id: RequestId,

    /// Cache key of the decoded offset.
    pub key: CacheKey,

    /// How the job ended.
    pub result: DecodeJobResult,
}

struct PoolShared {
    queue: Mutex<JobQueue>,
    notify: Notify,
    decoder: Arc<dyn Decoder>,
    outcome_tx: mpsc::UnboundedSender<DecodeOutcome>,
}

/// Fixed-size pool of decode workers.
pub struct DecodePool {
    shared: Arc<PoolShared>,
    workers: Vec<JoinHandle<()>>,
    shutdown: CancellationToken,
}

impl DecodePool {
    /// Spawns `size` worker tasks (at least one) draining the shared queue.
    ///
    /// Completions are delivered on `outcome_tx` in completion order, which
    /// is not guaranteed to match submission order across distinct offsets.
    pub fn new(
        size: usize,
        decoder: Arc<dyn Decoder>,
        outcome_tx: mpsc::UnboundedSender<DecodeOutcome>,
    ) -> Self {
        let shared = Arc::new(PoolShared {
            queue: Mutex::new(JobQueue::new()),
            notify: Notify::new(),
            decoder,
            outcome_tx,
        });
        let shutdown = CancellationToken::new();

        let size = size.max(1);
        let workers = (0..size)
            .map(|index| {
                let shared = Arc::clone(&shared);
                let shutdown = shutdown.clone();
                tokio::spawn(worker_loop(index, shared, shutdown))
            })
            .collect();

        debug!(workers = size, "decode pool started");
        Self {
            shared,
            workers,
            shutdown,
        }
    }

    /// Enqueues a job. When all workers are busy the job queues rather
    /// than spawning additional workers.
    pub fn submit(&self, job: DecodeJob) {
        if self.shutdown.is_cancelled() {
            warn!(request = %job.request_id, "submit after shutdown, dropping job");
            return;
        }
        debug!(request = %job.request_id, key = %job.key, priority = job.priority, "job queued");
        self.shared.queue.lock().push(job);
        self.shared.notify.notify_one();
    }

    /// Cancels any queued jobs for the given request id.
    ///
    /// Soft cancellation: an executing job finishes and its result is
    /// discarded downstream.
    pub fn cancel(&self, request_id: RequestId) {
        let cancelled = self.shared.queue.lock().cancel(request_id);
        if cancelled > 0 {
            debug!(request = %request_id, cancelled, "queued jobs cancelled");
        }
    }

    /// Returns the number of jobs waiting for a worker.
    pub fn queue_len(&self) -> usize {
        self.shared.queue.lock().len()
    }

    /// Stops all workers and drops queued jobs. Safe to call repeatedly.
    pub fn shutdown(&self) {
        if self.shutdown.is_cancelled() {
            return;
        }
        self.shutdown.cancel();
        self.shared.queue.lock().clear();
        self.shared.notify.notify_waiters();
        debug!("decode pool shut down");
    }

    /// Handles to the worker tasks, for tests that want to join them.
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }
}

impl Drop for DecodePool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn worker_loop(index: usize, shared: Arc<PoolShared>, shutdown: CancellationToken) {
    debug!(worker = index, "decode worker started");
    loop {
        let queued = shared.queue.lock().pop();

        let Some(queued) = queued else {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = shared.notify.notified() => continue,
            }
        };

        let wait = queued.wait_time();
        let job = queued.job;

        if job.cancellation.is_cancelled() {
            debug!(worker = index, request = %job.request_id, "skipping cancelled job");
            let _ = shared.outcome_tx.send(DecodeOutcome {
                job_id: job.job_id,
                request_id: job.request_id,
                key: job.key,
                result: DecodeJobResult::Cancelled,
            });
            continue;
        }

        debug!(
            worker = index,
            request = %job.request_id,
            key = %job.key,
            wait_ms = wait.as_millis() as u64,
            "decoding"
        );

        // Decoders are opaque: once started, the job runs to completion
        // even if it gets cancelled meanwhile. The coordinator drops the
        // result in that case.
        let result = match shared.decoder.decode(job.key.source(), job.key.offset()).await {
            Ok(frame) => DecodeJobResult::Decoded(frame),
            Err(e) => DecodeJobResult::Failed(e),
        };

        let _ = shared.outcome_tx.send(DecodeOutcome {
            job_id: job.job_id,
            request_id: job.request_id,
            key: job.key,
            result,
        });
    }
    debug!(worker = index, "decode worker stopped");
}
