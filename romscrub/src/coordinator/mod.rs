//! Request coordination for interactive offset scrubbing.
//!
//! The coordinator is the single owner of all preview scheduling state. It
//! runs as one actor task; hosts talk to it through a cloneable command
//! handle and consume results from an event channel, so no UI thread ever
//! blocks on cache or decode work.
//!
//! # Architecture
//!
//! ```text
//!  Host (UI / CLI)
//!    │ commands                         ▲ PreviewEvent
//!    ▼                                  │
//!  PreviewCoordinator ──mpsc──► CoordinatorActor
//!                                 │  drag state machine
//!                                 │  debounce + settle deadlines
//!                                 │  TieredCache (memory → persistent)
//!                                 ▼
//!                              DecodePool ──outcomes──► (same actor)
//! ```
//!
//! A request first runs the tiered lookup synchronously: a cached frame is
//! delivered immediately, regardless of drag state. Only a full miss is
//! debounced - one frame (16 ms) while a drag is in progress so the preview
//! tracks the handle, 200 ms otherwise so a settled position gets one
//! high-quality pass. Only the newest missed offset survives the window.
//!
//! Completions are filtered by request id: a decode whose (possibly
//! re-bound) request id trails the newest issued id by more than the
//! configured lag is discarded without touching the caches.
//!
//! # Example
//!
//! ```ignore
//! let decoder = Arc::new(RawTileDecoder::open("game.smc")?);
//! let (coordinator, mut events) = PreviewCoordinator::spawn(
//!     PreviewConfig::default(),
//!     SourceId::new("game.smc"),
//!     decoder,
//!     Some(Arc::new(DiskCache::new(cache_dir))),
//! );
//!
//! coordinator.press_start();
//! coordinator.request_preview(0x200000);
//! while let Some(event) = events.recv().await {
//!     match event {
//!         PreviewEvent::Cached(frame) | PreviewEvent::Ready(frame) => show(frame),
//!         PreviewEvent::Error(message) => status(message),
//!         PreviewEvent::DragStateChanged(state) => cursor(state),
//!     }
//! }
//! ```

mod drag;

pub use drag::{DragState, DragStateMachine};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cache::{CacheKey, PersistentCache, TieredCache};
use crate::config::PreviewConfig;
use crate::decoder::Decoder;
use crate::metrics::PreviewMetrics;
use crate::pool::{DecodeJob, DecodeJobResult, DecodeOutcome, DecodePool};
use crate::preview::{PreviewEvent, RequestId, SourceId};

/// Priority for previews requested mid-drag. Kept low so a settle or
/// manual request queued behind a drag burst jumps the line.
const PRIORITY_DRAG: u8 = 1;

/// Priority for settle-window and manual requests.
const PRIORITY_SETTLE: u8 = 10;

/// Commands accepted by the coordinator actor.
#[derive(Debug)]
enum Command {
    /// Debounced preview request for an offset, with a caller priority
    /// floor.
    Request { offset: u64, priority: u8 },
    /// Immediate high-priority request, bypassing the debounce window.
    ManualRequest { offset: u64 },
    /// The scrub handle was grabbed.
    PressStart,
    /// The scrub handle was released.
    ReleaseEnd,
    /// Drop the pending offset and cancel all in-flight decodes.
    CancelPending,
    /// Switch to a different source, invalidating the memory tier.
    SetSource(SourceId),
    /// Stop the actor and the decode pool.
    Cleanup,
}

/// Handle for submitting preview requests to the coordinator actor.
///
/// All methods are non-blocking; results arrive on the event channel
/// returned by [`PreviewCoordinator::spawn`].
pub struct PreviewCoordinator {
    commands: mpsc::UnboundedSender<Command>,
    metrics: Arc<PreviewMetrics>,
    actor: JoinHandle<()>,
}

impl PreviewCoordinator {
    /// Spawns the coordinator actor and its decode pool.
    ///
    /// Pass `None` for `persistent` to run with the memory tier only.
    pub fn spawn(
        config: PreviewConfig,
        source: SourceId,
        decoder: Arc<dyn Decoder>,
        persistent: Option<Arc<dyn PersistentCache>>,
    ) -> (Self, mpsc::UnboundedReceiver<PreviewEvent>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();

        let metrics = Arc::new(PreviewMetrics::new());
        let pool = DecodePool::new(config.pool_size, decoder, outcome_tx);
        let cache = TieredCache::new(config.memory_capacity, persistent);

        let actor = CoordinatorActor {
            config,
            source,
            cache,
            pool,
            metrics: Arc::clone(&metrics),
            drag: DragStateMachine::new(),
            commands: command_rx,
            outcomes: outcome_rx,
            events: event_tx,
            next_id: 0,
            next_job_id: 0,
            latest: RequestId::new(0),
            target: None,
            settle_deadline: None,
            in_flight: HashMap::new(),
        };
        let actor = tokio::spawn(actor.run());

        (
            Self {
                commands: command_tx,
                metrics,
                actor,
            },
            event_rx,
        )
    }

    /// Requests a preview for `offset`, debounced by the current drag state.
    pub fn request_preview(&self, offset: u64) {
        self.request_with_priority(offset, 0);
    }

    /// Like [`request_preview`](Self::request_preview) with an explicit
    /// priority floor. The dispatch priority is the higher of the hint and
    /// the drag-state default.
    pub fn request_with_priority(&self, offset: u64, priority: u8) {
        self.send(Command::Request { offset, priority });
    }

    /// Requests a preview immediately, skipping the debounce window.
    pub fn request_manual(&self, offset: u64) {
        self.send(Command::ManualRequest { offset });
    }

    /// Notifies the coordinator that the scrub handle was grabbed.
    pub fn press_start(&self) {
        self.send(Command::PressStart);
    }

    /// Notifies the coordinator that the scrub handle was released.
    pub fn release_end(&self) {
        self.send(Command::ReleaseEnd);
    }

    /// Drops any pending debounced request and cancels in-flight decodes.
    pub fn cancel_pending(&self) {
        self.send(Command::CancelPending);
    }

    /// Switches to a different source. Cancels pending work and drops the
    /// memory tier; the persistent tier keeps entries for all sources.
    pub fn set_source(&self, source: SourceId) {
        self.send(Command::SetSource(source));
    }

    /// Stops the actor and the decode pool. Queued jobs are dropped.
    pub fn shutdown(&self) {
        self.send(Command::Cleanup);
    }

    /// The live metrics recorder shared with the actor.
    pub fn metrics(&self) -> Arc<PreviewMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Waits for the actor task to finish (after [`shutdown`](Self::shutdown)).
    pub async fn join(self) {
        let _ = self.actor.await;
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            warn!("preview coordinator stopped, command dropped");
        }
    }
}

/// Missed offset waiting for its debounce window to elapse.
struct PendingTarget {
    offset: u64,
    priority: u8,
    deadline: Instant,
    request_id: RequestId,
}

/// Bookkeeping for a decode handed to the pool.
///
/// `request_id` is re-bound when a newer request lands on the same key, so
/// the eventual completion is judged for staleness as the newest request
/// it satisfies.
struct InFlight {
    request_id: RequestId,
    job_id: u64,
    token: CancellationToken,
    started: Instant,
}

struct CoordinatorActor {
    config: PreviewConfig,
    source: SourceId,
    cache: TieredCache,
    pool: DecodePool,
    metrics: Arc<PreviewMetrics>,
    drag: DragStateMachine,
    commands: mpsc::UnboundedReceiver<Command>,
    outcomes: mpsc::UnboundedReceiver<DecodeOutcome>,
    events: mpsc::UnboundedSender<PreviewEvent>,
    next_id: u64,
    next_job_id: u64,
    latest: RequestId,
    target: Option<PendingTarget>,
    settle_deadline: Option<Instant>,
    in_flight: HashMap<CacheKey, InFlight>,
}

impl CoordinatorActor {
    async fn run(mut self) {
        debug!(source = %self.source, "preview coordinator started");
        loop {
            let debounce_at = self.target.as_ref().map(|t| t.deadline);
            let settle_at = self.settle_deadline;

            tokio::select! {
                biased;

                command = self.commands.recv() => {
                    match command {
                        Some(Command::Cleanup) | None => break,
                        Some(command) => self.handle_command(command).await,
                    }
                }

                outcome = self.outcomes.recv() => {
                    if let Some(outcome) = outcome {
                        self.handle_outcome(outcome).await;
                    }
                }

                _ = sleep_until(debounce_at.unwrap_or_else(far_future)),
                    if debounce_at.is_some() =>
                {
                    self.fire_debounce().await;
                }

                _ = sleep_until(settle_at.unwrap_or_else(far_future)),
                    if settle_at.is_some() =>
                {
                    self.fire_settle();
                }
            }
        }

        self.cancel_all();
        self.pool.shutdown();
        debug!("preview coordinator stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Request { offset, priority } => {
                self.handle_request(offset, priority).await;
            }
            Command::ManualRequest { offset } => {
                self.handle_manual_request(offset).await;
            }
            Command::PressStart => {
                self.settle_deadline = None;
                if self.drag.press_start() {
                    self.emit(PreviewEvent::DragStateChanged(self.drag.state()));
                }
            }
            Command::ReleaseEnd => {
                if self.drag.release_end() {
                    self.emit(PreviewEvent::DragStateChanged(self.drag.state()));
                    self.settle_deadline = Some(Instant::now() + self.config.settle_timeout);
                    // The offset the drag ended on gets the long window and
                    // settle priority: one high-quality pass, not a burst.
                    if let Some(target) = self.target.as_mut() {
                        target.priority = PRIORITY_SETTLE;
                        target.deadline = Instant::now() + self.config.settle_debounce;
                    }
                }
            }
            Command::CancelPending => {
                self.cancel_all();
            }
            Command::SetSource(source) => {
                debug!(old = %self.source, new = %source, "source changed");
                self.cancel_all();
                self.cache.clear();
                self.source = source;
            }
            Command::Cleanup => unreachable!("handled in run loop"),
        }
    }

    /// Runs a debounced preview request: synchronous tiered lookup first,
    /// debounce only on a full miss. Allocates the request id the eventual
    /// completion is judged against.
    async fn handle_request(&mut self, offset: u64, priority_hint: u8) {
        let (delay, state_priority) = if self.drag.is_dragging() {
            (self.config.drag_debounce, PRIORITY_DRAG)
        } else {
            (self.config.settle_debounce, PRIORITY_SETTLE)
        };
        let priority = priority_hint.max(state_priority);

        let request_id = self.allocate_id();
        let key = CacheKey::new(self.source.clone(), offset);
        let started = Instant::now();
        debug!(request = %request_id, key = %key, "preview requested");

        if self.try_serve_cached(&key, started).await {
            return;
        }

        // Trailing-edge debounce: the newest missed offset replaces the
        // pending one and restarts the window.
        self.target = Some(PendingTarget {
            offset,
            priority,
            deadline: Instant::now() + delay,
            request_id,
        });
    }

    /// Manual requests skip the debounce window entirely.
    async fn handle_manual_request(&mut self, offset: u64) {
        let request_id = self.allocate_id();
        let key = CacheKey::new(self.source.clone(), offset);
        let started = Instant::now();
        debug!(request = %request_id, key = %key, "manual preview requested");

        if self.try_serve_cached(&key, started).await {
            return;
        }
        self.dispatch(key, request_id, PRIORITY_SETTLE);
    }

    async fn fire_debounce(&mut self) {
        let Some(target) = self.target.take() else {
            return;
        };
        let key = CacheKey::new(self.source.clone(), target.offset);

        // A completion for this key may have landed while the window was
        // open; serve it instead of decoding again. Not counted as a
        // lookup - the request was already tallied when it arrived.
        if let Some(frame) = self.cache.get_memory(&key) {
            self.emit(PreviewEvent::Cached(frame));
            return;
        }
        self.dispatch(key, target.request_id, target.priority);
    }

    fn fire_settle(&mut self) {
        self.settle_deadline = None;
        if self.drag.settle_timeout() {
            self.emit(PreviewEvent::DragStateChanged(self.drag.state()));
        }
    }

    fn allocate_id(&mut self) -> RequestId {
        self.next_id += 1;
        let id = RequestId::new(self.next_id);
        self.latest = id;
        id
    }

    /// Synchronous tiered lookup. Returns true when the request was served
    /// from a cache tier.
    async fn try_serve_cached(&mut self, key: &CacheKey, started: Instant) -> bool {
        if let Some(frame) = self.cache.get_memory(key) {
            self.metrics.record_memory_hit();
            self.metrics.record_response_time(started.elapsed());
            self.emit(PreviewEvent::Cached(frame));
            return true;
        }
        self.metrics.record_memory_miss();

        if self.cache.has_persistent_tier() {
            if let Some(frame) = self.cache.get_persistent(key).await {
                self.metrics.record_persistent_hit();
                self.metrics.record_response_time(started.elapsed());
                self.emit(PreviewEvent::Ready(frame));
                return true;
            }
            self.metrics.record_persistent_miss();
        }
        false
    }

    /// Hands a missed key to the pool, merging into an in-flight decode
    /// for the same key instead of submitting a duplicate. Re-binding the
    /// id keeps the eventual completion fresh relative to this request.
    fn dispatch(&mut self, key: CacheKey, request_id: RequestId, priority: u8) {
        if let Some(in_flight) = self.in_flight.get_mut(&key) {
            debug!(request = %request_id, key = %key, "merged into in-flight decode");
            in_flight.request_id = request_id;
            return;
        }

        self.next_job_id += 1;
        let job_id = self.next_job_id;
        let token = CancellationToken::new();
        self.in_flight.insert(
            key.clone(),
            InFlight {
                request_id,
                job_id,
                token: token.clone(),
                started: Instant::now(),
            },
        );
        self.pool.submit(DecodeJob {
            job_id,
            request_id,
            key,
            priority,
            cancellation: token,
        });
    }

    async fn handle_outcome(&mut self, outcome: DecodeOutcome) {
        // No entry means the decode was cancelled or superseded; its result
        // is dropped without touching caches or metrics.
        let Some(in_flight) = self.in_flight.remove(&outcome.key) else {
            debug!(key = %outcome.key, "dropping outcome for cancelled decode");
            return;
        };

        // The entry under this key may belong to a newer dispatch: after a
        // cancel, a fresh request for the same offset re-enters the table
        // while the old job's outcome is still in the channel. Only the
        // entry's own job may consume it.
        if in_flight.job_id != outcome.job_id {
            self.in_flight.insert(outcome.key.clone(), in_flight);
            debug!(key = %outcome.key, "dropping outcome from superseded job");
            return;
        }

        match outcome.result {
            DecodeJobResult::Cancelled => {}
            DecodeJobResult::Failed(error) => {
                warn!(key = %outcome.key, error = %error, "decode failed");
                self.emit(PreviewEvent::Error(error.to_string()));
            }
            DecodeJobResult::Decoded(frame) => {
                let lag = in_flight.request_id.lag_behind(self.latest);
                if lag > self.config.stale_lag {
                    debug!(
                        request = %in_flight.request_id,
                        latest = %self.latest,
                        lag,
                        "dropping stale decode result"
                    );
                    self.metrics.record_stale_drop();
                    return;
                }

                self.metrics.record_decode();
                self.cache.put(&outcome.key, frame.clone(), true).await;
                self.metrics
                    .record_response_time(in_flight.started.elapsed());
                self.emit(PreviewEvent::Ready(frame));
            }
        }
    }

    fn cancel_all(&mut self) {
        self.target = None;
        for (key, in_flight) in self.in_flight.drain() {
            in_flight.token.cancel();
            self.pool.cancel(in_flight.request_id);
            debug!(key = %key, request = %in_flight.request_id, "cancelled decode");
        }
    }

    fn emit(&self, event: PreviewEvent) {
        if self.events.send(event).is_err() {
            debug!("event receiver dropped");
        }
    }
}

fn far_future() -> Instant {
    Instant::now() + Duration::from_secs(86_400 * 365)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::DecodeError;
    use crate::preview::{BoxFuture, PreviewFrame};
    use parking_lot::Mutex;
    use std::collections::{HashMap, HashSet};
    use tokio::time::sleep;

    /// Decoder with per-offset delays and failures, all on the tokio clock
    /// so paused-time tests stay deterministic.
    struct ScriptedDecoder {
        calls: Mutex<Vec<u64>>,
        delays: HashMap<u64, Duration>,
        failures: HashSet<u64>,
        base_delay: Duration,
    }

    impl ScriptedDecoder {
        fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                delays: HashMap::new(),
                failures: HashSet::new(),
                base_delay: Duration::from_millis(1),
            }
        }

        fn slow_at(mut self, offset: u64, delay: Duration) -> Self {
            self.delays.insert(offset, delay);
            self
        }

        fn failing_at(mut self, offset: u64) -> Self {
            self.failures.insert(offset);
            self
        }

        fn calls(&self) -> Vec<u64> {
            self.calls.lock().clone()
        }
    }

    impl Decoder for ScriptedDecoder {
        fn decode<'a>(
            &'a self,
            _source: &'a SourceId,
            offset: u64,
        ) -> BoxFuture<'a, Result<PreviewFrame, DecodeError>> {
            Box::pin(async move {
                self.calls.lock().push(offset);
                let delay = self.delays.get(&offset).copied().unwrap_or(self.base_delay);
                sleep(delay).await;
                if self.failures.contains(&offset) {
                    return Err(DecodeError::Other(format!("scripted failure at {offset:#x}")));
                }
                Ok(PreviewFrame::new(
                    vec![0x11u8; 8],
                    4,
                    2,
                    format!("manual_0x{offset:06X}"),
                ))
            })
        }
    }

    fn spawn_with(
        decoder: ScriptedDecoder,
    ) -> (
        Arc<ScriptedDecoder>,
        PreviewCoordinator,
        mpsc::UnboundedReceiver<PreviewEvent>,
    ) {
        spawn_with_config(decoder, PreviewConfig::default())
    }

    fn spawn_with_config(
        decoder: ScriptedDecoder,
        config: PreviewConfig,
    ) -> (
        Arc<ScriptedDecoder>,
        PreviewCoordinator,
        mpsc::UnboundedReceiver<PreviewEvent>,
    ) {
        let decoder = Arc::new(decoder);
        let (coordinator, events) = PreviewCoordinator::spawn(
            config,
            SourceId::new("rom.bin"),
            Arc::clone(&decoder) as Arc<dyn Decoder>,
            None,
        );
        (decoder, coordinator, events)
    }

    fn drain(events: &mut mpsc::UnboundedReceiver<PreviewEvent>) -> Vec<PreviewEvent> {
        let mut out = Vec::new();
        while let Ok(event) = events.try_recv() {
            out.push(event);
        }
        out
    }

    fn frames(events: &[PreviewEvent]) -> Vec<&PreviewFrame> {
        events
            .iter()
            .filter_map(|event| match event {
                PreviewEvent::Cached(frame) | PreviewEvent::Ready(frame) => Some(frame),
                _ => None,
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_drag_burst_coalesces_to_newest_offset() {
        let (decoder, coordinator, mut events) = spawn_with(ScriptedDecoder::new());

        coordinator.press_start();
        coordinator.request_preview(0x1000);
        coordinator.request_preview(0x2000);
        coordinator.request_preview(0x3000);

        sleep(Duration::from_millis(100)).await;

        assert_eq!(decoder.calls(), vec![0x3000]);
        let received = drain(&mut events);
        assert!(matches!(
            received[0],
            PreviewEvent::DragStateChanged(DragState::Dragging)
        ));
        let delivered = frames(&received);
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].label, "manual_0x003000");
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_request_uses_long_debounce() {
        let (decoder, coordinator, mut events) = spawn_with(ScriptedDecoder::new());

        coordinator.request_preview(0x1000);

        // Well past the drag window but inside the settle window: nothing
        // has fired yet.
        sleep(Duration::from_millis(100)).await;
        assert!(decoder.calls().is_empty());
        assert!(drain(&mut events).is_empty());

        sleep(Duration::from_millis(150)).await;
        assert_eq!(decoder.calls(), vec![0x1000]);
        assert!(matches!(drain(&mut events)[0], PreviewEvent::Ready(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeat_request_hits_memory_tier() {
        let (decoder, coordinator, mut events) = spawn_with(ScriptedDecoder::new());

        coordinator.request_preview(0x1000);
        sleep(Duration::from_millis(250)).await;
        coordinator.request_preview(0x1000);
        sleep(Duration::from_millis(250)).await;

        let received = drain(&mut events);
        assert!(matches!(received[0], PreviewEvent::Ready(_)));
        assert!(matches!(received[1], PreviewEvent::Cached(_)));
        assert_eq!(decoder.calls().len(), 1);

        let snap = coordinator.metrics().snapshot();
        assert_eq!(snap.memory_hits, 1);
        assert_eq!(snap.memory_misses, 1);
        assert_eq!(snap.decodes, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_memory_hit_bypasses_debounce() {
        let (_, coordinator, mut events) = spawn_with(ScriptedDecoder::new());

        coordinator.request_preview(0x1000);
        sleep(Duration::from_millis(250)).await;
        drain(&mut events);

        // The cached repeat is served synchronously, far inside the
        // 200 ms window.
        coordinator.request_preview(0x1000);
        sleep(Duration::from_millis(5)).await;
        let received = drain(&mut events);
        assert!(matches!(received[0], PreviewEvent::Cached(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_completion_is_dropped() {
        let decoder = ScriptedDecoder::new().slow_at(0xAAAA, Duration::from_secs(10));
        let (decoder, coordinator, mut events) = spawn_with(decoder);

        // Slow decode dispatched first.
        coordinator.request_preview(0xAAAA);
        sleep(Duration::from_millis(250)).await;

        // Three newer requests push the latest id out of the lag window
        // while the slow decode is still running.
        for _ in 0..3 {
            coordinator.request_preview(0xBBBB);
            sleep(Duration::from_millis(250)).await;
        }

        // Let the slow decode finish.
        sleep(Duration::from_secs(15)).await;

        let received = drain(&mut events);
        for frame in frames(&received) {
            assert_eq!(frame.label, "manual_0x00BBBB");
        }

        let snap = coordinator.metrics().snapshot();
        assert_eq!(snap.stale_drops, 1);
        assert_eq!(snap.decodes, 1);
        assert_eq!(decoder.calls(), vec![0xAAAA, 0xBBBB]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_completion_within_lag_window_is_kept() {
        let decoder = ScriptedDecoder::new().slow_at(0xAAAA, Duration::from_secs(1));
        let (_, coordinator, mut events) = spawn_with(decoder);

        coordinator.request_preview(0xAAAA);
        sleep(Duration::from_millis(250)).await;

        // One newer request: lag of 1, inside the default window of 2.
        coordinator.request_preview(0xBBBB);
        sleep(Duration::from_secs(2)).await;

        let received = drain(&mut events);
        let labels: Vec<_> = frames(&received).iter().map(|f| f.label.clone()).collect();
        assert!(labels.contains(&"manual_0x00AAAA".to_string()));
        assert!(labels.contains(&"manual_0x00BBBB".to_string()));
        assert_eq!(coordinator.metrics().snapshot().stale_drops, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_key_requests_merge_into_one_decode() {
        let decoder = ScriptedDecoder::new().slow_at(0x1000, Duration::from_secs(5));
        let (decoder, coordinator, mut events) = spawn_with(decoder);

        coordinator.request_preview(0x1000);
        sleep(Duration::from_millis(250)).await;
        coordinator.request_preview(0x1000);
        sleep(Duration::from_millis(250)).await;

        sleep(Duration::from_secs(6)).await;

        assert_eq!(decoder.calls(), vec![0x1000]);
        let received = drain(&mut events);
        assert_eq!(frames(&received).len(), 1);

        // The merged completion is judged against the re-bound id, so it is
        // not stale even though the original id now lags.
        let snap = coordinator.metrics().snapshot();
        assert_eq!(snap.stale_drops, 0);
        assert_eq!(snap.decodes, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_pending_suppresses_everything() {
        let (decoder, coordinator, mut events) = spawn_with(ScriptedDecoder::new());

        coordinator.request_preview(0x1000);
        coordinator.cancel_pending();
        sleep(Duration::from_secs(1)).await;

        assert!(decoder.calls().is_empty());
        assert!(drain(&mut events).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_pending_drops_in_flight_result() {
        let decoder = ScriptedDecoder::new().slow_at(0x1000, Duration::from_secs(5));
        let (_, coordinator, mut events) = spawn_with(decoder);

        coordinator.request_preview(0x1000);
        sleep(Duration::from_millis(250)).await;
        coordinator.cancel_pending();
        sleep(Duration::from_secs(6)).await;

        // The decode ran to completion but its result never surfaced.
        assert!(drain(&mut events).is_empty());
        assert_eq!(coordinator.metrics().snapshot().decodes, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_pending_is_idempotent() {
        let (decoder, coordinator, mut events) = spawn_with(ScriptedDecoder::new());

        // Cancelling with nothing pending is a no-op.
        coordinator.cancel_pending();

        coordinator.request_preview(0x1000);
        coordinator.cancel_pending();
        coordinator.cancel_pending();
        sleep(Duration::from_secs(1)).await;

        assert!(decoder.calls().is_empty());
        assert!(drain(&mut events).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reissued_request_survives_cancelled_predecessor() {
        let decoder = ScriptedDecoder::new().slow_at(0xAAAA, Duration::from_secs(10));
        let (_, coordinator, mut events) =
            spawn_with_config(decoder, PreviewConfig::default().with_pool_size(1));

        // Slow decode occupies the lone worker; the second key queues
        // behind it.
        coordinator.request_preview(0xAAAA);
        sleep(Duration::from_millis(250)).await;
        coordinator.request_preview(0xBBBB);
        sleep(Duration::from_millis(250)).await;

        coordinator.cancel_pending();

        // Fresh request for the queued key, issued after the cancel.
        coordinator.request_preview(0xBBBB);
        sleep(Duration::from_millis(250)).await;

        sleep(Duration::from_secs(15)).await;

        // The old queued job's cancellation must not swallow the re-issued
        // request: its frame is delivered.
        let received = drain(&mut events);
        let labels: Vec<_> = frames(&received).iter().map(|f| f.label.clone()).collect();
        assert!(
            labels.contains(&"manual_0x00BBBB".to_string()),
            "re-issued request was not delivered: {labels:?}"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_priority_hint_raises_dispatch_order() {
        let decoder = ScriptedDecoder::new().slow_at(0xAAAA, Duration::from_secs(10));
        let (decoder, coordinator, _events) =
            spawn_with_config(decoder, PreviewConfig::default().with_pool_size(1));

        coordinator.press_start();
        coordinator.request_preview(0xAAAA);
        sleep(Duration::from_millis(100)).await;
        coordinator.request_preview(0xBBBB);
        sleep(Duration::from_millis(100)).await;
        coordinator.request_with_priority(0xCCCC, 10);
        sleep(Duration::from_millis(100)).await;

        sleep(Duration::from_secs(15)).await;

        // The hinted request jumps the drag-priority job in the queue.
        assert_eq!(decoder.calls(), vec![0xAAAA, 0xCCCC, 0xBBBB]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_request_bypasses_debounce() {
        let (decoder, coordinator, mut events) = spawn_with(ScriptedDecoder::new());

        coordinator.request_manual(0x4000);
        sleep(Duration::from_millis(10)).await;

        // Delivered long before the 200 ms settle window would elapse.
        assert_eq!(decoder.calls(), vec![0x4000]);
        assert!(matches!(drain(&mut events)[0], PreviewEvent::Ready(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_settles_then_returns_to_idle() {
        let (_, coordinator, mut events) = spawn_with(ScriptedDecoder::new());

        coordinator.press_start();
        coordinator.request_preview(0x1000);
        coordinator.release_end();
        sleep(Duration::from_secs(1)).await;

        let received = drain(&mut events);
        let states: Vec<_> = received
            .iter()
            .filter_map(|event| match event {
                PreviewEvent::DragStateChanged(state) => Some(*state),
                _ => None,
            })
            .collect();
        assert_eq!(
            states,
            vec![DragState::Dragging, DragState::Settling, DragState::Idle]
        );
        assert_eq!(frames(&received).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_regrab_during_settle_cancels_idle_transition() {
        let (_, coordinator, mut events) = spawn_with(ScriptedDecoder::new());

        coordinator.press_start();
        coordinator.release_end();
        sleep(Duration::from_millis(300)).await;
        coordinator.press_start();
        sleep(Duration::from_secs(1)).await;

        let states: Vec<_> = drain(&mut events)
            .iter()
            .filter_map(|event| match event {
                PreviewEvent::DragStateChanged(state) => Some(*state),
                _ => None,
            })
            .collect();
        // No Idle: the re-grab cleared the settle deadline.
        assert_eq!(
            states,
            vec![DragState::Dragging, DragState::Settling, DragState::Dragging]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_decode_failure_reports_error_and_recovers() {
        let decoder = ScriptedDecoder::new().failing_at(0xDEAD);
        let (_, coordinator, mut events) = spawn_with(decoder);

        coordinator.request_preview(0xDEAD);
        sleep(Duration::from_millis(250)).await;
        assert!(matches!(drain(&mut events)[0], PreviewEvent::Error(_)));

        coordinator.request_preview(0x1000);
        sleep(Duration::from_millis(250)).await;
        assert!(matches!(drain(&mut events)[0], PreviewEvent::Ready(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_source_invalidates_memory_tier() {
        let (decoder, coordinator, mut events) = spawn_with(ScriptedDecoder::new());

        coordinator.request_preview(0x1000);
        sleep(Duration::from_millis(250)).await;

        coordinator.set_source(SourceId::new("other.bin"));
        coordinator.request_preview(0x1000);
        sleep(Duration::from_millis(250)).await;

        // Same offset decoded again: no Cached event after the switch.
        assert_eq!(decoder.calls(), vec![0x1000, 0x1000]);
        let received = drain(&mut events);
        assert!(received
            .iter()
            .all(|event| !matches!(event, PreviewEvent::Cached(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_actor() {
        let (_, coordinator, _events) = spawn_with(ScriptedDecoder::new());
        coordinator.shutdown();
        coordinator.join().await;
    }
}
