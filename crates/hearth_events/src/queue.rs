//! # Prioritized Event Queue
//!
//! Deferred publication in three FIFO tiers.
//!
//! ```text
//!   enqueue ──> [ High   ] ─┐
//!   enqueue ──> [ Normal ] ─┼──> process_pending / EventDispatcher ──> EventBus
//!   enqueue ──> [ Low    ] ─┘         (always drains the highest
//!                                      non-empty tier first)
//! ```
//!
//! Critical and High events share the `High` tier. The highest non-empty
//! tier is re-checked before every event, so a steady stream of high-priority
//! traffic starves the lower tiers. There is no anti-starvation mechanism.
//!
//! The dispatcher thread sleeps on a condition variable and is woken by
//! `enqueue`; `idle_wait_ms` only bounds how long it takes to notice a
//! cancellation.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};

use crate::bus::{DispatchOutcome, EventBus};
use crate::error::{EventError, EventResult};
use crate::event::{Event, EventPriority};

/// Configuration for [`PrioritizedEventQueue`] and [`EventDispatcher`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventQueueConfig {
    /// Maximum events per tier. 0 means unbounded.
    pub capacity: usize,
    /// Longest the dispatcher sleeps before re-checking cancellation (ms).
    pub idle_wait_ms: u64,
    /// Events drained per dispatcher wake-up.
    pub batch_size: usize,
}

impl Default for EventQueueConfig {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            idle_wait_ms: 10,
            batch_size: 64,
        }
    }
}

impl EventQueueConfig {
    /// Longest the dispatcher sleeps before re-checking cancellation.
    #[must_use]
    pub const fn idle_wait(&self) -> Duration {
        Duration::from_millis(self.idle_wait_ms)
    }
}

/// Queue tier, highest first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum QueueTier {
    /// Critical and High events.
    High,
    /// Normal events.
    Normal,
    /// Low events.
    Low,
}

impl QueueTier {
    /// All tiers in drain order.
    pub const ALL: [Self; 3] = [Self::High, Self::Normal, Self::Low];

    /// Tier an event of `priority` is queued in.
    #[must_use]
    pub const fn from_priority(priority: EventPriority) -> Self {
        match priority {
            EventPriority::Critical | EventPriority::High => Self::High,
            EventPriority::Normal => Self::Normal,
            EventPriority::Low => Self::Low,
        }
    }

    const fn index(self) -> usize {
        match self {
            Self::High => 0,
            Self::Normal => 1,
            Self::Low => 2,
        }
    }
}

type Dispatch = Box<dyn FnOnce(&EventBus) -> DispatchOutcome + Send>;

#[derive(Default)]
struct Tiers {
    queues: [VecDeque<Dispatch>; 3],
    disposed: bool,
}

impl Tiers {
    fn len(&self) -> usize {
        self.queues.iter().map(VecDeque::len).sum()
    }

    fn pop_highest(&mut self) -> Option<Dispatch> {
        self.queues.iter_mut().find_map(VecDeque::pop_front)
    }
}

/// Three-tier FIFO queue of events waiting to be published.
pub struct PrioritizedEventQueue {
    config: EventQueueConfig,
    tiers: Mutex<Tiers>,
    not_empty: Condvar,
    enqueued: AtomicU64,
    processed: AtomicU64,
    dispatching: AtomicBool,
}

impl PrioritizedEventQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new(config: EventQueueConfig) -> Self {
        Self {
            config,
            tiers: Mutex::new(Tiers::default()),
            not_empty: Condvar::new(),
            enqueued: AtomicU64::new(0),
            processed: AtomicU64::new(0),
            dispatching: AtomicBool::new(false),
        }
    }

    /// The queue's configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &EventQueueConfig {
        &self.config
    }

    /// Queues `event` in the tier matching its priority.
    ///
    /// # Errors
    ///
    /// `QueueDisposed` after [`dispose`](Self::dispose), `QueueFull` if the
    /// tier is bounded and at capacity.
    pub fn enqueue<E: Event>(&self, event: E) -> EventResult<QueueTier> {
        let tier = QueueTier::from_priority(event.priority());
        let capacity = self.config.capacity;

        let mut tiers = self.tiers.lock();
        if tiers.disposed {
            return Err(EventError::QueueDisposed);
        }
        let queue = &mut tiers.queues[tier.index()];
        if capacity > 0 && queue.len() >= capacity {
            tracing::warn!(target: "hearth::queue", event = E::event_name(), ?tier, capacity, "event queue tier full");
            return Err(EventError::QueueFull { capacity });
        }
        queue.push_back(Box::new(move |bus: &EventBus| bus.publish(event)));
        self.enqueued.fetch_add(1, Ordering::Relaxed);
        self.not_empty.notify_one();
        Ok(tier)
    }

    /// Publishes up to `max` queued events on the calling thread, highest
    /// tier first. Returns the number published.
    pub fn process_pending(&self, bus: &EventBus, max: usize) -> usize {
        let mut count = 0;
        while count < max {
            // Lock released before the handlers run.
            let Some(dispatch) = self.tiers.lock().pop_highest() else {
                break;
            };
            let outcome = dispatch(bus);
            if !outcome.is_clean() {
                tracing::debug!(target: "hearth::queue", failed = outcome.failed, "queued event had failing handlers");
            }
            count += 1;
        }
        self.processed.fetch_add(count as u64, Ordering::Relaxed);
        count
    }

    /// Blocks until an event is queued, the queue is disposed, or `timeout`
    /// elapses. Returns `true` if events are waiting.
    pub fn wait_for_work(&self, timeout: Duration) -> bool {
        let mut tiers = self.tiers.lock();
        if tiers.len() == 0 && !tiers.disposed {
            self.not_empty.wait_for(&mut tiers, timeout);
        }
        tiers.len() > 0
    }

    fn wake_all(&self) {
        let _tiers = self.tiers.lock();
        self.not_empty.notify_all();
    }

    /// Rejects further events and drops the pending ones. Returns the number
    /// dropped. Idempotent.
    pub fn dispose(&self) -> usize {
        let mut tiers = self.tiers.lock();
        if tiers.disposed {
            return 0;
        }
        tiers.disposed = true;
        let dropped = tiers.len();
        for queue in &mut tiers.queues {
            queue.clear();
        }
        self.not_empty.notify_all();
        tracing::debug!(target: "hearth::queue", dropped, "event queue disposed");
        dropped
    }

    /// True after [`dispose`](Self::dispose).
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.tiers.lock().disposed
    }

    /// Events waiting across all tiers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tiers.lock().len()
    }

    /// Events waiting in `tier`.
    #[must_use]
    pub fn len_tier(&self, tier: QueueTier) -> usize {
        self.tiers.lock().queues[tier.index()].len()
    }

    /// True if nothing is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Events accepted since creation.
    #[must_use]
    pub fn enqueued_count(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }

    /// Events published since creation.
    #[must_use]
    pub fn processed_count(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }
}

impl Default for PrioritizedEventQueue {
    fn default() -> Self {
        Self::new(EventQueueConfig::default())
    }
}

impl std::fmt::Debug for PrioritizedEventQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tiers = self.tiers.lock();
        f.debug_struct("PrioritizedEventQueue")
            .field("high", &tiers.queues[0].len())
            .field("normal", &tiers.queues[1].len())
            .field("low", &tiers.queues[2].len())
            .field("disposed", &tiers.disposed)
            .finish_non_exhaustive()
    }
}

/// Background thread draining a [`PrioritizedEventQueue`] into an
/// [`EventBus`].
///
/// At most one dispatcher runs per queue. Dropping the dispatcher cancels
/// and joins it. Events still queued at cancellation stay in the queue.
pub struct EventDispatcher {
    queue: Arc<PrioritizedEventQueue>,
    cancelled: Arc<AtomicBool>,
    handle: Option<JoinHandle<u64>>,
}

impl EventDispatcher {
    /// Spawns the dispatcher thread.
    ///
    /// # Errors
    ///
    /// `DispatcherRunning` if another dispatcher drains `queue`,
    /// `QueueDisposed` if it was disposed, `DispatcherSpawn` if the OS
    /// refused the thread.
    pub fn start(queue: Arc<PrioritizedEventQueue>, bus: Arc<EventBus>) -> EventResult<Self> {
        if queue.dispatching.swap(true, Ordering::AcqRel) {
            return Err(EventError::DispatcherRunning);
        }
        if queue.is_disposed() {
            queue.dispatching.store(false, Ordering::Release);
            return Err(EventError::QueueDisposed);
        }

        let cancelled = Arc::new(AtomicBool::new(false));
        let worker_queue = Arc::clone(&queue);
        let worker_cancelled = Arc::clone(&cancelled);

        let handle = thread::Builder::new()
            .name("hearth-event-dispatcher".into())
            .spawn(move || Self::run(&worker_queue, &bus, &worker_cancelled))
            .map_err(|e| {
                queue.dispatching.store(false, Ordering::Release);
                EventError::DispatcherSpawn(e.to_string())
            })?;

        tracing::info!(target: "hearth::queue", "event dispatcher started");
        Ok(Self {
            queue,
            cancelled,
            handle: Some(handle),
        })
    }

    fn run(queue: &PrioritizedEventQueue, bus: &EventBus, cancelled: &AtomicBool) -> u64 {
        let batch = queue.config.batch_size.max(1);
        let idle = queue.config.idle_wait();
        let mut total = 0_u64;

        loop {
            if cancelled.load(Ordering::Acquire) || queue.is_disposed() {
                break;
            }
            let drained = queue.process_pending(bus, batch);
            total += drained as u64;
            if drained == 0 {
                queue.wait_for_work(idle);
            }
        }

        tracing::info!(target: "hearth::queue", processed = total, "event processing cancelled");
        queue.dispatching.store(false, Ordering::Release);
        total
    }

    /// True while the thread is alive.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Cancels the dispatcher and waits for it. Returns the number of events
    /// it published.
    pub fn shutdown(mut self) -> u64 {
        self.stop()
    }

    fn stop(&mut self) -> u64 {
        let Some(handle) = self.handle.take() else {
            return 0;
        };
        self.cancelled.store(true, Ordering::Release);
        self.queue.wake_all();

        handle.join().unwrap_or_else(|_| {
            tracing::error!(target: "hearth::queue", "event dispatcher thread panicked");
            self.queue.dispatching.store(false, Ordering::Release);
            0
        })
    }
}

impl Drop for EventDispatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}
