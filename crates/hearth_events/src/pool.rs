//! # Event Pools
//!
//! Recycle event values instead of constructing a fresh one per publish.
//!
//! Each event type gets its own FIFO queue of released instances, bounded by
//! [`EventPoolConfig::max_pool_size`]. Instances returned to a full queue are
//! discarded and counted. Queues untouched for longer than
//! `cleanup_interval * eviction_multiplier` are evicted so a long-running
//! process does not accumulate pools for event types it stopped using.

use std::any::{Any, TypeId};
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::event::{Event, EventPriority};

/// Configuration for [`EventPool`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventPoolConfig {
    /// Released instances kept per event type.
    pub max_pool_size: usize,
    /// Minimum time between two idle sweeps (seconds).
    pub cleanup_interval_secs: u64,
    /// A queue idle for more than `multiplier * interval` is evicted.
    pub eviction_multiplier: u32,
}

impl Default for EventPoolConfig {
    fn default() -> Self {
        Self {
            max_pool_size: 100,
            cleanup_interval_secs: 300,
            eviction_multiplier: 2,
        }
    }
}

impl EventPoolConfig {
    /// Minimum time between two idle sweeps.
    #[must_use]
    pub const fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    /// Idle time after which a queue is evicted. Saturates at
    /// [`Duration::MAX`].
    #[must_use]
    pub fn eviction_threshold(&self) -> Duration {
        self.cleanup_interval()
            .checked_mul(self.eviction_multiplier)
            .unwrap_or(Duration::MAX)
    }
}

/// Usage counters for one event type.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct EventPoolStatistics {
    /// Event type name.
    pub type_name: &'static str,
    /// Instances constructed because the queue was empty.
    pub created: u64,
    /// Instances handed out from the queue.
    pub reused: u64,
    /// Instances accepted back into the queue.
    pub returned: u64,
    /// Instances dropped because the queue was full.
    pub discarded: u64,
    /// Instances currently waiting in the queue.
    pub available: usize,
}

/// One event type's queue. The queue is a `VecDeque<E>` behind `Any`.
struct TypePool {
    queue: Box<dyn Any + Send>,
    stats: EventPoolStatistics,
    last_access: Instant,
}

impl TypePool {
    fn new<E: Event>(now: Instant) -> Self {
        Self {
            queue: Box::new(VecDeque::<E>::new()),
            stats: EventPoolStatistics {
                type_name: E::event_name(),
                ..EventPoolStatistics::default()
            },
            last_access: now,
        }
    }

    fn queue_mut<E: Event>(&mut self) -> &mut VecDeque<E> {
        self.queue
            .downcast_mut::<VecDeque<E>>()
            .unwrap_or_else(|| unreachable!("pool keyed by a different event type"))
    }

    fn queue_len<E: Event>(&self) -> usize {
        self.queue
            .downcast_ref::<VecDeque<E>>()
            .map_or(0, VecDeque::len)
    }
}

struct PoolState {
    pools: HashMap<TypeId, TypePool>,
    last_cleanup: Instant,
}

impl PoolState {
    fn pool<E: Event>(&mut self, now: Instant) -> &mut TypePool {
        let pool = self
            .pools
            .entry(TypeId::of::<E>())
            .or_insert_with(|| TypePool::new::<E>(now));
        pool.last_access = now;
        pool
    }
}

/// Thread-safe per-type event pool with statistics and idle eviction.
///
/// # Example
///
/// ```rust
/// use hearth_events::{Event, EventPool};
///
/// #[derive(Default)]
/// struct Tick(u64);
/// impl Event for Tick {}
///
/// let pool = EventPool::default();
/// let tick: Tick = pool.get();
/// pool.put(tick);
/// let _again: Tick = pool.get();
/// assert_eq!(pool.statistics::<Tick>().map(|s| s.reused), Some(1));
/// ```
pub struct EventPool {
    config: EventPoolConfig,
    state: Mutex<PoolState>,
}

impl EventPool {
    /// Creates an empty pool.
    #[must_use]
    pub fn new(config: EventPoolConfig) -> Self {
        Self {
            config,
            state: Mutex::new(PoolState {
                pools: HashMap::new(),
                last_cleanup: Instant::now(),
            }),
        }
    }

    /// The pool's configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &EventPoolConfig {
        &self.config
    }

    /// Takes a released instance of `E`, or constructs a default one.
    ///
    /// Opportunistically runs the idle sweep first.
    #[must_use]
    pub fn get<E: Event>(&self) -> E {
        self.get_at(Instant::now())
    }

    #[must_use]
    pub(crate) fn get_at<E: Event>(&self, now: Instant) -> E {
        let mut state = self.state.lock();
        Self::sweep(&mut state, &self.config, now);

        let pool = state.pool::<E>(now);
        let popped = pool.queue_mut::<E>().pop_front();
        pool.stats.available = pool.queue_len::<E>();
        if let Some(event) = popped {
            pool.stats.reused += 1;
            tracing::trace!(target: "hearth::pool", event = E::event_name(), "event reused");
            event
        } else {
            pool.stats.created += 1;
            E::default()
        }
    }

    /// Returns an instance to the pool. Dropped if the queue is full.
    pub fn put<E: Event>(&self, event: E) {
        let now = Instant::now();
        let max = self.config.max_pool_size;
        let mut state = self.state.lock();
        let pool = state.pool::<E>(now);

        let len = pool.queue_len::<E>();
        if len >= max {
            pool.stats.discarded += 1;
            tracing::trace!(target: "hearth::pool", event = E::event_name(), "pool full, event discarded");
            return;
        }
        pool.queue_mut::<E>().push_back(event);
        pool.stats.returned += 1;
        pool.stats.available = len + 1;
    }

    /// Evicts queues idle for longer than the eviction threshold, at most
    /// once per cleanup interval. Returns the number of evicted queues.
    pub fn check_pool_cleanup(&self, now: Instant) -> usize {
        let mut state = self.state.lock();
        Self::sweep(&mut state, &self.config, now)
    }

    fn sweep(state: &mut PoolState, config: &EventPoolConfig, now: Instant) -> usize {
        if now.saturating_duration_since(state.last_cleanup) < config.cleanup_interval() {
            return 0;
        }
        state.last_cleanup = now;

        let threshold = config.eviction_threshold();
        let before = state.pools.len();
        state.pools.retain(|_, pool| {
            let keep = now.saturating_duration_since(pool.last_access) <= threshold;
            if !keep {
                tracing::debug!(target: "hearth::pool", event = pool.stats.type_name, "idle event pool evicted");
            }
            keep
        });
        before - state.pools.len()
    }

    /// Statistics for `E`, if a queue exists for it.
    #[must_use]
    pub fn statistics<E: Event>(&self) -> Option<EventPoolStatistics> {
        let state = self.state.lock();
        state
            .pools
            .get(&TypeId::of::<E>())
            .map(|pool| pool.stats.clone())
    }

    /// Statistics for every live queue, sorted by type name.
    #[must_use]
    pub fn all_statistics(&self) -> Vec<EventPoolStatistics> {
        let state = self.state.lock();
        let mut stats: Vec<_> = state
            .pools
            .values()
            .map(|pool| pool.stats.clone())
            .collect();
        stats.sort_by_key(|s| s.type_name);
        stats
    }

    /// Instances of `E` waiting in the pool.
    #[must_use]
    pub fn available<E: Event>(&self) -> usize {
        let state = self.state.lock();
        state
            .pools
            .get(&TypeId::of::<E>())
            .map_or(0, TypePool::queue_len::<E>)
    }

    /// Number of per-type queues.
    #[must_use]
    pub fn pool_count(&self) -> usize {
        self.state.lock().pools.len()
    }

    /// Drops every queue and its statistics.
    pub fn clear(&self) {
        self.state.lock().pools.clear();
    }
}

impl Default for EventPool {
    fn default() -> Self {
        Self::new(EventPoolConfig::default())
    }
}

impl std::fmt::Debug for EventPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventPool")
            .field("config", &self.config)
            .field("pools", &self.pool_count())
            .finish()
    }
}

/// Minimal pool that also remembers each event type's priority.
///
/// The priority is read once, lazily, from a throwaway default instance, so
/// consumers can learn it without constructing a real event.
pub struct PrioritizedEventPool {
    max_pool_size: usize,
    pools: Mutex<HashMap<TypeId, Box<dyn Any + Send>>>,
    priorities: Mutex<HashMap<TypeId, EventPriority>>,
}

impl PrioritizedEventPool {
    /// Creates an empty pool keeping up to `max_pool_size` instances per type.
    #[must_use]
    pub fn new(max_pool_size: usize) -> Self {
        Self {
            max_pool_size,
            pools: Mutex::new(HashMap::new()),
            priorities: Mutex::new(HashMap::new()),
        }
    }

    /// Takes a released instance or constructs a default one.
    #[must_use]
    pub fn get<E: Event>(&self) -> E {
        let mut pools = self.pools.lock();
        pools
            .get_mut(&TypeId::of::<E>())
            .and_then(|queue| queue.downcast_mut::<VecDeque<E>>())
            .and_then(VecDeque::pop_front)
            .unwrap_or_default()
    }

    /// Returns an instance. Dropped if the queue is full.
    pub fn put<E: Event>(&self, event: E) {
        let mut pools = self.pools.lock();
        let Some(queue) = pools
            .entry(TypeId::of::<E>())
            .or_insert_with(|| Box::new(VecDeque::<E>::new()))
            .downcast_mut::<VecDeque<E>>()
        else {
            return;
        };
        if queue.len() < self.max_pool_size {
            queue.push_back(event);
        }
    }

    /// The priority of `E`, computed on first request and remembered.
    #[must_use]
    pub fn event_priority<E: Event>(&self) -> EventPriority {
        *self
            .priorities
            .lock()
            .entry(TypeId::of::<E>())
            .or_insert_with(|| E::default().priority())
    }

    /// Instances of `E` waiting in the pool.
    #[must_use]
    pub fn available<E: Event>(&self) -> usize {
        self.pools
            .lock()
            .get(&TypeId::of::<E>())
            .and_then(|queue| queue.downcast_ref::<VecDeque<E>>())
            .map_or(0, VecDeque::len)
    }
}

impl Default for PrioritizedEventPool {
    fn default() -> Self {
        Self::new(EventPoolConfig::default().max_pool_size)
    }
}
