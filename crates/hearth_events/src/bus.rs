//! # Event Bus
//!
//! Type-keyed publish/subscribe with per-subscription priority.
//!
//! ## Dispatch rules
//!
//! - Handlers run in descending priority. Equal priorities keep subscription
//!   order (the handler list is re-sorted with a stable sort).
//! - A handler that returns `Err` or panics is logged and counted; the
//!   remaining handlers still run.
//! - The handler list is snapshotted before dispatch, so a handler may
//!   subscribe or unsubscribe without deadlocking the bus.
//! - After the last handler, the event goes back to the attached
//!   [`EventPool`], if any.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::runtime::Handle;
use tokio::task::JoinSet;

use crate::error::{EventError, EventResult};
use crate::event::{Event, EventPriority, HandlerResult};
use crate::pool::EventPool;

type SyncHandler = Arc<dyn Fn(&dyn Any) -> HandlerResult + Send + Sync>;
type HandlerFuture = Pin<Box<dyn Future<Output = HandlerResult> + Send>>;
type AsyncHandler = Arc<dyn Fn(Arc<dyn Any + Send + Sync>) -> HandlerFuture + Send + Sync>;

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

static NEXT_SUBSCRIPTION: AtomicU64 = AtomicU64::new(1);

impl SubscriptionId {
    fn next() -> Self {
        Self(NEXT_SUBSCRIPTION.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Result of one publish call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// Handlers invoked.
    pub invoked: usize,
    /// Handlers that returned `Err` or panicked.
    pub failed: usize,
}

impl DispatchOutcome {
    /// True if no handler failed.
    #[inline]
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.failed == 0
    }

    /// Handlers that completed successfully.
    #[inline]
    #[must_use]
    pub const fn succeeded(&self) -> usize {
        self.invoked - self.failed
    }

    fn record_failure(&mut self) {
        self.failed += 1;
    }
}

#[derive(Clone)]
struct Subscription<H> {
    id: SubscriptionId,
    priority: EventPriority,
    handler: H,
}

type HandlerMap<H> = HashMap<TypeId, Vec<Subscription<H>>>;

fn insert_sorted<H>(list: &mut Vec<Subscription<H>>, subscription: Subscription<H>) {
    list.push(subscription);
    // Stable: ties keep subscription order.
    list.sort_by(|a, b| b.priority.cmp(&a.priority));
}

fn remove_subscription<H>(map: &mut HandlerMap<H>, id: SubscriptionId) -> bool {
    let mut removed = false;
    map.retain(|_, list| {
        let before = list.len();
        list.retain(|sub| sub.id != id);
        removed |= list.len() != before;
        !list.is_empty()
    });
    removed
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

/// Publish/subscribe dispatcher keyed by event type.
///
/// # Example
///
/// ```rust
/// use hearth_events::{Event, EventBus, EventPriority};
///
/// #[derive(Default)]
/// struct Scored(u32);
/// impl Event for Scored {}
///
/// let bus = EventBus::new();
/// bus.subscribe(EventPriority::Normal, |event: &Scored| {
///     assert_eq!(event.0, 10);
///     Ok(())
/// });
/// let outcome = bus.publish(Scored(10));
/// assert_eq!(outcome.invoked, 1);
/// ```
#[derive(Default)]
pub struct EventBus {
    sync_handlers: RwLock<HandlerMap<SyncHandler>>,
    async_handlers: RwLock<HandlerMap<AsyncHandler>>,
    pool: Option<Arc<EventPool>>,
}

impl EventBus {
    /// Creates a bus without a pool. Published events are dropped.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a bus returning published events to `pool`.
    #[must_use]
    pub fn with_pool(pool: Arc<EventPool>) -> Self {
        Self {
            pool: Some(pool),
            ..Self::default()
        }
    }

    /// The attached pool.
    #[inline]
    #[must_use]
    pub fn pool(&self) -> Option<&Arc<EventPool>> {
        self.pool.as_ref()
    }

    /// Takes an event from the attached pool, or constructs a default one.
    #[must_use]
    pub fn acquire<E: Event>(&self) -> E {
        self.pool.as_ref().map_or_else(E::default, |pool| pool.get())
    }

    /// Subscribes a synchronous handler for `E`.
    ///
    /// # Arguments
    ///
    /// * `priority` - Higher runs first
    /// * `handler` - Called with a borrow of every published `E`
    pub fn subscribe<E, F>(&self, priority: EventPriority, handler: F) -> SubscriptionId
    where
        E: Event,
        F: Fn(&E) -> HandlerResult + Send + Sync + 'static,
    {
        let id = SubscriptionId::next();
        let erased: SyncHandler = Arc::new(move |event: &dyn Any| {
            event.downcast_ref::<E>().map_or(Ok(()), &handler)
        });

        let mut map = self.sync_handlers.write();
        insert_sorted(
            map.entry(TypeId::of::<E>()).or_default(),
            Subscription {
                id,
                priority,
                handler: erased,
            },
        );
        tracing::debug!(target: "hearth::events", event = E::event_name(), ?priority, subscription = id.0, "handler subscribed");
        id
    }

    /// Subscribes an asynchronous handler for `E`.
    ///
    /// The handler receives a shared reference to the event; it runs on the
    /// tokio runtime driving [`EventBus::publish_async`].
    pub fn subscribe_async<E, F, Fut>(&self, priority: EventPriority, handler: F) -> SubscriptionId
    where
        E: Event,
        F: Fn(Arc<E>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let id = SubscriptionId::next();
        let erased: AsyncHandler = Arc::new(move |event: Arc<dyn Any + Send + Sync>| {
            match event.downcast::<E>() {
                Ok(event) => Box::pin(handler(event)) as HandlerFuture,
                Err(_) => Box::pin(std::future::ready(Ok(()))),
            }
        });

        let mut map = self.async_handlers.write();
        insert_sorted(
            map.entry(TypeId::of::<E>()).or_default(),
            Subscription {
                id,
                priority,
                handler: erased,
            },
        );
        tracing::debug!(target: "hearth::events", event = E::event_name(), ?priority, subscription = id.0, "async handler subscribed");
        id
    }

    /// Removes a subscription. Returns `false` if it was not found.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = remove_subscription(&mut self.sync_handlers.write(), id)
            || remove_subscription(&mut self.async_handlers.write(), id);
        if removed {
            tracing::debug!(target: "hearth::events", subscription = id.0, "handler unsubscribed");
        }
        removed
    }

    /// Sync plus async subscriptions for `E`.
    #[must_use]
    pub fn subscriber_count<E: Event>(&self) -> usize {
        let key = TypeId::of::<E>();
        let sync = self.sync_handlers.read().get(&key).map_or(0, Vec::len);
        let async_ = self.async_handlers.read().get(&key).map_or(0, Vec::len);
        sync + async_
    }

    /// True if anything is subscribed to `E`.
    #[must_use]
    pub fn has_subscribers<E: Event>(&self) -> bool {
        self.subscriber_count::<E>() > 0
    }

    /// Drops every subscription. Meant for hard resets, not per-frame use.
    pub fn clear(&self) {
        self.sync_handlers.write().clear();
        self.async_handlers.write().clear();
        tracing::debug!(target: "hearth::events", "event bus cleared");
    }

    /// Runs every synchronous handler for `E` in priority order, then
    /// returns the event to the pool.
    pub fn publish<E: Event>(&self, event: E) -> DispatchOutcome {
        let handlers: Vec<SyncHandler> = self
            .sync_handlers
            .read()
            .get(&TypeId::of::<E>())
            .map(|list| list.iter().map(|sub| Arc::clone(&sub.handler)).collect())
            .unwrap_or_default();

        let mut outcome = DispatchOutcome::default();
        let erased: &dyn Any = &event;
        for handler in &handlers {
            outcome.invoked += 1;
            match catch_unwind(AssertUnwindSafe(|| handler(erased))) {
                Ok(Ok(())) => {}
                Ok(Err(error)) => {
                    outcome.record_failure();
                    tracing::error!(target: "hearth::events", event = E::event_name(), %error, "event handler failed");
                }
                Err(payload) => {
                    outcome.record_failure();
                    tracing::error!(target: "hearth::events", event = E::event_name(), panic = panic_message(&*payload), "event handler panicked");
                }
            }
        }

        self.recycle(event);
        outcome
    }

    fn recycle<E: Event>(&self, event: E) {
        if let Some(pool) = &self.pool {
            pool.put(event);
        }
    }

    /// Starts every asynchronous handler for `E` on the current tokio
    /// runtime, awaits all of them, then returns the event to the pool.
    ///
    /// # Errors
    ///
    /// [`EventError::RuntimeUnavailable`] if async handlers are subscribed
    /// for `E` but no tokio runtime is current. No handler runs and the
    /// event goes back to the pool.
    pub async fn publish_async<E: Event>(&self, event: E) -> EventResult<DispatchOutcome> {
        let handlers: Vec<AsyncHandler> = self
            .async_handlers
            .read()
            .get(&TypeId::of::<E>())
            .map(|list| list.iter().map(|sub| Arc::clone(&sub.handler)).collect())
            .unwrap_or_default();

        if handlers.is_empty() {
            self.recycle(event);
            return Ok(DispatchOutcome::default());
        }
        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(error) => {
                tracing::error!(target: "hearth::events", event = E::event_name(), %error, "async publish without a tokio runtime");
                self.recycle(event);
                return Err(EventError::RuntimeUnavailable);
            }
        };

        let event = Arc::new(event);
        let mut outcome = DispatchOutcome::default();
        let mut tasks = JoinSet::new();

        for handler in &handlers {
            outcome.invoked += 1;
            let shared: Arc<dyn Any + Send + Sync> = Arc::clone(&event) as _;
            match catch_unwind(AssertUnwindSafe(|| handler(shared))) {
                Ok(future) => {
                    tasks.spawn_on(future, &runtime);
                }
                Err(payload) => {
                    outcome.record_failure();
                    tracing::error!(target: "hearth::events", event = E::event_name(), panic = panic_message(&*payload), "async event handler panicked");
                }
            }
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(error)) => {
                    outcome.record_failure();
                    tracing::error!(target: "hearth::events", event = E::event_name(), %error, "async event handler failed");
                }
                Err(error) => {
                    outcome.record_failure();
                    tracing::error!(target: "hearth::events", event = E::event_name(), %error, "async event handler aborted");
                }
            }
        }

        match Arc::try_unwrap(event) {
            Ok(event) => self.recycle(event),
            Err(_) => {
                tracing::trace!(target: "hearth::events", event = E::event_name(), "event still shared after dispatch, not pooled");
            }
        }
        Ok(outcome)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("event_types", &self.sync_handlers.read().len())
            .field("async_event_types", &self.async_handlers.read().len())
            .field("pooled", &self.pool.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::HandlerError;
    use parking_lot::Mutex;

    #[derive(Debug, Default)]
    struct Hit {
        damage: u32,
    }

    impl Event for Hit {}

    #[derive(Debug, Default)]
    struct Other;

    impl Event for Other {}

    fn recorder() -> Arc<Mutex<Vec<&'static str>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    #[test]
    fn test_priority_order() {
        let bus = EventBus::new();
        let log = recorder();

        for (name, priority) in [
            ("low", EventPriority::Low),
            ("critical", EventPriority::Critical),
            ("normal", EventPriority::Normal),
        ] {
            let log = Arc::clone(&log);
            bus.subscribe(priority, move |_: &Hit| {
                log.lock().push(name);
                Ok(())
            });
        }

        let outcome = bus.publish(Hit::default());
        assert_eq!(*log.lock(), ["critical", "normal", "low"]);
        assert_eq!(outcome.invoked, 3);
        assert!(outcome.is_clean());
    }

    #[test]
    fn test_equal_priorities_keep_subscription_order() {
        let bus = EventBus::new();
        let log = recorder();
        for name in ["a", "b", "c", "d"] {
            let log = Arc::clone(&log);
            bus.subscribe(EventPriority::Normal, move |_: &Hit| {
                log.lock().push(name);
                Ok(())
            });
        }
        bus.publish(Hit::default());
        assert_eq!(*log.lock(), ["a", "b", "c", "d"]);
    }

    #[test]
    fn test_failing_handlers_are_isolated() {
        let bus = EventBus::new();
        let log = recorder();

        let l = Arc::clone(&log);
        bus.subscribe(EventPriority::Low, move |_: &Hit| {
            l.lock().push("low");
            Ok(())
        });
        bus.subscribe(EventPriority::Critical, |_: &Hit| -> HandlerResult {
            panic!("handler blew up")
        });
        bus.subscribe(EventPriority::High, |_: &Hit| Err("refused".into()));
        let l = Arc::clone(&log);
        bus.subscribe(EventPriority::Normal, move |_: &Hit| {
            l.lock().push("normal");
            Ok(())
        });

        let outcome = bus.publish(Hit::default());
        assert_eq!(*log.lock(), ["normal", "low"]);
        assert_eq!(outcome.invoked, 4);
        assert_eq!(outcome.failed, 2);
        assert_eq!(outcome.succeeded(), 2);
    }

    #[test]
    fn test_events_only_reach_their_type() {
        let bus = EventBus::new();
        let log = recorder();
        let l = Arc::clone(&log);
        bus.subscribe(EventPriority::Normal, move |_: &Hit| {
            l.lock().push("hit");
            Ok(())
        });

        let outcome = bus.publish(Other);
        assert_eq!(outcome.invoked, 0);
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_unsubscribe_drops_empty_entries() {
        let bus = EventBus::new();
        let id = bus.subscribe(EventPriority::Normal, |_: &Hit| Ok(()));
        assert!(bus.has_subscribers::<Hit>());

        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        assert!(!bus.has_subscribers::<Hit>());
        assert_eq!(bus.sync_handlers.read().len(), 0);

        let sync_id = bus.subscribe(EventPriority::Normal, |_: &Hit| Ok(()));
        let async_id = bus.subscribe_async(EventPriority::Normal, |_: Arc<Hit>| async {
            Ok::<(), HandlerError>(())
        });
        assert_eq!(bus.subscriber_count::<Hit>(), 2);

        assert!(bus.unsubscribe(async_id));
        assert!(!bus.unsubscribe(async_id));
        assert_eq!(bus.subscriber_count::<Hit>(), 1);
        assert_eq!(bus.async_handlers.read().len(), 0);
        assert_eq!(bus.sync_handlers.read().len(), 1);
        assert!(bus.unsubscribe(sync_id));
        assert!(!bus.has_subscribers::<Hit>());
    }

    #[test]
    fn test_published_event_returns_to_pool() {
        let pool = Arc::new(EventPool::default());
        let bus = EventBus::with_pool(Arc::clone(&pool));

        let mut hit: Hit = bus.acquire();
        hit.damage = 9;
        bus.publish(hit);
        assert_eq!(pool.available::<Hit>(), 1);

        let again: Hit = bus.acquire();
        assert_eq!(again.damage, 9);
    }

    #[test]
    fn test_handler_may_subscribe_during_dispatch() {
        let bus = Arc::new(EventBus::new());
        let inner = Arc::clone(&bus);
        bus.subscribe(EventPriority::Normal, move |_: &Hit| {
            inner.subscribe(EventPriority::Normal, |_: &Other| Ok(()));
            Ok(())
        });
        bus.publish(Hit::default());
        assert!(bus.has_subscribers::<Other>());
    }

    #[test]
    fn test_clear() {
        let bus = EventBus::new();
        bus.subscribe(EventPriority::Normal, |_: &Hit| Ok(()));
        bus.subscribe_async(EventPriority::Normal, |_: Arc<Hit>| async {
            Ok::<(), HandlerError>(())
        });
        assert_eq!(bus.subscriber_count::<Hit>(), 2);
        bus.clear();
        assert_eq!(bus.subscriber_count::<Hit>(), 0);
    }

    #[tokio::test]
    async fn test_publish_async_awaits_all_handlers() {
        let pool = Arc::new(EventPool::default());
        let bus = EventBus::with_pool(Arc::clone(&pool));
        let total = Arc::new(Mutex::new(0_u32));

        for _ in 0..3 {
            let total = Arc::clone(&total);
            bus.subscribe_async(EventPriority::Normal, move |event: Arc<Hit>| {
                let total = Arc::clone(&total);
                async move {
                    tokio::task::yield_now().await;
                    *total.lock() += event.damage;
                    Ok::<(), HandlerError>(())
                }
            });
        }
        bus.subscribe_async(EventPriority::High, |_: Arc<Hit>| async {
            Err::<(), HandlerError>("async refusal".into())
        });

        let outcome = bus.publish_async(Hit { damage: 5 }).await.unwrap();
        assert_eq!(*total.lock(), 15);
        assert_eq!(outcome.invoked, 4);
        assert_eq!(outcome.failed, 1);
        assert_eq!(pool.available::<Hit>(), 1);
    }

    struct NoopWake;

    impl std::task::Wake for NoopWake {
        fn wake(self: Arc<Self>) {}
    }

    #[test]
    fn test_publish_async_outside_runtime_is_an_error() {
        use std::task::{Context, Poll, Waker};

        let pool = Arc::new(EventPool::default());
        let bus = EventBus::with_pool(Arc::clone(&pool));
        let ran = Arc::new(Mutex::new(false));
        let flag = Arc::clone(&ran);
        bus.subscribe_async(EventPriority::Normal, move |_: Arc<Hit>| {
            let flag = Arc::clone(&flag);
            async move {
                *flag.lock() = true;
                Ok::<(), HandlerError>(())
            }
        });

        let waker = Waker::from(Arc::new(NoopWake));
        let mut cx = Context::from_waker(&waker);
        let mut publish = std::pin::pin!(bus.publish_async(Hit { damage: 1 }));

        assert_eq!(
            publish.as_mut().poll(&mut cx),
            Poll::Ready(Err(EventError::RuntimeUnavailable))
        );
        assert!(!*ran.lock());
        assert_eq!(pool.available::<Hit>(), 1);
    }

    #[test]
    fn test_publish_async_without_handlers_needs_no_runtime() {
        use std::task::{Context, Poll, Waker};

        let pool = Arc::new(EventPool::default());
        let bus = EventBus::with_pool(Arc::clone(&pool));
        let waker = Waker::from(Arc::new(NoopWake));
        let mut cx = Context::from_waker(&waker);
        let mut publish = std::pin::pin!(bus.publish_async(Other));

        assert_eq!(
            publish.as_mut().poll(&mut cx),
            Poll::Ready(Ok(DispatchOutcome::default()))
        );
        assert_eq!(pool.available::<Other>(), 1);
    }
}
