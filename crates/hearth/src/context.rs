//! # Game Context
//!
//! One owner for the world, the event plumbing and the services, with a
//! single per-frame entry point.
//!
//! ```text
//! tick():
//!   1. world.tick()            refresh component caches
//!   2. queue.process_pending   publish what was queued before this tick
//! ```
//!
//! Events enqueued by handlers during step 2 run on the next tick. When a
//! background [`EventDispatcher`] is running, step 2 is skipped.

use std::sync::Arc;

use hearth_core::World;
use hearth_events::{
    DispatchOutcome, Event, EventBus, EventDispatcher, EventPool, EventResult,
    PrioritizedEventQueue, QueueTier,
};

use crate::config::HearthConfig;
use crate::error::ConfigResult;
use crate::services::ServiceContainer;

/// What one [`GameContext::tick`] did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Tick number, starting at 1.
    pub tick: u64,
    /// Queued events published during this tick.
    pub events_processed: usize,
}

/// Wires a [`World`], an [`EventBus`] returning events to a shared
/// [`EventPool`], a [`PrioritizedEventQueue`] and a [`ServiceContainer`].
///
/// The container is pre-populated with the bus, the pool, the queue and the
/// configuration.
pub struct GameContext {
    config: HearthConfig,
    world: World,
    pool: Arc<EventPool>,
    bus: Arc<EventBus>,
    queue: Arc<PrioritizedEventQueue>,
    services: ServiceContainer,
    dispatcher: Option<EventDispatcher>,
}

impl GameContext {
    /// Validates `config` and builds every subsystem.
    pub fn new(config: HearthConfig) -> ConfigResult<Self> {
        config.validate()?;

        let pool = Arc::new(EventPool::new(config.event_pool.clone()));
        let bus = Arc::new(EventBus::with_pool(Arc::clone(&pool)));
        let queue = Arc::new(PrioritizedEventQueue::new(config.event_queue.clone()));

        let mut services = ServiceContainer::new();
        services.register_shared(Arc::clone(&pool));
        services.register_shared(Arc::clone(&bus));
        services.register_shared(Arc::clone(&queue));
        services.register_instance(config.clone());

        tracing::debug!(target: "hearth::services", services = services.len(), "game context created");
        Ok(Self {
            config,
            world: World::new(),
            pool,
            bus,
            queue,
            services,
            dispatcher: None,
        })
    }

    /// The configuration the context was built with.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &HearthConfig {
        &self.config
    }

    /// The ECS world.
    #[inline]
    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    /// The ECS world, mutably.
    #[inline]
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// The event bus.
    #[inline]
    #[must_use]
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// The event pool shared with the bus.
    #[inline]
    #[must_use]
    pub fn pool(&self) -> &Arc<EventPool> {
        &self.pool
    }

    /// The deferred event queue.
    #[inline]
    #[must_use]
    pub fn queue(&self) -> &Arc<PrioritizedEventQueue> {
        &self.queue
    }

    /// The service container.
    #[inline]
    #[must_use]
    pub fn services(&self) -> &ServiceContainer {
        &self.services
    }

    /// The service container, for registrations.
    #[inline]
    pub fn services_mut(&mut self) -> &mut ServiceContainer {
        &mut self.services
    }

    /// Takes an event from the pool.
    #[must_use]
    pub fn acquire<E: Event>(&self) -> E {
        self.bus.acquire()
    }

    /// Publishes immediately on the calling thread.
    pub fn publish<E: Event>(&self, event: E) -> DispatchOutcome {
        self.bus.publish(event)
    }

    /// Defers an event to the next tick (or the dispatcher thread).
    pub fn enqueue<E: Event>(&self, event: E) -> EventResult<QueueTier> {
        self.queue.enqueue(event)
    }

    /// Refreshes caches, then publishes the events queued so far.
    pub fn tick(&mut self) -> TickReport {
        self.world.tick();
        let events_processed = if self.dispatcher.is_some() {
            0
        } else {
            let pending = self.queue.len();
            self.queue.process_pending(&self.bus, pending)
        };
        TickReport {
            tick: self.world.tick_count(),
            events_processed,
        }
    }

    /// Moves queue draining to a background thread.
    pub fn start_dispatcher(&mut self) -> EventResult<()> {
        let dispatcher = EventDispatcher::start(Arc::clone(&self.queue), Arc::clone(&self.bus))?;
        self.dispatcher = Some(dispatcher);
        Ok(())
    }

    /// Stops the background dispatcher. Returns the number of events it
    /// published, 0 if none was running.
    pub fn stop_dispatcher(&mut self) -> u64 {
        self.dispatcher.take().map_or(0, EventDispatcher::shutdown)
    }

    /// True while a background dispatcher drains the queue.
    #[must_use]
    pub fn is_dispatching(&self) -> bool {
        self.dispatcher.as_ref().is_some_and(EventDispatcher::is_running)
    }

    /// Hard teardown: stops the dispatcher, disposes the queue and the
    /// services, drops every subscription and entity.
    pub fn shutdown(mut self) {
        let published = self.stop_dispatcher();
        let dropped = self.queue.dispose();
        if self.services.dispose().is_err() {
            tracing::warn!(target: "hearth::services", "services were already disposed");
        }
        self.bus.clear();
        self.world.clear();
        tracing::info!(target: "hearth::queue", published, dropped, "game context shut down");
    }
}

impl std::fmt::Debug for GameContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameContext")
            .field("world", &self.world)
            .field("queue", &self.queue)
            .field("services", &self.services)
            .field("dispatching", &self.is_dispatching())
            .finish_non_exhaustive()
    }
}
