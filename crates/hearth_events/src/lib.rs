//! # HEARTH Event System
//!
//! Type-keyed publish/subscribe for decoupled gameplay systems.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐  get   ┌─────────────┐  publish  ┌─────────────┐
//! │  EventPool  │───────>│   System A  │──────────>│  EventBus   │
//! └─────────────┘        └─────────────┘           └──────┬──────┘
//!        ^                                                │ priority order
//!        │                     put (after dispatch)       v
//!        └──────────────────────────────────────── handlers (B, C, ...)
//! ```
//!
//! Deferred events go through a [`PrioritizedEventQueue`], drained either
//! per frame with [`PrioritizedEventQueue::process_pending`] or continuously
//! by an [`EventDispatcher`] thread.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod bus;
pub mod error;
pub mod event;
pub mod pool;
pub mod queue;

pub use bus::{DispatchOutcome, EventBus, SubscriptionId};
pub use error::{EventError, EventResult};
pub use event::{Event, EventId, EventPriority, HandlerError, HandlerResult};
pub use pool::{EventPool, EventPoolConfig, EventPoolStatistics, PrioritizedEventPool};
pub use queue::{EventDispatcher, EventQueueConfig, PrioritizedEventQueue, QueueTier};
