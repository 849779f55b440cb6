//! # HEARTH
//!
//! Game skeleton runtime: the ECS from [`hearth_core`], the event system from
//! [`hearth_events`], a service container and TOML configuration, wired
//! together by [`GameContext`].
//!
//! ## Architecture Rules
//!
//! 1. **No global locator** - the container is built once and passed on
//! 2. **Systems talk through events** - never through each other
//! 3. **One tick entry point** - caches refresh, then queued events publish
//!
//! ## Example
//!
//! ```rust
//! use hearth::{GameContext, HearthConfig};
//! use hearth::ecs::Health;
//!
//! let mut context = GameContext::new(HearthConfig::default()).unwrap();
//! let id = context.world_mut().spawn();
//! context.world_mut().entities.add_component(id, Health::new(100, 100)).unwrap();
//! context.world_mut().archetypes.register_entity_archetype(id, "Character");
//!
//! assert_eq!(context.world().archetypes.get_entity_archetype(id), Some("Character"));
//! assert_eq!(context.tick().tick, 1);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod context;
pub mod error;
pub mod services;

pub use hearth_core as ecs;
pub use hearth_events as events;

pub use config::HearthConfig;
pub use context::{GameContext, TickReport};
pub use error::{ConfigError, ConfigResult, ServiceError, ServiceResult};
pub use services::{Disposable, Resolver, ServiceContainer, ServiceLifetime, ServiceScope};
