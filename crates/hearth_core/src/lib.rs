//! # HEARTH Core Engine
//!
//! Entity Component System for gameplay code:
//! - Entities are opaque, never-reused identifiers
//! - Components are plain data keyed by their Rust type
//! - Systems read entities through per-type caches refreshed once per tick
//!
//! ## Architecture Rules
//!
//! 1. **Components are data** - no behavior, replaced wholesale, never mutated in place
//! 2. **Caches are derived** - the [`EntityManager`] is the single source of truth
//! 3. **Absence is explicit** - lookups return `Option`, mutations return `Result`
//!
//! ## Example
//!
//! ```rust
//! use hearth_core::{EntityManager, Health};
//!
//! let mut entities = EntityManager::new();
//! let id = entities.create_entity();
//! entities.add_component(id, Health::new(100, 100)).unwrap();
//!
//! assert!(entities.has_component::<Health>(id));
//! assert_eq!(entities.get_component::<Health>(id).map(|h| h.current), Some(100));
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod ecs;
pub mod error;

pub use ecs::{
    ArchetypeDetector, ArchetypeRegistry, ArchetypeTemplate, ArchetypeTemplateBuilder,
    ArchetypeTemplateRegistry, CacheStatistics, Component, ComponentCache,
    ComponentCacheRegistry, ComponentOverrides, EntityId, EntityManager, Health, Position,
    Velocity, World,
};
pub use error::{EcsError, EcsResult};
