//! # Entity Component System
//!
//! ## Design Philosophy
//!
//! - Entity IDs are handed out sequentially and abandoned on destroy
//! - Each entity owns at most one component per component type
//! - Per-type reverse indices answer "who has T" without a full scan
//! - Caches and archetype tags are derived views, never authoritative

pub mod archetype;
mod cache;
mod component;
mod entity;
mod manager;
mod world;

pub use archetype::{
    ArchetypeDetector, ArchetypeRegistry, ArchetypeTemplate, ArchetypeTemplateBuilder,
    ArchetypeTemplateRegistry, ComponentOverrides,
};
pub use cache::{CacheStatistics, ComponentCache, ComponentCacheRegistry};
pub use component::{Component, Health, Position, Velocity};
pub use entity::EntityId;
pub use manager::EntityManager;
pub use world::World;
