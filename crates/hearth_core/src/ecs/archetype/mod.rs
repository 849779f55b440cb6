//! # Archetypes
//!
//! An archetype is a named set of component types, optionally with defaults.
//!
//! Three cooperating pieces:
//! - [`ArchetypeTemplateRegistry`]: named templates of default component values,
//!   used to construct entities
//! - [`ArchetypeRegistry`]: bookkeeping of "entity X is tagged archetype Y"
//! - [`ArchetypeDetector`]: one-shot, first-match-wins classification of an
//!   entity against the registered templates
//!
//! A tag does not imply the entity still carries the archetype's components.
//! Nothing re-checks tags after detection.

mod detector;
mod registry;
mod template;

pub use detector::ArchetypeDetector;
pub use registry::ArchetypeRegistry;
pub use template::{
    ArchetypeTemplate, ArchetypeTemplateBuilder, ArchetypeTemplateRegistry, ComponentOverrides,
};
