//! # Component System
//!
//! Components are pure data containers with no behavior.
//! They are keyed by their Rust type: an entity holds at most one value per type.

use std::any::type_name;

/// Marker trait for ECS components.
///
/// Components must be:
/// - `Clone`: callers fetch a copy, mutate it and re-add it
/// - `Send + Sync + 'static`: storable behind type erasure and shareable across threads
///
/// # Example
///
/// ```rust
/// use hearth_core::Component;
///
/// #[derive(Clone, Debug, Default, PartialEq)]
/// struct Mana {
///     points: u32,
/// }
///
/// impl Component for Mana {}
/// ```
pub trait Component: Clone + Send + Sync + 'static {
    /// Human-readable name used in logs and statistics.
    #[must_use]
    fn component_name() -> &'static str {
        type_name::<Self>()
    }
}

/// Position component for entities.
///
/// Represents a 3D position in world space.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Position {
    /// X coordinate in world space.
    pub x: f32,
    /// Y coordinate in world space.
    pub y: f32,
    /// Z coordinate in world space.
    pub z: f32,
}

impl Component for Position {}

impl Position {
    /// Creates a new position.
    #[inline]
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Velocity component for entities.
///
/// Represents movement speed in world units per second.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Velocity {
    /// X velocity component.
    pub x: f32,
    /// Y velocity component.
    pub y: f32,
    /// Z velocity component.
    pub z: f32,
}

impl Component for Velocity {}

impl Velocity {
    /// Creates a new velocity.
    #[inline]
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Health component for living entities.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Health {
    /// Current hit points.
    pub current: i32,
    /// Maximum hit points.
    pub max: i32,
}

impl Component for Health {}

impl Health {
    /// Creates a new health value.
    #[inline]
    #[must_use]
    pub const fn new(current: i32, max: i32) -> Self {
        Self { current, max }
    }
}
