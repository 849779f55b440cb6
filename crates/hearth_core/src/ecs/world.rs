//! # ECS World
//!
//! The central container tying the entity manager to its derived views:
//! component caches, archetype tags and archetype templates.

use super::archetype::{
    ArchetypeDetector, ArchetypeRegistry, ArchetypeTemplate, ArchetypeTemplateRegistry,
    ComponentOverrides,
};
use super::cache::ComponentCacheRegistry;
use super::entity::EntityId;
use super::manager::EntityManager;
use crate::error::EcsResult;

/// The ECS World - container for all gameplay state.
///
/// Fields are public: systems borrow the pieces they need directly, while the
/// methods here cover operations that must keep several pieces in sync.
///
/// # Example
///
/// ```rust
/// use hearth_core::{ArchetypeTemplate, Health, World};
///
/// let mut world = World::new();
/// world.templates.register_template(
///     ArchetypeTemplate::builder("Character")
///         .with_component(Health::new(100, 100))
///         .build(),
/// );
///
/// let id = world.spawn_from_template("Character", None).unwrap();
/// assert_eq!(world.archetypes.get_entity_archetype(id), Some("Character"));
/// ```
#[derive(Debug, Default)]
pub struct World {
    /// Entities and components (source of truth).
    pub entities: EntityManager,
    /// Per-type component snapshots, refreshed by [`World::tick`].
    pub caches: ComponentCacheRegistry,
    /// Entity -> archetype tags.
    pub archetypes: ArchetypeRegistry,
    /// Named templates for spawning.
    pub templates: ArchetypeTemplateRegistry,
    /// Number of completed ticks.
    tick_count: u64,
}

impl World {
    /// Creates an empty world.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of ticks run so far.
    #[inline]
    #[must_use]
    pub const fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Creates an empty entity.
    pub fn spawn(&mut self) -> EntityId {
        self.entities.create_entity()
    }

    /// Registers a template, see [`ArchetypeTemplateRegistry::register_template`].
    pub fn register_template(&mut self, template: ArchetypeTemplate) -> bool {
        self.templates.register_template(template)
    }

    /// Creates an entity from a template and tags it with the template's id.
    pub fn spawn_from_template(
        &mut self,
        template: &str,
        overrides: Option<&ComponentOverrides>,
    ) -> EcsResult<EntityId> {
        let id = self
            .templates
            .create_entity_from_template(&mut self.entities, template, overrides)?;
        self.archetypes.register_entity_archetype(id, template);
        Ok(id)
    }

    /// Destroys an entity and scrubs it from tags and caches.
    ///
    /// Idempotent: returns `false` if the entity was already gone.
    pub fn despawn(&mut self, id: EntityId) -> bool {
        if !self.entities.destroy_entity(id) {
            return false;
        }
        self.archetypes.unregister_entity(id);
        self.caches.remove_entity(id);
        true
    }

    /// Tags an entity with the first matching template, if any.
    pub fn detect_archetype(&mut self, id: EntityId) -> Option<String> {
        ArchetypeDetector::new().detect_and_register(
            &self.entities,
            &self.templates,
            &mut self.archetypes,
            id,
        )
    }

    /// Refreshes every component cache. Call once per logical frame.
    pub fn tick(&mut self) {
        self.caches.update_all_caches(&self.entities);
        self.tick_count += 1;
    }

    /// Hard reset: drops entities, caches contents and tags. Templates are kept.
    pub fn clear(&mut self) {
        self.entities.clear();
        self.caches.clear_all_caches();
        self.archetypes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::component::{Health, Position, Velocity};

    fn world() -> World {
        let mut world = World::new();
        world.register_template(
            ArchetypeTemplate::builder("Character")
                .with_component(Health::new(100, 100))
                .with_component(Position::default())
                .build(),
        );
        world
    }

    #[test]
    fn test_spawn_from_template_tags() {
        let mut world = world();
        let id = world.spawn_from_template("Character", None).unwrap();
        assert_eq!(world.archetypes.get_entity_archetype(id), Some("Character"));
        assert_eq!(world.entities.get_component::<Health>(id), Some(Health::new(100, 100)));
        assert!(world.spawn_from_template("Missing", None).is_err());
    }

    #[test]
    fn test_despawn_scrubs_everything() {
        let mut world = world();
        world.caches.cache::<Health>();
        let id = world.spawn_from_template("Character", None).unwrap();
        world.tick();
        assert_eq!(world.caches.cache::<Health>().len(), 1);

        assert!(world.despawn(id));
        assert!(!world.despawn(id));
        assert!(world.archetypes.get_entity_archetype(id).is_none());
        assert!(world.caches.cache::<Health>().is_empty());
    }

    #[test]
    fn test_tick_refreshes_caches() {
        let mut world = world();
        world.caches.cache::<Velocity>();
        let id = world.spawn();
        world.entities.add_component(id, Velocity::new(1.0, 0.0, 0.0)).unwrap();
        assert!(world.caches.cache::<Velocity>().is_empty());

        world.tick();
        assert_eq!(world.caches.cache::<Velocity>().get_all_entity_ids(), vec![id]);
        assert_eq!(world.tick_count(), 1);
    }

    #[test]
    fn test_detect_archetype() {
        let mut world = world();
        let id = world.spawn();
        assert_eq!(world.detect_archetype(id), None);

        world.entities.add_component(id, Health::new(1, 1)).unwrap();
        world.entities.add_component(id, Position::default()).unwrap();
        assert_eq!(world.detect_archetype(id), Some("Character".to_owned()));
    }
}
