//! # ECS Property Tests
//!
//! End-to-end checks of the entity manager, component caches and archetype
//! bookkeeping through the public API.
//!
//! Run with: cargo test --package hearth --test ecs_properties

use hearth::ecs::{
    ArchetypeRegistry, ArchetypeTemplate, ComponentCache, ComponentOverrides, EcsError,
    EntityManager, Health, Position, Velocity, World,
};

// ============================================================================
// COMPONENT PRESENCE
// ============================================================================

#[test]
fn add_then_remove_only_touches_that_type() {
    let mut entities = EntityManager::new();
    let id = entities.create_entity();
    entities.add_component(id, Position::new(1.0, 2.0, 3.0)).unwrap();

    entities.add_component(id, Health::new(10, 10)).unwrap();
    assert!(entities.has_component::<Health>(id));
    assert!(entities.has_component::<Position>(id));
    assert!(!entities.has_component::<Velocity>(id));

    assert_eq!(entities.remove_component::<Health>(id), Some(Health::new(10, 10)));
    assert!(!entities.has_component::<Health>(id));
    assert!(entities.has_component::<Position>(id));
}

#[test]
fn add_to_unknown_entity_is_an_error() {
    let mut entities = EntityManager::new();
    let id = entities.create_entity();
    entities.destroy_entity(id);

    assert_eq!(
        entities.add_component(id, Health::new(1, 1)),
        Err(EcsError::EntityNotFound(id))
    );
    assert_eq!(entities.get_component::<Health>(id), None);
}

#[test]
fn destroy_is_idempotent() {
    let mut entities = EntityManager::new();
    let keep = entities.create_entity();
    let id = entities.create_entity();
    entities.add_component(id, Health::new(5, 5)).unwrap();

    assert!(entities.destroy_entity(id));
    let after_first = (entities.entity_count(), entities.get_all_entities());
    assert!(!entities.destroy_entity(id));
    assert_eq!((entities.entity_count(), entities.get_all_entities()), after_first);
    assert!(entities.contains(keep));
}

// ============================================================================
// CACHE SNAPSHOTS
// ============================================================================

#[test]
fn cache_update_is_a_snapshot() {
    let mut entities = EntityManager::new();
    for i in 0..20 {
        let id = entities.create_entity();
        if i % 3 == 0 {
            entities.add_component(id, Velocity::new(1.0, 0.0, 0.0)).unwrap();
        }
    }

    let mut cache = ComponentCache::<Velocity>::new();
    cache.update(&entities);
    let snapshot = cache.get_all_entity_ids();
    assert_eq!(snapshot, entities.get_entities_with::<Velocity>());

    // Later changes are invisible until the next update.
    let late = entities.create_entity();
    entities.add_component(late, Velocity::new(0.0, 1.0, 0.0)).unwrap();
    assert_eq!(cache.get_all_entity_ids(), snapshot);
    assert!(cache.get(late).is_none());

    cache.update(&entities);
    assert!(cache.contains(late));
    assert_eq!(cache.get_all_entity_ids(), entities.get_entities_with::<Velocity>());
}

#[test]
fn world_tick_refreshes_registered_caches() {
    let mut world = World::new();
    world.caches.cache::<Health>();
    let id = world.spawn();
    world.entities.add_component(id, Health::new(30, 40)).unwrap();

    assert!(world.caches.get_cache::<Health>().is_some_and(|c| c.is_empty()));
    world.tick();
    let cache = world.caches.get_cache::<Health>().unwrap();
    assert_eq!(cache.get(id).map(|h| h.current), Some(30));
    assert_eq!(cache.hit_count(), 1);
}

// ============================================================================
// ARCHETYPES
// ============================================================================

#[test]
fn archetype_tagging_is_exclusive() {
    let mut entities = EntityManager::new();
    let id = entities.create_entity();
    let mut archetypes = ArchetypeRegistry::new();

    archetypes.register_entity_archetype(id, "A");
    let previous = archetypes.register_entity_archetype(id, "B");

    assert_eq!(previous.as_deref(), Some("A"));
    assert!(archetypes.get_entities_with_archetype("A").is_empty());
    assert_eq!(archetypes.get_entities_with_archetype("B"), vec![id]);
    assert_eq!(archetypes.get_entity_archetype(id), Some("B"));
}

#[test]
fn templates_spawn_and_detect() {
    let mut world = World::new();
    world.register_template(
        ArchetypeTemplate::builder("Character")
            .with_component(Health::new(100, 100))
            .with_component(Position::default())
            .build(),
    );
    world.register_template(
        ArchetypeTemplate::builder("Projectile")
            .with_component(Position::default())
            .with_component(Velocity::default())
            .build(),
    );

    let overrides = ComponentOverrides::new().with(Health::new(60, 100));
    let hero = world.spawn_from_template("Character", Some(&overrides)).unwrap();
    assert_eq!(world.archetypes.get_entity_archetype(hero), Some("Character"));
    assert_eq!(world.entities.get_component::<Health>(hero).map(|h| h.current), Some(60));

    let bullet = world.spawn();
    world.entities.add_component(bullet, Position::default()).unwrap();
    world.entities.add_component(bullet, Velocity::new(9.0, 0.0, 0.0)).unwrap();
    assert_eq!(world.detect_archetype(bullet).as_deref(), Some("Projectile"));

    assert_eq!(
        world.spawn_from_template("Missing", None),
        Err(EcsError::TemplateNotFound("Missing".into()))
    );

    assert!(world.despawn(hero));
    assert!(!world.archetypes.has_archetype(hero));
}

// ============================================================================
// END TO END
// ============================================================================

#[test]
fn character_scenario() {
    let mut entities = EntityManager::new();
    let mut archetypes = ArchetypeRegistry::new();

    let id = entities.create_entity();
    entities.add_component(id, Health::new(100, 100)).unwrap();
    archetypes.register_entity_archetype(id, "Character");

    assert_eq!(archetypes.get_entity_archetype(id), Some("Character"));
    assert!(entities.has_component::<Health>(id));
    assert_eq!(entities.get_component::<Health>(id).map(|h| h.current), Some(100));
}
