//! # Entity Manager
//!
//! The single source of truth for entities and their components.
//!
//! Storage layout:
//! - One type-erased component map per entity, keyed by component `TypeId`
//! - One reverse index per component type listing the entities that hold it

use std::any::{Any, TypeId};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::component::Component;
use super::entity::EntityId;
use crate::error::{EcsError, EcsResult};

type ComponentMap = HashMap<TypeId, Box<dyn Any + Send + Sync>>;

/// Owns entity IDs and per-entity component maps.
///
/// # Failure semantics
///
/// - Queries on unknown entities return `false` / `None` / empty.
/// - [`add_component`](Self::add_component) on an unknown entity is an error.
/// - [`destroy_entity`](Self::destroy_entity) is idempotent.
///
/// # Example
///
/// ```rust
/// use hearth_core::{EntityManager, Position};
///
/// let mut entities = EntityManager::new();
/// let id = entities.create_entity();
/// entities.add_component(id, Position::new(1.0, 2.0, 3.0)).unwrap();
///
/// assert_eq!(entities.get_entities_with::<Position>(), vec![id]);
/// ```
#[derive(Default)]
pub struct EntityManager {
    /// Component maps of all live entities, ordered by ID.
    entities: BTreeMap<EntityId, ComponentMap>,
    /// Reverse index: component type -> entities holding it.
    index: HashMap<TypeId, BTreeSet<EntityId>>,
    /// Next ID to hand out. IDs are never reused.
    next_id: Option<EntityId>,
}

impl EntityManager {
    /// Creates an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates the next sequential ID with an empty component map.
    pub fn create_entity(&mut self) -> EntityId {
        let id = self.next_id.unwrap_or(EntityId::FIRST);
        self.next_id = Some(id.next());
        self.entities.insert(id, ComponentMap::new());
        tracing::trace!(target: "hearth::ecs", entity = %id, "entity created");
        id
    }

    /// Destroys an entity, removing it from every component index.
    ///
    /// Returns `false` if the entity was unknown (already destroyed or never
    /// created). Calling it twice has the same effect as calling it once.
    pub fn destroy_entity(&mut self, id: EntityId) -> bool {
        let Some(components) = self.entities.remove(&id) else {
            return false;
        };

        for type_id in components.keys() {
            self.unindex(*type_id, id);
        }

        tracing::trace!(
            target: "hearth::ecs",
            entity = %id,
            components = components.len(),
            "entity destroyed"
        );
        true
    }

    /// Checks whether an entity exists.
    #[inline]
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Returns the number of live entities.
    #[inline]
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Returns the number of components attached to an entity (0 if unknown).
    #[must_use]
    pub fn component_count(&self, id: EntityId) -> usize {
        self.entities.get(&id).map_or(0, HashMap::len)
    }

    /// Adds or replaces the component `T` on an entity.
    ///
    /// Returns the previous value of `T`, if any.
    pub fn add_component<T: Component>(&mut self, id: EntityId, value: T) -> EcsResult<Option<T>> {
        let components = self
            .entities
            .get_mut(&id)
            .ok_or(EcsError::EntityNotFound(id))?;

        let type_id = TypeId::of::<T>();
        let previous = components
            .insert(type_id, Box::new(value))
            .and_then(|old| old.downcast::<T>().ok())
            .map(|old| *old);

        self.index.entry(type_id).or_default().insert(id);
        Ok(previous)
    }

    /// Checks if an entity holds component `T`.
    #[inline]
    #[must_use]
    pub fn has_component<T: Component>(&self, id: EntityId) -> bool {
        self.has_component_type(id, TypeId::of::<T>())
    }

    /// Checks if an entity holds a component of the given type.
    #[must_use]
    pub fn has_component_type(&self, id: EntityId, type_id: TypeId) -> bool {
        self.entities
            .get(&id)
            .is_some_and(|components| components.contains_key(&type_id))
    }

    /// Returns a copy of component `T`, or `None` if absent.
    #[must_use]
    pub fn get_component<T: Component>(&self, id: EntityId) -> Option<T> {
        self.get_component_ref::<T>(id).cloned()
    }

    /// Returns a reference to component `T`, or `None` if absent.
    #[must_use]
    pub fn get_component_ref<T: Component>(&self, id: EntityId) -> Option<&T> {
        self.entities
            .get(&id)?
            .get(&TypeId::of::<T>())?
            .downcast_ref::<T>()
    }

    /// Removes component `T`, returning it if it was present.
    pub fn remove_component<T: Component>(&mut self, id: EntityId) -> Option<T> {
        let type_id = TypeId::of::<T>();
        let removed = self.entities.get_mut(&id)?.remove(&type_id)?;
        self.unindex(type_id, id);
        removed.downcast::<T>().ok().map(|value| *value)
    }

    /// Returns all live entity IDs in creation order.
    #[must_use]
    pub fn get_all_entities(&self) -> Vec<EntityId> {
        self.entities.keys().copied().collect()
    }

    /// Returns a snapshot of every entity holding `T`, in creation order.
    #[must_use]
    pub fn get_entities_with<T: Component>(&self) -> Vec<EntityId> {
        self.index
            .get(&TypeId::of::<T>())
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Iterates every `(entity, component)` pair for `T`.
    pub fn iter_component<T: Component>(&self) -> impl Iterator<Item = (EntityId, &T)> + '_ {
        self.index
            .get(&TypeId::of::<T>())
            .into_iter()
            .flatten()
            .filter_map(move |id| self.get_component_ref::<T>(*id).map(|value| (*id, value)))
    }

    /// Destroys every entity. IDs keep counting from where they left off.
    pub fn clear(&mut self) {
        self.entities.clear();
        self.index.clear();
    }

    fn unindex(&mut self, type_id: TypeId, id: EntityId) {
        if let Some(ids) = self.index.get_mut(&type_id) {
            ids.remove(&id);
            if ids.is_empty() {
                self.index.remove(&type_id);
            }
        }
    }
}

impl std::fmt::Debug for EntityManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityManager")
            .field("entities", &self.entities.len())
            .field("component_types", &self.index.len())
            .field("next_id", &self.next_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::component::{Health, Position, Velocity};

    #[test]
    fn test_ids_are_sequential_and_never_reused() {
        let mut entities = EntityManager::new();
        let a = entities.create_entity();
        let b = entities.create_entity();
        assert_eq!(b.raw(), a.raw() + 1);

        assert!(entities.destroy_entity(a));
        let c = entities.create_entity();
        assert_ne!(c, a);
        assert_eq!(c.raw(), b.raw() + 1);
    }

    #[test]
    fn test_add_has_remove() {
        let mut entities = EntityManager::new();
        let id = entities.create_entity();

        entities.add_component(id, Position::new(1.0, 0.0, 0.0)).unwrap();
        entities.add_component(id, Velocity::new(0.0, 1.0, 0.0)).unwrap();
        assert!(entities.has_component::<Position>(id));
        assert!(entities.has_component::<Velocity>(id));

        let removed = entities.remove_component::<Position>(id);
        assert_eq!(removed, Some(Position::new(1.0, 0.0, 0.0)));
        assert!(!entities.has_component::<Position>(id));
        assert!(entities.has_component::<Velocity>(id));
        assert!(entities.get_entities_with::<Position>().is_empty());
    }

    #[test]
    fn test_add_replaces_existing() {
        let mut entities = EntityManager::new();
        let id = entities.create_entity();

        assert_eq!(entities.add_component(id, Health::new(100, 100)).unwrap(), None);
        let previous = entities.add_component(id, Health::new(40, 100)).unwrap();
        assert_eq!(previous, Some(Health::new(100, 100)));
        assert_eq!(entities.get_component::<Health>(id), Some(Health::new(40, 100)));
        assert_eq!(entities.component_count(id), 1);
        assert_eq!(entities.get_entities_with::<Health>(), vec![id]);
    }

    #[test]
    fn test_unknown_entity() {
        let mut entities = EntityManager::new();
        let ghost = EntityId::from_raw(99);

        assert!(!entities.has_component::<Health>(ghost));
        assert_eq!(entities.get_component::<Health>(ghost), None);
        assert_eq!(entities.remove_component::<Health>(ghost), None);
        assert_eq!(
            entities.add_component(ghost, Health::default()),
            Err(EcsError::EntityNotFound(ghost))
        );
    }

    #[test]
    fn test_zeroed_component_is_not_absence() {
        let mut entities = EntityManager::new();
        let id = entities.create_entity();
        entities.add_component(id, Health::default()).unwrap();
        assert_eq!(entities.get_component::<Health>(id), Some(Health::new(0, 0)));
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let mut entities = EntityManager::new();
        let id = entities.create_entity();
        entities.add_component(id, Health::new(1, 1)).unwrap();

        assert!(entities.destroy_entity(id));
        assert!(!entities.destroy_entity(id));
        assert!(!entities.contains(id));
        assert!(entities.get_entities_with::<Health>().is_empty());
        assert_eq!(
            entities.add_component(id, Health::new(1, 1)),
            Err(EcsError::EntityNotFound(id))
        );
    }

    #[test]
    fn test_iter_component() {
        let mut entities = EntityManager::new();
        let a = entities.create_entity();
        let b = entities.create_entity();
        let _c = entities.create_entity();
        entities.add_component(a, Health::new(1, 1)).unwrap();
        entities.add_component(b, Health::new(2, 2)).unwrap();

        let seen: Vec<_> = entities
            .iter_component::<Health>()
            .map(|(id, health)| (id, health.current))
            .collect();
        assert_eq!(seen, vec![(a, 1), (b, 2)]);
        assert_eq!(entities.get_all_entities().len(), 3);
    }

    #[test]
    fn test_clear_keeps_id_counter() {
        let mut entities = EntityManager::new();
        let a = entities.create_entity();
        entities.clear();
        assert_eq!(entities.entity_count(), 0);
        let b = entities.create_entity();
        assert!(b > a);
    }
}
