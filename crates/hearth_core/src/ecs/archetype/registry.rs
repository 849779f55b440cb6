//! # Archetype Registry
//!
//! Pure bookkeeping of archetype tags. An entity carries at most one tag;
//! re-tagging moves it to the new archetype's bucket.

use std::collections::{BTreeSet, HashMap};

use crate::ecs::entity::EntityId;

/// Forward (entity -> archetype) and reverse (archetype -> entities) maps, kept in sync.
#[derive(Debug, Default)]
pub struct ArchetypeRegistry {
    /// entity -> archetype name.
    entity_archetype: HashMap<EntityId, String>,
    /// archetype name -> tagged entities. Empty buckets are dropped.
    archetype_entities: HashMap<String, BTreeSet<EntityId>>,
}

impl ArchetypeRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Tags an entity, evicting it from its previous archetype first.
    ///
    /// Returns the previous tag, if it differed.
    pub fn register_entity_archetype(
        &mut self,
        entity: EntityId,
        archetype: impl Into<String>,
    ) -> Option<String> {
        let archetype = archetype.into();
        if self.entity_archetype.get(&entity) == Some(&archetype) {
            return None;
        }
        let previous = self.unregister_entity(entity);

        self.archetype_entities
            .entry(archetype.clone())
            .or_default()
            .insert(entity);
        tracing::trace!(target: "hearth::archetype", entity = %entity, archetype = %archetype, "entity tagged");
        self.entity_archetype.insert(entity, archetype);
        previous
    }

    /// Removes an entity's tag, returning it.
    pub fn unregister_entity(&mut self, entity: EntityId) -> Option<String> {
        let archetype = self.entity_archetype.remove(&entity)?;
        if let Some(bucket) = self.archetype_entities.get_mut(&archetype) {
            bucket.remove(&entity);
            if bucket.is_empty() {
                self.archetype_entities.remove(&archetype);
            }
        }
        Some(archetype)
    }

    /// The entity's current tag.
    #[must_use]
    pub fn get_entity_archetype(&self, entity: EntityId) -> Option<&str> {
        self.entity_archetype.get(&entity).map(String::as_str)
    }

    /// Entities tagged with `archetype`, in ascending ID order.
    #[must_use]
    pub fn get_entities_with_archetype(&self, archetype: &str) -> Vec<EntityId> {
        self.archetype_entities
            .get(archetype)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Checks whether an entity carries a tag.
    #[must_use]
    pub fn has_archetype(&self, entity: EntityId) -> bool {
        self.entity_archetype.contains_key(&entity)
    }

    /// Archetype names that currently have at least one entity, sorted.
    #[must_use]
    pub fn archetype_names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.archetype_entities.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of tagged entities.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entity_archetype.len()
    }

    /// Checks if no entity is tagged.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entity_archetype.is_empty()
    }

    /// Wipes both maps.
    pub fn clear(&mut self) {
        self.entity_archetype.clear();
        self.archetype_entities.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tagging_is_exclusive() {
        let mut registry = ArchetypeRegistry::new();
        let e = EntityId::from_raw(1);

        assert_eq!(registry.register_entity_archetype(e, "A"), None);
        assert_eq!(registry.register_entity_archetype(e, "B"), Some("A".to_owned()));

        assert_eq!(registry.get_entity_archetype(e), Some("B"));
        assert!(registry.get_entities_with_archetype("A").is_empty());
        assert_eq!(registry.get_entities_with_archetype("B"), vec![e]);
        assert_eq!(registry.archetype_names(), vec!["B"]);
    }

    #[test]
    fn test_retag_same_archetype_is_noop() {
        let mut registry = ArchetypeRegistry::new();
        let e = EntityId::from_raw(1);
        registry.register_entity_archetype(e, "A");
        assert_eq!(registry.register_entity_archetype(e, "A"), None);
        assert_eq!(registry.get_entities_with_archetype("A"), vec![e]);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unregister_and_clear() {
        let mut registry = ArchetypeRegistry::new();
        let a = EntityId::from_raw(1);
        let b = EntityId::from_raw(2);
        registry.register_entity_archetype(a, "Tree");
        registry.register_entity_archetype(b, "Tree");

        assert_eq!(registry.unregister_entity(a), Some("Tree".to_owned()));
        assert_eq!(registry.unregister_entity(a), None);
        assert_eq!(registry.get_entities_with_archetype("Tree"), vec![b]);

        registry.clear();
        assert!(registry.is_empty());
        assert!(!registry.has_archetype(b));
        assert!(registry.archetype_names().is_empty());
    }
}
