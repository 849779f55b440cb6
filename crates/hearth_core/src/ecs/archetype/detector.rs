//! # Archetype Detection
//!
//! Classifies an entity against the registered templates and tags it.
//!
//! First match wins, in template registration order. Overlapping templates
//! are not ranked by specificity: register narrower templates first if they
//! should take precedence.

use super::registry::ArchetypeRegistry;
use super::template::ArchetypeTemplateRegistry;
use crate::ecs::entity::EntityId;
use crate::ecs::manager::EntityManager;

/// Stateless one-shot classifier.
#[derive(Clone, Copy, Debug, Default)]
pub struct ArchetypeDetector;

impl ArchetypeDetector {
    /// Creates a detector.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Returns the first template, in registration order, whose required
    /// components are all present on the entity.
    #[must_use]
    pub fn detect<'t>(
        &self,
        entities: &EntityManager,
        templates: &'t ArchetypeTemplateRegistry,
        entity: EntityId,
    ) -> Option<&'t str> {
        templates
            .templates()
            .find(|template| template.matches(entities, entity))
            .map(|template| template.id())
    }

    /// Detects and, on a match, tags the entity in `registry`.
    ///
    /// Entities that match nothing keep whatever tag they had.
    pub fn detect_and_register(
        &self,
        entities: &EntityManager,
        templates: &ArchetypeTemplateRegistry,
        registry: &mut ArchetypeRegistry,
        entity: EntityId,
    ) -> Option<String> {
        let archetype = self.detect(entities, templates, entity)?.to_owned();
        registry.register_entity_archetype(entity, archetype.clone());
        tracing::debug!(target: "hearth::archetype", entity = %entity, archetype = %archetype, "archetype detected");
        Some(archetype)
    }

    /// Runs detection over every entity without a tag. Returns how many were tagged.
    pub fn detect_untagged(
        &self,
        entities: &EntityManager,
        templates: &ArchetypeTemplateRegistry,
        registry: &mut ArchetypeRegistry,
    ) -> usize {
        let mut tagged = 0;
        for id in entities.get_all_entities() {
            if registry.has_archetype(id) {
                continue;
            }
            if self.detect_and_register(entities, templates, registry, id).is_some() {
                tagged += 1;
            }
        }
        tagged
    }
}
