//! # Archetype Templates
//!
//! Named bundles of default component values, built fluently:
//!
//! ```rust
//! use hearth_core::{ArchetypeTemplate, ArchetypeTemplateRegistry, EntityManager, Health, Position};
//!
//! let mut templates = ArchetypeTemplateRegistry::new();
//! templates.register_template(
//!     ArchetypeTemplate::builder("Character")
//!         .with_component(Health::new(100, 100))
//!         .with_component(Position::default())
//!         .build(),
//! );
//!
//! let mut entities = EntityManager::new();
//! let id = templates.create_entity_from_template(&mut entities, "Character", None).unwrap();
//! assert!(templates.matches_template(&entities, id, "Character"));
//! ```

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;

use crate::ecs::component::Component;
use crate::ecs::entity::EntityId;
use crate::ecs::manager::EntityManager;
use crate::error::{EcsError, EcsResult};

/// A component value whose concrete type is known only at registration time.
trait ErasedComponent: Send + Sync {
    fn component_type(&self) -> TypeId;
    fn component_name(&self) -> &'static str;
    fn insert_into(&self, entities: &mut EntityManager, id: EntityId) -> EcsResult<()>;
    fn clone_box(&self) -> Box<dyn ErasedComponent>;
}

struct ComponentValue<T: Component>(T);

impl<T: Component> ErasedComponent for ComponentValue<T> {
    fn component_type(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn component_name(&self) -> &'static str {
        T::component_name()
    }

    fn insert_into(&self, entities: &mut EntityManager, id: EntityId) -> EcsResult<()> {
        entities.add_component(id, self.0.clone()).map(|_| ())
    }

    fn clone_box(&self) -> Box<dyn ErasedComponent> {
        Box::new(Self(self.0.clone()))
    }
}

impl Clone for Box<dyn ErasedComponent> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// A named set of (component type, default value) pairs.
#[derive(Clone)]
pub struct ArchetypeTemplate {
    id: String,
    /// Defaults in insertion order, at most one per component type.
    components: Vec<Box<dyn ErasedComponent>>,
}

impl ArchetypeTemplate {
    /// Starts building a template with the given id.
    #[must_use]
    pub fn builder(id: impl Into<String>) -> ArchetypeTemplateBuilder {
        ArchetypeTemplateBuilder {
            template: Self {
                id: id.into(),
                components: Vec::new(),
            },
        }
    }

    /// The template's id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Component types the template requires, in insertion order.
    pub fn component_types(&self) -> impl Iterator<Item = TypeId> + '_ {
        self.components.iter().map(|c| c.component_type())
    }

    /// Component type names, in insertion order.
    pub fn component_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.components.iter().map(|c| c.component_name())
    }

    /// Checks whether the template includes component `T`.
    #[must_use]
    pub fn requires<T: Component>(&self) -> bool {
        self.components
            .iter()
            .any(|c| c.component_type() == TypeId::of::<T>())
    }

    /// Number of component types in the template.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Checks if the template has no components.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Structural check: does the entity hold every required component type?
    ///
    /// Values are not compared.
    #[must_use]
    pub fn matches(&self, entities: &EntityManager, id: EntityId) -> bool {
        entities.contains(id)
            && self
                .component_types()
                .all(|type_id| entities.has_component_type(id, type_id))
    }

    fn set(&mut self, value: Box<dyn ErasedComponent>) {
        let type_id = value.component_type();
        match self
            .components
            .iter_mut()
            .find(|c| c.component_type() == type_id)
        {
            Some(slot) => *slot = value,
            None => self.components.push(value),
        }
    }
}

impl fmt::Debug for ArchetypeTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchetypeTemplate")
            .field("id", &self.id)
            .field("components", &self.component_names().collect::<Vec<_>>())
            .finish()
    }
}

/// Fluent builder for [`ArchetypeTemplate`].
#[must_use]
pub struct ArchetypeTemplateBuilder {
    template: ArchetypeTemplate,
}

impl ArchetypeTemplateBuilder {
    /// Adds a default component. A second value of the same type replaces the first.
    pub fn with_component<T: Component>(mut self, value: T) -> Self {
        self.template.set(Box::new(ComponentValue(value)));
        self
    }

    /// Finishes the template.
    pub fn build(self) -> ArchetypeTemplate {
        self.template
    }
}

/// Per-type values that replace a template's defaults at instantiation.
#[derive(Clone, Default)]
pub struct ComponentOverrides {
    values: HashMap<TypeId, Box<dyn ErasedComponent>>,
}

impl ComponentOverrides {
    /// Creates an empty set of overrides.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an override, builder style.
    #[must_use]
    pub fn with<T: Component>(mut self, value: T) -> Self {
        self.insert(value);
        self
    }

    /// Adds or replaces an override.
    pub fn insert<T: Component>(&mut self, value: T) {
        self.values
            .insert(TypeId::of::<T>(), Box::new(ComponentValue(value)));
    }

    /// Number of overrides.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Checks if there are no overrides.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn get(&self, type_id: TypeId) -> Option<&(dyn ErasedComponent + 'static)> {
        self.values.get(&type_id).map(|value| &**value)
    }
}

impl fmt::Debug for ComponentOverrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.values.values().map(|c| c.component_name()))
            .finish()
    }
}

/// Templates by id, remembering registration order.
#[derive(Debug, Default)]
pub struct ArchetypeTemplateRegistry {
    /// Templates in registration order.
    templates: Vec<ArchetypeTemplate>,
    /// Template id -> position in `templates`.
    by_id: HashMap<String, usize>,
}

impl ArchetypeTemplateRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a template.
    ///
    /// Re-registering an id replaces the template but keeps its original
    /// position in the registration order. Returns `true` on replacement.
    pub fn register_template(&mut self, template: ArchetypeTemplate) -> bool {
        if let Some(&slot) = self.by_id.get(template.id()) {
            tracing::debug!(target: "hearth::archetype", template = template.id(), "template replaced");
            self.templates[slot] = template;
            return true;
        }

        tracing::debug!(
            target: "hearth::archetype",
            template = template.id(),
            components = template.len(),
            "template registered"
        );
        self.by_id.insert(template.id.clone(), self.templates.len());
        self.templates.push(template);
        false
    }

    /// Removes a template, returning it if it existed.
    pub fn remove_template(&mut self, id: &str) -> Option<ArchetypeTemplate> {
        let slot = self.by_id.remove(id)?;
        let template = self.templates.remove(slot);
        for index in self.by_id.values_mut() {
            if *index > slot {
                *index -= 1;
            }
        }
        Some(template)
    }

    /// Looks up a template.
    #[must_use]
    pub fn get_template(&self, id: &str) -> Option<&ArchetypeTemplate> {
        self.by_id.get(id).map(|slot| &self.templates[*slot])
    }

    /// Checks whether a template is registered.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    /// Template ids in registration order.
    pub fn template_ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.templates.iter().map(ArchetypeTemplate::id)
    }

    /// Templates in registration order.
    pub fn templates(&self) -> impl Iterator<Item = &ArchetypeTemplate> + '_ {
        self.templates.iter()
    }

    /// Number of registered templates.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Checks if no template is registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Creates an entity carrying every default of the template.
    ///
    /// An override for a component type the template includes replaces the
    /// default; overrides for other types are ignored.
    pub fn create_entity_from_template(
        &self,
        entities: &mut EntityManager,
        id: &str,
        overrides: Option<&ComponentOverrides>,
    ) -> EcsResult<EntityId> {
        let Some(template) = self.get_template(id) else {
            tracing::warn!(target: "hearth::archetype", template = id, "unknown archetype template");
            return Err(EcsError::TemplateNotFound(id.to_owned()));
        };

        let entity = entities.create_entity();
        for default in &template.components {
            let value = overrides
                .and_then(|o| o.get(default.component_type()))
                .unwrap_or(&**default);
            value.insert_into(entities, entity)?;
        }

        tracing::trace!(target: "hearth::archetype", template = id, entity = %entity, "entity created from template");
        Ok(entity)
    }

    /// Structural check against a registered template. Unknown ids never match.
    #[must_use]
    pub fn matches_template(&self, entities: &EntityManager, entity: EntityId, id: &str) -> bool {
        self.get_template(id)
            .is_some_and(|template| template.matches(entities, entity))
    }

    /// Drops every template.
    pub fn clear(&mut self) {
        self.templates.clear();
        self.by_id.clear();
    }
}
