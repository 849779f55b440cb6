//! # Component Caches
//!
//! Per-type snapshots of "which entities hold component T".
//!
//! A cache is a derived index, not a source of truth. After
//! [`ComponentCache::update`] it matches the [`EntityManager`] exactly; it may
//! then go stale until the next update. There is no change notification, so
//! the owning system refreshes it once per tick.

use std::any::{Any, TypeId};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use super::component::Component;
use super::entity::EntityId;
use super::manager::EntityManager;

/// Hit/miss instrumentation for one cache.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CacheStatistics {
    /// Component type the cache holds.
    pub type_name: &'static str,
    /// Entities currently cached.
    pub entity_count: usize,
    /// Successful lookups.
    pub hits: u64,
    /// Failed lookups.
    pub misses: u64,
    /// `hits / (hits + misses)`, or 0 with no lookups.
    pub hit_ratio: f64,
}

/// Computes a hit ratio, defaulting to 0 when nothing was looked up.
#[allow(clippy::cast_precision_loss)]
fn hit_ratio(hits: u64, misses: u64) -> f64 {
    let total = hits + misses;
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}

/// Snapshot of every entity holding `T`, with lookup statistics.
///
/// # Example
///
/// ```rust
/// use hearth_core::{ComponentCache, EntityManager, Health};
///
/// let mut entities = EntityManager::new();
/// let id = entities.create_entity();
/// entities.add_component(id, Health::new(5, 10)).unwrap();
///
/// let mut cache = ComponentCache::<Health>::new();
/// cache.update(&entities);
/// assert_eq!(cache.get(id).map(|h| h.current), Some(5));
/// assert_eq!(cache.hit_count(), 1);
/// ```
pub struct ComponentCache<T: Component> {
    /// entity -> cached component value.
    values: HashMap<EntityId, T>,
    /// Entities currently cached, ordered by ID.
    ids: BTreeSet<EntityId>,
    /// Lookup hits (monotonic until reset).
    hits: AtomicU64,
    /// Lookup misses (monotonic until reset).
    misses: AtomicU64,
}

impl<T: Component> ComponentCache<T> {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
            ids: BTreeSet::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Rebuilds the cache from the entity manager.
    ///
    /// O(entities holding `T`). Statistics are left untouched.
    pub fn update(&mut self, entities: &EntityManager) {
        self.values.clear();
        self.ids.clear();

        for (id, value) in entities.iter_component::<T>() {
            self.values.insert(id, value.clone());
            self.ids.insert(id);
        }

        tracing::trace!(
            target: "hearth::ecs",
            component = T::component_name(),
            entities = self.ids.len(),
            "component cache rebuilt"
        );
    }

    /// Looks up a cached component, counting a hit or a miss.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&T> {
        let value = self.values.get(&id);
        let counter = if value.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        value
    }

    /// Checks whether an entity is cached. Does not touch statistics.
    #[inline]
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.ids.contains(&id)
    }

    /// Inserts or replaces a single entry without a full rebuild.
    pub fn add(&mut self, id: EntityId, value: T) {
        self.values.insert(id, value);
        self.ids.insert(id);
    }

    /// Removes a single entry without a full rebuild.
    pub fn remove(&mut self, id: EntityId) -> Option<T> {
        self.ids.remove(&id);
        self.values.remove(&id)
    }

    /// Returns the cached entity IDs in ascending order.
    #[must_use]
    pub fn get_all_entity_ids(&self) -> Vec<EntityId> {
        self.ids.iter().copied().collect()
    }

    /// Iterates cached `(entity, component)` pairs in ascending entity order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &T)> + '_ {
        self.ids
            .iter()
            .filter_map(move |id| self.values.get(id).map(|value| (*id, value)))
    }

    /// Number of cached entities.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Checks if the cache holds no entities.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Drops every cached entry. Statistics are kept.
    pub fn clear(&mut self) {
        self.values.clear();
        self.ids.clear();
    }

    /// Number of successful lookups.
    #[inline]
    #[must_use]
    pub fn hit_count(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Number of failed lookups.
    #[inline]
    #[must_use]
    pub fn miss_count(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// `hits / (hits + misses)`, 0 when nothing was looked up.
    #[must_use]
    pub fn hit_ratio(&self) -> f64 {
        hit_ratio(self.hit_count(), self.miss_count())
    }

    /// Zeroes the hit/miss counters.
    pub fn reset_statistics(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    /// Snapshot of this cache's statistics.
    #[must_use]
    pub fn statistics(&self) -> CacheStatistics {
        let hits = self.hit_count();
        let misses = self.miss_count();
        CacheStatistics {
            type_name: T::component_name(),
            entity_count: self.len(),
            hits,
            misses,
            hit_ratio: hit_ratio(hits, misses),
        }
    }
}

impl<T: Component> Default for ComponentCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Type-erased view of a [`ComponentCache`] so the registry can batch them.
trait ErasedCache: Send + Sync {
    fn update(&mut self, entities: &EntityManager);
    fn clear(&mut self);
    fn remove_entity(&mut self, id: EntityId);
    fn statistics(&self) -> CacheStatistics;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Component> ErasedCache for ComponentCache<T> {
    fn update(&mut self, entities: &EntityManager) {
        ComponentCache::update(self, entities);
    }

    fn clear(&mut self) {
        ComponentCache::clear(self);
    }

    fn remove_entity(&mut self, id: EntityId) {
        self.remove(id);
    }

    fn statistics(&self) -> CacheStatistics {
        ComponentCache::statistics(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// One lazily created [`ComponentCache`] per component type.
#[derive(Default)]
pub struct ComponentCacheRegistry {
    /// Caches in creation order.
    caches: Vec<Box<dyn ErasedCache>>,
    /// Component type -> position in `caches`.
    slots: HashMap<TypeId, usize>,
}

impl ComponentCacheRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cache for `T`, creating it on first use.
    ///
    /// A freshly created cache is empty until the next update.
    pub fn cache<T: Component>(&mut self) -> &mut ComponentCache<T> {
        let type_id = TypeId::of::<T>();
        let slot = match self.slots.get(&type_id) {
            Some(slot) => *slot,
            None => {
                tracing::debug!(
                    target: "hearth::ecs",
                    component = T::component_name(),
                    "component cache created"
                );
                self.caches.push(Box::new(ComponentCache::<T>::new()));
                let slot = self.caches.len() - 1;
                self.slots.insert(type_id, slot);
                slot
            }
        };

        self.caches[slot]
            .as_any_mut()
            .downcast_mut::<ComponentCache<T>>()
            .unwrap_or_else(|| unreachable!("cache slot holds a different component type"))
    }

    /// Returns the cache for `T` if one was created.
    #[must_use]
    pub fn get_cache<T: Component>(&self) -> Option<&ComponentCache<T>> {
        let cache = self
            .slots
            .get(&TypeId::of::<T>())
            .and_then(|slot| self.caches[*slot].as_any().downcast_ref::<ComponentCache<T>>());

        if cache.is_none() {
            tracing::warn!(
                target: "hearth::ecs",
                component = T::component_name(),
                "no component cache registered"
            );
        }
        cache
    }

    /// Checks whether a cache exists for `T`.
    #[must_use]
    pub fn has_cache<T: Component>(&self) -> bool {
        self.slots.contains_key(&TypeId::of::<T>())
    }

    /// Rebuilds every cache from the entity manager.
    pub fn update_all_caches(&mut self, entities: &EntityManager) {
        for cache in &mut self.caches {
            cache.update(entities);
        }
    }

    /// Empties every cache. Statistics are kept.
    pub fn clear_all_caches(&mut self) {
        for cache in &mut self.caches {
            cache.clear();
        }
    }

    /// Drops one entity from every cache without a rebuild.
    pub fn remove_entity(&mut self, id: EntityId) {
        for cache in &mut self.caches {
            cache.remove_entity(id);
        }
    }

    /// Statistics for every cache, in creation order.
    #[must_use]
    pub fn get_cache_statistics(&self) -> Vec<CacheStatistics> {
        self.caches.iter().map(|cache| cache.statistics()).collect()
    }

    /// Aggregate hit ratio across all caches, 0 with no lookups.
    #[must_use]
    pub fn total_hit_ratio(&self) -> f64 {
        let (hits, misses) = self
            .caches
            .iter()
            .map(|cache| cache.statistics())
            .fold((0, 0), |(hits, misses), stats| (hits + stats.hits, misses + stats.misses));
        hit_ratio(hits, misses)
    }

    /// Number of registered caches.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.caches.len()
    }

    /// Checks if no cache was created yet.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.caches.is_empty()
    }
}

impl std::fmt::Debug for ComponentCacheRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentCacheRegistry")
            .field("caches", &self.caches.len())
            .finish()
    }
}
