//! The component memory manager: one pool per registered type.
//!
//! Pools are created up front from the registry and addressed by
//! [`ComponentTypeId`] index. Capability compatibility is resolved here, once
//! per pool, so capability queries only touch pools that qualify.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::rc::Rc;

use crate::capability::CapabilityEntry;
use crate::component::{Component, ComponentTypeId, FieldMap};
use crate::entity::EntityId;
use crate::lifecycle::HookFn;
use crate::pool::{AnyPool, ComponentPool, SlotFilter};
use crate::reference::ComponentRef;
use crate::registry::ComponentRegistry;
use crate::EcsError;

/// Owns every component pool.
pub struct ComponentMemoryManager {
    registry: Rc<ComponentRegistry>,
    /// Indexed by `ComponentTypeId::index()`.
    pools: Vec<Box<dyn AnyPool>>,
    /// Capability TypeId -> pools exposing it, in type-id order.
    capabilities: HashMap<TypeId, Vec<(ComponentTypeId, CapabilityEntry)>>,
}

impl ComponentMemoryManager {
    /// Create one empty pool per type in `registry`.
    pub fn new(registry: Rc<ComponentRegistry>) -> Self {
        let pools: Vec<Box<dyn AnyPool>> = registry.create_all_pools().into_values().collect();

        let mut capabilities: HashMap<TypeId, Vec<(ComponentTypeId, CapabilityEntry)>> =
            HashMap::new();
        for descriptor in registry.iter() {
            for entry in &descriptor.capabilities {
                capabilities
                    .entry(entry.capability)
                    .or_default()
                    .push((descriptor.id, entry.clone()));
            }
        }

        Self {
            registry,
            pools,
            capabilities,
        }
    }

    /// The registry the pools were built from.
    pub fn registry(&self) -> &Rc<ComponentRegistry> {
        &self.registry
    }

    // -- per-instance operations --------------------------------------------

    /// Allocate a default instance of type `id` for `entity`.
    pub fn allocate_component(
        &mut self,
        entity: EntityId,
        id: ComponentTypeId,
    ) -> Result<ComponentRef, EcsError> {
        self.get_pool_mut(id)?.allocate(entity)
    }

    /// Allocate an instance of type `id` seeded from `fields`.
    pub fn allocate_with_fields(
        &mut self,
        entity: EntityId,
        id: ComponentTypeId,
        fields: &FieldMap,
    ) -> Result<ComponentRef, EcsError> {
        self.get_pool_mut(id)?.allocate_with_fields(entity, fields)
    }

    /// Remove `entity`'s instance of type `id` without running any hook.
    pub fn destroy_component(&mut self, entity: EntityId, id: ComponentTypeId) -> bool {
        match self.pools.get_mut(id.index()) {
            Some(pool) => pool.destroy(entity),
            None => false,
        }
    }

    /// Whether `entity` has an instance of type `id`.
    pub fn has_component(&self, entity: EntityId, id: ComponentTypeId) -> bool {
        self.pools
            .get(id.index())
            .is_some_and(|pool| pool.has(entity))
    }

    /// Whether `reference` still resolves to a live instance.
    pub fn is_live(&self, reference: &ComponentRef) -> bool {
        let Some(pool) = self.pools.get(reference.type_id().index()) else {
            return false;
        };
        pool.component_type() == reference.type_id()
            && pool.serial_of(reference.entity()) == Some(reference.serial())
    }

    // -- pool access --------------------------------------------------------

    /// The pool for type `id`.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownComponentId`] if `id` is not registered.
    pub fn get_pool(&self, id: ComponentTypeId) -> Result<&dyn AnyPool, EcsError> {
        self.pools
            .get(id.index())
            .map(|pool| pool.as_ref())
            .ok_or(EcsError::UnknownComponentId { id })
    }

    /// Mutable variant of [`get_pool`](Self::get_pool).
    pub fn get_pool_mut(&mut self, id: ComponentTypeId) -> Result<&mut dyn AnyPool, EcsError> {
        match self.pools.get_mut(id.index()) {
            Some(pool) => Ok(pool.as_mut()),
            None => Err(EcsError::UnknownComponentId { id }),
        }
    }

    /// The typed pool for `T`, if registered.
    pub fn pool<T: Component>(&self) -> Option<&ComponentPool<T>> {
        self.pool_by_id(self.registry.lookup::<T>()?)
    }

    /// The typed pool for `T`, mutably, if registered.
    pub fn pool_mut<T: Component>(&mut self) -> Option<&mut ComponentPool<T>> {
        let id = self.registry.lookup::<T>()?;
        self.pool_by_id_mut(id)
    }

    /// The pool for `id` downcast to `T`. `None` if `id` is unknown or stores
    /// another type.
    pub fn pool_by_id<T: Component>(&self, id: ComponentTypeId) -> Option<&ComponentPool<T>> {
        self.pools
            .get(id.index())?
            .as_any()
            .downcast_ref::<ComponentPool<T>>()
    }

    /// Mutable variant of [`pool_by_id`](Self::pool_by_id).
    pub fn pool_by_id_mut<T: Component>(
        &mut self,
        id: ComponentTypeId,
    ) -> Option<&mut ComponentPool<T>> {
        self.pools
            .get_mut(id.index())?
            .as_any_mut()
            .downcast_mut::<ComponentPool<T>>()
    }

    pub(crate) fn hook_fn(&self, id: ComponentTypeId) -> Option<HookFn> {
        self.registry.descriptor(id).map(|descriptor| descriptor.hook)
    }

    // -- bulk access --------------------------------------------------------

    /// Visit every pool in type-id order.
    pub fn for_each_pool(&self, mut f: impl FnMut(&dyn AnyPool)) {
        for pool in &self.pools {
            f(pool.as_ref());
        }
    }

    /// Visit every live instance of every pool as `&mut dyn Any`.
    ///
    /// Structural changes are impossible here; use
    /// [`EntityManager::for_all_components`](crate::manager::EntityManager::for_all_components)
    /// when the callback needs to create or destroy.
    pub fn for_all_components(&mut self, mut f: impl FnMut(ComponentTypeId, EntityId, &mut dyn Any)) {
        for pool in &mut self.pools {
            let id = pool.component_type();
            pool.for_each_any(&mut |entity, value| f(id, entity, value));
        }
    }

    /// Append `(type, entity)` pairs accepted by `filter`, in type-id then
    /// storage order.
    pub(crate) fn collect_live(
        &self,
        filter: SlotFilter,
        out: &mut Vec<(ComponentTypeId, EntityId)>,
    ) {
        let mut entities = Vec::new();
        for pool in &self.pools {
            entities.clear();
            pool.collect_entities(filter, &mut entities);
            let id = pool.component_type();
            out.extend(entities.iter().map(|&entity| (id, entity)));
        }
    }

    /// Visit every live instance whose type declared capability `C`.
    ///
    /// Returns the number of instances visited.
    pub fn for_each_capability<C: ?Sized + 'static>(
        &mut self,
        mut f: impl FnMut(EntityId, &mut C),
    ) -> usize {
        let Some(entries) = self.capabilities.get(&TypeId::of::<C>()) else {
            return 0;
        };
        let mut visited = 0;
        for (id, entry) in entries {
            let (Some(pool), Some(visitor)) =
                (self.pools.get_mut(id.index()), entry.visitor::<C>())
            else {
                continue;
            };
            visited += visitor.visit(pool.as_mut(), &mut f);
        }
        visited
    }

    /// Number of pools exposing capability `C`.
    pub fn capability_pool_count<C: ?Sized + 'static>(&self) -> usize {
        self.capabilities
            .get(&TypeId::of::<C>())
            .map_or(0, Vec::len)
    }

    // -- accounting ---------------------------------------------------------

    /// Bytes reserved by all pools, slot storage plus index overhead.
    pub fn total_bytes(&self) -> usize {
        self.pools
            .iter()
            .map(|pool| pool.allocated_bytes() + pool.reference_overhead_bytes())
            .sum()
    }

    /// Live instances across all pools.
    pub fn component_count(&self) -> usize {
        self.pools.iter().map(|pool| pool.component_count()).sum()
    }

    /// Number of pools (one per registered type).
    pub fn pool_count(&self) -> usize {
        self.pools.len()
    }

    /// Drop every instance in every pool without running hooks.
    pub fn clear_all(&mut self) {
        for pool in &mut self.pools {
            pool.clear();
        }
    }
}

impl std::fmt::Debug for ComponentMemoryManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentMemoryManager")
            .field("pools", &self.pools.len())
            .field("components", &self.component_count())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Transform;
    use serde::{Deserialize, Serialize};

    trait Scored {
        fn score(&self) -> u32;
        fn bump(&mut self);
    }

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Coin {
        value: u32,
    }

    impl Component for Coin {}

    impl Scored for Coin {
        fn score(&self) -> u32 {
            self.value
        }
        fn bump(&mut self) {
            self.value += 1;
        }
    }

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Gem {
        carats: u32,
    }

    impl Component for Gem {}

    impl Scored for Gem {
        fn score(&self) -> u32 {
            self.carats * 10
        }
        fn bump(&mut self) {
            self.carats += 1;
        }
    }

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Rock {
        mass: f32,
    }

    impl Component for Rock {}

    fn memory() -> (ComponentMemoryManager, ComponentTypeId, ComponentTypeId, ComponentTypeId) {
        let mut registry = ComponentRegistry::new();
        let coin = registry.register::<Coin>("coin").unwrap();
        let gem = registry.register::<Gem>("gem").unwrap();
        let rock = registry.register::<Rock>("rock").unwrap();
        registry.register_capability::<Coin, dyn Scored>(|c| c).unwrap();
        registry.register_capability::<Gem, dyn Scored>(|g| g).unwrap();
        (ComponentMemoryManager::new(Rc::new(registry)), coin, gem, rock)
    }

    fn e(raw: u64) -> EntityId {
        EntityId::from_raw(raw)
    }

    #[test]
    fn one_pool_per_registered_type() {
        let (memory, coin, _, rock) = memory();
        assert_eq!(memory.pool_count(), 4);
        assert_eq!(memory.get_pool(coin).unwrap().name(), "coin");
        assert_eq!(memory.get_pool(rock).unwrap().component_type(), rock);
        assert!(memory.pool::<Transform>().is_some());
    }

    #[test]
    fn unknown_pool_is_an_error() {
        let (mut memory, ..) = memory();
        let bogus = ComponentTypeId(42);
        assert!(matches!(
            memory.get_pool(bogus),
            Err(EcsError::UnknownComponentId { .. })
        ));
        assert!(memory.allocate_component(e(1), bogus).is_err());
        assert!(!memory.destroy_component(e(1), bogus));
        assert!(!memory.has_component(e(1), bogus));
    }

    #[test]
    fn allocate_destroy_routes_by_type() {
        let (mut memory, coin, gem, _) = memory();
        let r = memory.allocate_component(e(1), coin).unwrap();
        memory.allocate_component(e(1), gem).unwrap();
        assert!(memory.is_live(&r));
        assert_eq!(memory.component_count(), 2);

        assert!(memory.destroy_component(e(1), coin));
        assert!(!memory.is_live(&r));
        assert!(!memory.has_component(e(1), coin));
        assert!(memory.has_component(e(1), gem));
    }

    #[test]
    fn typed_pool_downcast_checks_type() {
        let (mut memory, coin, ..) = memory();
        memory.allocate_component(e(1), coin).unwrap();
        assert!(memory.pool_by_id::<Coin>(coin).is_some());
        assert!(memory.pool_by_id::<Gem>(coin).is_none());
        memory.pool_mut::<Coin>().unwrap().get_mut(e(1)).unwrap().value = 5;
        assert_eq!(memory.pool::<Coin>().unwrap()[e(1)].value, 5);
    }

    #[test]
    fn capability_query_touches_only_qualifying_pools() {
        let (mut memory, coin, gem, rock) = memory();
        memory.allocate_component(e(1), coin).unwrap();
        memory.allocate_component(e(2), coin).unwrap();
        memory.allocate_component(e(3), gem).unwrap();
        memory.allocate_component(e(4), rock).unwrap();
        assert_eq!(memory.capability_pool_count::<dyn Scored>(), 2);

        let visited = memory.for_each_capability::<dyn Scored>(|_, s| s.bump());
        assert_eq!(visited, 3);

        let mut total = 0;
        memory.for_each_capability::<dyn Scored>(|_, s| total += s.score());
        assert_eq!(total, 1 + 1 + 10);
    }

    #[test]
    fn capability_without_declarations_visits_nothing() {
        trait Unused {}
        let (mut memory, coin, ..) = memory();
        memory.allocate_component(e(1), coin).unwrap();
        assert_eq!(memory.for_each_capability::<dyn Unused>(|_, _| {}), 0);
    }

    #[test]
    fn for_all_components_sees_every_instance() {
        let (mut memory, coin, gem, _) = memory();
        memory.allocate_component(e(1), coin).unwrap();
        memory.allocate_component(e(2), gem).unwrap();
        let mut seen = Vec::new();
        memory.for_all_components(|id, entity, value| {
            if let Some(coin) = value.downcast_mut::<Coin>() {
                coin.value = 9;
            }
            seen.push((id, entity));
        });
        assert_eq!(seen, vec![(coin, e(1)), (gem, e(2))]);
        assert_eq!(memory.pool::<Coin>().unwrap()[e(1)].value, 9);
    }

    #[test]
    fn clear_all_and_byte_accounting() {
        let (mut memory, coin, ..) = memory();
        assert_eq!(memory.total_bytes(), 0);
        for raw in 1..=16 {
            memory.allocate_component(e(raw), coin).unwrap();
        }
        assert!(memory.total_bytes() > 0);
        memory.clear_all();
        assert_eq!(memory.component_count(), 0);
    }
}
