//! Per-type component pools.
//!
//! A [`ComponentPool<T>`] owns every live instance of one component type in a
//! densely packed `Vec`, plus a map from [`EntityId`] to the instance's current
//! slot. Removal erases the slot in place and shifts every later slot down by
//! one, keeping storage order equal to insertion order. The index is fixed up
//! accordingly, which is why references hold entity ids and never slot
//! positions.
//!
//! The memory manager only sees pools through the object-safe [`AnyPool`]
//! trait.

use std::any::Any;
use std::collections::HashMap;
use std::ops::Index;

use crate::component::{fields_of, overlay_fields, Component, ComponentTypeId, FieldMap};
use crate::entity::EntityId;
use crate::reference::ComponentRef;
use crate::EcsError;

// ---------------------------------------------------------------------------
// Slot
// ---------------------------------------------------------------------------

/// Storage cell for one instance.
///
/// `value` is `None` only while the instance is checked out to one of its own
/// lifecycle hooks.
#[derive(Debug)]
struct Slot<T> {
    entity: EntityId,
    serial: u64,
    started: bool,
    value: Option<T>,
}

/// Which live instances a snapshot should include.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotFilter {
    /// Every live instance.
    All,
    /// Instances whose start hook has not run yet.
    Pending,
    /// Instances whose start hook has run.
    Started,
}

impl SlotFilter {
    fn accepts(self, started: bool) -> bool {
        match self {
            SlotFilter::All => true,
            SlotFilter::Pending => !started,
            SlotFilter::Started => started,
        }
    }
}

/// An instance temporarily moved out of its slot while a hook runs on it.
#[derive(Debug)]
pub(crate) struct Checkout<T> {
    pub entity: EntityId,
    pub serial: u64,
    pub value: T,
}

// ---------------------------------------------------------------------------
// ComponentPool
// ---------------------------------------------------------------------------

/// Contiguous storage for every live instance of component type `T`.
#[derive(Debug)]
pub struct ComponentPool<T: Component> {
    type_id: ComponentTypeId,
    name: String,
    slots: Vec<Slot<T>>,
    index: HashMap<EntityId, usize>,
    next_serial: u64,
}

impl<T: Component> ComponentPool<T> {
    /// Create an empty pool for the type registered as `type_id` / `name`.
    pub fn new(type_id: ComponentTypeId, name: &str) -> Self {
        Self {
            type_id,
            name: name.to_owned(),
            slots: Vec::new(),
            index: HashMap::new(),
            next_serial: 0,
        }
    }

    /// The component type this pool stores.
    pub fn type_id(&self) -> ComponentTypeId {
        self.type_id
    }

    /// Registered display name of the stored type.
    pub fn name(&self) -> &str {
        &self.name
    }

    // -- allocation ---------------------------------------------------------

    /// Append a default-constructed instance for `entity`.
    ///
    /// # Errors
    ///
    /// [`EcsError::DuplicateComponent`] if `entity` already has an instance
    /// in this pool.
    pub fn allocate(&mut self, entity: EntityId) -> Result<ComponentRef, EcsError> {
        self.insert(entity, T::default())
    }

    /// Append `value` as the instance for `entity`.
    ///
    /// # Errors
    ///
    /// [`EcsError::DuplicateComponent`] if `entity` already has an instance
    /// in this pool.
    pub fn insert(&mut self, entity: EntityId, value: T) -> Result<ComponentRef, EcsError> {
        if self.index.contains_key(&entity) {
            return Err(EcsError::DuplicateComponent {
                entity,
                component: self.name.clone(),
            });
        }
        self.next_serial += 1;
        let serial = self.next_serial;
        self.index.insert(entity, self.slots.len());
        self.slots.push(Slot {
            entity,
            serial,
            started: false,
            value: Some(value),
        });
        Ok(ComponentRef::new(self.type_id, entity, serial))
    }

    /// Append a default instance with `fields` overlaid on it.
    ///
    /// # Errors
    ///
    /// [`EcsError::DuplicateComponent`] if `entity` already has an instance,
    /// or a deserialization error if `fields` does not fit the type.
    pub fn allocate_with_fields(
        &mut self,
        entity: EntityId,
        fields: &FieldMap,
    ) -> Result<ComponentRef, EcsError> {
        if self.index.contains_key(&entity) {
            return Err(EcsError::DuplicateComponent {
                entity,
                component: self.name.clone(),
            });
        }
        let value = overlay_fields(&self.name, &T::default(), fields)?;
        self.insert(entity, value)
    }

    // -- removal ------------------------------------------------------------

    /// Destroy the instance owned by `entity`.
    ///
    /// Returns `false` (and does nothing) if there is none.
    pub fn destroy(&mut self, entity: EntityId) -> bool {
        self.take(entity).is_some()
    }

    /// Remove the slot owned by `entity` and hand back its value.
    ///
    /// The outer `Option` is `None` if `entity` had no slot. The inner one is
    /// `None` if the value is currently checked out to a hook; that hook's
    /// check-in will then receive it back as an orphan.
    pub(crate) fn take(&mut self, entity: EntityId) -> Option<Option<T>> {
        let position = self.index.remove(&entity)?;
        let slot = self.slots.remove(position);
        for index in self.index.values_mut() {
            if *index > position {
                *index -= 1;
            }
        }
        Some(slot.value)
    }

    /// Drop every instance and the index.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.index.clear();
    }

    // -- lookup -------------------------------------------------------------

    /// Whether `entity` has an instance in this pool.
    pub fn has(&self, entity: EntityId) -> bool {
        self.index.contains_key(&entity)
    }

    /// The instance owned by `entity`.
    ///
    /// Returns `None` if there is none, or while it is checked out to one of
    /// its own hooks (the hook already holds it as `&mut self`).
    pub fn get(&self, entity: EntityId) -> Option<&T> {
        let position = *self.index.get(&entity)?;
        self.slots[position].value.as_ref()
    }

    /// Mutable access to the instance owned by `entity`.
    pub fn get_mut(&mut self, entity: EntityId) -> Option<&mut T> {
        let position = *self.index.get(&entity)?;
        self.slots[position].value.as_mut()
    }

    /// Whether the start hook has run for `entity`'s instance.
    pub fn is_started(&self, entity: EntityId) -> Option<bool> {
        self.index
            .get(&entity)
            .map(|&position| self.slots[position].started)
    }

    /// Allocation serial of `entity`'s current instance.
    pub fn serial_of(&self, entity: EntityId) -> Option<u64> {
        self.index
            .get(&entity)
            .map(|&position| self.slots[position].serial)
    }

    /// Whether `reference` still points at a live instance of this pool.
    pub fn is_live(&self, reference: &ComponentRef) -> bool {
        reference.type_id() == self.type_id
            && self.serial_of(reference.entity()) == Some(reference.serial())
    }

    // -- iteration ----------------------------------------------------------

    /// Visit every instance in storage order.
    pub fn for_each(&self, mut f: impl FnMut(EntityId, &T)) {
        for slot in &self.slots {
            if let Some(value) = &slot.value {
                f(slot.entity, value);
            }
        }
    }

    /// Visit every instance mutably in storage order.
    pub fn for_each_mut(&mut self, mut f: impl FnMut(EntityId, &mut T)) {
        for slot in &mut self.slots {
            if let Some(value) = &mut slot.value {
                f(slot.entity, value);
            }
        }
    }

    /// Iterate `(entity, instance)` pairs in storage order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &T)> + '_ {
        self.slots
            .iter()
            .filter_map(|slot| slot.value.as_ref().map(|value| (slot.entity, value)))
    }

    /// Owning entities in storage order.
    pub fn entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.slots.iter().map(|slot| slot.entity)
    }

    // -- checkout -----------------------------------------------------------

    /// Move `entity`'s instance out of its slot so a hook can run on it.
    ///
    /// `filter` decides eligibility: [`SlotFilter::Pending`] only checks out
    /// unstarted instances and marks them started, [`SlotFilter::Started`]
    /// only started ones. Already checked-out instances are never handed out
    /// twice.
    pub(crate) fn check_out(&mut self, entity: EntityId, filter: SlotFilter) -> Option<Checkout<T>> {
        let position = *self.index.get(&entity)?;
        let slot = &mut self.slots[position];
        if !filter.accepts(slot.started) {
            return None;
        }
        let value = slot.value.take()?;
        if filter == SlotFilter::Pending {
            slot.started = true;
        }
        Some(Checkout {
            entity,
            serial: slot.serial,
            value,
        })
    }

    /// Return a checked-out instance to its slot.
    ///
    /// If the slot was destroyed (or replaced by a new allocation) while the
    /// value was out, the value is handed back as an orphan.
    pub(crate) fn check_in(&mut self, checkout: Checkout<T>) -> Option<T> {
        match self.index.get(&checkout.entity) {
            Some(&position) if self.slots[position].serial == checkout.serial => {
                self.slots[position].value = Some(checkout.value);
                None
            }
            _ => Some(checkout.value),
        }
    }

    /// Remove the slot a checked-out instance came from, if it still holds
    /// the same allocation. The value itself is dropped.
    pub(crate) fn retire(&mut self, checkout: Checkout<T>) -> bool {
        match self.index.get(&checkout.entity) {
            Some(&position) if self.slots[position].serial == checkout.serial => {
                self.take(checkout.entity).is_some()
            }
            _ => false,
        }
    }

    /// Whether `entity`'s instance is currently checked out by a running hook.
    pub fn is_checked_out(&self, entity: EntityId) -> bool {
        self.index
            .get(&entity)
            .is_some_and(|&position| self.slots[position].value.is_none())
    }

    // -- fields -------------------------------------------------------------

    /// Field-map view of `entity`'s instance.
    pub fn read_fields(&self, entity: EntityId) -> Result<FieldMap, EcsError> {
        let value = self.get(entity).ok_or_else(|| EcsError::MissingComponent {
            entity,
            component: self.name.clone(),
        })?;
        fields_of(&self.name, value)
    }

    /// Overlay `fields` onto `entity`'s instance.
    pub fn write_fields(&mut self, entity: EntityId, fields: &FieldMap) -> Result<(), EcsError> {
        let name = self.name.clone();
        let value = self
            .get_mut(entity)
            .ok_or_else(|| EcsError::MissingComponent {
                entity,
                component: name.clone(),
            })?;
        *value = overlay_fields(&name, value, fields)?;
        Ok(())
    }

    // -- accounting ---------------------------------------------------------

    /// Number of live instances.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the pool holds no instances.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Bytes reserved for slot storage.
    pub fn allocated_bytes(&self) -> usize {
        self.slots.capacity() * std::mem::size_of::<Slot<T>>()
    }

    /// Approximate bytes used by the entity -> slot index.
    pub fn reference_overhead_bytes(&self) -> usize {
        self.index.capacity() * (std::mem::size_of::<EntityId>() + std::mem::size_of::<usize>())
    }
}

impl<T: Component> Index<EntityId> for ComponentPool<T> {
    type Output = T;

    /// # Panics
    ///
    /// Panics if `entity` has no instance in this pool, or if the instance is
    /// checked out by its own running hook.
    fn index(&self, entity: EntityId) -> &T {
        match self.get(entity) {
            Some(value) => value,
            None if self.has(entity) => panic!(
                "entity {entity}'s '{}' component is checked out by its running hook",
                self.name
            ),
            None => panic!("entity {entity} has no '{}' component", self.name),
        }
    }
}

// ---------------------------------------------------------------------------
// AnyPool -- type-erased pool interface
// ---------------------------------------------------------------------------

/// Object-safe view of a [`ComponentPool`], used by the memory manager to
/// route operations by [`ComponentTypeId`].
pub trait AnyPool: Any {
    /// The component type this pool stores.
    fn component_type(&self) -> ComponentTypeId;
    /// Registered display name of the stored type.
    fn name(&self) -> &str;
    /// See [`ComponentPool::allocate`].
    fn allocate(&mut self, entity: EntityId) -> Result<ComponentRef, EcsError>;
    /// See [`ComponentPool::allocate_with_fields`].
    fn allocate_with_fields(
        &mut self,
        entity: EntityId,
        fields: &FieldMap,
    ) -> Result<ComponentRef, EcsError>;
    /// See [`ComponentPool::destroy`].
    fn destroy(&mut self, entity: EntityId) -> bool;
    /// See [`ComponentPool::has`].
    fn has(&self, entity: EntityId) -> bool;
    /// The instance owned by `entity`, as `&dyn Any`.
    fn get_any(&self, entity: EntityId) -> Option<&dyn Any>;
    /// The instance owned by `entity`, as `&mut dyn Any`.
    fn get_any_mut(&mut self, entity: EntityId) -> Option<&mut dyn Any>;
    /// See [`ComponentPool::serial_of`].
    fn serial_of(&self, entity: EntityId) -> Option<u64>;
    /// See [`ComponentPool::read_fields`].
    fn read_fields(&self, entity: EntityId) -> Result<FieldMap, EcsError>;
    /// See [`ComponentPool::write_fields`].
    fn write_fields(&mut self, entity: EntityId, fields: &FieldMap) -> Result<(), EcsError>;
    /// Append owning entities accepted by `filter`, in storage order.
    fn collect_entities(&self, filter: SlotFilter, out: &mut Vec<EntityId>);
    /// Visit every instance mutably as `&mut dyn Any`.
    fn for_each_any(&mut self, f: &mut dyn FnMut(EntityId, &mut dyn Any));
    /// See [`ComponentPool::clear`].
    fn clear(&mut self);
    /// Number of live instances.
    fn component_count(&self) -> usize;
    /// See [`ComponentPool::allocated_bytes`].
    fn allocated_bytes(&self) -> usize;
    /// See [`ComponentPool::reference_overhead_bytes`].
    fn reference_overhead_bytes(&self) -> usize;
    /// Upcast for typed downcasting.
    fn as_any(&self) -> &dyn Any;
    /// Upcast for typed downcasting.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Component> AnyPool for ComponentPool<T> {
    fn component_type(&self) -> ComponentTypeId {
        self.type_id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn allocate(&mut self, entity: EntityId) -> Result<ComponentRef, EcsError> {
        ComponentPool::allocate(self, entity)
    }

    fn allocate_with_fields(
        &mut self,
        entity: EntityId,
        fields: &FieldMap,
    ) -> Result<ComponentRef, EcsError> {
        ComponentPool::allocate_with_fields(self, entity, fields)
    }

    fn destroy(&mut self, entity: EntityId) -> bool {
        ComponentPool::destroy(self, entity)
    }

    fn has(&self, entity: EntityId) -> bool {
        ComponentPool::has(self, entity)
    }

    fn get_any(&self, entity: EntityId) -> Option<&dyn Any> {
        self.get(entity).map(|value| value as &dyn Any)
    }

    fn get_any_mut(&mut self, entity: EntityId) -> Option<&mut dyn Any> {
        self.get_mut(entity).map(|value| value as &mut dyn Any)
    }

    fn serial_of(&self, entity: EntityId) -> Option<u64> {
        ComponentPool::serial_of(self, entity)
    }

    fn read_fields(&self, entity: EntityId) -> Result<FieldMap, EcsError> {
        ComponentPool::read_fields(self, entity)
    }

    fn write_fields(&mut self, entity: EntityId, fields: &FieldMap) -> Result<(), EcsError> {
        ComponentPool::write_fields(self, entity, fields)
    }

    fn collect_entities(&self, filter: SlotFilter, out: &mut Vec<EntityId>) {
        out.extend(
            self.slots
                .iter()
                .filter(|slot| filter.accepts(slot.started))
                .map(|slot| slot.entity),
        );
    }

    fn for_each_any(&mut self, f: &mut dyn FnMut(EntityId, &mut dyn Any)) {
        self.for_each_mut(|entity, value| f(entity, value));
    }

    fn clear(&mut self) {
        ComponentPool::clear(self)
    }

    fn component_count(&self) -> usize {
        self.len()
    }

    fn allocated_bytes(&self) -> usize {
        ComponentPool::allocated_bytes(self)
    }

    fn reference_overhead_bytes(&self) -> usize {
        ComponentPool::reference_overhead_bytes(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
