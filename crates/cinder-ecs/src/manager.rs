//! The entity manager: entity directory, component attachment, and lifecycle
//! passes.
//!
//! [`EntityManager`] is the single owner of all runtime state. It keeps a
//! directory of live entities (name plus attached component types), routes
//! component storage to the [`ComponentMemoryManager`], and drives the
//! start / update / fixed-update / delete hooks.
//!
//! Every pass works on a snapshot of `(type, entity)` pairs taken up front and
//! re-checks each pair before visiting it, so hooks are free to create and
//! destroy entities and components (their own included) while a pass runs.

use std::any::{type_name, Any};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;

use crate::component::{Component, ComponentTypeId, FieldMap, Transform};
use crate::entity::{EntityAllocator, EntityId, EntityRecord};
use crate::lifecycle::{self, Context, FrameTime, Hook};
use crate::memory::ComponentMemoryManager;
use crate::pool::SlotFilter;
use crate::reference::{ComponentRef, Ref};
use crate::registry::ComponentRegistry;
use crate::EcsError;

/// Default bound on repeated start passes in one [`EntityManager::start_all`].
pub const DEFAULT_MAX_START_PASSES: usize = 8;

/// Owns every entity and component.
pub struct EntityManager {
    memory: ComponentMemoryManager,
    allocator: EntityAllocator,
    directory: BTreeMap<EntityId, EntityRecord>,
    names: HashMap<String, EntityId>,
    transform: ComponentTypeId,
    frame_time: FrameTime,
    /// Reused snapshot buffer for lifecycle passes.
    scratch: Vec<(ComponentTypeId, EntityId)>,
    max_start_passes: usize,
}

impl EntityManager {
    /// Create a manager over `registry`, which is frozen from here on.
    pub fn new(registry: ComponentRegistry) -> Self {
        Self::with_shared_registry(Rc::new(registry))
    }

    /// Create a manager over an already shared registry.
    pub fn with_shared_registry(registry: Rc<ComponentRegistry>) -> Self {
        let transform = registry
            .lookup::<Transform>()
            .unwrap_or(ComponentTypeId(0));
        Self {
            memory: ComponentMemoryManager::new(registry),
            allocator: EntityAllocator::new(),
            directory: BTreeMap::new(),
            names: HashMap::new(),
            transform,
            frame_time: FrameTime::default(),
            scratch: Vec::new(),
            max_start_passes: DEFAULT_MAX_START_PASSES,
        }
    }

    /// The registry this manager was built from.
    pub fn registry(&self) -> &Rc<ComponentRegistry> {
        self.memory.registry()
    }

    /// Read access to the component pools.
    pub fn memory(&self) -> &ComponentMemoryManager {
        &self.memory
    }

    /// Structural changes through this handle bypass the entity directory and
    /// the lifecycle hooks, so it stays crate-internal.
    pub(crate) fn memory_mut(&mut self) -> &mut ComponentMemoryManager {
        &mut self.memory
    }

    fn component_name(&self, id: ComponentTypeId) -> &str {
        self.registry()
            .descriptor(id)
            .map_or("<unregistered>", |d| d.name.as_str())
    }

    // -----------------------------------------------------------------------
    // Entities
    // -----------------------------------------------------------------------

    /// Create an entity carrying a default [`Transform`].
    ///
    /// An empty `name` leaves the entity unnamed; non-empty names are unique.
    ///
    /// # Errors
    ///
    /// [`EcsError::DuplicateEntityName`] if `name` is already taken.
    pub fn create_entity(&mut self, name: &str) -> Result<EntityId, EcsError> {
        if let Some(&existing) = self.names.get(name) {
            return Err(EcsError::DuplicateEntityName {
                name: name.to_owned(),
                existing,
            });
        }

        let entity = self.allocator.allocate();
        self.directory.insert(entity, EntityRecord::new(name));
        if !name.is_empty() {
            self.names.insert(name.to_owned(), entity);
        }
        tracing::debug!(entity = %entity, name = %name, "entity created");

        self.add_component(entity, self.transform)?;
        Ok(entity)
    }

    /// Resolve a name to its entity.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownEntityName`] if no live entity has that name.
    pub fn named_entity(&self, name: &str) -> Result<EntityId, EcsError> {
        self.find_entity(name)
            .ok_or_else(|| EcsError::UnknownEntityName {
                name: name.to_owned(),
            })
    }

    /// Resolve a name to its entity, if any.
    pub fn find_entity(&self, name: &str) -> Option<EntityId> {
        if name.is_empty() {
            return None;
        }
        self.names.get(name).copied()
    }

    /// Display name of `entity`. Empty for unnamed entities.
    pub fn entity_name(&self, entity: EntityId) -> Option<&str> {
        self.directory.get(&entity).map(|r| r.name.as_str())
    }

    /// Directory record of `entity`.
    pub fn entity_record(&self, entity: EntityId) -> Option<&EntityRecord> {
        self.directory.get(&entity)
    }

    /// Whether `entity` exists and has not been destroyed.
    pub fn is_alive(&self, entity: EntityId) -> bool {
        self.directory.contains_key(&entity)
    }

    /// Number of live entities.
    pub fn entity_count(&self) -> usize {
        self.directory.len()
    }

    /// Live entities in ascending id order.
    pub fn entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.directory.keys().copied()
    }

    /// Component types attached to `entity`, ascending. Empty if the entity
    /// does not exist.
    pub fn component_types(&self, entity: EntityId) -> Vec<ComponentTypeId> {
        self.directory
            .get(&entity)
            .map(|r| r.components.iter().copied().collect())
            .unwrap_or_default()
    }

    // -----------------------------------------------------------------------
    // Attaching
    // -----------------------------------------------------------------------

    fn attach_with(
        &mut self,
        entity: EntityId,
        id: ComponentTypeId,
        allocate: impl FnOnce(&mut ComponentMemoryManager) -> Result<ComponentRef, EcsError>,
    ) -> Result<ComponentRef, EcsError> {
        match self.directory.get(&entity) {
            None => return Err(EcsError::UnknownEntity { entity }),
            Some(record) if record.destroying => {
                return Err(EcsError::EntityBeingDestroyed { entity })
            }
            Some(_) => {}
        }

        let reference = allocate(&mut self.memory)?;
        if let Some(record) = self.directory.get_mut(&entity) {
            record.components.insert(id);
        }
        tracing::debug!(
            entity = %entity,
            component = %self.component_name(id),
            "component attached"
        );
        Ok(reference)
    }

    /// Attach a default instance of type `id`.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownEntity`], [`EcsError::UnknownComponentId`],
    /// [`EcsError::DuplicateComponent`] or
    /// [`EcsError::EntityBeingDestroyed`].
    pub fn add_component(
        &mut self,
        entity: EntityId,
        id: ComponentTypeId,
    ) -> Result<ComponentRef, EcsError> {
        self.attach_with(entity, id, |memory| memory.allocate_component(entity, id))
    }

    /// Attach an instance of type `id` seeded from `fields`.
    ///
    /// # Errors
    ///
    /// As [`add_component`](Self::add_component), plus a deserialization
    /// error if `fields` does not fit the type.
    pub fn add_component_with_fields(
        &mut self,
        entity: EntityId,
        id: ComponentTypeId,
        fields: &FieldMap,
    ) -> Result<ComponentRef, EcsError> {
        self.attach_with(entity, id, |memory| {
            memory.allocate_with_fields(entity, id, fields)
        })
    }

    /// Attach a component by registered display name, optionally seeded.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownComponent`] if `name` is not registered, otherwise
    /// as [`add_component_with_fields`](Self::add_component_with_fields).
    pub fn add_component_by_name(
        &mut self,
        entity: EntityId,
        name: &str,
        fields: Option<&FieldMap>,
    ) -> Result<ComponentRef, EcsError> {
        let id = self
            .registry()
            .lookup_by_name(name)
            .ok_or_else(|| self.registry().unknown_component(name))?;
        match fields {
            Some(fields) => self.add_component_with_fields(entity, id, fields),
            None => self.add_component(entity, id),
        }
    }

    /// Attach a default `T`.
    pub fn add<T: Component>(&mut self, entity: EntityId) -> Result<Ref<T>, EcsError> {
        self.insert(entity, T::default())
    }

    /// Attach `value`.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownComponent`] if `T` is not registered, otherwise as
    /// [`add_component`](Self::add_component).
    pub fn insert<T: Component>(&mut self, entity: EntityId, value: T) -> Result<Ref<T>, EcsError> {
        let id = self
            .registry()
            .lookup::<T>()
            .ok_or_else(|| self.registry().unknown_component(type_name::<T>()))?;
        let reference = self.attach_with(entity, id, |memory| {
            memory
                .pool_by_id_mut::<T>(id)
                .ok_or(EcsError::UnknownComponentId { id })?
                .insert(entity, value)
        })?;
        Ok(reference.typed())
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// `entity`'s `T`, if attached.
    ///
    /// Also `None` for the instance whose hook is currently running; that hook
    /// already holds it as `&mut self`.
    pub fn get_component<T: Component>(&self, entity: EntityId) -> Option<&T> {
        self.memory.pool::<T>()?.get(entity)
    }

    /// Mutable variant of [`get_component`](Self::get_component).
    pub fn get_component_mut<T: Component>(&mut self, entity: EntityId) -> Option<&mut T> {
        self.memory.pool_mut::<T>()?.get_mut(entity)
    }

    /// `entity`'s `T`.
    ///
    /// # Panics
    ///
    /// Panics if `entity` has no `T`, or if its `T` is checked out by the hook
    /// currently running on it.
    pub fn component<T: Component>(&self, entity: EntityId) -> &T {
        match self.get_component::<T>(entity) {
            Some(value) => value,
            None => missing_component::<T>(entity, self.is_checked_out::<T>(entity)),
        }
    }

    /// Mutable variant of [`component`](Self::component).
    ///
    /// # Panics
    ///
    /// As [`component`](Self::component).
    pub fn component_mut<T: Component>(&mut self, entity: EntityId) -> &mut T {
        let checked_out = self.is_checked_out::<T>(entity);
        match self.get_component_mut::<T>(entity) {
            Some(value) => value,
            None => missing_component::<T>(entity, checked_out),
        }
    }

    /// Whether `entity`'s `T` is attached but held by its running hook.
    pub fn is_checked_out<T: Component>(&self, entity: EntityId) -> bool {
        self.memory
            .pool::<T>()
            .is_some_and(|pool| pool.is_checked_out(entity))
    }

    /// Whether `entity` has a `T`.
    pub fn has_component<T: Component>(&self, entity: EntityId) -> bool {
        self.registry()
            .lookup::<T>()
            .is_some_and(|id| self.has_component_id(entity, id))
    }

    /// Whether `entity` has a component of type `id`.
    pub fn has_component_id(&self, entity: EntityId, id: ComponentTypeId) -> bool {
        self.memory.has_component(entity, id)
    }

    /// Whether `entity` has a component registered as `name`.
    pub fn has_component_named(&self, entity: EntityId, name: &str) -> bool {
        self.registry()
            .lookup_by_name(name)
            .is_some_and(|id| self.has_component_id(entity, id))
    }

    /// `entity`'s component of type `id`, type-erased.
    pub fn get_component_any(&self, entity: EntityId, id: ComponentTypeId) -> Option<&dyn Any> {
        self.memory.get_pool(id).ok()?.get_any(entity)
    }

    /// Field-map view of `entity`'s component of type `id`.
    pub fn component_fields(
        &self,
        entity: EntityId,
        id: ComponentTypeId,
    ) -> Result<FieldMap, EcsError> {
        self.memory.get_pool(id)?.read_fields(entity)
    }

    /// Overlay `fields` onto `entity`'s component of type `id`.
    pub fn set_component_fields(
        &mut self,
        entity: EntityId,
        id: ComponentTypeId,
        fields: &FieldMap,
    ) -> Result<(), EcsError> {
        self.memory.get_pool_mut(id)?.write_fields(entity, fields)
    }

    // -----------------------------------------------------------------------
    // Destruction
    // -----------------------------------------------------------------------

    /// Run the `on_delete` hook of `entity`'s component of type `id`, then
    /// remove it from its pool and from the entity's directory entry.
    ///
    /// While the hook runs the component is still attached, and destroying it
    /// again is a no-op. Returns `false` if there was nothing to destroy.
    /// Destroying the component whose hook is running defers its `on_delete`
    /// until that hook returns.
    pub fn destroy_component(&mut self, entity: EntityId, id: ComponentTypeId) -> bool {
        let Some(record) = self.directory.get_mut(&entity) else {
            return false;
        };
        if !record.components.contains(&id) || !record.deleting.insert(id) {
            return false;
        }

        if let Some(hook) = self.memory.hook_fn(id) {
            hook(self, id, entity, Hook::Delete);
        } else {
            self.memory.destroy_component(entity, id);
        }

        if let Some(record) = self.directory.get_mut(&entity) {
            record.components.remove(&id);
            record.deleting.remove(&id);
        }
        tracing::debug!(
            entity = %entity,
            component = %self.component_name(id),
            "component destroyed"
        );
        true
    }

    /// Destroy `entity`'s `T`, if any.
    pub fn remove<T: Component>(&mut self, entity: EntityId) -> bool {
        match self.registry().lookup::<T>() {
            Some(id) => self.destroy_component(entity, id),
            None => false,
        }
    }

    /// Destroy `entity` and every attached component, in ascending type-id
    /// order.
    ///
    /// Returns `false` if the entity does not exist or is already being
    /// destroyed.
    pub fn destroy_entity(&mut self, entity: EntityId) -> bool {
        match self.directory.get_mut(&entity) {
            Some(record) if !record.destroying => record.destroying = true,
            _ => return false,
        }

        // Types whose delete hook is already running are finished by their
        // own destroy_component call.
        while let Some(id) = self.directory.get(&entity).and_then(|record| {
            record
                .components
                .iter()
                .find(|id| !record.deleting.contains(id))
                .copied()
        }) {
            self.destroy_component(entity, id);
        }

        if let Some(record) = self.directory.remove(&entity) {
            if record.is_named() {
                self.names.remove(&record.name);
            }
        }
        tracing::debug!(entity = %entity, "entity destroyed");
        true
    }

    /// Destroy every entity, running delete hooks, then clear every pool.
    ///
    /// Entities created by delete hooks are destroyed in further sweeps, up to
    /// [`max_start_passes`](Self::max_start_passes) sweeps. Whatever is left
    /// after that is dropped without hooks.
    pub fn clear_everything(&mut self) {
        let mut count = 0;
        let mut sweeps = 0;
        while !self.directory.is_empty() && sweeps < self.max_start_passes {
            let entities: Vec<EntityId> = self.directory.keys().copied().collect();
            count += entities.len();
            for entity in entities {
                self.destroy_entity(entity);
            }
            sweeps += 1;
        }

        let leftover = self.directory.len();
        if leftover > 0 {
            tracing::warn!(
                leftover,
                sweeps,
                "clear sweep limit reached, remaining entities dropped without delete hooks"
            );
        }
        self.memory.clear_all();
        self.directory.clear();
        self.names.clear();
        tracing::info!(entities = count, sweeps, "entity manager cleared");
    }

    // -----------------------------------------------------------------------
    // Lifecycle passes
    // -----------------------------------------------------------------------

    fn run_pass(&mut self, hook: Hook) -> usize {
        let _span = tracing::trace_span!("lifecycle_pass", hook = ?hook).entered();

        let mut batch = std::mem::take(&mut self.scratch);
        batch.clear();
        self.memory.collect_live(hook.filter(), &mut batch);

        let mut ran = 0;
        for &(id, entity) in &batch {
            let Some(dispatch) = self.memory.hook_fn(id) else {
                continue;
            };
            if dispatch(self, id, entity, hook) {
                ran += 1;
            }
        }

        batch.clear();
        self.scratch = batch;
        ran
    }

    /// Run `start` on every instance that has not started yet.
    ///
    /// Components attached by start hooks are started in the same call, up to
    /// [`max_start_passes`](Self::max_start_passes) passes. Returns the number
    /// of hooks run.
    pub fn start_all(&mut self) -> usize {
        let mut total = 0;
        for _ in 0..self.max_start_passes {
            let ran = self.run_pass(Hook::Start);
            total += ran;
            if ran == 0 {
                return total;
            }
        }

        let mut pending = Vec::new();
        self.memory.collect_live(SlotFilter::Pending, &mut pending);
        if !pending.is_empty() {
            tracing::warn!(
                pending = pending.len(),
                passes = self.max_start_passes,
                "start pass limit reached, remaining components start next frame"
            );
        }
        total
    }

    /// Run `update` on every started instance. Returns the number of hooks run.
    pub fn update_all(&mut self) -> usize {
        self.run_pass(Hook::Update)
    }

    /// Run `fixed_update` on every started instance. Returns the number of
    /// hooks run.
    pub fn fixed_update_all(&mut self) -> usize {
        self.run_pass(Hook::FixedUpdate)
    }

    /// Upper bound on start passes per [`start_all`](Self::start_all).
    pub fn max_start_passes(&self) -> usize {
        self.max_start_passes
    }

    /// Set the start pass bound. Zero is treated as one.
    pub fn set_max_start_passes(&mut self, passes: usize) {
        self.max_start_passes = passes.max(1);
    }

    /// Timing of the current frame.
    pub fn frame_time(&self) -> FrameTime {
        self.frame_time
    }

    /// Publish the timing hooks see through [`Context::time`].
    pub fn set_frame_time(&mut self, time: FrameTime) {
        self.frame_time = time;
    }

    // -----------------------------------------------------------------------
    // Iteration
    // -----------------------------------------------------------------------

    /// Visit every `T` with full access to the manager.
    ///
    /// The set of visited entities is fixed when the call starts. Instances
    /// destroyed by an earlier callback are skipped. Returns the number of
    /// instances visited.
    pub fn for_each<T: Component>(&mut self, mut f: impl FnMut(&mut T, &mut Context<'_>)) -> usize {
        let Some(id) = self.registry().lookup::<T>() else {
            return 0;
        };
        let entities: Vec<EntityId> = match self.memory.pool_by_id::<T>(id) {
            Some(pool) => pool.entities().collect(),
            None => return 0,
        };

        let mut visited = 0;
        for entity in entities {
            if lifecycle::visit::<T>(self, id, entity, &mut f) {
                visited += 1;
            }
        }
        visited
    }

    /// Visit every live component of every type with full access to the
    /// manager. References that went stale during the walk are skipped.
    pub fn for_all_components(
        &mut self,
        mut f: impl FnMut(&mut EntityManager, ComponentRef),
    ) -> usize {
        let mut batch = Vec::new();
        self.memory.collect_live(SlotFilter::All, &mut batch);
        let references: Vec<ComponentRef> = batch
            .into_iter()
            .filter_map(|(id, entity)| {
                let serial = self.memory.get_pool(id).ok()?.serial_of(entity)?;
                Some(ComponentRef::new(id, entity, serial))
            })
            .collect();

        let mut visited = 0;
        for reference in references {
            if self.memory.is_live(&reference) {
                f(self, reference);
                visited += 1;
            }
        }
        visited
    }

    /// Visit every live instance whose type declared capability `C`.
    pub fn for_each_capability<C: ?Sized + 'static>(
        &mut self,
        f: impl FnMut(EntityId, &mut C),
    ) -> usize {
        self.memory.for_each_capability(f)
    }

    // -----------------------------------------------------------------------
    // Diagnostics
    // -----------------------------------------------------------------------

    /// Bytes reserved by all pools.
    pub fn total_pool_bytes(&self) -> usize {
        self.memory.total_bytes()
    }

    /// Live component instances across all pools.
    pub fn component_count(&self) -> usize {
        self.memory.component_count()
    }
}

fn missing_component<T: Component>(entity: EntityId, checked_out: bool) -> ! {
    if checked_out {
        panic!(
            "entity {entity}'s {} component is checked out by its running hook",
            type_name::<T>()
        )
    }
    panic!("entity {entity} has no {} component", type_name::<T>())
}

impl fmt::Debug for EntityManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityManager")
            .field("entities", &self.directory.len())
            .field("components", &self.memory.component_count())
            .field("frame", &self.frame_time.frame)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
    struct Health {
        value: i32,
    }

    impl Component for Health {}

    #[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
    struct Tag {
        label: String,
    }

    impl Component for Tag {}

    fn manager() -> EntityManager {
        let mut registry = ComponentRegistry::new();
        registry.register::<Health>("health").unwrap();
        registry.register::<Tag>("tag").unwrap();
        EntityManager::new(registry)
    }

    fn fields(value: serde_json::Value) -> FieldMap {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn create_entity_attaches_transform() {
        let mut m = manager();
        let e = m.create_entity("Player").unwrap();
        assert!(m.is_alive(e));
        assert!(m.has_component::<Transform>(e));
        assert_eq!(m.component::<Transform>(e), &Transform::IDENTITY);
        assert_eq!(m.entity_name(e), Some("Player"));
        assert_eq!(m.find_entity("Player"), Some(e));
    }

    #[test]
    fn ids_increase_and_are_never_reused() {
        let mut m = manager();
        let a = m.create_entity("").unwrap();
        m.destroy_entity(a);
        let b = m.create_entity("").unwrap();
        assert!(b > a);
        assert!(!m.is_alive(a));
    }

    #[test]
    fn duplicate_names_rejected_empty_names_allowed() {
        let mut m = manager();
        let a = m.create_entity("Boss").unwrap();
        let err = m.create_entity("Boss").unwrap_err();
        assert!(matches!(err, EcsError::DuplicateEntityName { existing, .. } if existing == a));
        m.create_entity("").unwrap();
        m.create_entity("").unwrap();
        assert_eq!(m.entity_count(), 3);
        assert!(m.find_entity("").is_none());
    }

    #[test]
    fn name_is_released_on_destroy() {
        let mut m = manager();
        let a = m.create_entity("Door").unwrap();
        assert!(m.destroy_entity(a));
        assert!(matches!(
            m.named_entity("Door"),
            Err(EcsError::UnknownEntityName { .. })
        ));
        let b = m.create_entity("Door").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn attach_to_missing_entity_fails() {
        let mut m = manager();
        let err = m.add::<Health>(EntityId::from_raw(77)).unwrap_err();
        assert!(matches!(err, EcsError::UnknownEntity { .. }));
    }

    #[test]
    fn attach_twice_rejected() {
        let mut m = manager();
        let e = m.create_entity("").unwrap();
        m.insert(e, Health { value: 1 }).unwrap();
        let err = m.insert(e, Health { value: 2 }).unwrap_err();
        assert!(matches!(err, EcsError::DuplicateComponent { .. }));
        assert_eq!(m.component::<Health>(e).value, 1);
    }

    #[test]
    fn attach_by_name_with_fields() {
        let mut m = manager();
        let e = m.create_entity("").unwrap();
        m.add_component_by_name(e, "health", Some(&fields(json!({ "value": 100 }))))
            .unwrap();
        assert_eq!(m.component::<Health>(e).value, 100);
        assert!(m.has_component_named(e, "health"));

        let err = m.add_component_by_name(e, "mana", None).unwrap_err();
        assert!(matches!(err, EcsError::UnknownComponent { .. }));
    }

    #[test]
    fn unregistered_type_is_unknown() {
        #[derive(Default, Serialize, Deserialize)]
        struct Unregistered;
        impl Component for Unregistered {}

        let mut m = manager();
        let e = m.create_entity("").unwrap();
        assert!(matches!(
            m.add::<Unregistered>(e),
            Err(EcsError::UnknownComponent { .. })
        ));
        assert!(!m.has_component::<Unregistered>(e));
        assert!(m.get_component::<Unregistered>(e).is_none());
    }

    #[test]
    fn destroy_component_twice_is_noop() {
        let mut m = manager();
        let e = m.create_entity("").unwrap();
        m.add::<Health>(e).unwrap();
        assert!(m.remove::<Health>(e));
        assert!(!m.remove::<Health>(e));
        assert!(!m.has_component::<Health>(e));
        assert!(m.get_component::<Health>(e).is_none());
    }

    #[test]
    fn destroy_entity_removes_all_components() {
        let mut m = manager();
        let e = m.create_entity("").unwrap();
        m.add::<Health>(e).unwrap();
        m.add::<Tag>(e).unwrap();
        assert_eq!(m.component_types(e).len(), 3);
        assert!(m.destroy_entity(e));
        assert!(!m.destroy_entity(e));
        assert_eq!(m.component_count(), 0);
        assert!(m.component_types(e).is_empty());
    }

    #[test]
    #[should_panic(expected = "has no")]
    fn asserting_accessor_panics_when_absent() {
        let mut m = manager();
        let e = m.create_entity("").unwrap();
        let _ = m.component::<Health>(e);
    }

    #[test]
    fn field_view_reads_and_writes() {
        let mut m = manager();
        let e = m.create_entity("").unwrap();
        let health = m.registry().lookup::<Health>().unwrap();
        m.add_component(e, health).unwrap();
        m.set_component_fields(e, health, &fields(json!({ "value": 42 })))
            .unwrap();
        assert_eq!(m.component_fields(e, health).unwrap()["value"], 42);
        let any = m.get_component_any(e, health).unwrap();
        assert_eq!(any.downcast_ref::<Health>(), Some(&Health { value: 42 }));
    }

    #[test]
    fn entities_listed_in_ascending_order() {
        let mut m = manager();
        let ids: Vec<_> = (0..5).map(|_| m.create_entity("").unwrap()).collect();
        m.destroy_entity(ids[2]);
        let listed: Vec<_> = m.entities().collect();
        assert_eq!(listed, vec![ids[0], ids[1], ids[3], ids[4]]);
    }

    #[test]
    fn for_all_components_visits_snapshot() {
        let mut m = manager();
        let a = m.create_entity("").unwrap();
        let b = m.create_entity("").unwrap();
        m.add::<Health>(a).unwrap();
        // Destroying b during the walk skips b's components.
        let visited = m.for_all_components(|m, r| {
            if r.entity() == a {
                m.destroy_entity(b);
            }
        });
        assert_eq!(visited, 2);
    }

    #[test]
    fn clear_everything_empties_state() {
        let mut m = manager();
        for _ in 0..4 {
            let e = m.create_entity("").unwrap();
            m.add::<Health>(e).unwrap();
        }
        m.clear_everything();
        assert_eq!(m.entity_count(), 0);
        assert_eq!(m.component_count(), 0);
        let e = m.create_entity("").unwrap();
        assert_eq!(e.to_raw(), 5);
    }
}
