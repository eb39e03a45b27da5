//! Component type registration and metadata.
//!
//! Every component type must be registered in a [`ComponentRegistry`] before
//! an [`EntityManager`](crate::manager::EntityManager) is built from it.
//! Registration assigns a [`ComponentTypeId`] and records a
//! [`ComponentDescriptor`]: display name, serialized field names, an instance
//! factory, a pool factory and the lifecycle dispatch entry. Once the registry
//! is handed to a manager it is shared read-only.

use std::any::{Any, TypeId};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::capability::CapabilityEntry;
use crate::component::{
    field_names, overlay_fields, Component, ComponentTypeId, FieldMap, Transform, TRANSFORM_NAME,
};
use crate::lifecycle::{self, HookFn};
use crate::pool::{AnyPool, ComponentPool};
use crate::EcsError;

type InstanceFactory = fn(&str, Option<&FieldMap>) -> Result<Box<dyn Any>, EcsError>;
type PoolFactory = fn(ComponentTypeId, &str) -> Box<dyn AnyPool>;

fn make_instance<T: Component>(
    name: &str,
    fields: Option<&FieldMap>,
) -> Result<Box<dyn Any>, EcsError> {
    let value = match fields {
        Some(fields) => overlay_fields(name, &T::default(), fields)?,
        None => T::default(),
    };
    Ok(Box::new(value))
}

fn make_pool<T: Component>(id: ComponentTypeId, name: &str) -> Box<dyn AnyPool> {
    Box::new(ComponentPool::<T>::new(id, name))
}

// ---------------------------------------------------------------------------
// ComponentDescriptor
// ---------------------------------------------------------------------------

/// Metadata about a registered component type.
pub struct ComponentDescriptor {
    /// Unique ID assigned at registration time.
    pub id: ComponentTypeId,
    /// Display name (supplied by the caller, unique).
    pub name: String,
    /// `std::any::type_name::<T>()`
    pub type_name: &'static str,
    /// Rust `TypeId` for runtime type checking.
    pub rust_type: TypeId,
    /// `std::mem::size_of::<T>()`
    pub size: usize,
    /// `std::mem::align_of::<T>()`
    pub align: usize,
    /// Serialized field names of the default instance.
    pub fields: Vec<String>,
    instance_factory: InstanceFactory,
    pool_factory: PoolFactory,
    pub(crate) hook: HookFn,
    pub(crate) capabilities: Vec<CapabilityEntry>,
}

impl ComponentDescriptor {
    fn new<T: Component>(id: ComponentTypeId, name: &str) -> Self {
        Self {
            id,
            name: name.to_owned(),
            type_name: std::any::type_name::<T>(),
            rust_type: TypeId::of::<T>(),
            size: std::mem::size_of::<T>(),
            align: std::mem::align_of::<T>(),
            fields: field_names::<T>(),
            instance_factory: make_instance::<T>,
            pool_factory: make_pool::<T>,
            hook: lifecycle::dispatch::<T>,
            capabilities: Vec::new(),
        }
    }

    /// Build a default instance, optionally seeded from `fields`.
    pub fn instantiate(&self, fields: Option<&FieldMap>) -> Result<Box<dyn Any>, EcsError> {
        (self.instance_factory)(&self.name, fields)
    }

    /// Build an empty pool for this type.
    pub fn create_pool(&self) -> Box<dyn AnyPool> {
        (self.pool_factory)(self.id, &self.name)
    }

    /// Whether this type declared capability `C`.
    pub fn has_capability<C: ?Sized + 'static>(&self) -> bool {
        let wanted = TypeId::of::<C>();
        self.capabilities.iter().any(|c| c.capability == wanted)
    }
}

impl fmt::Debug for ComponentDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDescriptor")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .field("size", &self.size)
            .field("fields", &self.fields)
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// ComponentPlugin
// ---------------------------------------------------------------------------

/// A unit of registration, so each subsystem can install its own component
/// types without a central list.
///
/// Any `Fn(&mut ComponentRegistry) -> Result<(), EcsError>` is a plugin.
pub trait ComponentPlugin {
    /// Register this plugin's types.
    fn install(&self, registry: &mut ComponentRegistry) -> Result<(), EcsError>;
}

impl<F> ComponentPlugin for F
where
    F: Fn(&mut ComponentRegistry) -> Result<(), EcsError>,
{
    fn install(&self, registry: &mut ComponentRegistry) -> Result<(), EcsError> {
        self(registry)
    }
}

// ---------------------------------------------------------------------------
// ComponentRegistry
// ---------------------------------------------------------------------------

/// Registry mapping Rust types and display names to [`ComponentTypeId`]s and
/// their descriptors.
///
/// A type can only be registered once; subsequent registrations of the same
/// Rust `TypeId` return the existing [`ComponentTypeId`].
#[derive(Debug)]
pub struct ComponentRegistry {
    /// TypeId -> ComponentTypeId for dedup.
    by_type: HashMap<TypeId, ComponentTypeId>,
    /// Name -> ComponentTypeId for data-driven lookup.
    by_name: HashMap<String, ComponentTypeId>,
    /// Indexed by ComponentTypeId.0.
    descriptors: Vec<ComponentDescriptor>,
}

impl ComponentRegistry {
    /// Create a registry holding only the built-in [`Transform`] type.
    pub fn new() -> Self {
        let mut registry = Self {
            by_type: HashMap::new(),
            by_name: HashMap::new(),
            descriptors: Vec::new(),
        };
        registry.push::<Transform>(TRANSFORM_NAME);
        registry
    }

    fn push<T: Component>(&mut self, name: &str) -> ComponentTypeId {
        let id = ComponentTypeId(self.descriptors.len() as u32);
        self.descriptors.push(ComponentDescriptor::new::<T>(id, name));
        self.by_type.insert(TypeId::of::<T>(), id);
        self.by_name.insert(name.to_owned(), id);
        tracing::debug!(component = %name, id = id.0, "component type registered");
        id
    }

    /// Register component type `T` under `name`.
    ///
    /// If `T` is already registered, the existing [`ComponentTypeId`] is
    /// returned and `name` is ignored.
    ///
    /// # Errors
    ///
    /// [`EcsError::DuplicateComponentName`] if `name` belongs to another type.
    pub fn register<T: Component>(&mut self, name: &str) -> Result<ComponentTypeId, EcsError> {
        if let Some(&existing) = self.by_type.get(&TypeId::of::<T>()) {
            return Ok(existing);
        }
        if let Some(&owner) = self.by_name.get(name) {
            return Err(EcsError::DuplicateComponentName {
                name: name.to_owned(),
                existing: self.descriptors[owner.index()].type_name,
            });
        }
        Ok(self.push::<T>(name))
    }

    /// Declare that component type `T` can be viewed as capability `C`.
    ///
    /// ```
    /// use cinder_ecs::prelude::*;
    ///
    /// trait Light {
    ///     fn intensity(&self) -> f32;
    /// }
    ///
    /// #[derive(Default, serde::Serialize, serde::Deserialize)]
    /// struct PointLight { intensity: f32 }
    ///
    /// impl Component for PointLight {}
    /// impl Light for PointLight {
    ///     fn intensity(&self) -> f32 { self.intensity }
    /// }
    ///
    /// let mut registry = ComponentRegistry::new();
    /// registry.register::<PointLight>("point_light").unwrap();
    /// registry.register_capability::<PointLight, dyn Light>(|light| light).unwrap();
    /// ```
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownComponent`] if `T` is not registered.
    pub fn register_capability<T: Component, C: ?Sized + 'static>(
        &mut self,
        cast: fn(&mut T) -> &mut C,
    ) -> Result<(), EcsError> {
        let id = self
            .lookup::<T>()
            .ok_or_else(|| self.unknown_component(std::any::type_name::<T>()))?;
        let entry = CapabilityEntry::new::<T, C>(cast);
        let capabilities = &mut self.descriptors[id.index()].capabilities;
        capabilities.retain(|existing| existing.capability != entry.capability);
        capabilities.push(entry);
        Ok(())
    }

    /// Run a [`ComponentPlugin`].
    pub fn install(&mut self, plugin: &dyn ComponentPlugin) -> Result<(), EcsError> {
        plugin.install(self)
    }

    /// Look up a component type by its Rust type.
    pub fn lookup<T: 'static>(&self) -> Option<ComponentTypeId> {
        self.by_type.get(&TypeId::of::<T>()).copied()
    }

    /// Look up a component type by its display name.
    pub fn lookup_by_name(&self, name: &str) -> Option<ComponentTypeId> {
        self.by_name.get(name).copied()
    }

    /// Descriptor of a registered type.
    pub fn descriptor(&self, id: ComponentTypeId) -> Option<&ComponentDescriptor> {
        self.descriptors.get(id.index())
    }

    /// Descriptor of a registered type, by display name.
    pub fn descriptor_by_name(&self, name: &str) -> Option<&ComponentDescriptor> {
        self.lookup_by_name(name).and_then(|id| self.descriptor(id))
    }

    /// Build an instance of a registered type, optionally seeded from
    /// `fields`.
    pub fn instantiate(
        &self,
        id: ComponentTypeId,
        fields: Option<&FieldMap>,
    ) -> Result<Box<dyn Any>, EcsError> {
        self.descriptor(id)
            .ok_or(EcsError::UnknownComponentId { id })?
            .instantiate(fields)
    }

    /// Build an empty pool for a registered type.
    pub fn create_pool(&self, id: ComponentTypeId) -> Option<Box<dyn AnyPool>> {
        self.descriptor(id).map(ComponentDescriptor::create_pool)
    }

    /// Build one empty pool per registered type.
    pub fn create_all_pools(&self) -> BTreeMap<ComponentTypeId, Box<dyn AnyPool>> {
        self.descriptors
            .iter()
            .map(|descriptor| (descriptor.id, descriptor.create_pool()))
            .collect()
    }

    /// All descriptors in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &ComponentDescriptor> {
        self.descriptors.iter()
    }

    /// Total number of registered component types.
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Whether no component types are registered. Never true for a registry
    /// built with [`ComponentRegistry::new`].
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Returns the names of all registered component types, sorted.
    pub fn registered_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.by_name.keys().map(|s| s.as_str()).collect();
        names.sort();
        names
    }

    /// The [`EcsError::UnknownComponent`] for `name`, listing what is registered.
    pub fn unknown_component(&self, name: &str) -> EcsError {
        EcsError::UnknownComponent {
            name: name.to_owned(),
            registered: self.registered_names().join(", "),
        }
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Pos {
        x: f32,
        y: f32,
    }

    impl Component for Pos {}

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Vel {
        dx: f32,
        dy: f32,
    }

    impl Component for Vel {}

    trait Movable {
        fn speed(&self) -> f32;
    }

    impl Movable for Vel {
        fn speed(&self) -> f32 {
            (self.dx * self.dx + self.dy * self.dy).sqrt()
        }
    }

    #[test]
    fn transform_is_preregistered() {
        let reg = ComponentRegistry::new();
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.lookup_by_name(TRANSFORM_NAME), reg.lookup::<Transform>());
    }

    #[test]
    fn register_and_lookup() {
        let mut reg = ComponentRegistry::new();
        let id = reg.register::<Pos>("position").unwrap();
        assert_eq!(reg.lookup::<Pos>(), Some(id));
        assert_eq!(reg.lookup_by_name("position"), Some(id));
        assert_eq!(reg.descriptor_by_name("position").unwrap().id, id);
    }

    #[test]
    fn same_type_same_id() {
        let mut reg = ComponentRegistry::new();
        let id1 = reg.register::<Pos>("position").unwrap();
        let id2 = reg.register::<Pos>("position_again").unwrap();
        assert_eq!(id1, id2);
        assert_eq!(reg.len(), 2);
        assert!(reg.lookup_by_name("position_again").is_none());
    }

    #[test]
    fn duplicate_name_for_other_type_rejected() {
        let mut reg = ComponentRegistry::new();
        reg.register::<Pos>("position").unwrap();
        let err = reg.register::<Vel>("position").unwrap_err();
        assert!(matches!(err, EcsError::DuplicateComponentName { .. }));
        assert!(reg.lookup::<Vel>().is_none());
    }

    #[test]
    fn unknown_lookups_are_absent() {
        let reg = ComponentRegistry::new();
        assert!(reg.lookup::<Pos>().is_none());
        assert!(reg.lookup_by_name("nope").is_none());
        assert!(reg.descriptor(ComponentTypeId(99)).is_none());
        assert!(reg.create_pool(ComponentTypeId(99)).is_none());
        assert!(matches!(
            reg.instantiate(ComponentTypeId(99), None),
            Err(EcsError::UnknownComponentId { .. })
        ));
    }

    #[test]
    fn descriptor_metadata() {
        let mut reg = ComponentRegistry::new();
        let id = reg.register::<Pos>("position").unwrap();
        let info = reg.descriptor(id).unwrap();
        assert_eq!(info.name, "position");
        assert_eq!(info.size, std::mem::size_of::<Pos>());
        assert_eq!(info.align, std::mem::align_of::<Pos>());
        assert_eq!(info.rust_type, TypeId::of::<Pos>());
        assert_eq!(info.fields, vec!["x".to_owned(), "y".to_owned()]);
    }

    #[test]
    fn instantiate_with_fields() {
        let mut reg = ComponentRegistry::new();
        let id = reg.register::<Pos>("position").unwrap();
        let fields = serde_json::json!({ "y": 2.5 }).as_object().cloned().unwrap();
        let boxed = reg.instantiate(id, Some(&fields)).unwrap();
        assert_eq!(boxed.downcast_ref::<Pos>(), Some(&Pos { x: 0.0, y: 2.5 }));
    }

    #[test]
    fn create_all_pools_one_per_type() {
        let mut reg = ComponentRegistry::new();
        let p = reg.register::<Pos>("position").unwrap();
        let v = reg.register::<Vel>("velocity").unwrap();
        let pools = reg.create_all_pools();
        assert_eq!(pools.len(), 3);
        assert_eq!(pools[&p].name(), "position");
        assert_eq!(pools[&v].component_type(), v);
    }

    #[test]
    fn capability_requires_registration() {
        let mut reg = ComponentRegistry::new();
        let err = reg
            .register_capability::<Vel, dyn Movable>(|v| v)
            .unwrap_err();
        assert!(matches!(err, EcsError::UnknownComponent { .. }));

        let id = reg.register::<Vel>("velocity").unwrap();
        reg.register_capability::<Vel, dyn Movable>(|v| v).unwrap();
        reg.register_capability::<Vel, dyn Movable>(|v| v).unwrap();
        let descriptor = reg.descriptor(id).unwrap();
        assert!(descriptor.has_capability::<dyn Movable>());
        assert_eq!(descriptor.capabilities.len(), 1);
    }

    #[test]
    fn plugins_register_their_types() {
        fn physics_plugin(reg: &mut ComponentRegistry) -> Result<(), EcsError> {
            reg.register::<Pos>("position")?;
            reg.register::<Vel>("velocity")?;
            Ok(())
        }
        let mut reg = ComponentRegistry::new();
        reg.install(&physics_plugin).unwrap();
        reg.install(&physics_plugin).unwrap();
        assert_eq!(reg.len(), 3);
        assert_eq!(reg.registered_names(), vec!["position", "transform", "velocity"]);
    }
}
