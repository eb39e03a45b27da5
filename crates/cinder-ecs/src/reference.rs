//! Non-owning component references.
//!
//! A [`ComponentRef`] names a component by `(type, entity, serial)`. The serial
//! is the pool's allocation counter for that instance, so a reference taken
//! before a destroy never resolves to an instance allocated afterwards, even
//! for the same entity. External systems keep references instead of borrows
//! and re-resolve them each time they need the data.

use std::fmt;
use std::marker::PhantomData;

use crate::component::{Component, ComponentTypeId};
use crate::entity::EntityId;
use crate::manager::EntityManager;

// ---------------------------------------------------------------------------
// ComponentRef
// ---------------------------------------------------------------------------

/// Type-erased, non-owning handle to a component instance.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentRef {
    type_id: ComponentTypeId,
    entity: EntityId,
    serial: u64,
}

impl ComponentRef {
    /// A reference that never resolves.
    pub const NULL: ComponentRef = ComponentRef {
        type_id: ComponentTypeId(u32::MAX),
        entity: EntityId::NULL,
        serial: 0,
    };

    pub(crate) fn new(type_id: ComponentTypeId, entity: EntityId, serial: u64) -> Self {
        Self {
            type_id,
            entity,
            serial,
        }
    }

    /// Component type of the referenced instance.
    pub fn type_id(&self) -> ComponentTypeId {
        self.type_id
    }

    /// Owning entity.
    pub fn entity(&self) -> EntityId {
        self.entity
    }

    /// Pool allocation serial of the referenced instance.
    pub fn serial(&self) -> u64 {
        self.serial
    }

    /// Whether the reference no longer resolves: the pool is unknown, the
    /// entity has no instance there, or the instance is a newer allocation.
    pub fn is_null(&self, manager: &EntityManager) -> bool {
        !manager.memory().is_live(self)
    }

    /// Resolve to the typed instance. `None` if stale or if `T` is not the
    /// referenced type.
    pub fn get<'m, T: Component>(&self, manager: &'m EntityManager) -> Option<&'m T> {
        if self.is_null(manager) {
            return None;
        }
        manager
            .memory()
            .pool_by_id::<T>(self.type_id)?
            .get(self.entity)
    }

    /// Mutable variant of [`get`](Self::get).
    pub fn get_mut<'m, T: Component>(&self, manager: &'m mut EntityManager) -> Option<&'m mut T> {
        if self.is_null(manager) {
            return None;
        }
        manager
            .memory_mut()
            .pool_by_id_mut::<T>(self.type_id)?
            .get_mut(self.entity)
    }

    /// Reinterpret as a typed reference. Resolution still checks the type.
    pub fn typed<T: Component>(self) -> Ref<T> {
        Ref {
            raw: self,
            _marker: PhantomData,
        }
    }
}

impl Default for ComponentRef {
    fn default() -> Self {
        Self::NULL
    }
}

impl fmt::Debug for ComponentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::NULL {
            return write!(f, "ComponentRef(null)");
        }
        write!(
            f,
            "ComponentRef({:?} of {} @{})",
            self.type_id, self.entity, self.serial
        )
    }
}

// ---------------------------------------------------------------------------
// Ref<T>
// ---------------------------------------------------------------------------

/// Typed [`ComponentRef`].
pub struct Ref<T> {
    raw: ComponentRef,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Component> Ref<T> {
    /// The underlying erased reference.
    pub fn raw(&self) -> ComponentRef {
        self.raw
    }

    /// Owning entity.
    pub fn entity(&self) -> EntityId {
        self.raw.entity
    }

    /// See [`ComponentRef::is_null`].
    pub fn is_null(&self, manager: &EntityManager) -> bool {
        self.raw.is_null(manager)
    }

    /// Resolve to the instance, if still live.
    pub fn get<'m>(&self, manager: &'m EntityManager) -> Option<&'m T> {
        self.raw.get::<T>(manager)
    }

    /// Resolve mutably, if still live.
    pub fn get_mut<'m>(&self, manager: &'m mut EntityManager) -> Option<&'m mut T> {
        self.raw.get_mut::<T>(manager)
    }
}

impl<T> Clone for Ref<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Ref<T> {}

impl<T> PartialEq for Ref<T> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<T> Eq for Ref<T> {}

impl<T> fmt::Debug for Ref<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ref<{}>({:?})", std::any::type_name::<T>(), self.raw)
    }
}

impl<T> From<Ref<T>> for ComponentRef {
    fn from(value: Ref<T>) -> Self {
        value.raw
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Transform;
    use crate::registry::ComponentRegistry;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Health {
        value: i32,
    }

    impl Component for Health {}

    fn manager() -> EntityManager {
        let mut registry = ComponentRegistry::new();
        registry.register::<Health>("health").unwrap();
        EntityManager::new(registry)
    }

    #[test]
    fn null_reference_never_resolves() {
        let manager = manager();
        assert!(ComponentRef::NULL.is_null(&manager));
        assert!(ComponentRef::default().get::<Health>(&manager).is_none());
        assert_eq!(format!("{:?}", ComponentRef::NULL), "ComponentRef(null)");
    }

    #[test]
    fn reference_resolves_until_destroyed() {
        let mut manager = manager();
        let e = manager.create_entity("").unwrap();
        let r = manager.insert(e, Health { value: 3 }).unwrap();
        assert_eq!(r.get(&manager), Some(&Health { value: 3 }));

        r.get_mut(&mut manager).unwrap().value = 4;
        assert_eq!(manager.get_component::<Health>(e), Some(&Health { value: 4 }));

        assert!(manager.remove::<Health>(e));
        assert!(r.is_null(&manager));
        assert!(r.get(&manager).is_none());
    }

    #[test]
    fn reattach_does_not_revive_old_reference() {
        let mut manager = manager();
        let e = manager.create_entity("").unwrap();
        let old = manager.add::<Health>(e).unwrap();
        manager.remove::<Health>(e);
        let new = manager.add::<Health>(e).unwrap();
        assert!(old.is_null(&manager));
        assert!(!new.is_null(&manager));
        assert_ne!(old, new);
    }

    #[test]
    fn wrong_type_does_not_resolve() {
        let mut manager = manager();
        let e = manager.create_entity("").unwrap();
        let r = manager.add::<Health>(e).unwrap().raw();
        assert!(r.get::<Transform>(&manager).is_none());
        assert!(r.get::<Health>(&manager).is_some());
    }
}
