//! Lightweight entity handles.
//!
//! [`EntityRef`] and [`EntityMut`] pair an [`EntityId`] with a borrow of the
//! manager so call sites can chain operations on one entity. They hold no
//! state of their own; every method forwards to [`EntityManager`].

use crate::component::{Component, ComponentTypeId, FieldMap};
use crate::entity::EntityId;
use crate::manager::EntityManager;
use crate::reference::{ComponentRef, Ref};
use crate::EcsError;

/// Read-only handle to a live entity.
#[derive(Clone, Copy)]
pub struct EntityRef<'a> {
    manager: &'a EntityManager,
    id: EntityId,
}

impl<'a> EntityRef<'a> {
    /// The entity's id.
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Display name; empty when unnamed.
    pub fn name(&self) -> &'a str {
        self.manager.entity_name(self.id).unwrap_or_default()
    }

    /// The entity's `T`, if attached.
    pub fn get<T: Component>(&self) -> Option<&'a T> {
        self.manager.get_component::<T>(self.id)
    }

    /// Whether the entity has a `T`.
    pub fn has<T: Component>(&self) -> bool {
        self.manager.has_component::<T>(self.id)
    }

    /// Attached component types, ascending.
    pub fn component_types(&self) -> Vec<ComponentTypeId> {
        self.manager.component_types(self.id)
    }
}

impl std::fmt::Debug for EntityRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityRef")
            .field("id", &self.id)
            .field("name", &self.name())
            .finish()
    }
}

/// Mutable handle to a live entity.
pub struct EntityMut<'a> {
    manager: &'a mut EntityManager,
    id: EntityId,
}

impl EntityMut<'_> {
    /// The entity's id.
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Display name; empty when unnamed.
    pub fn name(&self) -> &str {
        self.manager.entity_name(self.id).unwrap_or_default()
    }

    /// Attach a default `T`.
    pub fn add<T: Component>(&mut self) -> Result<Ref<T>, EcsError> {
        self.manager.add::<T>(self.id)
    }

    /// Attach `value`.
    pub fn insert<T: Component>(&mut self, value: T) -> Result<Ref<T>, EcsError> {
        self.manager.insert(self.id, value)
    }

    /// Attach a component by registered name, optionally seeded.
    pub fn add_by_name(
        &mut self,
        name: &str,
        fields: Option<&FieldMap>,
    ) -> Result<ComponentRef, EcsError> {
        self.manager.add_component_by_name(self.id, name, fields)
    }

    /// The entity's `T`, if attached.
    pub fn get<T: Component>(&self) -> Option<&T> {
        self.manager.get_component::<T>(self.id)
    }

    /// The entity's `T`, mutably.
    pub fn get_mut<T: Component>(&mut self) -> Option<&mut T> {
        self.manager.get_component_mut::<T>(self.id)
    }

    /// Whether the entity has a `T`.
    pub fn has<T: Component>(&self) -> bool {
        self.manager.has_component::<T>(self.id)
    }

    /// Destroy the entity's `T`, running its delete hook.
    pub fn remove<T: Component>(&mut self) -> bool {
        self.manager.remove::<T>(self.id)
    }

    /// Destroy the entity itself.
    pub fn destroy(self) -> bool {
        self.manager.destroy_entity(self.id)
    }
}

impl std::fmt::Debug for EntityMut<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityMut")
            .field("id", &self.id)
            .field("name", &self.name())
            .finish()
    }
}

impl EntityManager {
    /// Read-only handle to `id`, if alive.
    pub fn entity(&self, id: EntityId) -> Option<EntityRef<'_>> {
        self.is_alive(id).then_some(EntityRef { manager: self, id })
    }

    /// Mutable handle to `id`, if alive.
    pub fn entity_mut(&mut self, id: EntityId) -> Option<EntityMut<'_>> {
        if !self.is_alive(id) {
            return None;
        }
        Some(EntityMut { manager: self, id })
    }

    /// Create an entity and return a mutable handle to it.
    pub fn spawn(&mut self, name: &str) -> Result<EntityMut<'_>, EcsError> {
        let id = self.create_entity(name)?;
        Ok(EntityMut { manager: self, id })
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
    struct Ammo {
        rounds: u32,
    }

    impl Component for Ammo {}

    fn manager() -> EntityManager {
        let mut registry = ComponentRegistry::new();
        registry.register::<Ammo>("ammo").unwrap();
        EntityManager::new(registry)
    }

    #[test]
    fn spawn_and_chain() {
        let mut m = manager();
        let mut player = m.spawn("Player").unwrap();
        player.insert(Ammo { rounds: 30 }).unwrap();
        player.get_mut::<Ammo>().unwrap().rounds -= 1;
        assert!(player.has::<Transform>());
        let id = player.id();

        let view = m.entity(id).unwrap();
        assert_eq!(view.name(), "Player");
        assert_eq!(view.get::<Ammo>(), Some(&Ammo { rounds: 29 }));
        assert_eq!(view.component_types().len(), 2);
    }

    #[test]
    fn handles_require_live_entity() {
        let mut m = manager();
        let id = m.create_entity("").unwrap();
        assert!(m.entity_mut(id).unwrap().destroy());
        assert!(m.entity(id).is_none());
        assert!(m.entity_mut(id).is_none());
    }

    #[test]
    fn remove_through_handle() {
        let mut m = manager();
        let id = m.create_entity("").unwrap();
        let mut e = m.entity_mut(id).unwrap();
        e.add::<Ammo>().unwrap();
        assert!(e.remove::<Ammo>());
        assert!(!e.has::<Ammo>());
        assert!(e.add_by_name("ammo", None).is_ok());
    }
}
