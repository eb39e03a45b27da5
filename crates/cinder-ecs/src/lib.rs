//! Cinder ECS -- pool-based entity/component core with lifecycle dispatch.
//!
//! Component types are registered at startup in a [`ComponentRegistry`]; each
//! gets a contiguous per-type pool. The [`EntityManager`] owns every entity
//! and component, attaches a [`Transform`] to each new entity, and dispatches
//! the start / update / fixed-update / delete hooks. Hooks receive a
//! [`Context`] with full access to the manager, so gameplay code can spawn and
//! destroy freely while a pass is running.
//!
//! # Quick Start
//!
//! ```
//! use cinder_ecs::prelude::*;
//!
//! #[derive(Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
//! struct Health { value: i32 }
//!
//! impl Component for Health {
//!     fn update(&mut self, ctx: &mut Context<'_>) {
//!         if self.value <= 0 {
//!             ctx.destroy_owner();
//!         }
//!     }
//! }
//!
//! let mut registry = ComponentRegistry::new();
//! registry.register::<Health>("health").unwrap();
//! let mut manager = EntityManager::new(registry);
//!
//! let player = manager.create_entity("Player").unwrap();
//! let health = manager.insert(player, Health { value: 100 }).unwrap();
//! manager.start_all();
//! manager.update_all();
//!
//! assert_eq!(health.get(&manager), Some(&Health { value: 100 }));
//! assert!(manager.has_component::<Transform>(player));
//! ```
//!
//! [`ComponentRegistry`]: registry::ComponentRegistry
//! [`EntityManager`]: manager::EntityManager
//! [`Transform`]: component::Transform
//! [`Context`]: lifecycle::Context

#![deny(unsafe_code)]

mod capability;
pub mod component;
pub mod entity;
pub mod handle;
pub mod lifecycle;
pub mod manager;
pub mod memory;
pub mod pool;
pub mod reference;
pub mod registry;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by ECS operations.
#[derive(Debug, thiserror::Error)]
pub enum EcsError {
    /// The entity does not exist (destroyed or never allocated).
    #[error("entity {entity} does not exist (destroyed or never allocated)")]
    UnknownEntity { entity: entity::EntityId },

    /// No live entity carries this name.
    #[error("no entity named '{name}'")]
    UnknownEntityName { name: String },

    /// Entity names are unique.
    #[error("entity name '{name}' is already used by {existing}")]
    DuplicateEntityName {
        name: String,
        existing: entity::EntityId,
    },

    /// The entity is being torn down and refuses new components.
    #[error("entity {entity} is being destroyed")]
    EntityBeingDestroyed { entity: entity::EntityId },

    /// A component type was referenced that has not been registered.
    #[error("component type '{name}' not registered. Registered components: [{registered}]")]
    UnknownComponent { name: String, registered: String },

    /// A component type id outside the registry.
    #[error("component type id {id:?} not registered")]
    UnknownComponentId { id: component::ComponentTypeId },

    /// Display names are unique across component types.
    #[error("component name '{name}' is already registered for {existing}")]
    DuplicateComponentName {
        name: String,
        existing: &'static str,
    },

    /// At most one instance per (entity, type).
    #[error("entity {entity} already has a '{component}' component")]
    DuplicateComponent {
        entity: entity::EntityId,
        component: String,
    },

    /// The entity has no instance of the component type.
    #[error("entity {entity} has no '{component}' component")]
    MissingComponent {
        entity: entity::EntityId,
        component: String,
    },

    /// Deserialization of a component value failed.
    #[error("failed to deserialize component '{component}': {details}")]
    ComponentDeserializationError { component: String, details: String },

    /// The component type does not serialize to a JSON object, so it has no
    /// field view.
    #[error("component '{component}' does not serialize to a field map")]
    NotAFieldMap { component: String },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::component::{Component, ComponentTypeId, FieldMap, Transform};
    pub use crate::entity::EntityId;
    pub use crate::handle::{EntityMut, EntityRef};
    pub use crate::lifecycle::{Context, FrameTime, Hook};
    pub use crate::manager::EntityManager;
    pub use crate::memory::ComponentMemoryManager;
    pub use crate::pool::{AnyPool, ComponentPool};
    pub use crate::reference::{ComponentRef, Ref};
    pub use crate::registry::{ComponentDescriptor, ComponentPlugin, ComponentRegistry};
    pub use crate::EcsError;
}

// ---------------------------------------------------------------------------
// Integration Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use crate::prelude::*;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    // -- test component types -----------------------------------------------

    trait Drawable {
        fn layer(&self) -> u8;
    }

    #[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
    struct Sprite {
        layer: u8,
    }

    impl Component for Sprite {}

    impl Drawable for Sprite {
        fn layer(&self) -> u8 {
            self.layer
        }
    }

    #[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
    struct Collider {
        radius: f32,
    }

    impl Component for Collider {}

    #[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
    struct Health {
        value: i32,
    }

    impl Component for Health {}

    fn setup() -> EntityManager {
        let mut registry = ComponentRegistry::new();
        registry.register::<Sprite>("sprite").unwrap();
        registry.register::<Collider>("collider").unwrap();
        registry.register::<Health>("health").unwrap();
        registry
            .register_capability::<Sprite, dyn Drawable>(|s| s)
            .unwrap();
        EntityManager::new(registry)
    }

    // -- scenarios ------------------------------------------------------------

    #[test]
    fn player_health_attach_and_destroy() {
        let mut m = setup();
        let other = m.create_entity("Other").unwrap();
        m.insert(other, Health { value: 7 }).unwrap();

        let player = m.create_entity("Player").unwrap();
        let fields = json!({ "value": 100 }).as_object().cloned().unwrap();
        m.add_component_by_name(player, "health", Some(&fields)).unwrap();
        assert_eq!(m.component::<Health>(player).value, 100);

        let pool_len = m.memory().pool::<Health>().unwrap().len();
        assert!(m.remove::<Health>(player));
        assert!(!m.has_component_named(player, "health"));
        assert_eq!(m.memory().pool::<Health>().unwrap().len(), pool_len - 1);
        assert_eq!(m.component::<Health>(other).value, 7);
    }

    #[test]
    fn capability_visits_exactly_declaring_types() {
        let mut m = setup();
        let e1 = m.create_entity("").unwrap();
        let e2 = m.create_entity("").unwrap();
        let e3 = m.create_entity("").unwrap();
        m.insert(e1, Sprite { layer: 1 }).unwrap();
        m.add::<Collider>(e2).unwrap();
        m.insert(e3, Sprite { layer: 3 }).unwrap();

        let mut seen = Vec::new();
        let visited = m.for_each_capability::<dyn Drawable>(|entity, d| {
            seen.push((entity, d.layer()));
        });
        assert_eq!(visited, 2);
        assert_eq!(seen, vec![(e1, 1), (e3, 3)]);
    }

    #[test]
    fn compaction_keeps_remaining_values() {
        let mut m = setup();
        let ids: Vec<EntityId> = (0..5)
            .map(|i| {
                let e = m.create_entity("").unwrap();
                m.insert(e, Health { value: i * 10 }).unwrap();
                e
            })
            .collect();
        assert!(m.destroy_entity(ids[2]));
        for (i, &e) in ids.iter().enumerate() {
            if i == 2 {
                assert!(m.get_component::<Health>(e).is_none());
            } else {
                assert_eq!(m.component::<Health>(e).value, i as i32 * 10);
            }
        }
    }

    #[test]
    fn registering_twice_is_idempotent() {
        let mut registry = ComponentRegistry::new();
        let a = registry.register::<Sprite>("sprite").unwrap();
        let names = registry.registered_names().join(",");
        let b = registry.register::<Sprite>("sprite").unwrap();
        assert_eq!(a, b);
        assert_eq!(registry.registered_names().join(","), names);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn stale_reference_never_aliases_other_entity() {
        let mut m = setup();
        let a = m.create_entity("").unwrap();
        let b = m.create_entity("").unwrap();
        let ra = m.insert(a, Health { value: 1 }).unwrap();
        m.insert(b, Health { value: 2 }).unwrap();
        m.destroy_entity(a);
        assert!(ra.is_null(&m));
        assert!(ra.get(&m).is_none());
        assert_eq!(m.component::<Health>(b).value, 2);
    }

    #[test]
    fn shared_registry_serves_many_managers() {
        let mut registry = ComponentRegistry::new();
        registry.register::<Health>("health").unwrap();
        let registry = std::rc::Rc::new(registry);
        let mut first = EntityManager::with_shared_registry(registry.clone());
        let second = EntityManager::with_shared_registry(registry.clone());
        let e = first.create_entity("").unwrap();
        first.add::<Health>(e).unwrap();
        assert_eq!(first.component_count(), 2);
        assert_eq!(second.component_count(), 0);
        assert_eq!(std::rc::Rc::strong_count(&registry), 3);
    }
}
