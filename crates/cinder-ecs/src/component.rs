//! The [`Component`] trait, component type ids, and field-map helpers.
//!
//! A component is a plain Rust value stored by value in its type's pool. Its
//! lifecycle hooks are ordinary trait methods with no-op defaults, so a data
//! only component is just `impl Component for Health {}`.
//!
//! Field maps ([`FieldMap`]) are the data-driven view of a component: the
//! JSON object produced by serializing an instance. They seed new instances
//! (scene/blueprint loading) and capture existing ones (saving).

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::lifecycle::Context;
use crate::EcsError;

/// Field name -> value map used for data-driven construction and capture.
pub type FieldMap = serde_json::Map<String, serde_json::Value>;

// ---------------------------------------------------------------------------
// ComponentTypeId
// ---------------------------------------------------------------------------

/// Opaque, lightweight identifier for a registered component type.
///
/// Assigned in registration order, so it doubles as the pool index inside the
/// memory manager.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentTypeId(pub(crate) u32);

impl ComponentTypeId {
    /// The position of this type in registration order.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ComponentTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentTypeId({})", self.0)
    }
}

// ---------------------------------------------------------------------------
// Component
// ---------------------------------------------------------------------------

/// A typed bundle of data and behavior attachable to an entity.
///
/// Hooks are dispatched by the [`EntityManager`](crate::manager::EntityManager):
/// `start` exactly once before the first `update`/`fixed_update`, and
/// `on_delete` exactly once when the instance is destroyed. Every hook gets a
/// [`Context`] that dereferences to the manager, so hooks may create and
/// destroy entities and components, including their own.
pub trait Component: Default + Serialize + DeserializeOwned + 'static {
    /// Called once, before the first update of this instance.
    fn start(&mut self, _ctx: &mut Context<'_>) {}

    /// Called once per frame.
    fn update(&mut self, _ctx: &mut Context<'_>) {}

    /// Called once per fixed simulation step.
    fn fixed_update(&mut self, _ctx: &mut Context<'_>) {}

    /// Called once when the instance is destroyed.
    fn on_delete(&mut self, _ctx: &mut Context<'_>) {}
}

// ---------------------------------------------------------------------------
// Transform (built-in)
// ---------------------------------------------------------------------------

/// Registered name of the built-in [`Transform`] component.
pub const TRANSFORM_NAME: &str = "transform";

/// Spatial transform attached to every entity on creation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Transform {
    /// World-space position.
    pub position: [f32; 3],
    /// Orientation quaternion `[x, y, z, w]`.
    pub rotation: [f32; 4],
    /// Per-axis scale.
    pub scale: [f32; 3],
}

impl Transform {
    /// Identity transform: origin, no rotation, unit scale.
    pub const IDENTITY: Transform = Transform {
        position: [0.0, 0.0, 0.0],
        rotation: [0.0, 0.0, 0.0, 1.0],
        scale: [1.0, 1.0, 1.0],
    };

    /// Identity transform moved to `position`.
    pub fn from_position(position: [f32; 3]) -> Self {
        Self {
            position,
            ..Self::IDENTITY
        }
    }

    /// Offset the position by `delta`.
    pub fn translate(&mut self, delta: [f32; 3]) {
        for (axis, d) in self.position.iter_mut().zip(delta) {
            *axis += d;
        }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Component for Transform {}

// ---------------------------------------------------------------------------
// Field helpers
// ---------------------------------------------------------------------------

/// Serialize `value` to a field map.
///
/// Fails with [`EcsError::NotAFieldMap`] if the type does not serialize as a
/// JSON object (tuple structs, scalars).
pub(crate) fn fields_of<T: Component>(component: &str, value: &T) -> Result<FieldMap, EcsError> {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(_) => Err(EcsError::NotAFieldMap {
            component: component.to_owned(),
        }),
        Err(e) => Err(EcsError::ComponentDeserializationError {
            component: component.to_owned(),
            details: e.to_string(),
        }),
    }
}

/// Produce a new value from `base` with `fields` overlaid on top of it.
///
/// Keys absent from `fields` keep their value from `base`. Keys that `base`
/// does not serialize are passed through to serde but logged, since they are
/// usually a typo in data.
pub(crate) fn overlay_fields<T: Component>(
    component: &str,
    base: &T,
    fields: &FieldMap,
) -> Result<T, EcsError> {
    let mut merged = fields_of(component, base)?;
    for (key, value) in fields {
        if !merged.contains_key(key) {
            tracing::warn!(
                component = %component,
                field = %key,
                "field is not part of the component's serialized form"
            );
        }
        merged.insert(key.clone(), value.clone());
    }
    serde_json::from_value(serde_json::Value::Object(merged)).map_err(|e| {
        EcsError::ComponentDeserializationError {
            component: component.to_owned(),
            details: e.to_string(),
        }
    })
}

/// Names of the serialized fields of `T`'s default instance.
pub(crate) fn field_names<T: Component>() -> Vec<String> {
    match serde_json::to_value(T::default()) {
        Ok(serde_json::Value::Object(map)) => map.keys().cloned().collect(),
        _ => Vec::new(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
