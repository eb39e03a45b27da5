//! Data-driven stage blueprints.
//!
//! A [`StageBlueprint`] lists entities by name with a field map per component,
//! keyed by the component's registered name. Instantiating one goes through
//! the same attach and field-assignment paths gameplay code uses, and a bad
//! entry degrades to a logged skip instead of aborting the whole load.
//!
//! ```
//! use cinder_engine::prelude::*;
//!
//! let stage = StageBlueprint::from_json_str(r#"{
//!     "entities": [
//!         { "name": "Camera", "components": { "transform": { "position": [0.0, 5.0, -10.0] } } }
//!     ]
//! }"#).unwrap();
//!
//! let mut manager = EntityManager::new(ComponentRegistry::new());
//! let report = stage.instantiate(&mut manager);
//! assert_eq!(report.created.len(), 1);
//!
//! let camera = manager.named_entity("Camera").unwrap();
//! assert_eq!(manager.component::<Transform>(camera).position, [0.0, 5.0, -10.0]);
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context as _;
use cinder_ecs::component::FieldMap;
use cinder_ecs::entity::EntityId;
use cinder_ecs::manager::EntityManager;
use cinder_ecs::EcsError;
use serde::{Deserialize, Serialize};

use crate::EngineError;

/// One entity of a stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityBlueprint {
    /// Entity name. Empty for unnamed entities.
    #[serde(default)]
    pub name: String,
    /// Registered component name -> fields to seed.
    #[serde(default)]
    pub components: BTreeMap<String, FieldMap>,
}

impl EntityBlueprint {
    /// A blueprint with no components besides the default transform.
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            components: BTreeMap::new(),
        }
    }

    /// Add a component entry.
    pub fn with(mut self, component: &str, fields: FieldMap) -> Self {
        self.components.insert(component.to_owned(), fields);
        self
    }

    /// Create this entity in `manager`, failing on the first bad entry.
    ///
    /// Nothing is left behind on failure: a partially built entity is
    /// destroyed before the error is returned.
    ///
    /// # Errors
    ///
    /// [`EngineError::Ecs`] wrapping the duplicate-name, unknown-component or
    /// field error.
    pub fn spawn(&self, manager: &mut EntityManager) -> Result<EntityId, EngineError> {
        let entity = manager.create_entity(&self.name)?;
        for (component, fields) in &self.components {
            if let Err(e) = apply_component(manager, entity, component, fields) {
                manager.destroy_entity(entity);
                return Err(e.into());
            }
        }
        Ok(entity)
    }
}

/// Assign `fields` to `entity`'s `component` if it already has one (the
/// default transform), otherwise attach it seeded with them.
fn apply_component(
    manager: &mut EntityManager,
    entity: EntityId,
    component: &str,
    fields: &FieldMap,
) -> Result<(), EcsError> {
    let id = manager
        .registry()
        .lookup_by_name(component)
        .ok_or_else(|| manager.registry().unknown_component(component))?;
    if manager.has_component_id(entity, id) {
        manager.set_component_fields(entity, id, fields)
    } else {
        manager
            .add_component_with_fields(entity, id, fields)
            .map(|_| ())
    }
}

/// A set of entities to instantiate together.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageBlueprint {
    /// Entities in creation order.
    #[serde(default)]
    pub entities: Vec<EntityBlueprint>,
}

/// What [`StageBlueprint::instantiate`] did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageReport {
    /// Entities created, in blueprint order.
    pub created: Vec<EntityId>,
    /// Components attached or assigned.
    pub components: usize,
    /// Entries skipped, as `"<entity>: <reason>"`.
    pub skipped: Vec<String>,
}

impl StageReport {
    /// Whether every entry was applied.
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }
}

impl StageBlueprint {
    /// Parse a JSON blueprint.
    pub fn from_json_str(json: &str) -> Result<Self, EngineError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize as pretty JSON.
    pub fn to_json_string(&self) -> Result<String, EngineError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Read and parse a JSON blueprint file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, anyhow::Error> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read stage {}", path.display()))?;
        Self::from_json_str(&text).with_context(|| format!("invalid stage {}", path.display()))
    }

    /// Create every entity in `manager`.
    ///
    /// Components the entity already has (the default transform) get their
    /// fields assigned; the rest are attached seeded with theirs. Duplicate
    /// entity names, unknown component names and ill-typed fields are logged
    /// and skipped.
    pub fn instantiate(&self, manager: &mut EntityManager) -> StageReport {
        let mut report = StageReport::default();

        for blueprint in &self.entities {
            let entity = match manager.create_entity(&blueprint.name) {
                Ok(entity) => entity,
                Err(e) => {
                    tracing::warn!(name = %blueprint.name, error = %e, "stage entity skipped");
                    report.skipped.push(format!("{}: {e}", blueprint.name));
                    continue;
                }
            };
            report.created.push(entity);

            for (component, fields) in &blueprint.components {
                match apply_component(manager, entity, component, fields) {
                    Ok(()) => report.components += 1,
                    Err(e) => {
                        tracing::warn!(
                            entity = %entity,
                            component = %component,
                            error = %e,
                            "stage component skipped"
                        );
                        report.skipped.push(format!("{}: {e}", blueprint.name));
                    }
                }
            }
        }

        tracing::info!(
            entities = report.created.len(),
            components = report.components,
            skipped = report.skipped.len(),
            "stage instantiated"
        );
        report
    }

    /// Blueprint of every live entity in `manager`, in id order.
    ///
    /// Components without a field view (types that do not serialize to a
    /// JSON object) are left out.
    pub fn capture(manager: &EntityManager) -> Self {
        let registry = manager.registry();
        let entities = manager
            .entities()
            .map(|entity| {
                let mut blueprint =
                    EntityBlueprint::named(manager.entity_name(entity).unwrap_or_default());
                for id in manager.component_types(entity) {
                    let Some(descriptor) = registry.descriptor(id) else {
                        continue;
                    };
                    match manager.component_fields(entity, id) {
                        Ok(fields) => {
                            blueprint.components.insert(descriptor.name.clone(), fields);
                        }
                        Err(e) => {
                            tracing::debug!(
                                entity = %entity,
                                component = %descriptor.name,
                                error = %e,
                                "component left out of capture"
                            );
                        }
                    }
                }
                blueprint
            })
            .collect();
        Self { entities }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
