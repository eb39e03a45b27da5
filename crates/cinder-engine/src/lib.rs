//! Cinder Engine -- frame driver, configuration and stage loading on top of
//! [`cinder_ecs`].
//!
//! The [`FrameDriver`](frame::FrameDriver) owns an
//! [`EntityManager`](cinder_ecs::manager::EntityManager) and runs the
//! start, fixed-update and update passes once per frame. Stages are plain
//! JSON describing entities and their component fields.
//!
//! # Quick Start
//!
//! ```
//! use cinder_engine::prelude::*;
//!
//! #[derive(Debug, Default, serde::Serialize, serde::Deserialize)]
//! struct Spin { speed: f32, angle: f32 }
//!
//! impl Component for Spin {
//!     fn fixed_update(&mut self, ctx: &mut Context<'_>) {
//!         self.angle += self.speed * ctx.time().fixed_delta as f32;
//!     }
//! }
//!
//! let mut registry = ComponentRegistry::new();
//! registry.register::<Spin>("spin").unwrap();
//!
//! let config = EngineConfig { fixed_dt: 0.25, ..Default::default() };
//! let mut driver = FrameDriver::new(EntityManager::new(registry), config).unwrap();
//!
//! let stage = StageBlueprint::from_json_str(r#"{
//!     "entities": [ { "name": "Wheel", "components": { "spin": { "speed": 2.0 } } } ]
//! }"#).unwrap();
//! assert!(driver.load_stage(&stage).is_clean());
//!
//! driver.run_frames(2, 0.25);
//! let wheel = driver.manager().named_entity("Wheel").unwrap();
//! assert_eq!(driver.manager().component::<Spin>(wheel).angle, 1.0);
//! ```

#![deny(unsafe_code)]

pub mod config;
pub mod frame;
pub mod logging;
pub mod stage;

/// Re-export the ECS crate for convenience.
pub use cinder_ecs;

use cinder_ecs::EcsError;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by the engine layer.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A configuration value is out of range.
    #[error("invalid config field '{field}': {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    /// JSON (de)serialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// An ECS operation failed.
    #[error(transparent)]
    Ecs(#[from] EcsError),
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common engine usage.
pub mod prelude {
    pub use cinder_ecs::prelude::*;

    pub use crate::config::EngineConfig;
    pub use crate::frame::{FrameDiagnostics, FrameDriver};
    pub use crate::logging::init_logging;
    pub use crate::stage::{EntityBlueprint, StageBlueprint, StageReport};
    pub use crate::EngineError;
}
