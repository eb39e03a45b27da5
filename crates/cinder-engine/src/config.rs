//! Engine configuration.
//!
//! [`EngineConfig`] is plain serde data. Every field has a default, so a JSON
//! file only needs to name the values it changes:
//!
//! ```
//! use cinder_engine::config::EngineConfig;
//!
//! let config = EngineConfig::from_json_str(r#"{ "fixed_dt": 0.01 }"#).unwrap();
//! assert_eq!(config.fixed_dt, 0.01);
//! assert_eq!(config.max_fixed_steps_per_frame, 5);
//! ```

use std::path::Path;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::EngineError;

/// Configuration for the frame driver and the entity manager it owns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Seconds per fixed simulation step. Must be positive and finite.
    pub fixed_dt: f64,
    /// Upper bound on fixed steps run in one frame. Backlog beyond it is
    /// dropped.
    pub max_fixed_steps_per_frame: u32,
    /// A single frame's delta is clamped to this many seconds.
    pub max_frame_dt: f64,
    /// Upper bound on repeated start passes in one frame.
    pub max_start_passes: usize,
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for EngineConfig {
    /// 50 Hz fixed step, up to 5 catch-up steps, 250 ms frame clamp.
    fn default() -> Self {
        Self {
            fixed_dt: 1.0 / 50.0,
            max_fixed_steps_per_frame: 5,
            max_frame_dt: 0.25,
            max_start_passes: 8,
            log_filter: "info".to_owned(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON configuration.
    ///
    /// # Errors
    ///
    /// [`EngineError::Json`] on malformed JSON,
    /// [`EngineError::InvalidConfig`] on out-of-range values.
    pub fn from_json_str(json: &str) -> Result<Self, EngineError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error naming the file if it cannot be read or is invalid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, anyhow::Error> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read engine config {}", path.display()))?;
        let config = Self::from_json_str(&text)
            .with_context(|| format!("invalid engine config {}", path.display()))?;
        tracing::info!(path = %path.display(), fixed_dt = config.fixed_dt, "engine config loaded");
        Ok(config)
    }

    /// Serialize as pretty JSON.
    pub fn to_json_string(&self) -> Result<String, EngineError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidConfig`] naming the first offending field.
    pub fn validate(&self) -> Result<(), EngineError> {
        let invalid = |field: &'static str, reason: String| {
            Err(EngineError::InvalidConfig { field, reason })
        };
        if !(self.fixed_dt > 0.0 && self.fixed_dt.is_finite()) {
            return invalid(
                "fixed_dt",
                format!("must be positive and finite, got {}", self.fixed_dt),
            );
        }
        if self.max_fixed_steps_per_frame == 0 {
            return invalid("max_fixed_steps_per_frame", "must be at least 1".to_owned());
        }
        if self.max_frame_dt.is_nan() || self.max_frame_dt <= 0.0 {
            return invalid(
                "max_frame_dt",
                format!("must be positive, got {}", self.max_frame_dt),
            );
        }
        if self.max_start_passes == 0 {
            return invalid("max_start_passes", "must be at least 1".to_owned());
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
