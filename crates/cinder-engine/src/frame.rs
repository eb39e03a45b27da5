//! Frame driver: variable-rate frames with fixed-rate simulation steps.
//!
//! Each call to [`FrameDriver::frame`]:
//!
//! 1. Clamps the frame delta to `max_frame_dt` and publishes the
//!    [`FrameTime`] hooks read through `ctx.time()`.
//! 2. Runs `start` on every component attached since the last frame.
//! 3. Runs as many `fixed_update` passes as the accumulated time allows, up to
//!    `max_fixed_steps_per_frame`. Backlog beyond that is dropped.
//! 4. Runs one `update` pass.
//!
//! # Example
//!
//! ```
//! use cinder_engine::prelude::*;
//!
//! let manager = EntityManager::new(ComponentRegistry::new());
//! let config = EngineConfig { fixed_dt: 0.0625, ..Default::default() };
//! let mut driver = FrameDriver::new(manager, config).unwrap();
//!
//! driver.run_frames(4, 0.125);
//! assert_eq!(driver.frame_count(), 4);
//! assert_eq!(driver.fixed_step_count(), 8);
//! ```

use std::time::{Duration, Instant};

use cinder_ecs::lifecycle::FrameTime;
use cinder_ecs::manager::EntityManager;

use crate::config::EngineConfig;
use crate::logging::init_logging;
use crate::stage::{StageBlueprint, StageReport};
use crate::EngineError;

// ---------------------------------------------------------------------------
// FrameDiagnostics
// ---------------------------------------------------------------------------

/// Hook counts and timings for the last frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameDiagnostics {
    /// Start hooks run.
    pub started: usize,
    /// Fixed steps run.
    pub fixed_steps: u32,
    /// Fixed-update hooks run, across all steps.
    pub fixed_hooks: usize,
    /// Update hooks run.
    pub updated: usize,
    /// Fixed steps skipped because the backlog exceeded the per-frame limit.
    pub dropped_steps: u64,
    /// Time spent in the start pass.
    pub start_time: Duration,
    /// Time spent in fixed steps.
    pub fixed_time: Duration,
    /// Time spent in the update pass.
    pub update_time: Duration,
    /// Total time for the frame.
    pub total_time: Duration,
}

// ---------------------------------------------------------------------------
// FrameDriver
// ---------------------------------------------------------------------------

/// Drives an [`EntityManager`] one frame at a time.
pub struct FrameDriver {
    manager: EntityManager,
    config: EngineConfig,
    /// Simulation time not yet consumed by fixed steps.
    accumulator: f64,
    /// Sum of clamped frame deltas.
    elapsed: f64,
    frame_counter: u64,
    fixed_step_counter: u64,
    last_diagnostics: FrameDiagnostics,
}

impl FrameDriver {
    /// Create a driver over `manager`.
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidConfig`] if `config` does not validate.
    pub fn new(mut manager: EntityManager, config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        manager.set_max_start_passes(config.max_start_passes);
        manager.set_frame_time(FrameTime {
            fixed_delta: config.fixed_dt,
            ..FrameTime::default()
        });
        Ok(Self {
            manager,
            config,
            accumulator: 0.0,
            elapsed: 0.0,
            frame_counter: 0,
            fixed_step_counter: 0,
            last_diagnostics: FrameDiagnostics::default(),
        })
    }

    /// Install the logging subscriber with `config.log_filter`, then create
    /// the driver. The usual entry point for an application.
    ///
    /// Returns the driver and whether this call installed the subscriber.
    ///
    /// # Errors
    ///
    /// As [`new`](Self::new).
    pub fn bootstrap(
        manager: EntityManager,
        config: EngineConfig,
    ) -> Result<(Self, bool), EngineError> {
        config.validate()?;
        let installed = init_logging(&config.log_filter);
        tracing::info!(
            fixed_dt = config.fixed_dt,
            filter = %config.log_filter,
            installed,
            "frame driver starting"
        );
        Ok((Self::new(manager, config)?, installed))
    }

    /// Run one frame of `dt` seconds.
    ///
    /// Negative or non-finite deltas are treated as zero.
    pub fn frame(&mut self, dt: f64) -> &FrameDiagnostics {
        let _span = tracing::trace_span!("frame", frame = self.frame_counter).entered();
        let frame_start = Instant::now();

        let dt = if dt.is_finite() && dt >= 0.0 {
            dt
        } else {
            tracing::warn!(dt, "invalid frame delta treated as zero");
            0.0
        };
        let dt = if dt > self.config.max_frame_dt {
            tracing::debug!(dt, max = self.config.max_frame_dt, "frame delta clamped");
            self.config.max_frame_dt
        } else {
            dt
        };

        self.manager.set_frame_time(FrameTime {
            delta: dt,
            fixed_delta: self.config.fixed_dt,
            elapsed: self.elapsed,
            frame: self.frame_counter,
        });

        // Phase 1: start newly attached components.
        let start = Instant::now();
        let started = self.manager.start_all();
        let start_time = start.elapsed();

        // Phase 2: fixed steps.
        let fixed = Instant::now();
        self.accumulator += dt;
        let mut fixed_steps = 0;
        let mut fixed_hooks = 0;
        while self.accumulator >= self.config.fixed_dt
            && fixed_steps < self.config.max_fixed_steps_per_frame
        {
            fixed_hooks += self.manager.fixed_update_all();
            self.accumulator -= self.config.fixed_dt;
            fixed_steps += 1;
            self.fixed_step_counter += 1;
        }
        let mut dropped_steps = 0;
        if self.accumulator >= self.config.fixed_dt {
            dropped_steps = (self.accumulator / self.config.fixed_dt).floor() as u64;
            self.accumulator = self.accumulator.rem_euclid(self.config.fixed_dt);
            tracing::warn!(
                dropped = dropped_steps,
                limit = self.config.max_fixed_steps_per_frame,
                "fixed step backlog dropped"
            );
        }
        let fixed_time = fixed.elapsed();

        // Phase 3: variable-rate update.
        let update = Instant::now();
        let updated = self.manager.update_all();
        let update_time = update.elapsed();

        self.elapsed += dt;
        self.frame_counter += 1;

        self.last_diagnostics = FrameDiagnostics {
            started,
            fixed_steps,
            fixed_hooks,
            updated,
            dropped_steps,
            start_time,
            fixed_time,
            update_time,
            total_time: frame_start.elapsed(),
        };
        &self.last_diagnostics
    }

    /// Run `count` frames of `dt` seconds each. Returns the number of fixed
    /// steps run.
    pub fn run_frames(&mut self, count: u64, dt: f64) -> u64 {
        let before = self.fixed_step_counter;
        for _ in 0..count {
            self.frame(dt);
        }
        self.fixed_step_counter - before
    }

    /// Instantiate `stage` into the managed entities.
    pub fn load_stage(&mut self, stage: &StageBlueprint) -> StageReport {
        stage.instantiate(&mut self.manager)
    }

    // -- accessors ----------------------------------------------------------

    /// Frames run so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_counter
    }

    /// Fixed steps run so far.
    pub fn fixed_step_count(&self) -> u64 {
        self.fixed_step_counter
    }

    /// Seconds of (clamped) frame time run so far.
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Fraction of a fixed step left in the accumulator, in `[0, 1)`. Used
    /// to interpolate rendering between the last two fixed states.
    pub fn interpolation_alpha(&self) -> f64 {
        self.accumulator / self.config.fixed_dt
    }

    /// The driver's configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Diagnostics from the last frame.
    pub fn last_diagnostics(&self) -> &FrameDiagnostics {
        &self.last_diagnostics
    }

    /// Read-only access to the entity manager.
    pub fn manager(&self) -> &EntityManager {
        &self.manager
    }

    /// Mutable access to the entity manager, for setup between frames.
    pub fn manager_mut(&mut self) -> &mut EntityManager {
        &mut self.manager
    }

    /// Give up the driver and keep the entities.
    pub fn into_manager(self) -> EntityManager {
        self.manager
    }
}

impl std::fmt::Debug for FrameDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameDriver")
            .field("frame_counter", &self.frame_counter)
            .field("fixed_step_counter", &self.fixed_step_counter)
            .field("accumulator", &self.accumulator)
            .field("manager", &self.manager)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
