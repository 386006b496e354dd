//! Rainfall erosion simulation
//!
//! Each iteration rains evenly on the whole heightmap, drains the water
//! downhill cell by cell while it carries sediment from steep cells to
//! lower ones, then bakes the sediment back into the heights:
//! - **flow**: rain, steepest-descent routing and the drain sweep loop
//! - **sediment**: cone-shaped deposition of accumulated sediment
//! - **params**: run configuration and presets

pub mod flow;
pub mod params;
pub mod sediment;

pub use flow::{DrainOutcome, ErosionBuffers};
pub use params::{ErosionParams, ErosionPreset, DEFAULT_MAX_DRAIN_SWEEPS};

use std::ops::ControlFlow;

use thiserror::Error;

use crate::tilemap::Tilemap;

/// Errors raised for caller misuse. Numeric degeneracy (flat ground,
/// non-converging drains) is handled inside the simulation and never
/// surfaces here.
#[derive(Error, Debug)]
pub enum ErosionError {
    #[error("iterations must be at least 1, got {0}")]
    InvalidIterations(usize),
    #[error("rainfall must not be negative, got {0}")]
    InvalidRainfall(f32),
    #[error("cone threshold must be positive, got {0}")]
    InvalidConeThreshold(f32),
    #[error("drain sweep cap must be at least 1, got {0}")]
    InvalidSweepCap(usize),
    #[error("grid is {actual:?}, expected {expected:?}")]
    DimensionMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid erosion config: {0}")]
    Config(#[from] serde_json::Error),
}

/// Reported once per iteration, before that iteration runs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Progress {
    /// Zero-based index of the iteration about to run
    pub iteration: usize,
    pub total: usize,
    /// `iteration / total`, so the first report is 0.0
    pub fraction: f32,
}

/// Statistics from an erosion run
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ErosionStats {
    /// Iterations that ran to completion
    pub iterations_completed: usize,
    /// Drain sweeps used by each completed iteration
    pub sweeps_per_iteration: Vec<usize>,
    /// Iterations whose drain loop hit the sweep cap with water still moving
    pub unconverged_iterations: usize,
    /// Sediment shifted between cells by water routing
    pub total_sediment_moved: f64,
    /// Largest change one deposit made to a single cell
    pub max_height_change: f32,
    /// True if the progress callback stopped the run early
    pub cancelled: bool,
}

/// Rainfall erosion over a caller-owned heightmap.
///
/// Holds only validated parameters. Water and sediment grids are allocated
/// per run, or supplied by the caller through
/// [`run_with_buffers`](Self::run_with_buffers), so one engine can drive any
/// number of independent heightmaps.
#[derive(Clone, Debug)]
pub struct ErosionEngine {
    params: ErosionParams,
}

impl ErosionEngine {
    pub fn new(params: ErosionParams) -> Result<Self, ErosionError> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &ErosionParams {
        &self.params
    }

    /// Erode `heightmap` in place for every configured iteration.
    pub fn run(&self, heightmap: &mut Tilemap<f32>) -> ErosionStats {
        self.run_with_progress(heightmap, |_| ControlFlow::Continue(()))
    }

    /// Erode `heightmap` in place, calling `on_progress` before each
    /// iteration. Returning `ControlFlow::Break` stops the run there; the
    /// heightmap keeps every iteration completed so far.
    pub fn run_with_progress<F>(&self, heightmap: &mut Tilemap<f32>, on_progress: F) -> ErosionStats
    where
        F: FnMut(Progress) -> ControlFlow<()>,
    {
        let mut buffers = ErosionBuffers::for_heightmap(heightmap);
        self.erode(heightmap, &mut buffers, on_progress)
    }

    /// Like [`run_with_progress`](Self::run_with_progress), but reuses
    /// caller-owned water and sediment grids so repeated runs on
    /// same-sized maps skip the allocation.
    pub fn run_with_buffers<F>(
        &self,
        heightmap: &mut Tilemap<f32>,
        buffers: &mut ErosionBuffers,
        on_progress: F,
    ) -> Result<ErosionStats, ErosionError>
    where
        F: FnMut(Progress) -> ControlFlow<()>,
    {
        buffers.check_shape(heightmap)?;
        buffers.take_sediment_moved();
        Ok(self.erode(heightmap, buffers, on_progress))
    }

    fn erode<F>(&self, heightmap: &mut Tilemap<f32>, buffers: &mut ErosionBuffers, mut on_progress: F) -> ErosionStats
    where
        F: FnMut(Progress) -> ControlFlow<()>,
    {
        let mut stats = ErosionStats::default();
        if heightmap.is_empty() {
            return stats;
        }

        let total = self.params.iterations;

        for iteration in 0..total {
            let progress = Progress {
                iteration,
                total,
                fraction: iteration as f32 / total as f32,
            };
            if on_progress(progress).is_break() {
                stats.cancelled = true;
                break;
            }

            buffers.rain(self.params.rainfall);
            let outcome = buffers.drain(heightmap, self.params.max_drain_sweeps);
            let max_change = sediment::deposit_all(heightmap, &mut buffers.sediment, self.params.cone_threshold);

            stats.iterations_completed += 1;
            stats.sweeps_per_iteration.push(outcome.sweeps);
            if !outcome.converged {
                stats.unconverged_iterations += 1;
            }
            stats.total_sediment_moved += buffers.take_sediment_moved();
            stats.max_height_change = stats.max_height_change.max(max_change);
        }

        stats
    }
}

/// Validate `params` and erode `heightmap` in place.
pub fn simulate(heightmap: &mut Tilemap<f32>, params: &ErosionParams) -> Result<ErosionStats, ErosionError> {
    let engine = ErosionEngine::new(params.clone())?;
    Ok(engine.run(heightmap))
}
