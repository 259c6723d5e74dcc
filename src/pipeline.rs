//! Frame orchestration: Physics → JFA → Analysis
//!
//! [`Simulation`] owns the generators, the published voxel grid and the three
//! stage engines. Each frame runs the stages in order with a full barrier
//! between them:
//!
//! 1. Physics moves generators using the previous frame's analysis.
//! 2. JFA voxelizes the new positions into a scratch grid.
//! 3. Analysis computes centroids and acute counts from the scratch grid.
//!
//! The scratch grid and the analysis results are committed together at the
//! end of the frame, so a cancelled frame leaves no partial state behind.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::analysis::{AnalysisEngine, AnalysisReport, AnalysisSettings, Junction};
use crate::config::SimulationConfig;
use crate::error::{SimError, SimResult};
use crate::grid::{VolumeGrid, VoxelGrid};
use crate::jfa::JfaEngine;
use crate::physics::{PhysicsEngine, PhysicsSettings};
use crate::seeds::{DEFAULT_BOUND, Generator, SeedStore};

/// Timings and counters for one completed frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct FrameStats {
    /// Frame number, starting at 1 after (re)initialization
    pub frame: u64,
    pub jfa_time_ms: f64,
    pub analysis_time_ms: f64,
    pub physics_time_ms: f64,
    /// Generators that moved
    pub active_points: u32,
    /// Generators with positive flux
    pub growing_cells: u32,
    /// Generators with negative flux
    pub shrinking_cells: u32,
    pub total_delta: f32,
    pub max_delta: f32,
    pub junctions: usize,
    pub acute_pairs: u64,
    pub corrupted_voxels: u64,
}

/// Read-only view of one generator for renderers and legends
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeneratorSnapshot {
    pub position: Vec3,
    pub centroid: Vec3,
    pub acute_count: u32,
    pub voxel_count: u32,
}

impl From<&Generator> for GeneratorSnapshot {
    fn from(generator: &Generator) -> Self {
        Self {
            position: generator.position,
            centroid: generator.centroid,
            acute_count: generator.acute_count,
            voxel_count: generator.voxel_count,
        }
    }
}

/// Saved generator motion and damping memory for discarding a frame
type SavedMotion = (Vec<(Vec3, Vec3)>, Vec<f32>);

/// Stage that just finished when the cancel check runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameStage {
    Physics,
    Jfa,
    Analysis,
}

/// The Voronoi growth simulation
#[derive(Debug)]
pub struct Simulation {
    volume: VolumeGrid,
    seeds: SeedStore,
    grid: VoxelGrid,
    scratch: VoxelGrid,
    junctions: Vec<Junction>,
    jfa: JfaEngine,
    analysis: AnalysisEngine,
    physics: PhysicsEngine,
    rng_seed: Option<u64>,
    bound: f32,
    frame: u64,
}

impl Simulation {
    /// Create a simulation and prime it with one JFA + analysis pass
    ///
    /// An empty `initial_positions` seeds `generator_count` random positions
    /// inside the default bound; otherwise its length must match
    /// `generator_count` and every position must be finite and inside
    /// `[-1, 1]³`.
    pub fn initialize(
        resolution: u32,
        generator_count: u32,
        initial_positions: &[Vec3],
        seed: Option<u64>,
    ) -> SimResult<Self> {
        Self::build(
            resolution,
            generator_count,
            initial_positions,
            seed,
            DEFAULT_BOUND,
            AnalysisSettings::default(),
        )
    }

    /// Create a simulation from a loaded configuration, with random seeding
    pub fn from_config(config: &SimulationConfig) -> SimResult<Self> {
        config.physics.validate()?;
        Self::build(
            config.resolution,
            config.generator_count,
            &[],
            config.seed,
            config.physics.bound,
            config.analysis,
        )
    }

    fn build(
        resolution: u32,
        generator_count: u32,
        initial_positions: &[Vec3],
        seed: Option<u64>,
        bound: f32,
        analysis: AnalysisSettings,
    ) -> SimResult<Self> {
        let volume = VolumeGrid::new(resolution)?;
        if generator_count == 0 {
            return Err(SimError::NoGenerators);
        }
        if !initial_positions.is_empty() && initial_positions.len() != generator_count as usize {
            return Err(SimError::PositionCountMismatch {
                expected: generator_count,
                actual: initial_positions.len(),
            });
        }
        if let Some(index) = initial_positions
            .iter()
            .position(|p| !p.is_finite() || p.abs().max_element() > 1.0)
        {
            return Err(SimError::InvalidPosition { index });
        }
        analysis.validate()?;

        let seeds = if initial_positions.is_empty() {
            SeedStore::random(generator_count, bound, seed)
        } else {
            SeedStore::from_positions(initial_positions)
        };

        let mut sim = Self {
            volume,
            grid: VoxelGrid::new(volume),
            scratch: VoxelGrid::new(volume),
            junctions: Vec::new(),
            jfa: JfaEngine::new(),
            analysis: AnalysisEngine::new(analysis),
            physics: PhysicsEngine::new(),
            rng_seed: seed,
            bound,
            frame: 0,
            seeds,
        };
        sim.physics.reset(sim.seeds.len());
        sim.prime();

        tracing::info!(resolution, generators = generator_count, "simulation initialized");
        Ok(sim)
    }

    /// Voxelize and analyze the current positions without moving anything
    fn prime(&mut self) {
        self.jfa.run(self.seeds.generators(), &mut self.scratch);
        let report = self.analysis.run(&self.scratch, self.seeds.generators());
        self.commit(report);
    }

    fn commit(&mut self, report: AnalysisReport) {
        std::mem::swap(&mut self.grid, &mut self.scratch);
        self.seeds.apply_analysis(&report);
        self.junctions = report.junctions;
    }

    /// Run one Physics → JFA → Analysis frame
    ///
    /// Settings are validated first; rejected settings leave the simulation
    /// untouched.
    pub fn step_frame(&mut self, dt: f32, settings: &PhysicsSettings) -> SimResult<FrameStats> {
        // Without a cancel flag the frame always completes
        Ok(self.run_frame(dt, settings, None)?.unwrap_or_default())
    }

    /// Like [`Simulation::step_frame`], polling `cancel` after each stage
    ///
    /// Returns `Ok(None)` when the frame was cancelled; generator positions
    /// and damping memory are restored and nothing is committed.
    pub fn step_frame_cancellable(
        &mut self,
        dt: f32,
        settings: &PhysicsSettings,
        cancel: &AtomicBool,
    ) -> SimResult<Option<FrameStats>> {
        let check: &dyn Fn(FrameStage) -> bool = &|_| cancel.load(Ordering::Relaxed);
        self.run_frame(dt, settings, Some(check))
    }

    fn run_frame(
        &mut self,
        dt: f32,
        settings: &PhysicsSettings,
        cancel: Option<&dyn Fn(FrameStage) -> bool>,
    ) -> SimResult<Option<FrameStats>> {
        settings.validate()?;
        let cancelled = |stage: FrameStage| cancel.is_some_and(|check| check(stage));
        let saved: Option<SavedMotion> = cancel.map(|_| {
            (
                self.seeds.save_motion(),
                self.physics.previous_delta().to_vec(),
            )
        });

        let start = Instant::now();
        let physics = self.physics.step(self.seeds.generators_mut(), settings, dt);
        let physics_time_ms = elapsed_ms(start);
        if cancelled(FrameStage::Physics) {
            self.discard(saved, FrameStage::Physics);
            return Ok(None);
        }

        let start = Instant::now();
        self.jfa.run(self.seeds.generators(), &mut self.scratch);
        let jfa_time_ms = elapsed_ms(start);
        if cancelled(FrameStage::Jfa) {
            self.discard(saved, FrameStage::Jfa);
            return Ok(None);
        }

        let start = Instant::now();
        let report = self.analysis.run(&self.scratch, self.seeds.generators());
        let analysis_time_ms = elapsed_ms(start);
        if cancelled(FrameStage::Analysis) {
            self.discard(saved, FrameStage::Analysis);
            return Ok(None);
        }

        self.frame += 1;
        let stats = FrameStats {
            frame: self.frame,
            jfa_time_ms,
            analysis_time_ms,
            physics_time_ms,
            active_points: physics.active_points,
            growing_cells: physics.growing_points,
            shrinking_cells: physics.shrinking_points,
            total_delta: physics.total_delta,
            max_delta: physics.max_delta,
            junctions: report.junctions.len(),
            acute_pairs: report.acute_pairs,
            corrupted_voxels: report.corrupted_voxels,
        };
        self.commit(report);

        tracing::debug!(
            frame = stats.frame,
            jfa_ms = stats.jfa_time_ms,
            analysis_ms = stats.analysis_time_ms,
            physics_ms = stats.physics_time_ms,
            active = stats.active_points,
            "frame complete"
        );
        Ok(Some(stats))
    }

    fn discard(&mut self, saved: Option<SavedMotion>, after: FrameStage) {
        if let Some((motion, previous_delta)) = saved {
            self.seeds.restore_motion(&motion);
            self.physics.restore(previous_delta);
        }
        tracing::debug!(frame = self.frame + 1, ?after, "frame cancelled");
    }

    /// Change the resolution, reseeding every generator
    pub fn set_resolution(&mut self, resolution: u32) -> SimResult<()> {
        let volume = VolumeGrid::new(resolution)?;
        self.volume = volume;
        self.reallocate(self.seeds.len() as u32);
        tracing::info!(resolution, "resolution changed");
        Ok(())
    }

    /// Change the generator count, reseeding every generator
    pub fn set_generator_count(&mut self, generator_count: u32) -> SimResult<()> {
        if generator_count == 0 {
            return Err(SimError::NoGenerators);
        }
        self.reallocate(generator_count);
        tracing::info!(generators = generator_count, "generator count changed");
        Ok(())
    }

    /// Replace the analysis settings and re-analyze the current grid
    pub fn set_analysis_settings(&mut self, settings: AnalysisSettings) -> SimResult<()> {
        settings.validate()?;
        self.analysis = AnalysisEngine::new(settings);
        let report = self.analysis.run(&self.grid, self.seeds.generators());
        self.seeds.apply_analysis(&report);
        self.junctions = report.junctions;
        Ok(())
    }

    fn reallocate(&mut self, generator_count: u32) {
        self.grid = VoxelGrid::new(self.volume);
        self.scratch = VoxelGrid::new(self.volume);
        self.seeds = SeedStore::random(generator_count, self.bound, self.rng_seed);
        self.physics.reset(self.seeds.len());
        self.frame = 0;
        self.prime();
    }

    /// The published voxel grid from the last completed frame
    pub fn voxel_grid(&self) -> &VoxelGrid {
        &self.grid
    }

    /// Position, centroid and counts for every generator, in id order
    pub fn generator_snapshot(&self) -> Vec<GeneratorSnapshot> {
        self.seeds.generators().iter().map(GeneratorSnapshot::from).collect()
    }

    pub fn generators(&self) -> &[Generator] {
        self.seeds.generators()
    }

    /// Junctions found by the last analysis pass
    pub fn junctions(&self) -> &[Junction] {
        &self.junctions
    }

    pub fn resolution(&self) -> u32 {
        self.volume.size()
    }

    pub fn generator_count(&self) -> u32 {
        self.seeds.len() as u32
    }

    pub fn analysis_settings(&self) -> AnalysisSettings {
        self.analysis.settings()
    }

    /// Completed frames since the last (re)initialization
    pub fn frame(&self) -> u64 {
        self.frame
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}
