//! Generator records and the store that owns them
//!
//! Generator identity is its index in the store. A resize reallocates the
//! whole array, so indices are never reused across resizes.

use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::analysis::AnalysisReport;

/// Default half-width of the cube generators are confined to
pub const DEFAULT_BOUND: f32 = 0.9;

/// A Voronoi generator (seed point)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Generator {
    /// Position in world space, inside the bounding cube
    pub position: Vec3,
    /// Additive weight subtracted from the Euclidean distance during JFA
    pub weight: f32,
    /// Displacement per second applied by the last physics step
    pub velocity: Vec3,
    /// Acute seed-to-junction angle count from the last analysis pass
    pub acute_count: u32,
    /// Mean world position of the voxels this generator owns
    pub centroid: Vec3,
    /// Number of voxels this generator owns
    pub voxel_count: u32,
}

impl Generator {
    /// Create a generator at `position` with zero weight and velocity
    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            weight: 0.0,
            velocity: Vec3::ZERO,
            acute_count: 0,
            centroid: position,
            voxel_count: 0,
        }
    }

    /// Set the additive weight
    pub fn with_weight(mut self, weight: f32) -> Self {
        self.weight = weight;
        self
    }
}

/// Owner of every generator record
#[derive(Debug, Clone, Default)]
pub struct SeedStore {
    generators: Vec<Generator>,
}

impl SeedStore {
    /// Build a store from explicit positions
    pub fn from_positions(positions: &[Vec3]) -> Self {
        Self {
            generators: positions.iter().copied().map(Generator::new).collect(),
        }
    }

    /// Build a store of `count` generators uniformly inside `[-bound, bound]³`
    ///
    /// The same `seed` always produces the same layout; `None` draws from OS
    /// entropy.
    pub fn random(count: u32, bound: f32, seed: Option<u64>) -> Self {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let generators = (0..count)
            .map(|_| {
                Generator::new(Vec3::new(
                    rng.gen_range(-bound..=bound),
                    rng.gen_range(-bound..=bound),
                    rng.gen_range(-bound..=bound),
                ))
            })
            .collect();
        Self { generators }
    }

    pub fn len(&self) -> usize {
        self.generators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.generators.is_empty()
    }

    pub fn generators(&self) -> &[Generator] {
        &self.generators
    }

    pub fn generators_mut(&mut self) -> &mut [Generator] {
        &mut self.generators
    }

    pub fn get(&self, id: u32) -> Option<&Generator> {
        self.generators.get(id as usize)
    }

    /// Current positions, in id order
    pub fn positions(&self) -> Vec<Vec3> {
        self.generators.iter().map(|g| g.position).collect()
    }

    /// Overwrite positions and velocities (used to discard a cancelled frame)
    pub(crate) fn restore_motion(&mut self, saved: &[(Vec3, Vec3)]) {
        for (generator, &(position, velocity)) in self.generators.iter_mut().zip(saved) {
            generator.position = position;
            generator.velocity = velocity;
        }
    }

    pub(crate) fn save_motion(&self) -> Vec<(Vec3, Vec3)> {
        self.generators
            .iter()
            .map(|g| (g.position, g.velocity))
            .collect()
    }

    /// Overwrite centroid, voxel count and acute count from an analysis pass
    pub fn apply_analysis(&mut self, report: &AnalysisReport) {
        for (i, generator) in self.generators.iter_mut().enumerate() {
            generator.centroid = report.centroids.get(i).copied().unwrap_or(generator.position);
            generator.voxel_count = report.voxel_counts.get(i).copied().unwrap_or(0);
            generator.acute_count = report.acute_counts.get(i).copied().unwrap_or(0);
        }
    }
}
