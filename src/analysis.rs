//! Cell geometry analysis over a finished voxel grid
//!
//! Two independent statistics per generator:
//!
//! - **Centroid**: dense pass over every voxel, accumulating the integer
//!   voxel coordinate and a count into per-generator atomics. Integer
//!   coordinate sums are exact in `u64`, so no fixed-point scale is needed.
//! - **Acute count**: sparse pass over every 2×2×2 voxel cube. A cube whose
//!   corners hold at least `min_junction_cells` distinct owners is a
//!   junction; every owner pair at a junction whose seed-to-junction angle
//!   is below 90° increments both owners' counters.
//!
//! Cell ids `>= N` are treated as unassigned and counted as corrupted.

use std::f32::consts::FRAC_PI_2;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use glam::{UVec3, Vec3};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};
use crate::grid::{UNASSIGNED, VolumeGrid, VoxelGrid};
use crate::seeds::Generator;

/// Default distinct-owner threshold for a junction
pub const DEFAULT_MIN_JUNCTION_CELLS: u32 = 3;

/// Vectors shorter than this are skipped in the angle test
const ANGLE_EPSILON: f32 = 1e-6;

/// Settings for the analysis stage
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    /// Distinct owners a 2×2×2 cube needs to count as a junction (3..=8)
    pub min_junction_cells: u32,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            min_junction_cells: DEFAULT_MIN_JUNCTION_CELLS,
        }
    }
}

impl AnalysisSettings {
    pub fn validate(&self) -> SimResult<()> {
        if !(3..=8).contains(&self.min_junction_cells) {
            return Err(SimError::InvalidSettings(format!(
                "min_junction_cells must be in 3..=8, got {}",
                self.min_junction_cells
            )));
        }
        Ok(())
    }
}

/// A location where several cells meet
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Junction {
    /// World position of the 2×2×2 cube centre
    pub position: Vec3,
    /// Distinct owning generators, ascending
    pub cell_ids: Vec<u32>,
}

/// Output of one analysis pass; a full overwrite for every generator
#[derive(Debug, Clone, Default)]
pub struct AnalysisReport {
    pub centroids: Vec<Vec3>,
    pub voxel_counts: Vec<u32>,
    pub acute_counts: Vec<u32>,
    pub junctions: Vec<Junction>,
    /// Voxels whose id referenced a generator that does not exist
    pub corrupted_voxels: u64,
    /// Acute owner pairs found across all junctions
    pub acute_pairs: u64,
}

/// Angle at `junction` between the directions to seeds `a` and `b`
///
/// `None` when either seed coincides with the junction.
pub fn seed_angle(a: Vec3, b: Vec3, junction: Vec3) -> Option<f32> {
    let to_a = a - junction;
    let to_b = b - junction;
    if to_a.length() < ANGLE_EPSILON || to_b.length() < ANGLE_EPSILON {
        return None;
    }
    let cos = to_a.normalize().dot(to_b.normalize()).clamp(-1.0, 1.0);
    Some(cos.acos())
}

/// Centroid and junction analysis
#[derive(Debug, Clone, Default)]
pub struct AnalysisEngine {
    settings: AnalysisSettings,
}

impl AnalysisEngine {
    pub fn new(settings: AnalysisSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> AnalysisSettings {
        self.settings
    }

    /// Analyze `grid` against the generators that produced it
    pub fn run(&self, grid: &VoxelGrid, generators: &[Generator]) -> AnalysisReport {
        let (centroids, voxel_counts, corrupted_voxels) = centroid_pass(grid, generators);
        if corrupted_voxels > 0 {
            tracing::warn!(
                corrupted_voxels,
                generators = generators.len(),
                "voxel grid references unknown generators; treated as unassigned"
            );
        }

        let junctions = self.find_junctions(grid, generators.len());
        let (acute_counts, acute_pairs) = acute_pass(&junctions, generators);

        tracing::debug!(
            junctions = junctions.len(),
            acute_pairs,
            "analysis pass complete"
        );

        AnalysisReport {
            centroids,
            voxel_counts,
            acute_counts,
            junctions,
            corrupted_voxels,
            acute_pairs,
        }
    }

    /// Every 2×2×2 cube with at least `min_junction_cells` distinct owners
    ///
    /// Cubes are visited in linear order of their minimum corner, so the
    /// result order is deterministic.
    pub fn find_junctions(&self, grid: &VoxelGrid, generator_count: usize) -> Vec<Junction> {
        let volume = grid.volume();
        let cubes = volume.size() as usize - 1;
        let min_cells = self.settings.min_junction_cells as usize;
        let cells = grid.cells();

        (0..cubes * cubes * cubes)
            .into_par_iter()
            .filter_map(|k| {
                let base = UVec3::new(
                    (k % cubes) as u32,
                    ((k / cubes) % cubes) as u32,
                    (k / (cubes * cubes)) as u32,
                );
                let mut ids = [0u32; 8];
                let mut len = 0;
                for corner in 0..8u32 {
                    let offset = UVec3::new(corner & 1, (corner >> 1) & 1, (corner >> 2) & 1);
                    let id = cells[volume.index(base + offset)];
                    if id == UNASSIGNED || id as usize >= generator_count {
                        continue;
                    }
                    if !ids[..len].contains(&id) {
                        ids[len] = id;
                        len += 1;
                    }
                }
                if len < min_cells {
                    return None;
                }
                let mut cell_ids = ids[..len].to_vec();
                cell_ids.sort_unstable();
                Some(Junction {
                    position: volume.to_world(base.as_vec3() + Vec3::splat(0.5)),
                    cell_ids,
                })
            })
            .collect()
    }
}

/// Per-generator centroid and voxel count, plus the corrupted voxel count
fn centroid_pass(grid: &VoxelGrid, generators: &[Generator]) -> (Vec<Vec3>, Vec<u32>, u64) {
    let volume = grid.volume();
    let n = generators.len();
    let size = volume.size() as usize;

    let sums: Vec<[AtomicU64; 3]> = (0..n)
        .map(|_| [AtomicU64::new(0), AtomicU64::new(0), AtomicU64::new(0)])
        .collect();
    let counts: Vec<AtomicU32> = (0..n).map(|_| AtomicU32::new(0)).collect();
    let corrupted = AtomicU64::new(0);

    grid.cells()
        .par_chunks(size * size)
        .enumerate()
        .for_each(|(z, slice)| {
            for (i, &id) in slice.iter().enumerate() {
                if id == UNASSIGNED {
                    continue;
                }
                let Some(sum) = sums.get(id as usize) else {
                    corrupted.fetch_add(1, Ordering::Relaxed);
                    continue;
                };
                sum[0].fetch_add((i % size) as u64, Ordering::Relaxed);
                sum[1].fetch_add((i / size) as u64, Ordering::Relaxed);
                sum[2].fetch_add(z as u64, Ordering::Relaxed);
                counts[id as usize].fetch_add(1, Ordering::Relaxed);
            }
        });

    let voxel_counts: Vec<u32> = counts.into_iter().map(AtomicU32::into_inner).collect();
    let centroids = generators
        .par_iter()
        .enumerate()
        .map(|(i, generator)| {
            finalize_centroid(volume, &sums[i], voxel_counts[i], generator.position)
        })
        .collect();

    (centroids, voxel_counts, corrupted.into_inner())
}

fn finalize_centroid(
    volume: VolumeGrid,
    sum: &[AtomicU64; 3],
    count: u32,
    fallback: Vec3,
) -> Vec3 {
    if count == 0 {
        return fallback;
    }
    let n = count as f64;
    let mean = Vec3::new(
        (sum[0].load(Ordering::Relaxed) as f64 / n) as f32,
        (sum[1].load(Ordering::Relaxed) as f64 / n) as f32,
        (sum[2].load(Ordering::Relaxed) as f64 / n) as f32,
    );
    volume.to_world(mean)
}

/// Acute pair counts per generator and the total number of acute pairs
fn acute_pass(junctions: &[Junction], generators: &[Generator]) -> (Vec<u32>, u64) {
    let counts: Vec<AtomicU32> = (0..generators.len()).map(|_| AtomicU32::new(0)).collect();
    let pairs = AtomicU64::new(0);

    junctions.par_iter().for_each(|junction| {
        let ids = &junction.cell_ids;
        for (i, &a) in ids.iter().enumerate() {
            for &b in &ids[i + 1..] {
                let angle = seed_angle(
                    generators[a as usize].position,
                    generators[b as usize].position,
                    junction.position,
                );
                if matches!(angle, Some(angle) if angle < FRAC_PI_2) {
                    counts[a as usize].fetch_add(1, Ordering::Relaxed);
                    counts[b as usize].fetch_add(1, Ordering::Relaxed);
                    pairs.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    });

    (
        counts.into_iter().map(AtomicU32::into_inner).collect(),
        pairs.into_inner(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jfa::JfaEngine;
    use crate::seeds::SeedStore;

    fn voxelize(size: u32, generators: &[Generator]) -> VoxelGrid {
        let mut grid = VoxelGrid::new(VolumeGrid::new(size).unwrap());
        JfaEngine::new().run(generators, &mut grid);
        grid
    }

    fn tetrahedron() -> Vec<Generator> {
        [
            Vec3::new(1.0, 1.0, 1.0),
            Vec3::new(1.0, -1.0, -1.0),
            Vec3::new(-1.0, 1.0, -1.0),
            Vec3::new(-1.0, -1.0, 1.0),
        ]
        .into_iter()
        .map(Generator::new)
        .collect()
    }

    #[test]
    fn settings_reject_out_of_range_threshold() {
        assert!(AnalysisSettings::default().validate().is_ok());
        assert!(AnalysisSettings { min_junction_cells: 2 }.validate().is_err());
        assert!(AnalysisSettings { min_junction_cells: 9 }.validate().is_err());
        assert!(AnalysisSettings { min_junction_cells: 4 }.validate().is_ok());
    }

    #[test]
    fn seed_angle_classifies_right_and_acute_angles() {
        let right = seed_angle(Vec3::X, Vec3::Y, Vec3::ZERO).unwrap();
        assert!((right - FRAC_PI_2).abs() < 1e-6);
        let acute = seed_angle(Vec3::X, Vec3::new(1.0, 1.0, 0.0), Vec3::ZERO).unwrap();
        assert!(acute < FRAC_PI_2);
        let straight = seed_angle(Vec3::X, -Vec3::X, Vec3::ZERO).unwrap();
        assert!((straight - std::f32::consts::PI).abs() < 1e-5);
    }

    #[test]
    fn seed_angle_skips_zero_length_vectors() {
        assert_eq!(seed_angle(Vec3::ZERO, Vec3::X, Vec3::ZERO), None);
        assert_eq!(seed_angle(Vec3::X, Vec3::X, Vec3::X), None);
    }

    #[test]
    fn single_cell_centroid_is_grid_center() {
        let generators = [Generator::new(Vec3::new(0.7, -0.2, 0.4))];
        let grid = voxelize(8, &generators);
        let report = AnalysisEngine::default().run(&grid, &generators);
        assert_eq!(report.voxel_counts, vec![512]);
        assert!(report.centroids[0].length() < 1e-5);
        assert!(report.junctions.is_empty());
        assert_eq!(report.acute_counts, vec![0]);
    }

    #[test]
    fn cell_without_voxels_falls_back_to_position() {
        let outside = Vec3::new(3.0, 0.0, 0.0);
        let generators = [Generator::new(Vec3::ZERO), Generator::new(outside)];
        let grid = voxelize(8, &generators);
        let report = AnalysisEngine::default().run(&grid, &generators);
        assert_eq!(report.voxel_counts[1], 0);
        assert_eq!(report.centroids[1], outside);
        assert_eq!(report.acute_counts[1], 0);
    }

    #[test]
    fn two_cells_have_no_junctions() {
        let generators = [
            Generator::new(Vec3::new(-0.5, 0.0, 0.0)),
            Generator::new(Vec3::new(0.5, 0.0, 0.0)),
        ];
        let grid = voxelize(8, &generators);
        let report = AnalysisEngine::default().run(&grid, &generators);
        assert!(report.junctions.is_empty());
        assert_eq!(report.acute_counts, vec![0, 0]);
        assert!(report.centroids[0].x < 0.0);
        assert!(report.centroids[1].x > 0.0);
    }

    #[test]
    fn tetrahedral_corners_meet_at_the_center() {
        let generators = tetrahedron();
        let grid = voxelize(4, &generators);
        let report = AnalysisEngine::default().run(&grid, &generators);

        let center = report
            .junctions
            .iter()
            .find(|j| j.position.length() < 1e-5)
            .expect("junction at the cube center");
        assert_eq!(center.cell_ids, vec![0, 1, 2, 3]);
    }

    #[test]
    fn stricter_threshold_finds_fewer_junctions() {
        let store = SeedStore::random(16, 0.9, Some(11));
        let grid = voxelize(16, store.generators());
        let loose = AnalysisEngine::new(AnalysisSettings { min_junction_cells: 3 })
            .find_junctions(&grid, store.len());
        let strict = AnalysisEngine::new(AnalysisSettings { min_junction_cells: 4 })
            .find_junctions(&grid, store.len());
        assert!(!loose.is_empty());
        assert!(strict.len() <= loose.len());
        assert!(strict.iter().all(|j| j.cell_ids.len() >= 4));
    }

    #[test]
    fn acute_counts_are_applied_to_both_sides_of_a_pair() {
        let store = SeedStore::random(16, 0.9, Some(5));
        let generators = store.generators();
        let grid = voxelize(16, generators);
        let report = AnalysisEngine::default().run(&grid, generators);

        let total: u64 = report.acute_counts.iter().map(|&c| c as u64).sum();
        assert_eq!(total, 2 * report.acute_pairs);

        let mut expected = vec![0u32; generators.len()];
        for junction in &report.junctions {
            for (i, &a) in junction.cell_ids.iter().enumerate() {
                for &b in &junction.cell_ids[i + 1..] {
                    let angle = seed_angle(
                        generators[a as usize].position,
                        generators[b as usize].position,
                        junction.position,
                    );
                    if matches!(angle, Some(angle) if angle < FRAC_PI_2) {
                        expected[a as usize] += 1;
                        expected[b as usize] += 1;
                    }
                }
            }
        }
        assert_eq!(report.acute_counts, expected);
    }

    #[test]
    fn centroid_lies_within_owned_voxels() {
        let store = SeedStore::random(10, 0.9, Some(23));
        let generators = store.generators();
        let grid = voxelize(16, generators);
        let volume = grid.volume();
        let report = AnalysisEngine::default().run(&grid, generators);

        for (id, centroid) in report.centroids.iter().enumerate() {
            if report.voxel_counts[id] == 0 {
                continue;
            }
            let mut min = Vec3::splat(f32::INFINITY);
            let mut max = Vec3::splat(f32::NEG_INFINITY);
            for (index, &owner) in grid.cells().iter().enumerate() {
                if owner as usize == id {
                    let world = volume.voxel_to_world(volume.coord(index));
                    min = min.min(world);
                    max = max.max(world);
                }
            }
            let eps = Vec3::splat(1e-4);
            assert!(centroid.cmpge(min - eps).all() && centroid.cmple(max + eps).all());
        }
    }

    #[test]
    fn corrupted_ids_are_skipped() {
        let generators = [Generator::new(Vec3::ZERO), Generator::new(Vec3::X * 0.5)];
        let mut grid = VoxelGrid::new(VolumeGrid::new(4).unwrap());
        grid.cells_mut().fill(0);
        grid.cells_mut()[0] = 1;
        grid.cells_mut()[1] = 7;
        grid.cells_mut()[2] = 9;

        let report = AnalysisEngine::default().run(&grid, &generators);
        assert_eq!(report.corrupted_voxels, 2);
        assert_eq!(report.voxel_counts, vec![61, 1]);
        assert!(report.junctions.is_empty());
    }

    #[test]
    fn analysis_of_identical_inputs_is_identical() {
        let store = SeedStore::random(12, 0.9, Some(8));
        let grid = voxelize(12, store.generators());
        let engine = AnalysisEngine::default();
        let a = engine.run(&grid, store.generators());
        let b = engine.run(&grid, store.generators());
        assert_eq!(a.acute_counts, b.acute_counts);
        assert_eq!(a.voxel_counts, b.voxel_counts);
        assert_eq!(a.junctions, b.junctions);
    }
}
