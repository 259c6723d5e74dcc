//! Jump Flooding Algorithm voxelization
//!
//! Assigns every voxel the id of its nearest generator under the additive
//! weighted distance `|voxel - seed| - weight`.
//!
//! 1. **Seed pass**: each generator writes its id into the voxel it
//!    quantizes to.
//! 2. **Flood passes**: for step sizes `next_power_of_two(size) / 2` down
//!    to `1`, every voxel compares its current owner with the owners of the
//!    26 voxels at offsets `{-s, 0, +s}³` and keeps the closest.
//!
//! Passes ping-pong between two buffers owned by the engine; a voxel only
//! reads the previous pass, so the per-voxel work is order independent and
//! runs as a rayon parallel-for over z-slices.

use glam::{IVec3, UVec3, Vec3};
use rayon::prelude::*;

use crate::grid::{UNASSIGNED, VolumeGrid, VoxelGrid};
use crate::seeds::Generator;

/// The 26 neighbour directions, z-major then y then x
const NEIGHBOR_OFFSETS: [IVec3; 26] = neighbor_offsets();

const fn neighbor_offsets() -> [IVec3; 26] {
    let mut out = [IVec3::ZERO; 26];
    let mut n = 0;
    let mut dz = -1;
    while dz <= 1 {
        let mut dy = -1;
        while dy <= 1 {
            let mut dx = -1;
            while dx <= 1 {
                if !(dx == 0 && dy == 0 && dz == 0) {
                    out[n] = IVec3::new(dx, dy, dz);
                    n += 1;
                }
                dx += 1;
            }
            dy += 1;
        }
        dz += 1;
    }
    out
}

/// Additive weighted distance from a world point to a generator
#[inline]
pub fn weighted_distance(point: Vec3, generator: &Generator) -> f32 {
    point.distance(generator.position) - generator.weight
}

/// Flood step sizes for a grid of `size` voxels per axis
///
/// Starts at `next_power_of_two(size) / 2` and halves down to 1, giving
/// `⌈log2(size)⌉` passes.
pub fn step_schedule(size: u32) -> Vec<u32> {
    let mut steps = Vec::new();
    let mut step = size.next_power_of_two() / 2;
    while step >= 1 {
        steps.push(step);
        step /= 2;
    }
    steps
}

/// Jump flooding engine with reusable ping-pong buffers
#[derive(Debug, Default)]
pub struct JfaEngine {
    front: Vec<u32>,
    back: Vec<u32>,
    passes_run: u32,
}

impl JfaEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flood passes executed by the last [`JfaEngine::run`]
    pub fn passes_run(&self) -> u32 {
        self.passes_run
    }

    /// Recompute voxel ownership for `generators`, overwriting all of `out`
    ///
    /// With no generators the whole grid ends up [`UNASSIGNED`].
    pub fn run(&mut self, generators: &[Generator], out: &mut VoxelGrid) {
        let volume = out.volume();
        let total = volume.voxel_count();
        self.front.resize(total, UNASSIGNED);
        self.back.resize(total, UNASSIGNED);

        self.seed_pass(volume, generators);
        self.passes_run = 0;

        if !generators.is_empty() {
            for step in step_schedule(volume.size()) {
                self.flood_pass(volume, generators, step as i32);
                std::mem::swap(&mut self.front, &mut self.back);
                self.passes_run += 1;
            }
        }

        out.cells_mut().copy_from_slice(&self.front);
    }

    fn seed_pass(&mut self, volume: VolumeGrid, generators: &[Generator]) {
        self.front.fill(UNASSIGNED);
        let width = volume.voxel_width();

        for (id, generator) in generators.iter().enumerate() {
            if !generator.position.is_finite() {
                continue;
            }
            let coord = volume.quantize(generator.position);
            let center = volume.voxel_to_world(coord);
            if center.distance(generator.position) >= width {
                // Outside the domain: never seeds a voxel
                continue;
            }

            let index = volume.index(coord);
            let current = self.front[index];
            let replace = match generators.get(current as usize) {
                Some(existing) if current != UNASSIGNED => {
                    weighted_distance(center, generator) < weighted_distance(center, existing)
                }
                _ => true,
            };
            if replace {
                self.front[index] = id as u32;
            }
        }
    }

    fn flood_pass(&mut self, volume: VolumeGrid, generators: &[Generator], step: i32) {
        let size = volume.size() as usize;
        let slice_len = size * size;
        let src = &self.front;

        self.back
            .par_chunks_mut(slice_len)
            .enumerate()
            .for_each(|(z, slice)| {
                for y in 0..size {
                    for x in 0..size {
                        let coord = IVec3::new(x as i32, y as i32, z as i32);
                        slice[y * size + x] =
                            nearest_candidate(volume, src, generators, coord, step);
                    }
                }
            });
    }
}

/// Best owner for `coord` among its own id and the 26 ids at `±step`
///
/// Only a strictly smaller distance replaces the running best, so ties keep
/// the earlier candidate.
fn nearest_candidate(
    volume: VolumeGrid,
    src: &[u32],
    generators: &[Generator],
    coord: IVec3,
    step: i32,
) -> u32 {
    let here = volume.voxel_to_world(coord.as_uvec3());

    let mut best = src[volume.index(coord.as_uvec3())];
    let mut best_dist = match generators.get(best as usize) {
        Some(g) if best != UNASSIGNED => weighted_distance(here, g),
        _ => {
            best = UNASSIGNED;
            f32::INFINITY
        }
    };

    for offset in NEIGHBOR_OFFSETS {
        let neighbor = coord + offset * step;
        if !volume.in_bounds(neighbor) {
            continue;
        }
        let id = src[volume.index(neighbor.as_uvec3())];
        if id == UNASSIGNED || id == best {
            continue;
        }
        let Some(generator) = generators.get(id as usize) else {
            continue;
        };
        let dist = weighted_distance(here, generator);
        if dist < best_dist {
            best = id;
            best_dist = dist;
        }
    }

    best
}

/// Exact nearest generator for one voxel, by exhaustive search
///
/// O(N) per voxel; used to measure the flood approximation.
pub fn brute_force_owner(volume: VolumeGrid, generators: &[Generator], coord: UVec3) -> u32 {
    let here = volume.voxel_to_world(coord);
    let mut best = UNASSIGNED;
    let mut best_dist = f32::INFINITY;
    for (id, generator) in generators.iter().enumerate() {
        let dist = weighted_distance(here, generator);
        if dist < best_dist {
            best = id as u32;
            best_dist = dist;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seeds::SeedStore;

    fn run(size: u32, generators: &[Generator]) -> VoxelGrid {
        let mut grid = VoxelGrid::new(VolumeGrid::new(size).unwrap());
        JfaEngine::new().run(generators, &mut grid);
        grid
    }

    #[test]
    fn neighbor_offsets_are_unique_and_exclude_origin() {
        let mut seen = std::collections::HashSet::new();
        for offset in NEIGHBOR_OFFSETS {
            assert_ne!(offset, IVec3::ZERO);
            assert!(offset.abs().max_element() == 1);
            assert!(seen.insert(offset));
        }
        assert_eq!(seen.len(), 26);
    }

    #[test]
    fn step_schedule_halves_to_one() {
        assert_eq!(step_schedule(8), vec![4, 2, 1]);
        assert_eq!(step_schedule(64), vec![32, 16, 8, 4, 2, 1]);
        assert_eq!(step_schedule(2), vec![1]);
        // ⌈log2(6)⌉ = 3
        assert_eq!(step_schedule(6), vec![4, 2, 1]);
    }

    #[test]
    fn empty_generator_set_leaves_grid_unassigned() {
        let mut engine = JfaEngine::new();
        let mut grid = VoxelGrid::new(VolumeGrid::new(8).unwrap());
        grid.cells_mut().fill(3);
        engine.run(&[], &mut grid);
        assert_eq!(grid.unassigned_count(), grid.cells().len());
        assert_eq!(engine.passes_run(), 0);
    }

    #[test]
    fn single_generator_owns_every_voxel() {
        let grid = run(8, &[Generator::new(Vec3::new(0.3, -0.6, 0.1))]);
        assert!(grid.cells().iter().all(|&id| id == 0));
    }

    #[test]
    fn two_generators_split_along_the_bisector() {
        let generators = [
            Generator::new(Vec3::new(-0.5, 0.0, 0.0)),
            Generator::new(Vec3::new(0.5, 0.0, 0.0)),
        ];
        let grid = run(16, &generators);
        let volume = grid.volume();
        for (index, &id) in grid.cells().iter().enumerate() {
            let world = volume.voxel_to_world(volume.coord(index));
            if world.x < -0.01 {
                assert_eq!(id, 0, "voxel at {world} should belong to 0");
            } else if world.x > 0.01 {
                assert_eq!(id, 1, "voxel at {world} should belong to 1");
            }
        }
    }

    #[test]
    fn weight_enlarges_a_cell() {
        let plain = [
            Generator::new(Vec3::new(-0.5, 0.0, 0.0)),
            Generator::new(Vec3::new(0.5, 0.0, 0.0)),
        ];
        let weighted = [
            Generator::new(Vec3::new(-0.5, 0.0, 0.0)).with_weight(0.3),
            Generator::new(Vec3::new(0.5, 0.0, 0.0)),
        ];
        let count = |grid: &VoxelGrid| grid.cells().iter().filter(|&&id| id == 0).count();
        assert!(count(&run(16, &weighted)) > count(&run(16, &plain)));
    }

    #[test]
    fn flood_is_close_to_exact_voronoi() {
        let store = SeedStore::random(12, 0.9, Some(42));
        let generators = store.generators();
        let grid = run(16, generators);
        let volume = grid.volume();

        let mut wrong = 0;
        for (index, &id) in grid.cells().iter().enumerate() {
            let coord = volume.coord(index);
            let exact = brute_force_owner(volume, generators, coord);
            let here = volume.voxel_to_world(coord);
            let got = weighted_distance(here, &generators[id as usize]);
            let best = weighted_distance(here, &generators[exact as usize]);
            if got - best > 1e-5 {
                wrong += 1;
            }
        }
        let ratio = wrong as f32 / grid.cells().len() as f32;
        assert!(ratio < 0.05, "JFA error ratio too high: {ratio}");
    }

    #[test]
    fn rerunning_on_same_generators_is_idempotent() {
        let store = SeedStore::random(20, 0.9, Some(3));
        let mut engine = JfaEngine::new();
        let mut a = VoxelGrid::new(VolumeGrid::new(16).unwrap());
        let mut b = VoxelGrid::new(VolumeGrid::new(16).unwrap());
        engine.run(store.generators(), &mut a);
        engine.run(store.generators(), &mut b);
        assert_eq!(a, b);
    }

    #[test]
    fn coinciding_generators_keep_the_lower_index() {
        let generators = [
            Generator::new(Vec3::new(0.2, 0.2, 0.2)),
            Generator::new(Vec3::new(0.2, 0.2, 0.2)),
        ];
        let grid = run(8, &generators);
        assert!(grid.cells().iter().all(|&id| id == 0));
    }

    #[test]
    fn generator_outside_domain_never_seeds() {
        let generators = [
            Generator::new(Vec3::new(0.0, 0.0, 0.0)),
            Generator::new(Vec3::new(5.0, 0.0, 0.0)),
        ];
        let grid = run(8, &generators);
        assert!(grid.cells().iter().all(|&id| id == 0));
    }

    #[test]
    fn engine_adapts_to_a_new_resolution() {
        let generators = [Generator::new(Vec3::ZERO)];
        let mut engine = JfaEngine::new();
        let mut small = VoxelGrid::new(VolumeGrid::new(4).unwrap());
        let mut large = VoxelGrid::new(VolumeGrid::new(32).unwrap());
        engine.run(&generators, &mut small);
        engine.run(&generators, &mut large);
        assert_eq!(engine.passes_run(), 5);
        assert_eq!(large.unassigned_count(), 0);
    }
}
