//! Voxel coordinate system and the shared ownership grid
//!
//! Every stage maps between integer voxel coordinates `[0, size)³` and world
//! space `[-1, 1]³` through [`VolumeGrid`]. The mapping is
//! `c / (size - 1) * 2 - 1`, so voxel `0` sits at `-1` and voxel `size - 1`
//! at `+1`. JFA seeding, JFA distances, centroid decoding and junction
//! positions all use it.

use glam::{IVec3, UVec3, Vec3};

use crate::error::{SimError, SimResult};

/// Smallest supported resolution (the world mapping divides by `size - 1`)
pub const MIN_RESOLUTION: u32 = 2;

/// Largest supported resolution; keeps `size³` and per-cell voxel counts
/// inside `u32`
pub const MAX_RESOLUTION: u32 = 1024;

/// Sentinel cell id for voxels that no generator owns
pub const UNASSIGNED: u32 = u32::MAX;

/// Mapping between voxel coordinates and world space for a cubic grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeGrid {
    size: u32,
}

impl VolumeGrid {
    /// Create a grid with `size` voxels per axis
    pub fn new(size: u32) -> SimResult<Self> {
        if !(MIN_RESOLUTION..=MAX_RESOLUTION).contains(&size) {
            return Err(SimError::InvalidResolution(size));
        }
        Ok(Self { size })
    }

    /// Voxels per axis
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Total voxel count (`size³`)
    pub fn voxel_count(&self) -> usize {
        let s = self.size as usize;
        s * s * s
    }

    /// World-space width of one voxel step
    pub fn voxel_width(&self) -> f32 {
        2.0 / (self.size - 1) as f32
    }

    /// Map a (possibly fractional) voxel coordinate to world space
    #[inline]
    pub fn to_world(&self, coord: Vec3) -> Vec3 {
        coord / (self.size - 1) as f32 * 2.0 - Vec3::ONE
    }

    /// World position of an integer voxel coordinate
    #[inline]
    pub fn voxel_to_world(&self, coord: UVec3) -> Vec3 {
        self.to_world(coord.as_vec3())
    }

    /// Inverse of [`VolumeGrid::to_world`]
    #[inline]
    pub fn to_voxel(&self, world: Vec3) -> Vec3 {
        (world + Vec3::ONE) * 0.5 * (self.size - 1) as f32
    }

    /// Nearest voxel to a world position, clamped into the grid
    pub fn quantize(&self, world: Vec3) -> UVec3 {
        let max = (self.size - 1) as f32;
        self.to_voxel(world).round().clamp(Vec3::ZERO, Vec3::splat(max)).as_uvec3()
    }

    /// Whether a signed voxel coordinate lies inside the grid
    #[inline]
    pub fn in_bounds(&self, coord: IVec3) -> bool {
        let s = self.size as i32;
        coord.x >= 0 && coord.y >= 0 && coord.z >= 0 && coord.x < s && coord.y < s && coord.z < s
    }

    /// Linear index of a voxel (x fastest, then y, then z)
    #[inline]
    pub fn index(&self, coord: UVec3) -> usize {
        let s = self.size as usize;
        (coord.z as usize * s + coord.y as usize) * s + coord.x as usize
    }

    /// Voxel coordinate of a linear index
    #[inline]
    pub fn coord(&self, index: usize) -> UVec3 {
        let s = self.size as usize;
        UVec3::new(
            (index % s) as u32,
            ((index / s) % s) as u32,
            (index / (s * s)) as u32,
        )
    }
}

/// `size³` array of cell ids, one per voxel
///
/// A value in `[0, N)` names the owning generator; [`UNASSIGNED`] marks a
/// voxel no generator reached. Layout is x-fastest, matching
/// [`VolumeGrid::index`], which is also the layout a volume renderer reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoxelGrid {
    grid: VolumeGrid,
    cells: Vec<u32>,
}

impl VoxelGrid {
    /// Create a grid with every voxel unassigned
    pub fn new(grid: VolumeGrid) -> Self {
        Self {
            cells: vec![UNASSIGNED; grid.voxel_count()],
            grid,
        }
    }

    /// Coordinate mapping for this grid
    pub fn volume(&self) -> VolumeGrid {
        self.grid
    }

    /// Voxels per axis
    pub fn size(&self) -> u32 {
        self.grid.size()
    }

    /// Raw cell ids in linear order
    pub fn cells(&self) -> &[u32] {
        &self.cells
    }

    pub(crate) fn cells_mut(&mut self) -> &mut [u32] {
        &mut self.cells
    }

    /// Cell id at a voxel coordinate
    pub fn get(&self, coord: UVec3) -> u32 {
        self.cells[self.grid.index(coord)]
    }

    /// Mark every voxel unassigned
    pub fn clear(&mut self) {
        self.cells.fill(UNASSIGNED);
    }

    /// Number of voxels holding [`UNASSIGNED`]
    pub fn unassigned_count(&self) -> usize {
        self.cells.iter().filter(|&&id| id == UNASSIGNED).count()
    }

    /// Raw bytes for direct upload into a GPU buffer
    #[cfg(feature = "gpu")]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.cells)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_resolution_below_two() {
        assert!(matches!(
            VolumeGrid::new(0),
            Err(SimError::InvalidResolution(0))
        ));
        assert!(matches!(
            VolumeGrid::new(1),
            Err(SimError::InvalidResolution(1))
        ));
        assert!(VolumeGrid::new(2).is_ok());
    }

    #[test]
    fn rejects_resolution_above_maximum() {
        assert!(matches!(
            VolumeGrid::new(MAX_RESOLUTION + 1),
            Err(SimError::InvalidResolution(1025))
        ));
        assert!(matches!(
            VolumeGrid::new(3_000_000),
            Err(SimError::InvalidResolution(3_000_000))
        ));
        let largest = VolumeGrid::new(MAX_RESOLUTION).unwrap();
        assert_eq!(largest.voxel_count(), 1 << 30);
    }

    #[test]
    fn extreme_voxels_map_to_cube_faces() {
        let grid = VolumeGrid::new(8).unwrap();
        assert_eq!(grid.voxel_to_world(UVec3::ZERO), Vec3::splat(-1.0));
        assert_eq!(grid.voxel_to_world(UVec3::splat(7)), Vec3::splat(1.0));
    }

    #[test]
    fn to_voxel_inverts_to_world() {
        let grid = VolumeGrid::new(16).unwrap();
        let coord = Vec3::new(3.0, 7.5, 12.25);
        let back = grid.to_voxel(grid.to_world(coord));
        assert!((back - coord).length() < 1e-4);
    }

    #[test]
    fn quantize_rounds_and_clamps() {
        let grid = VolumeGrid::new(5).unwrap();
        assert_eq!(grid.quantize(Vec3::ZERO), UVec3::splat(2));
        assert_eq!(grid.quantize(Vec3::splat(5.0)), UVec3::splat(4));
        assert_eq!(grid.quantize(Vec3::splat(-3.0)), UVec3::ZERO);
    }

    #[test]
    fn index_and_coord_are_inverse() {
        let grid = VolumeGrid::new(6).unwrap();
        for index in [0, 1, 5, 6, 35, 36, 100, grid.voxel_count() - 1] {
            assert_eq!(grid.index(grid.coord(index)), index);
        }
        assert_eq!(grid.index(UVec3::new(1, 0, 0)), 1);
        assert_eq!(grid.index(UVec3::new(0, 1, 0)), 6);
        assert_eq!(grid.index(UVec3::new(0, 0, 1)), 36);
    }

    #[test]
    fn in_bounds_checks_every_axis() {
        let grid = VolumeGrid::new(4).unwrap();
        assert!(grid.in_bounds(IVec3::new(0, 3, 2)));
        assert!(!grid.in_bounds(IVec3::new(-1, 0, 0)));
        assert!(!grid.in_bounds(IVec3::new(0, 4, 0)));
        assert!(!grid.in_bounds(IVec3::new(0, 0, 4)));
    }

    #[test]
    fn new_voxel_grid_is_unassigned() {
        let grid = VoxelGrid::new(VolumeGrid::new(4).unwrap());
        assert_eq!(grid.cells().len(), 64);
        assert_eq!(grid.unassigned_count(), 64);
    }
}
