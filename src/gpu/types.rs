//! GPU buffer types for volume rendering
//!
//! These types are uploaded directly to storage and uniform buffers.
//! All are repr(C) and match the WGSL structs in [`super::shaders`].

use bytemuck::{Pod, Zeroable};

use crate::grid::VolumeGrid;
use crate::pipeline::GeneratorSnapshot;

/// One generator as seen by the renderer
///
/// Layout matches the WGSL `Generator` struct.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuGenerator {
    pub position: [f32; 3],
    /// Acute junction angles this cell takes part in; drives the color legend
    pub acute_count: u32,
    pub centroid: [f32; 3],
    pub voxel_count: u32,
}

impl From<&GeneratorSnapshot> for GpuGenerator {
    fn from(snapshot: &GeneratorSnapshot) -> Self {
        Self {
            position: snapshot.position.to_array(),
            acute_count: snapshot.acute_count,
            centroid: snapshot.centroid.to_array(),
            voxel_count: snapshot.voxel_count,
        }
    }
}

/// Volume description shared by every volume shader
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct VolumeUniforms {
    /// Voxels per axis
    pub resolution: u32,
    pub generator_count: u32,
    /// World-space distance between neighbouring voxel centers
    pub voxel_width: f32,
    /// Padding for 16-byte alignment
    pub _padding: u32,
}

impl VolumeUniforms {
    pub fn new(volume: VolumeGrid, generator_count: u32) -> Self {
        Self {
            resolution: volume.size(),
            generator_count,
            voxel_width: volume.voxel_width(),
            _padding: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_gpu_generator_size() {
        // vec3 + u32 + vec3 + u32 = 32 bytes, matching WGSL vec3 alignment
        assert_eq!(std::mem::size_of::<GpuGenerator>(), 32);
    }

    #[test]
    fn test_uniforms_size() {
        let size = std::mem::size_of::<VolumeUniforms>();
        assert_eq!(size % 16, 0, "Uniforms size {} is not 16-byte aligned", size);
    }

    #[test]
    fn test_generator_from_snapshot() {
        let snapshot = GeneratorSnapshot {
            position: Vec3::new(0.1, 0.2, 0.3),
            centroid: Vec3::new(-0.1, 0.0, 0.5),
            acute_count: 7,
            voxel_count: 40,
        };
        let gpu = GpuGenerator::from(&snapshot);
        assert_eq!(gpu.position, [0.1, 0.2, 0.3]);
        assert_eq!(gpu.centroid, [-0.1, 0.0, 0.5]);
        assert_eq!(gpu.acute_count, 7);
        assert_eq!(gpu.voxel_count, 40);
    }

    #[test]
    fn test_uniforms_from_volume() {
        let volume = VolumeGrid::new(5).unwrap();
        let uniforms = VolumeUniforms::new(volume, 3);
        assert_eq!(uniforms.resolution, 5);
        assert_eq!(uniforms.generator_count, 3);
        assert_eq!(uniforms.voxel_width, 0.5);
    }
}
