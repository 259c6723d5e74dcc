//! WGSL declarations for volume renderers
//!
//! A ray-marching renderer prepends [`volume_declarations`] to its own
//! shader source to read the buffers bound by
//! [`VolumeBuffers`](super::VolumeBuffers).

/// Structs matching [`GpuGenerator`](super::GpuGenerator) and
/// [`VolumeUniforms`](super::VolumeUniforms)
pub const VOLUME_STRUCTS: &str = r#"
struct Generator {
    position: vec3<f32>,
    acute_count: u32,
    centroid: vec3<f32>,
    voxel_count: u32,
}

struct VolumeUniforms {
    resolution: u32,
    generator_count: u32,
    voxel_width: f32,
    _padding: u32,
}
"#;

/// Bindings in the layout created by `VolumeBuffers`
pub const VOLUME_BINDINGS: &str = r#"
@group(0) @binding(0) var<uniform> volume: VolumeUniforms;
@group(0) @binding(1) var<storage, read> voxels: array<u32>;
@group(0) @binding(2) var<storage, read> generators: array<Generator>;
"#;

/// Lookup helpers; `UNASSIGNED` matches the CPU sentinel
pub const VOLUME_HELPERS: &str = r#"
const UNASSIGNED: u32 = 0xffffffffu;

fn voxel_index(coord: vec3<u32>) -> u32 {
    let n = volume.resolution;
    return coord.x + n * (coord.y + n * coord.z);
}

fn world_to_voxel(world: vec3<f32>) -> vec3<u32> {
    let max_coord = f32(volume.resolution - 1u);
    let scaled = round((world + vec3<f32>(1.0)) * 0.5 * max_coord);
    let c = clamp(scaled, vec3<f32>(0.0), vec3<f32>(max_coord));
    return vec3<u32>(c);
}

fn cell_at(world: vec3<f32>) -> u32 {
    return voxels[voxel_index(world_to_voxel(world))];
}
"#;

/// Structs, bindings and helpers in one string
pub fn volume_declarations() -> String {
    format!("{VOLUME_STRUCTS}{VOLUME_BINDINGS}{VOLUME_HELPERS}")
}
