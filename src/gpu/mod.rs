//! GPU upload of the published simulation state
//!
//! Enabled by the `gpu` feature. The voxel grid and the generator snapshot
//! are copied into wgpu storage buffers after each frame so a ray-marching
//! renderer can draw the cells; the WGSL declarations in [`shaders`] describe
//! the buffer layout.
//!
//! ```rust,ignore
//! use voxcell::Simulation;
//! use voxcell::gpu::VolumeBuffers;
//!
//! let mut sim = Simulation::initialize(64, 32, &[], None)?;
//! let mut buffers = VolumeBuffers::new(sim.voxel_grid(), &sim.generator_snapshot())?;
//!
//! sim.step_frame(0.016, &Default::default())?;
//! buffers.update(sim.voxel_grid(), &sim.generator_snapshot());
//! ```

pub mod shaders;
mod types;
mod volume;

use thiserror::Error;

pub use shaders::volume_declarations;
pub use types::{GpuGenerator, VolumeUniforms};
pub use volume::{VolumeBuffers, create_device};

/// Errors from device creation and buffer readback
#[derive(Error, Debug)]
pub enum GpuError {
    /// No adapter matched the request
    #[error("no suitable GPU adapter found")]
    NoAdapter,

    /// The adapter refused to create a device
    #[error("failed to create device: {0}")]
    Device(String),

    /// Mapping the staging buffer failed
    #[error("buffer readback failed: {0}")]
    Readback(String),
}
