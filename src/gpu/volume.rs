//! Storage buffers holding the published voxel grid and generators
//!
//! The simulation itself runs on the CPU. After each frame the caller
//! uploads the published state here, and an external ray-marching renderer
//! binds [`VolumeBuffers::bind_group`] with the layout from
//! [`VolumeBuffers::bind_group_layout`].

use std::sync::Arc;

use wgpu::util::DeviceExt;

use super::GpuError;
use super::types::{GpuGenerator, VolumeUniforms};
use crate::grid::VoxelGrid;
use crate::pipeline::GeneratorSnapshot;

/// Smallest buffer wgpu accepts for an empty storage binding
const MIN_BUFFER_SIZE: u64 = 16;

/// GPU copies of one simulation's published state
pub struct VolumeBuffers {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,

    uniform_buffer: wgpu::Buffer,
    voxel_buffer: wgpu::Buffer,
    generator_buffer: wgpu::Buffer,
    // Readback copy of the voxel buffer
    staging_buffer: wgpu::Buffer,

    bind_group_layout: wgpu::BindGroupLayout,
    bind_group: wgpu::BindGroup,

    uniforms: VolumeUniforms,
}

impl VolumeBuffers {
    /// Upload onto a newly created high-performance device
    pub fn new(grid: &VoxelGrid, generators: &[GeneratorSnapshot]) -> Result<Self, GpuError> {
        let (device, queue) = pollster::block_on(create_device())?;
        Ok(Self::with_device(
            Arc::new(device),
            Arc::new(queue),
            grid,
            generators,
        ))
    }

    /// Upload using an existing device and queue, e.g. the renderer's
    pub fn with_device(
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        grid: &VoxelGrid,
        generators: &[GeneratorSnapshot],
    ) -> Self {
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Volume Bind Group Layout"),
            entries: &[
                layout_entry(0, wgpu::BufferBindingType::Uniform),
                layout_entry(1, wgpu::BufferBindingType::Storage { read_only: true }),
                layout_entry(2, wgpu::BufferBindingType::Storage { read_only: true }),
            ],
        });

        let uniforms = VolumeUniforms::new(grid.volume(), generators.len() as u32);
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Volume Uniforms"),
            contents: bytemuck::bytes_of(&uniforms),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let voxel_buffer = storage_buffer(&device, "Voxel Buffer", grid.as_bytes());
        let gpu_generators: Vec<GpuGenerator> = generators.iter().map(GpuGenerator::from).collect();
        let generator_buffer = storage_buffer(
            &device,
            "Generator Buffer",
            bytemuck::cast_slice(&gpu_generators),
        );
        let staging_buffer = staging_buffer(&device, voxel_buffer.size());

        let bind_group = create_bind_group(
            &device,
            &bind_group_layout,
            &uniform_buffer,
            &voxel_buffer,
            &generator_buffer,
        );

        Self {
            device,
            queue,
            uniform_buffer,
            voxel_buffer,
            generator_buffer,
            staging_buffer,
            bind_group_layout,
            bind_group,
            uniforms,
        }
    }

    /// Upload a newer frame, reallocating when the grid or generator count changed
    pub fn update(&mut self, grid: &VoxelGrid, generators: &[GeneratorSnapshot]) {
        let uniforms = VolumeUniforms::new(grid.volume(), generators.len() as u32);
        let gpu_generators: Vec<GpuGenerator> = generators.iter().map(GpuGenerator::from).collect();
        let generator_bytes: &[u8] = bytemuck::cast_slice(&gpu_generators);

        if uniforms.resolution != self.uniforms.resolution
            || uniforms.generator_count != self.uniforms.generator_count
        {
            self.voxel_buffer = storage_buffer(&self.device, "Voxel Buffer", grid.as_bytes());
            self.generator_buffer =
                storage_buffer(&self.device, "Generator Buffer", generator_bytes);
            self.staging_buffer = staging_buffer(&self.device, self.voxel_buffer.size());
            self.bind_group = create_bind_group(
                &self.device,
                &self.bind_group_layout,
                &self.uniform_buffer,
                &self.voxel_buffer,
                &self.generator_buffer,
            );
            tracing::debug!(
                resolution = uniforms.resolution,
                generators = uniforms.generator_count,
                "volume buffers reallocated"
            );
        } else {
            self.queue.write_buffer(&self.voxel_buffer, 0, grid.as_bytes());
            if !generator_bytes.is_empty() {
                self.queue.write_buffer(&self.generator_buffer, 0, generator_bytes);
            }
        }

        self.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));
        self.uniforms = uniforms;
    }

    /// Read the voxel buffer back from the GPU
    pub fn read_voxels(&self) -> Result<Vec<u32>, GpuError> {
        let voxel_count = (self.uniforms.resolution as usize).pow(3);
        let byte_len = (voxel_count * std::mem::size_of::<u32>()) as u64;
        if byte_len == 0 {
            return Ok(Vec::new());
        }

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Read Voxels Encoder"),
            });
        encoder.copy_buffer_to_buffer(&self.voxel_buffer, 0, &self.staging_buffer, 0, byte_len);
        self.queue.submit(std::iter::once(encoder.finish()));

        let buffer_slice = self.staging_buffer.slice(..byte_len);
        let (tx, rx) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = self.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|e| GpuError::Readback(e.to_string()))?
            .map_err(|e| GpuError::Readback(e.to_string()))?;

        let data = buffer_slice.get_mapped_range();
        let voxels: Vec<u32> = bytemuck::cast_slice(&data).to_vec();
        drop(data);
        self.staging_buffer.unmap();

        Ok(voxels)
    }

    pub fn uniforms(&self) -> VolumeUniforms {
        self.uniforms
    }

    pub fn bind_group_layout(&self) -> &wgpu::BindGroupLayout {
        &self.bind_group_layout
    }

    pub fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }

    pub fn voxel_buffer(&self) -> &wgpu::Buffer {
        &self.voxel_buffer
    }

    pub fn generator_buffer(&self) -> &wgpu::Buffer {
        &self.generator_buffer
    }
}

/// Request a high-performance adapter and a default device
pub async fn create_device() -> Result<(wgpu::Device, wgpu::Queue), GpuError> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    });

    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        })
        .await
        .ok_or(GpuError::NoAdapter)?;

    adapter
        .request_device(
            &wgpu::DeviceDescriptor {
                label: Some("Volume Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::default(),
            },
            None, // trace path
        )
        .await
        .map_err(|e| GpuError::Device(e.to_string()))
}

fn layout_entry(binding: u32, ty: wgpu::BufferBindingType) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE | wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn storage_buffer(device: &wgpu::Device, label: &str, contents: &[u8]) -> wgpu::Buffer {
    let usage =
        wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::COPY_SRC;
    if contents.is_empty() {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: MIN_BUFFER_SIZE,
            usage,
            mapped_at_creation: false,
        })
    } else {
        device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents,
            usage,
        })
    }
}

fn staging_buffer(device: &wgpu::Device, size: u64) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Voxel Staging Buffer"),
        size,
        usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn create_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    uniforms: &wgpu::Buffer,
    voxels: &wgpu::Buffer,
    generators: &wgpu::Buffer,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Volume Bind Group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: uniforms.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: voxels.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: generators.as_entire_binding(),
            },
        ],
    })
}
