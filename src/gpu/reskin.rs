//! wgpu re-skinning backend.
//!
//! All per-avatar buffers are created once. Each frame uploads the vertex
//! buffer with `queue.write_buffer` and records two compute passes in one
//! encoder, so the propagation pass sees the complete face-frame output.
//! The position and other-data buffers stay on the GPU; readback exists for
//! tests and tools.
//!
//! Set `GSAVATAR_GPU_TIMING=1` to log per-frame timings.

use crate::avatar::{FrameStats, ReskinBackend, ReskinError};
use crate::config::ReskinConfig;
use crate::core::{FaceFrame, SplatBindingTable};
use crate::gpu::types::{BindingGPU, FaceFrameGPU, ParamsGPU};
use crate::gpu::{buffers, context::GpuContext, shaders, GpuError};
use crate::pack::{OtherData, OTHER_DATA_STRIDE, POSITION_STRIDE};
use nalgebra::Vector3;
use wgpu::{BindGroup, Buffer, BufferUsages, ComputePipeline};

/// Environment variable enabling per-frame timing logs.
pub const GPU_TIMING_ENV: &str = "GSAVATAR_GPU_TIMING";

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

/// Reject configurations the device would only report as uncaptured errors:
/// oversized buffers, workgroups and dispatches.
fn check_limits(
    limits: &wgpu::Limits,
    workgroup_size: u32,
    vertex_count: usize,
    triangle_count: usize,
    splat_count: usize,
) -> Result<(), GpuError> {
    let max_buffer = u64::from(limits.max_storage_buffer_binding_size).min(limits.max_buffer_size);
    for (label, size) in [
        ("vertices", (vertex_count * 3 * std::mem::size_of::<f32>()) as u64),
        ("positions", (splat_count * POSITION_STRIDE) as u64),
        ("other data", (splat_count * OTHER_DATA_STRIDE) as u64),
        ("bindings", (splat_count * std::mem::size_of::<BindingGPU>()) as u64),
        ("face frames", (triangle_count * std::mem::size_of::<FaceFrameGPU>()) as u64),
    ] {
        if size > max_buffer {
            return Err(GpuError::BufferTooLarge {
                label,
                size,
                max: max_buffer,
            });
        }
    }

    let max_invocations = limits
        .max_compute_invocations_per_workgroup
        .min(limits.max_compute_workgroup_size_x);
    if workgroup_size > max_invocations {
        return Err(GpuError::WorkgroupTooLarge {
            size: workgroup_size,
            max: max_invocations,
        });
    }

    let max_groups = limits.max_compute_workgroups_per_dimension;
    for (label, count) in [("face frame", triangle_count), ("propagate", splat_count)] {
        let workgroups = (count as u64).div_ceil(u64::from(workgroup_size));
        if workgroups > u64::from(max_groups) {
            return Err(GpuError::DispatchTooLarge {
                label,
                workgroups,
                max: max_groups,
            });
        }
    }
    Ok(())
}

pub struct GpuReskinner {
    ctx: GpuContext,
    face_pipeline: ComputePipeline,
    propagate_pipeline: ComputePipeline,
    bind_group: BindGroup,
    vertex_buffer: Buffer,
    frame_buffer: Buffer,
    position_buffer: Buffer,
    other_buffer: Buffer,
    required_vertices: usize,
    vertex_capacity: usize,
    triangle_count: usize,
    splat_count: usize,
    workgroup_size: u32,
    frame_index: u64,
}

impl GpuReskinner {
    /// Create a backend on a fresh device.
    pub fn new(table: &SplatBindingTable, config: &ReskinConfig) -> Result<Self, GpuError> {
        let ctx = GpuContext::new_blocking()?;
        Self::with_context(ctx, table, config)
    }

    /// Create a backend on an existing device.
    ///
    /// The vertex buffer is sized for exactly the vertices the topology
    /// references; larger per-frame buffers upload only that prefix.
    pub fn with_context(
        ctx: GpuContext,
        table: &SplatBindingTable,
        config: &ReskinConfig,
    ) -> Result<Self, GpuError> {
        let topology = table.topology();
        let triangle_count = topology.len();
        let splat_count = table.len();
        let vertex_capacity = topology.required_vertex_count();

        check_limits(
            &ctx.device.limits(),
            config.workgroup_size,
            vertex_capacity,
            triangle_count,
            splat_count,
        )?;

        // Anything the checks above miss (allocation failure, shader
        // validation) is captured here instead of reaching the uncaptured
        // error handler.
        ctx.push_error_scopes();
        let device = &ctx.device;
        let shader = shaders::create_reskin_shader(device, config.workgroup_size);

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Reskin Bind Group Layout"),
            entries: &[
                // Params uniform
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                storage_entry(1, true),  // vertices
                storage_entry(2, true),  // faces
                storage_entry(3, false), // face frames
                storage_entry(4, true),  // bindings
                storage_entry(5, false), // positions
                storage_entry(6, false), // other data
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Reskin Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let face_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Face Frame Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: shaders::FACE_FRAME_ENTRY,
        });

        let propagate_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Propagate Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: shaders::PROPAGATE_ENTRY,
        });

        let params = ParamsGPU::new(triangle_count, splat_count, config);
        let params_buffer =
            buffers::create_buffer_init(device, "Params Buffer", &[params], BufferUsages::UNIFORM);

        let faces: Vec<u32> = topology.triangles().iter().flatten().copied().collect();
        let face_buffer =
            buffers::create_buffer_init(device, "Face Buffer", &faces, BufferUsages::STORAGE);

        let bindings_gpu: Vec<BindingGPU> =
            table.bindings().iter().map(BindingGPU::from_binding).collect();
        let binding_buffer =
            buffers::create_buffer_init(device, "Binding Buffer", &bindings_gpu, BufferUsages::STORAGE);

        let vertex_buffer = buffers::create_buffer(
            device,
            "Vertex Buffer",
            (vertex_capacity * 3 * std::mem::size_of::<f32>()) as u64,
            BufferUsages::STORAGE | BufferUsages::COPY_DST,
        );
        let frame_buffer = buffers::create_buffer(
            device,
            "Face Frame Buffer",
            (triangle_count * std::mem::size_of::<FaceFrameGPU>()) as u64,
            BufferUsages::STORAGE | BufferUsages::COPY_SRC,
        );
        let position_buffer = buffers::create_buffer(
            device,
            "Position Buffer",
            (splat_count * POSITION_STRIDE) as u64,
            BufferUsages::STORAGE | BufferUsages::COPY_SRC | BufferUsages::VERTEX,
        );
        let other_buffer = buffers::create_buffer(
            device,
            "Other Data Buffer",
            (splat_count * OTHER_DATA_STRIDE) as u64,
            BufferUsages::STORAGE | BufferUsages::COPY_SRC,
        );

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Reskin Bind Group"),
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: vertex_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: face_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: frame_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: binding_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: position_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 6,
                    resource: other_buffer.as_entire_binding(),
                },
            ],
        });

        ctx.pop_error_scopes("reskin setup")?;

        log::info!(
            "GPU reskinner ready: {splat_count} splats, {triangle_count} triangles, workgroup size {}",
            config.workgroup_size
        );

        Ok(Self {
            ctx,
            face_pipeline,
            propagate_pipeline,
            bind_group,
            vertex_buffer,
            frame_buffer,
            position_buffer,
            other_buffer,
            required_vertices: topology.required_vertex_count(),
            vertex_capacity,
            triangle_count,
            splat_count,
            workgroup_size: config.workgroup_size,
            frame_index: 0,
        })
    }

    fn workgroups(&self, count: usize) -> u32 {
        (count as u32).div_ceil(self.workgroup_size)
    }

    /// Position buffer, `[f32; 3]` per splat, for binding in a render pass.
    pub fn position_buffer(&self) -> &Buffer {
        &self.position_buffer
    }

    /// Other-data buffer, [`OtherData`] per splat.
    pub fn other_data_buffer(&self) -> &Buffer {
        &self.other_buffer
    }

    pub fn context(&self) -> &GpuContext {
        &self.ctx
    }

    pub fn read_positions(&self) -> Result<Vec<[f32; 3]>, GpuError> {
        let flat: Vec<f32> = buffers::read_buffer_blocking(
            &self.ctx.device,
            &self.ctx.queue,
            &self.position_buffer,
            self.splat_count * 3,
        )?;
        Ok(flat.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect())
    }

    pub fn read_other_data(&self) -> Result<Vec<OtherData>, GpuError> {
        buffers::read_buffer_blocking(
            &self.ctx.device,
            &self.ctx.queue,
            &self.other_buffer,
            self.splat_count,
        )
    }

    pub fn read_face_frames(&self) -> Result<Vec<FaceFrame>, GpuError> {
        let frames: Vec<FaceFrameGPU> = buffers::read_buffer_blocking(
            &self.ctx.device,
            &self.ctx.queue,
            &self.frame_buffer,
            self.triangle_count,
        )?;
        Ok(frames.iter().map(FaceFrameGPU::to_face_frame).collect())
    }
}

impl ReskinBackend for GpuReskinner {
    fn reskin(&mut self, vertices: &[Vector3<f32>]) -> Result<FrameStats, ReskinError> {
        if vertices.len() < self.required_vertices {
            return Err(crate::core::FrameError::TooFewVertices {
                required: self.required_vertices,
                actual: vertices.len(),
            }
            .into());
        }

        let enable_timing = std::env::var(GPU_TIMING_ENV).is_ok();
        let t_start = enable_timing.then(std::time::Instant::now);

        let flat: Vec<f32> = vertices[..self.vertex_capacity]
            .iter()
            .flat_map(|v| [v.x, v.y, v.z])
            .collect();
        self.ctx.push_error_scopes();
        self.ctx
            .queue
            .write_buffer(&self.vertex_buffer, 0, bytemuck::cast_slice(&flat));

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Reskin Encoder"),
            });

        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Face Frame Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.face_pipeline);
            pass.set_bind_group(0, &self.bind_group, &[]);
            pass.dispatch_workgroups(self.workgroups(self.triangle_count), 1, 1);
        }

        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Propagate Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.propagate_pipeline);
            pass.set_bind_group(0, &self.bind_group, &[]);
            pass.dispatch_workgroups(self.workgroups(self.splat_count), 1, 1);
        }

        self.ctx.queue.submit(Some(encoder.finish()));
        self.ctx.pop_error_scopes("reskin frame")?;

        if let Some(t) = t_start {
            self.ctx.device.poll(wgpu::Maintain::Wait);
            log::info!("[GPU] Reskin frame {}: {:?}", self.frame_index + 1, t.elapsed());
        }

        self.frame_index += 1;
        Ok(FrameStats {
            frame_index: self.frame_index,
            splats: self.splat_count,
            clamped_faces: None,
        })
    }

    fn frame_index(&self) -> u64 {
        self.frame_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits_accept_typical_avatar() {
        let limits = wgpu::Limits::default();
        assert!(check_limits(&limits, 256, 10_475, 20_908, 200_000).is_ok());
    }

    #[test]
    fn test_workgroup_over_invocation_limit_rejected() {
        let limits = wgpu::Limits::default();
        let err = check_limits(&limits, 1024, 3, 1, 1).unwrap_err();
        assert!(matches!(err, GpuError::WorkgroupTooLarge { size: 1024, max: 256 }));
    }

    #[test]
    fn test_dispatch_over_dimension_limit_rejected() {
        let limits = wgpu::Limits {
            max_compute_workgroups_per_dimension: 4,
            ..wgpu::Limits::default()
        };
        // 5 workgroups of 2 splats each
        let err = check_limits(&limits, 2, 3, 1, 10).unwrap_err();
        assert!(matches!(
            err,
            GpuError::DispatchTooLarge { label: "propagate", workgroups: 5, max: 4 }
        ));
    }

    #[test]
    fn test_oversized_vertex_buffer_rejected() {
        let limits = wgpu::Limits {
            max_storage_buffer_binding_size: 1024,
            ..wgpu::Limits::default()
        };
        // 100 vertices * 12 bytes
        let err = check_limits(&limits, 64, 100, 1, 1).unwrap_err();
        assert!(matches!(
            err,
            GpuError::BufferTooLarge { label: "vertices", size: 1200, max: 1024 }
        ));
    }
}
