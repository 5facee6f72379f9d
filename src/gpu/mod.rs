//! GPU re-skinning backend (feature-gated).
//!
//! Only available when compiled with `--features gpu`.
//!
//! - `context` - wgpu device/queue initialization
//! - `buffers` - buffer creation and readback
//! - `types` - Pod layouts shared with the kernels
//! - `shaders` - WGSL kernels
//! - `reskin` - the [`GpuReskinner`] backend

mod buffers;
mod context;
mod reskin;
mod shaders;
mod types;

use thiserror::Error;

pub use buffers::{create_buffer, create_buffer_init, read_buffer, read_buffer_blocking};
pub use context::GpuContext;
pub use reskin::{GpuReskinner, GPU_TIMING_ENV};
pub use types::{BindingGPU, FaceFrameGPU, ParamsGPU};

#[derive(Debug, Error)]
pub enum GpuError {
    #[error("no suitable GPU adapter found")]
    NoAdapter,

    #[error("failed to create device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),

    #[error("buffer mapping failed: {0}")]
    BufferMap(#[from] wgpu::BufferAsyncError),

    #[error("readback channel closed before the buffer was mapped")]
    ReadbackChannelClosed,

    #[error("{label} buffer needs {size} bytes, device limit is {max}")]
    BufferTooLarge {
        label: &'static str,
        size: u64,
        max: u64,
    },

    #[error("workgroup size {size} exceeds device limit {max}")]
    WorkgroupTooLarge { size: u32, max: u32 },

    #[error("{label} pass needs {workgroups} workgroups, device limit is {max}")]
    DispatchTooLarge {
        label: &'static str,
        workgroups: u64,
        max: u32,
    },

    /// Validation or out-of-memory error captured from the device.
    #[error("{stage} failed on the device: {message}")]
    Device { stage: &'static str, message: String },
}
