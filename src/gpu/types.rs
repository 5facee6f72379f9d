//! GPU-side data layouts.
//!
//! These types are uploaded directly to GPU buffers:
//! - Flat memory layout (no pointers)
//! - WGSL alignment rules (vec3 aligned to 16 bytes)
//! - bytemuck Pod + Zeroable traits
//!
//! Vertices, faces and the output position buffer are plain scalar arrays
//! (3 per element) so they match the CPU buffers byte for byte.

use crate::config::ReskinConfig;
use crate::core::{FaceFrame, SplatBinding};
use nalgebra::{UnitQuaternion, Vector3};

/// One face frame.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FaceFrameGPU {
    /// Origin (x, y, z) and scale in w
    pub origin_scale: [f32; 4],

    /// Rotation quaternion (x, y, z, w)
    pub rotation: [f32; 4],
}

impl FaceFrameGPU {
    pub fn to_face_frame(&self) -> FaceFrame {
        let [x, y, z, scale] = self.origin_scale;
        let [qx, qy, qz, qw] = self.rotation;
        FaceFrame {
            origin: Vector3::new(x, y, z),
            rotation: UnitQuaternion::from_quaternion(nalgebra::Quaternion::new(qw, qx, qy, qz)),
            scale,
        }
    }
}

/// One splat binding.
///
/// WGSL layout: `vec3<f32>` + `u32` share the first 16 bytes.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct BindingGPU {
    pub offset: [f32; 3],
    pub face_index: u32,

    /// Rotation quaternion (x, y, z, w)
    pub rotation: [f32; 4],

    /// Unactivated scale
    pub scale: [f32; 3],
    pub _pad: f32,
}

impl BindingGPU {
    pub fn from_binding(b: &SplatBinding) -> Self {
        let q = b.local_rotation;
        Self {
            offset: b.local_offset.into(),
            face_index: b.face_index,
            rotation: [q.i, q.j, q.k, q.w],
            scale: b.local_scale.into(),
            _pad: 0.0,
        }
    }
}

/// Uniform parameters shared by both kernels.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ParamsGPU {
    pub triangle_count: u32,
    pub splat_count: u32,
    pub max_scale: f32,
    pub degenerate_epsilon: f32,
    pub activation_min: f32,
    pub activation_max: f32,
    pub _pad: [u32; 2],
}

impl ParamsGPU {
    pub fn new(triangle_count: usize, splat_count: usize, config: &ReskinConfig) -> Self {
        Self {
            triangle_count: triangle_count as u32,
            splat_count: splat_count as u32,
            max_scale: config.max_scale,
            degenerate_epsilon: config.degenerate_epsilon,
            activation_min: config.scale_activation.min,
            activation_max: config.scale_activation.max,
            _pad: [0; 2],
        }
    }
}
