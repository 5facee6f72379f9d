//! Core data structures and the CPU re-skinning math.
//!
//! This module contains the fundamental types used throughout the system:
//! - `MeshTopology` / `MeshSource`: the deforming body mesh
//! - `FaceFrame`: per-triangle local frames
//! - `SplatBindingTable`: splats attached to faces
//! - `PropagatedSplat`: world-space splats for the current frame
//!
//! All types here are "pure data" - no I/O, no GPU.

mod binding;
mod camera;
mod face_frame;
pub mod math;
mod mesh;
mod propagate;

pub use binding::{BindingArrays, BindingError, SplatBinding, SplatBindingTable};
pub use camera::{Camera, CameraKind};
pub use face_frame::{build_face_frames, build_face_frames_into, FaceFrame};
pub use math::{inverse_sigmoid, rotation_matrix_to_quaternion, sigmoid, AxisConvention, ScaleActivation};
pub use mesh::{BakedFrameQueue, FrameError, MeshSource, MeshTopology, StaticMesh, Triangle, TopologyError};
pub use propagate::{propagate_splat, propagate_splats, propagate_splats_into, PropagatedSplat};
