//! # gsavatar-rs: Gaussian-splat avatars on a deforming body mesh
//!
//! Each splat of a trained avatar is bound to one triangle of an SMPL-X body
//! mesh. Every frame, an external skinning system supplies the deformed
//! vertex positions and this crate re-skins the splats: it builds a local
//! frame per triangle, carries each splat's face-local position, rotation
//! and scale into world space, and packs the result into the buffers a
//! splat renderer consumes.
//!
//! ## Architecture
//!
//! - `core`: mesh topology, face frames, splat bindings, propagation (CPU)
//! - `pack`: renderer buffer layouts and 10.10.10.2 rotation packing
//! - `io`: trainer state dict, pose sequences, text meshes, texture export
//! - `avatar`: per-frame driver, pose switching, render registry
//! - `config`: re-skinning parameters
//! - `gpu`: wgpu compute backend (feature-gated)
//!
//! ## Per-frame flow
//!
//! ```text
//! MeshSource → vertices → face frames → propagated splats → buffers
//! ```

// Core data structures and math
pub mod core;

// Re-skinning parameters
pub mod config;

// Renderer buffer layouts
pub mod pack;

// I/O operations (state dict, poses, meshes)
pub mod io;

// Runtime driving and render bookkeeping
pub mod avatar;

// GPU acceleration (optional)
#[cfg(feature = "gpu")]
pub mod gpu;

// Re-export commonly used types at crate root for convenience
pub use avatar::{AvatarDriver, CpuReskinner, ReskinBackend};
pub use config::ReskinConfig;
pub use core::{FaceFrame, MeshTopology, PropagatedSplat, SplatBinding, SplatBindingTable};
pub use io::{AvatarAsset, ImportError};
pub use pack::SplatAttributeBuffers;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
