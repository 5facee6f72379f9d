//! I/O operations for loading and saving avatar data.
//!
//! This module handles all file format parsing and export:
//! - Trainer state dict (JSON): splat bindings, betas, UV texture
//! - SMPL-X pose sequences (JSON, one file per frame)
//! - Plain-text vertex/face dumps
//! - Texture PNG export

mod haha;
mod mesh_txt;
mod pose;
mod texture;

// Re-export public types and functions
pub use haha::{load_avatar_asset, parse_avatar_asset, AvatarAsset, ImportError};
pub use mesh_txt::{load_faces, load_vertices, save_faces, save_vertices};
pub use pose::{load_pose_frame, load_pose_sequence, parse_pose_frame, pose_files, PoseFrame};
pub use texture::{save_texture_png, texture_from_channels, TextureError};
