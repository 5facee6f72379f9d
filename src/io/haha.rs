//! Importer for the avatar trainer's JSON state dict.
//!
//! The file is a flat JSON object of nested arrays:
//!
//! ```text
//! _xyz               N × 3   face-local offsets
//! _rotation          N × 4   (w, x, y, z), unnormalised
//! _scaling           N × 3   unactivated scale
//! _opacity           N × 1
//! _color             N × 3   rgb
//! _gaussian_to_face  N       triangle index per splat
//! _faces             M × 3   vertex indices
//! _betas             1 × B   SMPL-X shape coefficients
//! _trainable_texture 3 × S × S
//! ```
//!
//! Integer fields are accepted as JSON integers or as integral floats, since
//! some exporters write every tensor as float.

use crate::core::{BindingArrays, BindingError, MeshTopology, SplatBindingTable, TopologyError};
use crate::io::texture::{texture_from_channels, TextureError};
use image::RgbImage;
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed {field}: {reason}")]
    Malformed { field: &'static str, reason: String },

    #[error("Invalid bindings: {0}")]
    Binding(#[from] BindingError),

    #[error("Invalid topology: {0}")]
    Topology(#[from] TopologyError),

    #[error("Invalid texture: {0}")]
    Texture(#[from] TextureError),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("No pose files found in {0}")]
    NoPoseFiles(PathBuf),
}

/// Raw state dict as stored on disk.
#[derive(Debug, Deserialize)]
struct StateDict {
    #[serde(rename = "_xyz")]
    xyz: Vec<Vec<f32>>,
    #[serde(rename = "_rotation")]
    rotation: Vec<Vec<f32>>,
    #[serde(rename = "_scaling")]
    scaling: Vec<Vec<f32>>,
    #[serde(rename = "_opacity")]
    opacity: Vec<Vec<f32>>,
    #[serde(rename = "_color")]
    color: Vec<Vec<f32>>,
    #[serde(rename = "_gaussian_to_face")]
    gaussian_to_face: Vec<f64>,
    #[serde(rename = "_faces")]
    faces: Vec<Vec<f64>>,
    #[serde(rename = "_betas", default)]
    betas: Vec<Vec<f32>>,
    #[serde(rename = "_trainable_texture", default)]
    trainable_texture: Option<Vec<Vec<Vec<f32>>>>,
}

/// Everything the runtime needs from one trained avatar.
#[derive(Debug)]
pub struct AvatarAsset {
    /// SMPL-X shape coefficients (first row of `_betas`)
    pub betas: Vec<f32>,

    pub bindings: SplatBindingTable,

    /// Present when the state dict carries a trained texture
    pub texture: Option<RgbImage>,
}

fn fixed_rows<const K: usize>(
    field: &'static str,
    rows: &[Vec<f32>],
) -> Result<Vec<[f32; K]>, ImportError> {
    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            <[f32; K]>::try_from(row.as_slice()).map_err(|_| ImportError::Malformed {
                field,
                reason: format!("row {i} has {} values, expected {K}", row.len()),
            })
        })
        .collect()
}

fn integral(field: &'static str, value: f64) -> Result<i64, ImportError> {
    if !value.is_finite() || value.fract() != 0.0 {
        return Err(ImportError::Malformed {
            field,
            reason: format!("{value} is not an integer"),
        });
    }
    Ok(value as i64)
}

fn parse_faces(rows: &[Vec<f64>]) -> Result<Vec<[u32; 3]>, ImportError> {
    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            if row.len() != 3 {
                return Err(ImportError::Malformed {
                    field: "_faces",
                    reason: format!("row {i} has {} indices, expected 3", row.len()),
                });
            }
            let mut tri = [0u32; 3];
            for (slot, &v) in tri.iter_mut().zip(row) {
                let v = integral("_faces", v)?;
                *slot = u32::try_from(v).map_err(|_| ImportError::Malformed {
                    field: "_faces",
                    reason: format!("row {i} has out-of-range vertex index {v}"),
                })?;
            }
            Ok(tri)
        })
        .collect()
}

impl StateDict {
    fn into_asset(self) -> Result<AvatarAsset, ImportError> {
        let opacities = self
            .opacity
            .iter()
            .enumerate()
            .map(|(i, row)| {
                row.first().copied().ok_or_else(|| ImportError::Malformed {
                    field: "_opacity",
                    reason: format!("row {i} is empty"),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let face_indices = self
            .gaussian_to_face
            .iter()
            .map(|&v| integral("_gaussian_to_face", v))
            .collect::<Result<Vec<_>, _>>()?;

        let arrays = BindingArrays {
            offsets: fixed_rows("_xyz", &self.xyz)?,
            rotations: fixed_rows("_rotation", &self.rotation)?,
            scales: fixed_rows("_scaling", &self.scaling)?,
            opacities,
            colors: fixed_rows("_color", &self.color)?,
            face_indices,
        };

        let topology = MeshTopology::new(parse_faces(&self.faces)?)?;
        let bindings = SplatBindingTable::from_arrays(arrays, topology)?;

        let betas = self.betas.into_iter().next().unwrap_or_default();

        let texture = match self.trainable_texture {
            Some(channels) => Some(texture_from_channels(&channels)?),
            None => None,
        };

        Ok(AvatarAsset {
            betas,
            bindings,
            texture,
        })
    }
}

/// Parse a state dict from a JSON string.
pub fn parse_avatar_asset(json: &str) -> Result<AvatarAsset, ImportError> {
    let dict: StateDict = serde_json::from_str(json)?;
    dict.into_asset()
}

/// Load a state dict from disk.
pub fn load_avatar_asset<P: AsRef<Path>>(path: P) -> Result<AvatarAsset, ImportError> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);
    let dict: StateDict = serde_json::from_reader(reader)?;
    let asset = dict.into_asset()?;

    log::info!(
        "Loaded avatar {}: {} splats on {} triangles, {} betas{}",
        path.display(),
        asset.bindings.len(),
        asset.bindings.triangle_count(),
        asset.betas.len(),
        match &asset.texture {
            Some(t) => format!(", {}x{} texture", t.width(), t.height()),
            None => String::new(),
        }
    );

    Ok(asset)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal(face_index: &str, texture: &str) -> String {
        format!(
            r#"{{
                "_xyz": [[0.0, 0.0, 0.0]],
                "_rotation": [[1.0, 0.0, 0.0, 0.0]],
                "_scaling": [[0.0, 0.0, 0.0]],
                "_opacity": [[0.9]],
                "_color": [[1.0, 0.5, 0.0]],
                "_gaussian_to_face": [{face_index}],
                "_faces": [[0, 1, 2]],
                "_betas": [[0.1, 0.2]]{texture}
            }}"#
        )
    }

    #[test]
    fn test_parse_minimal() {
        let asset = parse_avatar_asset(&minimal("0", "")).unwrap();
        assert_eq!(asset.bindings.len(), 1);
        assert_eq!(asset.betas, vec![0.1, 0.2]);
        assert_eq!(asset.bindings.bindings()[0].opacity, 0.9);
        assert!(asset.texture.is_none());
    }

    #[test]
    fn test_float_face_index_accepted() {
        let asset = parse_avatar_asset(&minimal("0.0", "")).unwrap();
        assert_eq!(asset.bindings.bindings()[0].face_index, 0);
    }

    #[test]
    fn test_fractional_face_index_rejected() {
        let err = parse_avatar_asset(&minimal("0.5", "")).unwrap_err();
        assert!(matches!(err, ImportError::Malformed { field: "_gaussian_to_face", .. }));
    }

    #[test]
    fn test_face_index_equal_to_count_rejected() {
        let err = parse_avatar_asset(&minimal("1", "")).unwrap_err();
        assert!(matches!(
            err,
            ImportError::Binding(BindingError::FaceIndexOutOfRange { face_index: 1, .. })
        ));
    }

    #[test]
    fn test_texture_channel_count_checked() {
        let tex = r#", "_trainable_texture": [[[0.0]], [[0.0]]]"#;
        let err = parse_avatar_asset(&minimal("0", tex)).unwrap_err();
        assert!(matches!(err, ImportError::Texture(TextureError::ChannelCount(2))));
    }

    #[test]
    fn test_short_row_rejected() {
        let json = minimal("0", "").replace("[[1.0, 0.5, 0.0]]", "[[1.0, 0.5]]");
        let err = parse_avatar_asset(&json).unwrap_err();
        assert!(matches!(err, ImportError::Malformed { field: "_color", .. }));
    }
}
