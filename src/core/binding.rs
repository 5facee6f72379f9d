//! Static splat-to-face bindings.
//!
//! Each splat is attached to exactly one triangle and stores its Gaussian
//! parameters in that triangle's local frame. The table is validated once at
//! load time; per-frame code indexes into it without further checks.

use crate::core::mesh::{MeshTopology, TopologyError};
use nalgebra::{Quaternion, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while building a [`SplatBindingTable`].
#[derive(Debug, Error, PartialEq)]
pub enum BindingError {
    #[error("{field} has {actual} entries, expected {expected} (one per splat)")]
    LengthMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("splat {splat} is bound to face {face_index}, but the mesh has {triangle_count} triangles")]
    FaceIndexOutOfRange {
        splat: usize,
        face_index: i64,
        triangle_count: usize,
    },

    #[error("splat {splat} has a zero-length rotation quaternion")]
    DegenerateRotation { splat: usize },

    #[error("splat {splat} has a non-finite {field}")]
    NonFinite { splat: usize, field: &'static str },

    #[error(transparent)]
    Topology(#[from] TopologyError),
}

/// One splat's parameters relative to its face.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SplatBinding {
    /// Index of the triangle this splat follows
    pub face_index: u32,

    /// Offset from the face origin, in face-local units
    pub local_offset: Vector3<f32>,

    /// Orientation relative to the face frame
    pub local_rotation: UnitQuaternion<f32>,

    /// Stored (unactivated) scale
    pub local_scale: Vector3<f32>,

    pub opacity: f32,

    /// Linear RGB
    pub color: Vector3<f32>,
}

/// Raw per-splat arrays as exported by the trainer.
///
/// Rotations are `(w, x, y, z)` and need not be normalised. Face indices are
/// signed so that corrupt negative entries can be reported instead of
/// wrapping.
#[derive(Clone, Debug, Default)]
pub struct BindingArrays {
    pub offsets: Vec<[f32; 3]>,
    pub rotations: Vec<[f32; 4]>,
    pub scales: Vec<[f32; 3]>,
    pub opacities: Vec<f32>,
    pub colors: Vec<[f32; 3]>,
    pub face_indices: Vec<i64>,
}

impl BindingArrays {
    fn check_lengths(&self) -> Result<usize, BindingError> {
        let expected = self.offsets.len();
        let lengths = [
            ("rotations", self.rotations.len()),
            ("scales", self.scales.len()),
            ("opacities", self.opacities.len()),
            ("colors", self.colors.len()),
            ("face_indices", self.face_indices.len()),
        ];
        for (field, actual) in lengths {
            if actual != expected {
                return Err(BindingError::LengthMismatch {
                    field,
                    expected,
                    actual,
                });
            }
        }
        Ok(expected)
    }
}

fn finite3(v: &[f32; 3]) -> bool {
    v.iter().all(|c| c.is_finite())
}

/// Validated bindings plus the topology they refer to.
#[derive(Clone, Debug)]
pub struct SplatBindingTable {
    bindings: Vec<SplatBinding>,
    topology: MeshTopology,
}

impl SplatBindingTable {
    /// Validate already-typed bindings against a topology.
    pub fn new(bindings: Vec<SplatBinding>, topology: MeshTopology) -> Result<Self, BindingError> {
        let triangle_count = topology.len();
        for (splat, b) in bindings.iter().enumerate() {
            if b.face_index as usize >= triangle_count {
                return Err(BindingError::FaceIndexOutOfRange {
                    splat,
                    face_index: b.face_index as i64,
                    triangle_count,
                });
            }
        }
        Ok(Self { bindings, topology })
    }

    /// Build from the trainer's parallel arrays.
    ///
    /// Checks array lengths, face index range, finiteness of every value and
    /// that each rotation can be normalised.
    pub fn from_arrays(arrays: BindingArrays, topology: MeshTopology) -> Result<Self, BindingError> {
        let count = arrays.check_lengths()?;
        let triangle_count = topology.len();

        let mut bindings = Vec::with_capacity(count);
        for splat in 0..count {
            let face_index = arrays.face_indices[splat];
            if face_index < 0 || face_index as u64 >= triangle_count as u64 {
                return Err(BindingError::FaceIndexOutOfRange {
                    splat,
                    face_index,
                    triangle_count,
                });
            }

            let offset = &arrays.offsets[splat];
            let scale = &arrays.scales[splat];
            let color = &arrays.colors[splat];
            let [w, x, y, z] = arrays.rotations[splat];
            let opacity = arrays.opacities[splat];

            let non_finite = if !finite3(offset) {
                Some("offset")
            } else if !finite3(scale) {
                Some("scale")
            } else if !finite3(color) {
                Some("color")
            } else if ![w, x, y, z].iter().all(|c| c.is_finite()) {
                Some("rotation")
            } else if !opacity.is_finite() {
                Some("opacity")
            } else {
                None
            };
            if let Some(field) = non_finite {
                return Err(BindingError::NonFinite { splat, field });
            }

            let q = Quaternion::new(w, x, y, z);
            if q.norm() <= f32::EPSILON {
                return Err(BindingError::DegenerateRotation { splat });
            }

            bindings.push(SplatBinding {
                face_index: face_index as u32,
                local_offset: Vector3::from(*offset),
                local_rotation: UnitQuaternion::from_quaternion(q),
                local_scale: Vector3::from(*scale),
                opacity,
                color: Vector3::from(*color),
            });
        }

        Ok(Self { bindings, topology })
    }

    pub fn bindings(&self) -> &[SplatBinding] {
        &self.bindings
    }

    pub fn get(&self, splat: usize) -> Option<&SplatBinding> {
        self.bindings.get(splat)
    }

    /// Number of splats.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn topology(&self) -> &MeshTopology {
        &self.topology
    }

    pub fn triangle_count(&self) -> usize {
        self.topology.len()
    }

    /// How many splats each triangle carries.
    pub fn splats_per_face(&self) -> Vec<u32> {
        let mut counts = vec![0u32; self.triangle_count()];
        for b in &self.bindings {
            counts[b.face_index as usize] += 1;
        }
        counts
    }
}
