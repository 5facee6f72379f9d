//! Per-triangle reference frames.
//!
//! Every splat is expressed relative to the frame of the triangle it is bound
//! to. The convention below must match the one the splats were trained with:
//!
//! ```text
//! origin    = (v0 + v1 + v2) / 3
//! e1 = v2 - v1,  e2 = v0 - v1,  e3 = v0 - v2
//! normal    = normalize(e1 × e2)
//! tangent   = normalize(e1)
//! bitangent = normalize(tangent × normal)
//! R         = [tangent | normal | bitangent]      (columns)
//! scale     = (|e1 × e2| / |e3| + |e3|) / (2 * max_scale)
//! ```
//!
//! `|e1 × e2| / |e3|` is the triangle height over edge e3.

use crate::config::ReskinConfig;
use crate::core::math::rotation_matrix_to_quaternion;
use crate::core::mesh::{FrameError, MeshTopology};
use nalgebra::{Matrix3, UnitQuaternion, Vector3};
use rayon::prelude::*;

/// Local frame of one triangle for the current frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FaceFrame {
    /// Triangle centroid
    pub origin: Vector3<f32>,

    /// Rotation taking face-local axes to world axes
    pub rotation: UnitQuaternion<f32>,

    /// Uniform scale factor of the face
    pub scale: f32,
}

impl FaceFrame {
    /// Frame used for triangles without a usable orientation.
    pub fn degenerate(origin: Vector3<f32>) -> Self {
        Self {
            origin,
            rotation: UnitQuaternion::identity(),
            scale: 0.0,
        }
    }

    pub fn is_degenerate(&self) -> bool {
        self.scale == 0.0
    }

    /// Compute the frame of triangle (v0, v1, v2).
    ///
    /// Near-zero area or edge length, or any non-finite intermediate, yields
    /// [`FaceFrame::degenerate`] at the centroid (or at the origin if the
    /// centroid itself is not finite).
    pub fn from_triangle(
        v0: &Vector3<f32>,
        v1: &Vector3<f32>,
        v2: &Vector3<f32>,
        max_scale: f32,
        epsilon: f32,
    ) -> Self {
        let origin = (v0 + v1 + v2) / 3.0;
        if !origin.iter().all(|c| c.is_finite()) {
            return Self::degenerate(Vector3::zeros());
        }

        let e1 = v2 - v1;
        let e2 = v0 - v1;
        let e3 = v0 - v2;

        let normal_raw = e1.cross(&e2);
        let area = normal_raw.norm();
        let edge_len = e3.norm();

        if !(area > epsilon && edge_len > epsilon) {
            return Self::degenerate(origin);
        }

        let normal = normal_raw / area;
        let tangent = e1.normalize();
        let bitangent = tangent.cross(&normal).normalize();

        // Rows [tangent, normal, bitangent], transposed
        let rows = Matrix3::from_rows(&[
            tangent.transpose(),
            normal.transpose(),
            bitangent.transpose(),
        ]);
        let rotation = match rotation_matrix_to_quaternion(&rows.transpose()) {
            Some(q) => q,
            None => return Self::degenerate(origin),
        };

        let height = area / edge_len;
        let scale = (height + edge_len) / (2.0 * max_scale);
        if !scale.is_finite() {
            return Self::degenerate(origin);
        }

        Self {
            origin,
            rotation,
            scale,
        }
    }
}

/// Compute one frame per triangle.
pub fn build_face_frames(
    vertices: &[Vector3<f32>],
    topology: &MeshTopology,
    config: &ReskinConfig,
) -> Result<Vec<FaceFrame>, FrameError> {
    let mut frames = Vec::with_capacity(topology.len());
    build_face_frames_into(vertices, topology, config, &mut frames)?;
    Ok(frames)
}

/// Compute one frame per triangle into a reusable buffer.
///
/// Returns the number of triangles that were clamped to a degenerate frame.
/// The whole buffer is written before this returns, so callers can hand it to
/// the propagation stage directly.
pub fn build_face_frames_into(
    vertices: &[Vector3<f32>],
    topology: &MeshTopology,
    config: &ReskinConfig,
    frames: &mut Vec<FaceFrame>,
) -> Result<usize, FrameError> {
    topology.check_vertices(vertices.len())?;

    let max_scale = config.max_scale;
    let epsilon = config.degenerate_epsilon;

    topology
        .triangles()
        .par_iter()
        .map(|&[a, b, c]| {
            FaceFrame::from_triangle(
                &vertices[a as usize],
                &vertices[b as usize],
                &vertices[c as usize],
                max_scale,
                epsilon,
            )
        })
        .collect_into_vec(frames);

    let clamped = frames.iter().filter(|f| f.is_degenerate()).count();
    if clamped > 0 {
        log::debug!("{clamped} degenerate faces clamped to zero scale");
    }
    Ok(clamped)
}
