//! Face frame × binding → world-space splat.
//!
//! For splat i on face f:
//!
//! ```text
//! position = origin_f + R_f · (offset_i · k_f)
//! rotation = R_f · q_i
//! scale    = activation(s_i) · k_f
//! ```
//!
//! Each splat depends only on its own binding and its face's frame, so the
//! map runs in parallel with no ordering constraints.

use crate::core::binding::{SplatBinding, SplatBindingTable};
use crate::core::face_frame::FaceFrame;
use crate::core::math::ScaleActivation;
use crate::core::mesh::FrameError;
use nalgebra::{UnitQuaternion, Vector3};
use rayon::prelude::*;

/// World-space attributes of one splat for the current frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PropagatedSplat {
    pub world_position: Vector3<f32>,
    pub world_rotation: UnitQuaternion<f32>,
    pub world_scale: Vector3<f32>,
}

impl PropagatedSplat {
    pub fn is_finite(&self) -> bool {
        self.world_position.iter().all(|c| c.is_finite())
            && self.world_rotation.coords.iter().all(|c| c.is_finite())
            && self.world_scale.iter().all(|c| c.is_finite())
    }
}

/// Place a single splat on its face.
///
/// Non-finite results collapse to a zero-scale splat at the face origin so a
/// bad value can never reach the renderer.
pub fn propagate_splat(
    frame: &FaceFrame,
    binding: &SplatBinding,
    activation: &ScaleActivation,
) -> PropagatedSplat {
    let splat = PropagatedSplat {
        world_position: frame.origin + frame.rotation * (binding.local_offset * frame.scale),
        world_rotation: frame.rotation * binding.local_rotation,
        world_scale: activation.apply(&binding.local_scale) * frame.scale,
    };

    if splat.is_finite() {
        splat
    } else {
        PropagatedSplat {
            world_position: if frame.origin.iter().all(|c| c.is_finite()) {
                frame.origin
            } else {
                Vector3::zeros()
            },
            world_rotation: UnitQuaternion::identity(),
            world_scale: Vector3::zeros(),
        }
    }
}

/// Propagate every splat in the table.
pub fn propagate_splats(
    frames: &[FaceFrame],
    table: &SplatBindingTable,
    activation: &ScaleActivation,
) -> Result<Vec<PropagatedSplat>, FrameError> {
    let mut out = Vec::with_capacity(table.len());
    propagate_splats_into(frames, table, activation, &mut out)?;
    Ok(out)
}

/// Propagate every splat into a reusable buffer.
///
/// Output index i always corresponds to binding i. `frames` must hold one
/// frame per triangle of the table's topology; `out` is left untouched
/// otherwise.
pub fn propagate_splats_into(
    frames: &[FaceFrame],
    table: &SplatBindingTable,
    activation: &ScaleActivation,
    out: &mut Vec<PropagatedSplat>,
) -> Result<(), FrameError> {
    if frames.len() != table.triangle_count() {
        return Err(FrameError::FaceFrameCountMismatch {
            expected: table.triangle_count(),
            actual: frames.len(),
        });
    }

    table
        .bindings()
        .par_iter()
        .map(|b| propagate_splat(&frames[b.face_index as usize], b, activation))
        .collect_into_vec(out);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn binding(offset: Vector3<f32>) -> SplatBinding {
        SplatBinding {
            face_index: 0,
            local_offset: offset,
            local_rotation: UnitQuaternion::from_euler_angles(0.0, 0.3, 0.0),
            local_scale: Vector3::new(0.0, 1.0, -1.0),
            opacity: 1.0,
            color: Vector3::new(1.0, 0.0, 0.0),
        }
    }

    #[test]
    fn test_offset_scaled_and_rotated() {
        let frame = FaceFrame {
            origin: Vector3::new(1.0, 2.0, 3.0),
            rotation: UnitQuaternion::from_axis_angle(&Vector3::z_axis(), std::f32::consts::FRAC_PI_2),
            scale: 2.0,
        };
        let splat = propagate_splat(&frame, &binding(Vector3::x()), &ScaleActivation::default());

        // x-offset of 1 scaled by 2, rotated 90° about z → +2 in y
        assert_relative_eq!(splat.world_position, Vector3::new(1.0, 4.0, 3.0), epsilon = 1e-5);
    }

    #[test]
    fn test_rotation_composes_face_first() {
        let frame = FaceFrame {
            origin: Vector3::zeros(),
            rotation: UnitQuaternion::from_euler_angles(0.2, 0.0, 0.4),
            scale: 1.0,
        };
        let b = binding(Vector3::zeros());
        let splat = propagate_splat(&frame, &b, &ScaleActivation::default());
        assert_relative_eq!(splat.world_rotation, frame.rotation * b.local_rotation, epsilon = 1e-6);
    }

    #[test]
    fn test_scale_is_activation_times_face_scale() {
        let act = ScaleActivation::new(0.0, 0.1);
        let frame = FaceFrame {
            origin: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
            scale: 3.0,
        };
        let b = binding(Vector3::zeros());
        let splat = propagate_splat(&frame, &b, &act);
        assert_relative_eq!(splat.world_scale, act.apply(&b.local_scale) * 3.0, epsilon = 1e-6);
        assert_relative_eq!(splat.world_scale.x, 0.15, epsilon = 1e-6);
    }

    #[test]
    fn test_degenerate_face_collapses_splat() {
        let frame = FaceFrame::degenerate(Vector3::new(0.0, 1.0, 0.0));
        let splat = propagate_splat(&frame, &binding(Vector3::new(5.0, 5.0, 5.0)), &ScaleActivation::default());
        assert_eq!(splat.world_scale, Vector3::zeros());
        assert_relative_eq!(splat.world_position, frame.origin, epsilon = 1e-6);
        assert!(splat.is_finite());
    }

    #[test]
    fn test_non_finite_result_clamped() {
        let frame = FaceFrame {
            origin: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
            scale: f32::INFINITY,
        };
        let splat = propagate_splat(&frame, &binding(Vector3::x()), &ScaleActivation::default());
        assert!(splat.is_finite());
        assert_eq!(splat.world_scale, Vector3::zeros());
    }

    #[test]
    fn test_frames_from_other_topology_rejected() {
        use crate::core::{BindingArrays, MeshTopology};

        let arrays = BindingArrays {
            offsets: vec![[0.0; 3]],
            rotations: vec![[1.0, 0.0, 0.0, 0.0]],
            scales: vec![[0.0; 3]],
            opacities: vec![1.0],
            colors: vec![[1.0; 3]],
            face_indices: vec![1],
        };
        let topology = MeshTopology::new(vec![[0, 1, 2], [1, 3, 2]]).unwrap();
        let table = SplatBindingTable::from_arrays(arrays, topology).unwrap();

        // One frame for a two-triangle table: face 1 has no frame
        let frames = [FaceFrame::degenerate(Vector3::zeros())];
        let mut out = Vec::new();
        let err = propagate_splats_into(&frames, &table, &ScaleActivation::default(), &mut out)
            .unwrap_err();
        assert_eq!(
            err,
            FrameError::FaceFrameCountMismatch {
                expected: 2,
                actual: 1
            }
        );
        assert!(out.is_empty());
    }
}
