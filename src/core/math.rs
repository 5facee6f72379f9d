//! Mathematical utilities (activations, rotation conversions, axis conventions).

use nalgebra::{Matrix3, Quaternion, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// Sigmoid activation function: σ(x) = 1 / (1 + e^(-x))
///
/// Maps R → (0, 1)
pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Inverse sigmoid (logit): logit(p) = log(p / (1-p))
///
/// Maps (0, 1) → R
/// Used to turn a desired physical scale back into the stored parameter space.
pub fn inverse_sigmoid(p: f32) -> f32 {
    // Clamp to avoid log(0) or division by zero
    let p_clamped = p.clamp(1e-6, 1.0 - 1e-6);
    (p_clamped / (1.0 - p_clamped)).ln()
}

/// Squashing function for stored splat scales.
///
/// Trained scales are unconstrained; the physical scale relative to a face is
/// `min + sigmoid(s) * (max - min)`, applied per component.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScaleActivation {
    pub min: f32,
    pub max: f32,
}

impl ScaleActivation {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// Activate a single component.
    pub fn apply_scalar(&self, s: f32) -> f32 {
        self.min + sigmoid(s).clamp(0.0, 1.0) * (self.max - self.min)
    }

    /// Activate all three scale components.
    pub fn apply(&self, s: &Vector3<f32>) -> Vector3<f32> {
        s.map(|c| self.apply_scalar(c))
    }

    /// Stored parameter that activates to `value` (clamped into the open range).
    pub fn inverse(&self, value: f32) -> f32 {
        let span = self.max - self.min;
        if span <= 0.0 {
            return 0.0;
        }
        inverse_sigmoid((value - self.min) / span)
    }
}

impl Default for ScaleActivation {
    fn default() -> Self {
        Self::new(0.0, 0.1)
    }
}

/// Convert a rotation matrix to a unit quaternion.
///
/// Uses the largest-diagonal-term method: four candidate quaternions are
/// derived from
///
/// ```text
/// 1 + m00 + m11 + m22   (w dominant)
/// 1 + m00 - m11 - m22   (x dominant)
/// 1 - m00 + m11 - m22   (y dominant)
/// 1 - m00 - m11 + m22   (z dominant)
/// ```
///
/// each clamped to ≥ 0 before the square root, and the candidate with the
/// largest root is kept. Returns `None` if the matrix contains non-finite
/// values or no candidate is usable.
pub fn rotation_matrix_to_quaternion(m: &Matrix3<f32>) -> Option<UnitQuaternion<f32>> {
    if !m.iter().all(|v| v.is_finite()) {
        return None;
    }

    let (m00, m01, m02) = (m[(0, 0)], m[(0, 1)], m[(0, 2)]);
    let (m10, m11, m12) = (m[(1, 0)], m[(1, 1)], m[(1, 2)]);
    let (m20, m21, m22) = (m[(2, 0)], m[(2, 1)], m[(2, 2)]);

    let q_abs = [
        (1.0 + m00 + m11 + m22).max(0.0).sqrt(),
        (1.0 + m00 - m11 - m22).max(0.0).sqrt(),
        (1.0 - m00 + m11 - m22).max(0.0).sqrt(),
        (1.0 - m00 - m11 + m22).max(0.0).sqrt(),
    ];

    let mut best = 0;
    for i in 1..4 {
        if q_abs[i] > q_abs[best] {
            best = i;
        }
    }

    let r = q_abs[best];
    if r <= f32::EPSILON {
        return None;
    }
    let inv = 0.5 / r;

    // Components in (w, x, y, z) order
    let q = match best {
        0 => [0.5 * r, (m21 - m12) * inv, (m02 - m20) * inv, (m10 - m01) * inv],
        1 => [(m21 - m12) * inv, 0.5 * r, (m10 + m01) * inv, (m02 + m20) * inv],
        2 => [(m02 - m20) * inv, (m10 + m01) * inv, 0.5 * r, (m12 + m21) * inv],
        _ => [(m10 - m01) * inv, (m02 + m20) * inv, (m12 + m21) * inv, 0.5 * r],
    };

    let quat = Quaternion::new(q[0], q[1], q[2], q[3]);
    let norm = quat.norm();
    if !norm.is_finite() || norm <= f32::EPSILON {
        return None;
    }
    Some(UnitQuaternion::from_quaternion(quat))
}

/// Axis convention of imported rotation vectors.
///
/// Pose exports and the runtime may disagree on handedness. All conversion
/// goes through [`AxisConvention::convert_rotation_vector`]; nothing else in
/// the crate flips signs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AxisConvention {
    /// Rotation vectors are used as stored.
    #[default]
    Native,
    /// Source frame is mirrored along X relative to ours.
    MirrorX,
}

impl AxisConvention {
    /// Map a rotation vector (axis × angle) from the source frame into ours.
    ///
    /// Rotation vectors are pseudovectors, so under the X mirror
    /// `M = diag(-1, 1, 1)` they transform as `det(M) · M · v = (x, -y, -z)`.
    pub fn convert_rotation_vector(self, v: &Vector3<f32>) -> Vector3<f32> {
        match self {
            AxisConvention::Native => *v,
            AxisConvention::MirrorX => Vector3::new(v.x, -v.y, -v.z),
        }
    }

    /// Rodrigues rotation vector → unit quaternion in our frame.
    pub fn rotation_from_vector(self, v: &Vector3<f32>) -> UnitQuaternion<f32> {
        UnitQuaternion::from_scaled_axis(self.convert_rotation_vector(v))
    }
}
