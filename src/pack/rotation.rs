//! 10.10.10.2 "smallest three" rotation packing.
//!
//! A unit quaternion is stored in 32 bits: the largest-magnitude component is
//! dropped (it is recoverable from the other three), its index goes in the
//! top 2 bits and the remaining three components, each in
//! `[-1/√2, 1/√2]`, are remapped to `[0, 1]` and quantised to 10 bits.
//!
//! ```text
//! bits  0..10  first kept component
//! bits 10..20  second kept component
//! bits 20..30  third kept component
//! bits 30..32  index of the dropped component (x=0, y=1, z=2, w=3)
//! ```
//!
//! Components are ordered (x, y, z, w). This is the layout the splat renderer
//! decodes; it is not ours to change.

use nalgebra::{Quaternion, UnitQuaternion};
use std::f32::consts::SQRT_2;

const TEN_BITS: u32 = 1023;

fn quantize(v: f32) -> u32 {
    let unit = (v * SQRT_2 * 0.5 + 0.5).clamp(0.0, 1.0);
    ((unit * 1023.5) as u32).min(TEN_BITS)
}

fn dequantize(bits: u32) -> f32 {
    ((bits & TEN_BITS) as f32 / TEN_BITS as f32 - 0.5) * SQRT_2
}

/// Pack a rotation into 10.10.10.2 bits.
///
/// Non-finite quaternions pack as identity.
pub fn encode_rotation(q: &UnitQuaternion<f32>) -> u32 {
    let mut c = [q.i, q.j, q.k, q.w];
    let norm = c.iter().map(|v| v * v).sum::<f32>().sqrt();
    if !norm.is_finite() || norm <= f32::EPSILON {
        c = [0.0, 0.0, 0.0, 1.0];
    } else {
        c.iter_mut().for_each(|v| *v /= norm);
    }

    let mut largest = 0;
    for i in 1..4 {
        if c[i].abs() > c[largest].abs() {
            largest = i;
        }
    }

    // Swizzle the largest component out: x → yzw, y → xzw, z → xyw, w → xyz
    let three = match largest {
        0 => [c[1], c[2], c[3]],
        1 => [c[0], c[2], c[3]],
        2 => [c[0], c[1], c[3]],
        _ => [c[0], c[1], c[2]],
    };

    // q and -q are the same rotation; keep the dropped component positive
    let sign = if c[largest] >= 0.0 { 1.0 } else { -1.0 };

    quantize(three[0] * sign)
        | quantize(three[1] * sign) << 10
        | quantize(three[2] * sign) << 20
        | (largest as u32) << 30
}

/// Unpack a 10.10.10.2 rotation.
pub fn decode_rotation(bits: u32) -> UnitQuaternion<f32> {
    let a = dequantize(bits);
    let b = dequantize(bits >> 10);
    let c = dequantize(bits >> 20);
    let dropped = (1.0 - a * a - b * b - c * c).max(0.0).sqrt();

    let [x, y, z, w] = match bits >> 30 {
        0 => [dropped, a, b, c],
        1 => [a, dropped, b, c],
        2 => [a, b, dropped, c],
        _ => [a, b, c, dropped],
    };
    UnitQuaternion::from_quaternion(Quaternion::new(w, x, y, z))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    #[test]
    fn test_identity_drops_w() {
        let bits = encode_rotation(&UnitQuaternion::identity());
        assert_eq!(bits >> 30, 3);
        // Zero maps to the middle of the 10-bit range
        assert_eq!(bits & TEN_BITS, 511);
    }

    #[test]
    fn test_largest_component_index() {
        // 170° about x: x dominates
        let q = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), 170f32.to_radians());
        assert_eq!(encode_rotation(&q) >> 30, 0);

        let q = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), 170f32.to_radians());
        assert_eq!(encode_rotation(&q) >> 30, 1);

        let q = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), 170f32.to_radians());
        assert_eq!(encode_rotation(&q) >> 30, 2);
    }

    #[test]
    fn test_decode_recovers_rotation() {
        let rotations = [
            UnitQuaternion::from_euler_angles(0.1, -0.4, 2.0),
            UnitQuaternion::from_axis_angle(&Vector3::x_axis(), 3.0),
            UnitQuaternion::from_euler_angles(-2.5, 1.1, 0.3),
        ];
        for q in rotations {
            let decoded = decode_rotation(encode_rotation(&q));
            assert!(decoded.angle_to(&q) < 0.01, "{q:?} -> {decoded:?}");
        }
    }

    #[test]
    fn test_negated_quaternion_packs_identically() {
        let q = UnitQuaternion::from_euler_angles(0.7, 0.2, -0.9);
        let neg = UnitQuaternion::new_unchecked(-q.into_inner());
        assert_eq!(encode_rotation(&q), encode_rotation(&neg));
    }
}
