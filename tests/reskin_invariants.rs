//! End-to-end invariants of the CPU re-skinning pipeline.
//!
//! Each test checks a property the renderer relies on, with small meshes
//! whose expected values can be worked out by hand.

use approx::assert_relative_eq;
use gsavatar_rs::config::ReskinConfig;
use gsavatar_rs::core::{
    build_face_frames, propagate_splat, propagate_splats, BindingArrays, MeshTopology,
    ScaleActivation, SplatBindingTable,
};
use nalgebra::{Quaternion, UnitQuaternion, Vector3};

fn unit_triangle() -> Vec<Vector3<f32>> {
    vec![
        Vector3::new(0.0, 0.0, 0.0),
        Vector3::new(1.0, 0.0, 0.0),
        Vector3::new(0.0, 1.0, 0.0),
    ]
}

/// Two triangles sharing an edge, folded out of the xy-plane.
fn folded_quad() -> (Vec<Vector3<f32>>, MeshTopology) {
    let vertices = vec![
        Vector3::new(0.0, 0.0, 0.0),
        Vector3::new(1.0, 0.0, 0.0),
        Vector3::new(0.0, 1.0, 0.0),
        Vector3::new(1.0, 1.0, 0.4),
    ];
    let topology = MeshTopology::new(vec![[0, 1, 2], [1, 3, 2]]).unwrap();
    (vertices, topology)
}

fn bindings(face_indices: Vec<i64>, topology: MeshTopology) -> SplatBindingTable {
    let n = face_indices.len();
    let arrays = BindingArrays {
        offsets: (0..n)
            .map(|i| [0.01 * i as f32, -0.02, 0.005 * i as f32])
            .collect(),
        rotations: (0..n)
            .map(|i| [1.0, 0.1 * i as f32, -0.05, 0.2])
            .collect(),
        scales: (0..n).map(|i| [-2.0, 0.5 * i as f32, 1.0]).collect(),
        opacities: vec![0.8; n],
        colors: vec![[0.3, 0.6, 0.9]; n],
        face_indices,
    };
    SplatBindingTable::from_arrays(arrays, topology).unwrap()
}

fn identity_binding_table() -> SplatBindingTable {
    let arrays = BindingArrays {
        offsets: vec![[0.0; 3]],
        rotations: vec![[1.0, 0.0, 0.0, 0.0]],
        scales: vec![[0.0; 3]],
        opacities: vec![1.0],
        colors: vec![[1.0; 3]],
        face_indices: vec![0],
    };
    SplatBindingTable::from_arrays(arrays, MeshTopology::new(vec![[0, 1, 2]]).unwrap()).unwrap()
}

#[test]
fn test_unit_triangle_identity_splat() {
    let table = identity_binding_table();
    let config = ReskinConfig::default();
    let frames = build_face_frames(&unit_triangle(), table.topology(), &config).unwrap();
    let splats = propagate_splats(&frames, &table, &config.scale_activation).unwrap();

    let frame = &frames[0];
    assert_relative_eq!(frame.origin, Vector3::new(1.0 / 3.0, 1.0 / 3.0, 0.0), epsilon = 1e-6);
    assert!(frame.scale.is_finite() && frame.scale > 0.0);

    // Tangent is normalize(v2 - v1)
    let expected_tangent = Vector3::new(-1.0, 1.0, 0.0).normalize();
    assert_relative_eq!(frame.rotation * Vector3::x(), expected_tangent, epsilon = 1e-5);

    // Zero offset lands on the origin, identity local rotation gives the face rotation
    assert_relative_eq!(splats[0].world_position, frame.origin, epsilon = 1e-6);
    assert_relative_eq!(splats[0].world_rotation, frame.rotation, epsilon = 1e-6);

    // sigmoid(0) = 0.5 → half the activation range, times face scale
    assert_relative_eq!(splats[0].world_scale.x, 0.05 * frame.scale, epsilon = 1e-5);
}

#[test]
fn test_frames_are_deterministic() {
    let (vertices, topology) = folded_quad();
    let table = bindings(vec![0, 1, 1, 0, 1], topology);
    let config = ReskinConfig::default();

    let run = || {
        let frames = build_face_frames(&vertices, table.topology(), &config).unwrap();
        propagate_splats(&frames, &table, &config.scale_activation).unwrap()
    };

    let a = run();
    let b = run();
    assert_eq!(a, b);
}

#[test]
fn test_degenerate_triangles_never_produce_non_finite_output() {
    let vertices = vec![
        Vector3::new(0.0, 0.0, 0.0),
        Vector3::new(0.0, 0.0, 0.0),
        Vector3::new(0.0, 0.0, 0.0),
        Vector3::new(1.0, 2.0, 3.0),
        Vector3::new(2.0, 4.0, 6.0),
        Vector3::new(f32::INFINITY, 0.0, 0.0),
    ];
    // coincident, collinear, infinite
    let topology = MeshTopology::new(vec![[0, 1, 2], [0, 3, 4], [3, 4, 5]]).unwrap();
    let table = bindings(vec![0, 1, 2, 2], topology);
    let config = ReskinConfig::default();

    let frames = build_face_frames(&vertices, table.topology(), &config).unwrap();
    for frame in &frames {
        assert_eq!(frame.scale, 0.0);
        assert_eq!(frame.rotation, UnitQuaternion::identity());
    }

    for splat in propagate_splats(&frames, &table, &config.scale_activation).unwrap() {
        assert!(splat.is_finite());
        assert_eq!(splat.world_scale, Vector3::zeros());
    }
}

#[test]
fn test_rigid_motion_moves_splats_rigidly() {
    let (vertices, topology) = folded_quad();
    let table = bindings(vec![0, 1, 0, 1], topology);
    let config = ReskinConfig::default();

    let motion = UnitQuaternion::from_euler_angles(0.4, -1.1, 2.0);
    let shift = Vector3::new(3.0, -1.0, 0.5);
    let moved: Vec<_> = vertices.iter().map(|v| motion * v + shift).collect();

    let before = {
        let f = build_face_frames(&vertices, table.topology(), &config).unwrap();
        propagate_splats(&f, &table, &config.scale_activation).unwrap()
    };
    let after = {
        let f = build_face_frames(&moved, table.topology(), &config).unwrap();
        propagate_splats(&f, &table, &config.scale_activation).unwrap()
    };

    for (a, b) in before.iter().zip(&after) {
        assert_relative_eq!(b.world_position, motion * a.world_position + shift, epsilon = 1e-4);
        assert_relative_eq!(b.world_scale, a.world_scale, epsilon = 1e-4);
        // q and -q are the same rotation
        let expected = motion * a.world_rotation;
        assert!(b.world_rotation.angle_to(&expected) < 1e-3);
    }
}

#[test]
fn test_batched_equals_one_at_a_time() {
    let (vertices, topology) = folded_quad();
    let table = bindings(vec![1, 0, 1, 1, 0, 0, 1], topology);
    let config = ReskinConfig::default();
    let frames = build_face_frames(&vertices, table.topology(), &config).unwrap();

    let batched = propagate_splats(&frames, &table, &config.scale_activation).unwrap();
    for (i, binding) in table.bindings().iter().enumerate() {
        let single = propagate_splat(
            &frames[binding.face_index as usize],
            binding,
            &config.scale_activation,
        );
        assert_eq!(batched[i], single);
    }
}

#[test]
fn test_face_scale_is_translation_invariant_and_linear() {
    let config = ReskinConfig::default();
    let topology = MeshTopology::new(vec![[0, 1, 2]]).unwrap();
    let base = unit_triangle();
    let doubled: Vec<_> = base.iter().map(|v| v * 2.0 + Vector3::new(5.0, 5.0, 5.0)).collect();

    let a = build_face_frames(&base, &topology, &config).unwrap()[0];
    let b = build_face_frames(&doubled, &topology, &config).unwrap()[0];
    assert_relative_eq!(b.scale, 2.0 * a.scale, epsilon = 1e-4);
    assert!(b.rotation.angle_to(&a.rotation) < 1e-5);
}

#[test]
fn test_stored_rotation_is_normalised_wxyz() {
    let arrays = BindingArrays {
        offsets: vec![[0.0; 3]],
        rotations: vec![[0.0, 0.0, 0.0, 3.0]],
        scales: vec![[0.0; 3]],
        opacities: vec![1.0],
        colors: vec![[1.0; 3]],
        face_indices: vec![0],
    };
    let table =
        SplatBindingTable::from_arrays(arrays, MeshTopology::new(vec![[0, 1, 2]]).unwrap()).unwrap();

    // (w, x, y, z) = (0, 0, 0, 3) → 180° about z
    let q = table.bindings()[0].local_rotation;
    assert_relative_eq!(
        q.into_inner(),
        Quaternion::new(0.0, 0.0, 0.0, 1.0),
        epsilon = 1e-6
    );
}

#[test]
fn test_activation_range_is_configurable() {
    let act = ScaleActivation::new(0.01, 0.02);
    assert_relative_eq!(act.apply_scalar(-100.0), 0.01, epsilon = 1e-6);
    assert_relative_eq!(act.apply_scalar(100.0), 0.02, epsilon = 1e-6);
    assert_relative_eq!(act.inverse(act.apply_scalar(0.7)), 0.7, epsilon = 1e-3);
}
