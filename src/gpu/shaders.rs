//! WGSL compute kernels for re-skinning.
//!
//! One module, two entry points sharing a bind group:
//! - `build_face_frames`: one invocation per triangle
//! - `propagate_splats`: one invocation per splat, writes both output buffers
//!
//! The math mirrors `core::face_frame`, `core::propagate` and
//! `pack::encode_rotation` exactly; quaternions are stored (x, y, z, w).

use wgpu::{Device, ShaderModule};

pub const FACE_FRAME_ENTRY: &str = "build_face_frames";
pub const PROPAGATE_ENTRY: &str = "propagate_splats";

/// Re-skinning kernels. `{{WORKGROUP_SIZE}}` is substituted at module
/// creation.
pub const RESKIN_SHADER: &str = r#"
struct Params {
    triangle_count: u32,
    splat_count: u32,
    max_scale: f32,
    degenerate_epsilon: f32,
    activation_min: f32,
    activation_max: f32,
    pad0: u32,
    pad1: u32,
}

// Matches FaceFrameGPU
struct FaceFrame {
    origin_scale: vec4<f32>,  // (x, y, z, scale)
    rotation: vec4<f32>,      // (x, y, z, w)
}

// Matches BindingGPU
struct Binding {
    offset: vec3<f32>,
    face_index: u32,
    rotation: vec4<f32>,      // (x, y, z, w)
    scale: vec3<f32>,         // unactivated
    pad: f32,
}

@group(0) @binding(0) var<uniform> params: Params;
@group(0) @binding(1) var<storage, read> vertices: array<f32>;
@group(0) @binding(2) var<storage, read> faces: array<u32>;
@group(0) @binding(3) var<storage, read_write> frames: array<FaceFrame>;
@group(0) @binding(4) var<storage, read> bindings: array<Binding>;
@group(0) @binding(5) var<storage, read_write> positions: array<f32>;
@group(0) @binding(6) var<storage, read_write> other_data: array<u32>;

const MAX_FINITE: f32 = 3.0e38;
const EPSILON: f32 = 1.1920929e-7;
const SQRT_2: f32 = 1.4142135;

// NaN fails every comparison, so these reject NaN and ±inf alike
fn finite1(x: f32) -> bool {
    return abs(x) <= MAX_FINITE;
}

fn finite3(v: vec3<f32>) -> bool {
    return all(abs(v) <= vec3<f32>(MAX_FINITE));
}

fn finite4(v: vec4<f32>) -> bool {
    return all(abs(v) <= vec4<f32>(MAX_FINITE));
}

fn load_vertex(i: u32) -> vec3<f32> {
    return vec3<f32>(vertices[3u * i], vertices[3u * i + 1u], vertices[3u * i + 2u]);
}

fn degenerate_frame(origin: vec3<f32>) -> FaceFrame {
    var f: FaceFrame;
    f.origin_scale = vec4<f32>(origin, 0.0);
    f.rotation = vec4<f32>(0.0, 0.0, 0.0, 1.0);
    return f;
}

// Rotation matrix with columns (t, n, b) to quaternion (x, y, z, w),
// largest-diagonal method. Returns zero if no candidate is usable.
fn matrix_to_quat(t: vec3<f32>, n: vec3<f32>, b: vec3<f32>) -> vec4<f32> {
    let m00 = t.x;
    let m10 = t.y;
    let m20 = t.z;
    let m01 = n.x;
    let m11 = n.y;
    let m21 = n.z;
    let m02 = b.x;
    let m12 = b.y;
    let m22 = b.z;

    let q_abs = vec4<f32>(
        sqrt(max(1.0 + m00 + m11 + m22, 0.0)),
        sqrt(max(1.0 + m00 - m11 - m22, 0.0)),
        sqrt(max(1.0 - m00 + m11 - m22, 0.0)),
        sqrt(max(1.0 - m00 - m11 + m22, 0.0))
    );

    var best = 0u;
    var r = q_abs.x;
    if (q_abs.y > r) { best = 1u; r = q_abs.y; }
    if (q_abs.z > r) { best = 2u; r = q_abs.z; }
    if (q_abs.w > r) { best = 3u; r = q_abs.w; }
    if (r <= EPSILON) {
        return vec4<f32>(0.0);
    }
    let inv = 0.5 / r;

    // (w, x, y, z)
    var q: vec4<f32>;
    switch best {
        case 0u: { q = vec4<f32>(0.5 * r, (m21 - m12) * inv, (m02 - m20) * inv, (m10 - m01) * inv); }
        case 1u: { q = vec4<f32>((m21 - m12) * inv, 0.5 * r, (m10 + m01) * inv, (m02 + m20) * inv); }
        case 2u: { q = vec4<f32>((m02 - m20) * inv, (m10 + m01) * inv, 0.5 * r, (m12 + m21) * inv); }
        default: { q = vec4<f32>((m10 - m01) * inv, (m02 + m20) * inv, (m12 + m21) * inv, 0.5 * r); }
    }
    q = normalize(q);
    return vec4<f32>(q.y, q.z, q.w, q.x);
}

fn quat_mul(a: vec4<f32>, b: vec4<f32>) -> vec4<f32> {
    return vec4<f32>(
        a.w * b.xyz + b.w * a.xyz + cross(a.xyz, b.xyz),
        a.w * b.w - dot(a.xyz, b.xyz)
    );
}

fn quat_rotate(q: vec4<f32>, v: vec3<f32>) -> vec3<f32> {
    let t = 2.0 * cross(q.xyz, v);
    return v + q.w * t + cross(q.xyz, t);
}

fn quantize(v: f32) -> u32 {
    let unit = clamp(v * SQRT_2 * 0.5 + 0.5, 0.0, 1.0);
    return min(u32(unit * 1023.5), 1023u);
}

// 10.10.10.2 smallest-three packing
fn encode_rotation(q_in: vec4<f32>) -> u32 {
    var q = vec4<f32>(0.0, 0.0, 0.0, 1.0);
    let len = length(q_in);
    if (len > EPSILON && finite1(len)) {
        q = q_in / len;
    }

    let a = abs(q);
    var largest = 0u;
    var big = a.x;
    if (a.y > big) { largest = 1u; big = a.y; }
    if (a.z > big) { largest = 2u; big = a.z; }
    if (a.w > big) { largest = 3u; big = a.w; }

    var three: vec3<f32>;
    var dropped: f32;
    switch largest {
        case 0u: { three = q.yzw; dropped = q.x; }
        case 1u: { three = q.xzw; dropped = q.y; }
        case 2u: { three = q.xyw; dropped = q.z; }
        default: { three = q.xyz; dropped = q.w; }
    }
    if (dropped < 0.0) {
        three = -three;
    }

    return quantize(three.x)
        | (quantize(three.y) << 10u)
        | (quantize(three.z) << 20u)
        | (largest << 30u);
}

@compute @workgroup_size({{WORKGROUP_SIZE}})
fn build_face_frames(@builtin(global_invocation_id) gid: vec3<u32>) {
    let f = gid.x;
    if (f >= params.triangle_count) {
        return;
    }

    let v0 = load_vertex(faces[3u * f]);
    let v1 = load_vertex(faces[3u * f + 1u]);
    let v2 = load_vertex(faces[3u * f + 2u]);

    let origin = (v0 + v1 + v2) / 3.0;
    if (!finite3(origin)) {
        frames[f] = degenerate_frame(vec3<f32>(0.0));
        return;
    }

    let e1 = v2 - v1;
    let e2 = v0 - v1;
    let e3 = v0 - v2;

    let normal_raw = cross(e1, e2);
    let area = length(normal_raw);
    let edge_len = length(e3);

    if (!(area > params.degenerate_epsilon && edge_len > params.degenerate_epsilon)
        || !finite1(area) || !finite1(edge_len)) {
        frames[f] = degenerate_frame(origin);
        return;
    }

    let normal = normal_raw / area;
    let tangent = normalize(e1);
    let bitangent = normalize(cross(tangent, normal));
    let q = matrix_to_quat(tangent, normal, bitangent);
    let scale = (area / edge_len + edge_len) / (2.0 * params.max_scale);

    if (!finite4(q) || length(q) <= EPSILON || !finite1(scale)) {
        frames[f] = degenerate_frame(origin);
        return;
    }

    var out: FaceFrame;
    out.origin_scale = vec4<f32>(origin, scale);
    out.rotation = q;
    frames[f] = out;
}

@compute @workgroup_size({{WORKGROUP_SIZE}})
fn propagate_splats(@builtin(global_invocation_id) gid: vec3<u32>) {
    let i = gid.x;
    if (i >= params.splat_count) {
        return;
    }

    let b = bindings[i];
    let frame = frames[b.face_index];
    let origin = frame.origin_scale.xyz;
    let k = frame.origin_scale.w;

    var pos = origin + quat_rotate(frame.rotation, b.offset * k);
    var rot = quat_mul(frame.rotation, b.rotation);
    let sig = vec3<f32>(1.0) / (vec3<f32>(1.0) + exp(-b.scale));
    var scale = (params.activation_min + sig * (params.activation_max - params.activation_min)) * k;

    if (!finite3(pos) || !finite4(rot) || !finite3(scale)) {
        pos = select(vec3<f32>(0.0), origin, finite3(origin));
        rot = vec4<f32>(0.0, 0.0, 0.0, 1.0);
        scale = vec3<f32>(0.0);
    }

    positions[3u * i] = pos.x;
    positions[3u * i + 1u] = pos.y;
    positions[3u * i + 2u] = pos.z;

    other_data[4u * i] = encode_rotation(rot);
    other_data[4u * i + 1u] = bitcast<u32>(scale.x);
    other_data[4u * i + 2u] = bitcast<u32>(scale.y);
    other_data[4u * i + 3u] = bitcast<u32>(scale.z);
}
"#;

pub fn create_reskin_shader(device: &Device, workgroup_size: u32) -> ShaderModule {
    let source = RESKIN_SHADER.replace("{{WORKGROUP_SIZE}}", &workgroup_size.to_string());
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("Reskin Shader"),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    })
}
