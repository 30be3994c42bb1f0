// Both pipelines share one uniform block, bound at group 0.
const UNIFORMS: &str = r#"
struct Uniforms {
    view_proj: mat4x4<f32>,
    // xyz = eye, w = fog distance
    eye_fog: vec4<f32>,
};

@group(0) @binding(0)
var<uniform> uniforms: Uniforms;

const SKY: vec3<f32> = vec3<f32>(0.53, 0.68, 0.85);

// Fraction of sky colour at a world position, quadratic in distance.
fn fog_at(pos: vec3<f32>) -> f32 {
    let f = clamp(distance(pos, uniforms.eye_fog.xyz) / uniforms.eye_fog.w, 0.0, 1.0);
    return f * f;
}
"#;

/// Lit boxes. A unit cube, instanced per box as center, yaw, size and colour.
pub const BOX_SHADER: &str = r#"
struct CubeVertex {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
};

struct BoxInstance {
    // xyz = center, w = yaw about +Y
    @location(2) center_yaw: vec4<f32>,
    @location(3) size: vec4<f32>,
    @location(4) color: vec4<f32>,
};

struct BoxOut {
    @builtin(position) clip: vec4<f32>,
    @location(0) normal: vec3<f32>,
    @location(1) color: vec4<f32>,
    @location(2) world: vec3<f32>,
};

fn turn(v: vec3<f32>, yaw: f32) -> vec3<f32> {
    let c = cos(yaw);
    let s = sin(yaw);
    return vec3<f32>(c * v.x + s * v.z, v.y, c * v.z - s * v.x);
}

@vertex
fn vs_box(v: CubeVertex, b: BoxInstance) -> BoxOut {
    let yaw = b.center_yaw.w;
    let world = b.center_yaw.xyz + turn(v.position * b.size.xyz, yaw);

    var out: BoxOut;
    out.clip = uniforms.view_proj * vec4<f32>(world, 1.0);
    out.normal = turn(v.normal, yaw);
    out.color = b.color;
    out.world = world;
    return out;
}

@fragment
fn fs_box(in: BoxOut) -> @location(0) vec4<f32> {
    let sun = normalize(vec3<f32>(0.4, 1.0, 0.3));
    let lambert = max(dot(normalize(in.normal), sun), 0.0);
    let lit = in.color.rgb * (0.35 + 0.65 * lambert);
    return vec4<f32>(mix(lit, SKY, fog_at(in.world)), in.color.a);
}
"#;

/// Floor grid lines, fogged like the boxes.
pub const GRID_SHADER: &str = r#"
struct LineVertex {
    @location(0) position: vec3<f32>,
    @location(1) color: vec4<f32>,
};

struct LineOut {
    @builtin(position) clip: vec4<f32>,
    @location(0) color: vec4<f32>,
    @location(1) world: vec3<f32>,
};

@vertex
fn vs_grid(v: LineVertex) -> LineOut {
    var out: LineOut;
    out.clip = uniforms.view_proj * vec4<f32>(v.position, 1.0);
    out.color = v.color;
    out.world = v.position;
    return out;
}

@fragment
fn fs_grid(in: LineOut) -> @location(0) vec4<f32> {
    return vec4<f32>(mix(in.color.rgb, SKY, fog_at(in.world)), in.color.a);
}
"#;

/// Full WGSL source for a pipeline: the shared uniforms followed by `body`.
pub fn with_uniforms(body: &str) -> String {
    format!("{UNIFORMS}{body}")
}
