/// WGSL shader for clipped, textured 2D geometry.
///
/// Positions arrive in physical pixels and are mapped to clip space with the
/// target size; colors are premultiplied and multiplied by the texel.
pub const GEOMETRY_SHADER: &str = r#"
struct Screen {
    size: vec2<f32>,
    _pad: vec2<f32>,
};

@group(0) @binding(0)
var<uniform> screen: Screen;

@group(1) @binding(0)
var tex: texture_2d<f32>;
@group(1) @binding(1)
var tex_sampler: sampler;

struct VertexInput {
    @location(0) position: vec2<f32>,
    @location(1) color: vec4<f32>,
    @location(2) tex_coord: vec2<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) color: vec4<f32>,
    @location(1) tex_coord: vec2<f32>,
};

@vertex
fn vs_main(vertex: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.clip_position = vec4<f32>(
        2.0 * vertex.position.x / screen.size.x - 1.0,
        1.0 - 2.0 * vertex.position.y / screen.size.y,
        0.0,
        1.0,
    );
    out.color = vertex.color;
    out.tex_coord = vertex.tex_coord;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return in.color * textureSample(tex, tex_sampler, in.tex_coord);
}
"#;
