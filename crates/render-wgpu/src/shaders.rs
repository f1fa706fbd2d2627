/// Starter WGSL for a model material. The engine prepends the
/// `GlobalUniforms` struct declaration before compiling.
///
/// Bind groups: 0 global uniforms, 1 node transform, 2 instance transforms,
/// 3 material (unused here). Vertex inputs: 0 position, 1 normal.
pub const MODEL_SHADER: &str = r#"@group(0) @binding(0) var<uniform> uGlobalUniforms: GlobalUniforms;

struct LocalUniforms
{
    modelMatrix: mat4x4<f32>
};
@group(1) @binding(0) var<uniform> uLocalUniforms: LocalUniforms;

struct InstanceUniforms
{
    transform: array<mat4x4<f32>, 256>
};
@group(2) @binding(0) var<uniform> uInstanceUniforms: InstanceUniforms;

struct VertexInput
{
    @builtin(instance_index) instanceIndex: u32,
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
};

struct VertexOutput
{
    @builtin(position) position: vec4<f32>,
    @location(0) normal: vec3<f32>,
};

@vertex
fn vertexMain(in: VertexInput) -> VertexOutput
{
    let model = uInstanceUniforms.transform[in.instanceIndex] * uLocalUniforms.modelMatrix;
    var out: VertexOutput;
    out.position = uGlobalUniforms.projectionMatrix * uGlobalUniforms.viewMatrix * model * vec4<f32>(in.position, 1.0);
    out.normal = normalize((model * vec4<f32>(in.normal, 0.0)).xyz);
    return out;
}

@fragment
fn fragmentMain(in: VertexOutput) -> @location(0) vec4<f32>
{
    let lightDir = normalize(vec3<f32>(0.3, 1.0, 0.5));
    let diffuse = max(dot(in.normal, lightDir), 0.0);
    let shade = 0.3 + diffuse * 0.7;
    return vec4<f32>(vec3<f32>(0.8, 0.6, 0.4) * shade, 1.0);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declares_one_entry_point_per_stage() {
        assert_eq!(MODEL_SHADER.matches("@vertex").count(), 1);
        assert_eq!(MODEL_SHADER.matches("@fragment").count(), 1);
    }

    #[test]
    fn relies_on_prelude_struct() {
        assert!(MODEL_SHADER.contains("var<uniform> uGlobalUniforms: GlobalUniforms"));
        assert!(!MODEL_SHADER.contains("struct GlobalUniforms"));
    }
}
