// ============================
// === SHADER GENERATION ===
// ============================

/// Flat ambient term used while no environment map is bound.
pub const FLAT_AMBIENT: f32 = 0.3;

pub fn generate_scene_shader() -> String {
    format!(
        r#"
    struct FrameUniforms {{
        view_proj: mat4x4<f32>,
        model: mat4x4<f32>,
        camera_position: vec3<f32>,
        env_levels: f32,
    }}

    struct MaterialUniforms {{
        base_color_factor: vec4<f32>,
        emissive_factor: vec3<f32>,
        occlusion_strength: f32,
        metallic_factor: f32,
        roughness_factor: f32,
    }}

    @group(0) @binding(0) var<uniform> frame: FrameUniforms;
    @group(1) @binding(0) var environment: texture_2d<f32>;
    @group(2) @binding(0) var<uniform> material: MaterialUniforms;
    @group(2) @binding(1) var base_color_texture: texture_2d<f32>;
    @group(2) @binding(2) var metallic_roughness_texture: texture_2d<f32>;
    @group(2) @binding(3) var occlusion_texture: texture_2d<f32>;
    @group(2) @binding(4) var emissive_texture: texture_2d<f32>;
    @group(2) @binding(5) var material_sampler: sampler;

    struct VertexInput {{
        @location(0) position: vec3<f32>,
        @location(1) normal: vec3<f32>,
        @location(2) uv: vec2<f32>,
    }}

    struct VertexOutput {{
        @builtin(position) clip_position: vec4<f32>,
        @location(0) world_position: vec3<f32>,
        @location(1) normal: vec3<f32>,
        @location(2) uv: vec2<f32>,
    }}

    const PI: f32 = 3.14159265359;
    const FLAT_AMBIENT: f32 = {flat_ambient:.4};

    @vertex
    fn vs_main(vertex: VertexInput) -> VertexOutput {{
        let world = frame.model * vec4<f32>(vertex.position, 1.0);
        var out: VertexOutput;
        out.clip_position = frame.view_proj * world;
        out.world_position = world.xyz;
        // Model transform is a pure rotation
        out.normal = (frame.model * vec4<f32>(vertex.normal, 0.0)).xyz;
        out.uv = vertex.uv;
        return out;
    }}

    fn equirect_uv(dir: vec3<f32>) -> vec2<f32> {{
        let u = atan2(dir.z, dir.x) / (2.0 * PI) + 0.5;
        let v = asin(clamp(dir.y, -1.0, 1.0)) / PI + 0.5;
        return vec2<f32>(u, 1.0 - v);
    }}

    fn sample_environment(dir: vec3<f32>, level: f32) -> vec3<f32> {{
        let lod = i32(clamp(round(level), 0.0, frame.env_levels - 1.0));
        let size = vec2<f32>(textureDimensions(environment, lod));
        let uv = equirect_uv(normalize(dir));
        let texel = vec2<i32>(clamp(uv * size, vec2<f32>(0.0), size - vec2<f32>(1.0)));
        return textureLoad(environment, texel, lod).rgb;
    }}

    fn fresnel_schlick_roughness(cos_theta: f32, f0: vec3<f32>, roughness: f32) -> vec3<f32> {{
        let grazing = max(vec3<f32>(1.0 - roughness), f0);
        return f0 + (grazing - f0) * pow(clamp(1.0 - cos_theta, 0.0, 1.0), 5.0);
    }}

    @fragment
    fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {{
        let base_sample = textureSample(base_color_texture, material_sampler, in.uv);
        let mr_sample = textureSample(metallic_roughness_texture, material_sampler, in.uv);
        let occlusion_sample = textureSample(occlusion_texture, material_sampler, in.uv).r;
        let emissive_sample = textureSample(emissive_texture, material_sampler, in.uv).rgb;

        let base_color = base_sample * material.base_color_factor;
        let roughness = clamp(mr_sample.g * material.roughness_factor, 0.04, 1.0);
        let metallic = clamp(mr_sample.b * material.metallic_factor, 0.0, 1.0);
        let occlusion = mix(1.0, occlusion_sample, material.occlusion_strength);

        let n = normalize(in.normal);
        let v = normalize(frame.camera_position - in.world_position);
        let n_dot_v = max(dot(n, v), 0.0);
        let f0 = mix(vec3<f32>(0.04), base_color.rgb, metallic);
        let fresnel = fresnel_schlick_roughness(n_dot_v, f0, roughness);
        let kd = (vec3<f32>(1.0) - fresnel) * (1.0 - metallic);

        var ambient: vec3<f32>;
        if (frame.env_levels > 0.0) {{
            let max_level = frame.env_levels - 1.0;
            let reflected = reflect(-v, n);
            let specular = sample_environment(reflected, roughness * max_level) * fresnel;
            let diffuse = sample_environment(n, max_level) * base_color.rgb * kd;
            ambient = diffuse + specular;
        }} else {{
            ambient = vec3<f32>(FLAT_AMBIENT) * (base_color.rgb * kd + fresnel);
        }}

        let color = ambient * occlusion + emissive_sample * material.emissive_factor;
        return vec4<f32>(color, base_color.a);
    }}
    "#,
        flat_ambient = FLAT_AMBIENT,
    )
}

/// Fullscreen pass: RGB channel shift, exposure and ACES filmic tone mapping.
/// Output encoding is left to the target view format.
pub fn generate_post_shader() -> String {
    format!(
        r#"
    struct PostUniforms {{
        shift_amount: f32,
        shift_angle: f32,
        exposure: f32,
        _padding: f32,
    }}

    @group(0) @binding(0) var scene_texture: texture_2d<f32>;
    @group(0) @binding(1) var scene_sampler: sampler;
    @group(0) @binding(2) var<uniform> post: PostUniforms;

    struct VertexOutput {{
        @builtin(position) clip_position: vec4<f32>,
        @location(0) uv: vec2<f32>,
    }}

    @vertex
    fn vs_fullscreen(@builtin(vertex_index) index: u32) -> VertexOutput {{
        let uv = vec2<f32>(f32((index << 1u) & 2u), f32(index & 2u));
        var out: VertexOutput;
        out.clip_position = vec4<f32>(uv * vec2<f32>(2.0, -2.0) + vec2<f32>(-1.0, 1.0), 0.0, 1.0);
        out.uv = uv;
        return out;
    }}

    fn rrt_and_odt_fit(v: vec3<f32>) -> vec3<f32> {{
        let a = v * (v + 0.0245786) - 0.000090537;
        let b = v * (0.983729 * v + 0.4329510) + 0.238081;
        return a / b;
    }}

    fn aces_filmic(hdr: vec3<f32>) -> vec3<f32> {{
        // Column-major sRGB -> AP1 and back
        let aces_input = mat3x3<f32>(
            vec3<f32>(0.59719, 0.07600, 0.02840),
            vec3<f32>(0.35458, 0.90834, 0.13383),
            vec3<f32>(0.04823, 0.01566, 0.83777),
        );
        let aces_output = mat3x3<f32>(
            vec3<f32>(1.60475, -0.10208, -0.00327),
            vec3<f32>(-0.53108, 1.10813, -0.07276),
            vec3<f32>(-0.07367, -0.00605, 1.07602),
        );
        var color = aces_input * (hdr / 0.6);
        color = rrt_and_odt_fit(color);
        color = aces_output * color;
        return clamp(color, vec3<f32>(0.0), vec3<f32>(1.0));
    }}

    fn tone_map(color: vec3<f32>) -> vec3<f32> {{
        return aces_filmic(color * post.exposure);
    }}

    @fragment
    fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {{
        let offset = post.shift_amount * vec2<f32>(cos(post.shift_angle), sin(post.shift_angle));
        let cr = textureSample(scene_texture, scene_sampler, in.uv + offset);
        let cga = textureSample(scene_texture, scene_sampler, in.uv);
        let cb = textureSample(scene_texture, scene_sampler, in.uv - offset);
        let shifted = vec3<f32>(cr.r, cga.g, cb.b);
        return vec4<f32>(tone_map(shifted), cga.a);
    }}
    "#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_shader_applies_exposure_before_aces() {
        let shader = generate_post_shader();
        assert!(shader.contains("return aces_filmic(color * post.exposure);"));
        assert!(shader.contains("fn rrt_and_odt_fit"));
    }

    #[test]
    fn scene_shader_inlines_flat_ambient() {
        assert!(generate_scene_shader().contains("const FLAT_AMBIENT: f32 = 0.3000;"));
    }
}
