mod mesh;
mod post;
mod shaders;
mod texture;

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use wgpu::util::DeviceExt;
use winit::window::Window;

pub use mesh::{GpuMesh, GpuModel, MaterialUniforms};
pub use post::{PostChain, PostUniforms, RenderTargets};
pub use shaders::{FLAT_AMBIENT, generate_post_shader, generate_scene_shader};
pub use texture::{DEPTH_FORMAT, ENVIRONMENT_FORMAT, HDR_FORMAT, mip_chain};

use crate::assets::EnvironmentMap;
use crate::config::{RenderSettings, Viewport};
use crate::context::{DirtyFlags, ViewerContext};
use crate::error::RenderError;
use crate::scene::Vertex;

// ============================
// === GPU DATA ===
// ============================

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct FrameUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub model: [[f32; 4]; 4],
    pub camera_position: [f32; 3],
    /// Mip levels of the bound environment, 0 for flat lighting.
    pub env_levels: f32,
}

impl FrameUniforms {
    pub fn from_context(context: &ViewerContext) -> Self {
        let model = context.scene.model.as_ref().map_or(Mat4::IDENTITY, |model| model.transform());
        let env_levels = context.scene.environment.as_ref().map_or(0, |env| env.level_count());
        Self {
            view_proj: context.camera.view_proj().to_cols_array_2d(),
            model: model.to_cols_array_2d(),
            camera_position: context.camera.position.to_array(),
            env_levels: env_levels as f32,
        }
    }
}

/// Picks the highest supported sample count not above `requested`.
pub fn supported_sample_count(requested: u32, flags: wgpu::TextureFormatFeatureFlags) -> u32 {
    [16, 8, 4, 2]
        .into_iter()
        .filter(|&count| count <= requested)
        .find(|&count| flags.sample_count_supported(count))
        .unwrap_or(1)
}

// ============================
// === RENDERER ===
// ============================

/// Window surface plus every GPU resource of the viewer. Mirrors the
/// `ViewerContext` it is synced from each frame.
pub struct Renderer {
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub window: Arc<Window>,
    output_format: wgpu::TextureFormat,
    max_dimension: u32,
    targets: RenderTargets,
    frame_buffer: wgpu::Buffer,
    frame_bind_group: wgpu::BindGroup,
    environment_layout: wgpu::BindGroupLayout,
    environment_bind_group: wgpu::BindGroup,
    material_layout: wgpu::BindGroupLayout,
    material_sampler: wgpu::Sampler,
    scene_pipeline: wgpu::RenderPipeline,
    post: PostChain,
    model: Option<GpuModel>,
}

impl Renderer {
    /// Creates the surface for `window` and every pipeline. The scene starts
    /// empty; the first `sync` uploads whatever the context already holds.
    pub async fn new(
        window: Arc<Window>,
        viewport: Viewport,
        settings: &RenderSettings,
    ) -> Result<Self, RenderError> {
        cfg_if::cfg_if! {
            if #[cfg(target_arch = "wasm32")] {
                let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
                    backends: wgpu::Backends::BROWSER_WEBGPU,
                    ..Default::default()
                });
            } else {
                let instance = wgpu::Instance::default();
            }
        }

        let surface = instance.create_surface(window.clone())?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                force_fallback_adapter: false,
                compatible_surface: Some(&surface),
            })
            .await?;
        let info = adapter.get_info();
        log::info!("Using adapter {} ({:?})", info.name, info.backend);

        cfg_if::cfg_if! {
            if #[cfg(target_arch = "wasm32")] {
                let limits = wgpu::Limits::downlevel_webgl2_defaults().using_resolution(adapter.limits());
            } else {
                let limits = wgpu::Limits::default().using_resolution(adapter.limits());
            }
        }
        let max_dimension = limits.max_texture_dimension_2d;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Viewer Device"),
                required_features: wgpu::Features::empty(),
                required_limits: limits,
                memory_hints: Default::default(),
                trace: Default::default(),
            })
            .await?;

        let caps = surface.get_capabilities(&adapter);
        let surface_format = *caps.formats.first().ok_or(RenderError::NoSurfaceFormat)?;
        // Transparent clear lets the page show through on the web.
        let alpha_mode = if caps.alpha_modes.contains(&wgpu::CompositeAlphaMode::PreMultiplied) {
            wgpu::CompositeAlphaMode::PreMultiplied
        } else {
            wgpu::CompositeAlphaMode::Auto
        };
        let output_format = if settings.srgb_output {
            surface_format.add_srgb_suffix()
        } else {
            surface_format.remove_srgb_suffix()
        };

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: viewport.width.min(max_dimension),
            height: viewport.height.min(max_dimension),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![output_format],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let format_flags = adapter.get_texture_format_features(HDR_FORMAT).flags;
        let sample_count = supported_sample_count(settings.msaa_samples, format_flags);
        if sample_count != settings.msaa_samples {
            log::warn!("MSAA x{} unsupported, using x{sample_count}", settings.msaa_samples);
        }
        let render_size = viewport.render_size(settings.pixel_ratio_cap);
        let targets = RenderTargets::new(&device, clamp_size(render_size, max_dimension), sample_count);

        // === FRAME UNIFORMS ===

        let frame_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Frame Uniform Buffer"),
            contents: bytemuck::cast_slice(&[FrameUniforms::zeroed()]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let frame_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Frame Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Frame Bind Group"),
            layout: &frame_layout,
            entries: &[wgpu::BindGroupEntry { binding: 0, resource: frame_buffer.as_entire_binding() }],
        });

        // === ENVIRONMENT ===

        let environment_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Environment Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: false },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            }],
        });
        let environment_bind_group = create_environment_bind_group(&device, &queue, &environment_layout, None);

        // === MATERIALS ===

        let material_layout = mesh::create_material_layout(&device);
        let material_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Material Sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        // === PIPELINES ===

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Scene Shader"),
            source: wgpu::ShaderSource::Wgsl(generate_scene_shader().into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Scene Pipeline Layout"),
            bind_group_layouts: &[&frame_layout, &environment_layout, &material_layout],
            push_constant_ranges: &[],
        });

        let scene_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Scene Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[Vertex::desc()],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: HDR_FORMAT,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: Some(wgpu::Face::Back),
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState {
                count: sample_count,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
            cache: None,
        });

        let post = PostChain::new(&device, output_format, settings, &targets);

        log::info!(
            "Renderer ready: {:?} surface {}x{}, scene {}x{} x{sample_count} MSAA",
            surface_format,
            config.width,
            config.height,
            targets.width,
            targets.height
        );

        Ok(Self {
            surface,
            device,
            queue,
            config,
            window,
            output_format,
            max_dimension,
            targets,
            frame_buffer,
            frame_bind_group,
            environment_layout,
            environment_bind_group,
            material_layout,
            material_sampler,
            scene_pipeline,
            post,
            model: None,
        })
    }

    /// Reconfigures the surface at the physical window size and rebuilds the
    /// offscreen targets at the capped render size.
    pub fn resize(&mut self, context: &ViewerContext) {
        let width = context.viewport.width.min(self.max_dimension);
        let height = context.viewport.height.min(self.max_dimension);
        if width != self.config.width || height != self.config.height {
            self.config.width = width;
            self.config.height = height;
            self.surface.configure(&self.device, &self.config);
        }

        let render_size = clamp_size(context.render_size(), self.max_dimension);
        if render_size != (self.targets.width, self.targets.height) {
            self.targets = RenderTargets::new(&self.device, render_size, self.targets.sample_count);
            self.post.set_input(&self.device, &self.targets);
        }
    }

    pub fn reconfigure(&self) {
        self.surface.configure(&self.device, &self.config);
    }

    /// Applies whatever the handlers changed since the last frame.
    pub fn sync(&mut self, context: &mut ViewerContext) {
        let dirty = context.take_dirty();
        if dirty.contains(DirtyFlags::SURFACE) {
            self.resize(context);
        }
        if dirty.contains(DirtyFlags::ENVIRONMENT) {
            self.environment_bind_group =
                create_environment_bind_group(&self.device, &self.queue, &self.environment_layout, context.scene.environment.as_ref());
        }
        if dirty.contains(DirtyFlags::MODEL) {
            self.model = context.scene.model.as_ref().map(|model| {
                GpuModel::upload(&self.device, &self.queue, &self.material_layout, &self.material_sampler, &model.data)
            });
        }
    }

    pub fn render(&mut self, context: &ViewerContext) -> Result<(), wgpu::SurfaceError> {
        self.queue.write_buffer(
            &self.frame_buffer,
            0,
            bytemuck::cast_slice(&[FrameUniforms::from_context(context)]),
        );

        let output = self.surface.get_current_texture()?;
        let view = output.texture.create_view(&wgpu::TextureViewDescriptor {
            format: Some(self.output_format),
            ..Default::default()
        });

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Frame Encoder"),
        });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Pass"),
                color_attachments: &[Some(self.targets.color_attachment(wgpu::Color::TRANSPARENT))],
                depth_stencil_attachment: Some(self.targets.depth_attachment()),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            if let Some(model) = &self.model {
                render_pass.set_pipeline(&self.scene_pipeline);
                render_pass.set_bind_group(0, &self.frame_bind_group, &[]);
                render_pass.set_bind_group(1, &self.environment_bind_group, &[]);
                model.draw(&mut render_pass);
            }
        }

        self.post.draw(&mut encoder, &view);

        self.queue.submit([encoder.finish()]);
        self.window.pre_present_notify();
        output.present();

        Ok(())
    }
}

fn create_environment_bind_group(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    layout: &wgpu::BindGroupLayout,
    environment: Option<&EnvironmentMap>,
) -> wgpu::BindGroup {
    let view = texture::create_environment_texture(device, queue, environment);
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Environment Bind Group"),
        layout,
        entries: &[wgpu::BindGroupEntry { binding: 0, resource: wgpu::BindingResource::TextureView(&view) }],
    })
}

fn clamp_size((width, height): (u32, u32), max_dimension: u32) -> (u32, u32) {
    (width.clamp(1, max_dimension), height.clamp(1, max_dimension))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ViewerConfig;

    #[test]
    fn frame_uniforms_match_shader_layout() {
        // two mat4 + vec3 + f32
        assert_eq!(std::mem::size_of::<FrameUniforms>(), 144);
    }

    #[test]
    fn frame_uniforms_flag_missing_environment() {
        let context = ViewerContext::new(ViewerConfig::default(), Viewport::default());
        let uniforms = FrameUniforms::from_context(&context);
        assert_eq!(uniforms.env_levels, 0.0);
        assert_eq!(uniforms.model, Mat4::IDENTITY.to_cols_array_2d());
        assert_eq!(uniforms.camera_position, context.camera.position.to_array());
    }

    #[test]
    fn sample_count_falls_back_to_supported() {
        use wgpu::TextureFormatFeatureFlags as F;
        let four = F::MULTISAMPLE_X4;
        assert_eq!(supported_sample_count(4, four), 4);
        assert_eq!(supported_sample_count(8, four), 4);
        assert_eq!(supported_sample_count(4, F::empty()), 1);
        assert_eq!(supported_sample_count(1, F::MULTISAMPLE_X4 | F::MULTISAMPLE_X2), 1);
    }

    #[test]
    fn render_size_is_clamped_to_device_limit() {
        assert_eq!(clamp_size((9000, 0), 8192), (8192, 1));
    }
}
