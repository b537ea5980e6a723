use std::collections::HashMap;

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use super::texture;
use crate::scene::{MaterialData, ModelData, Vertex};

impl Vertex {
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: (std::mem::size_of::<[f32; 3]>() * 2) as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x2,
                },
            ],
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct MaterialUniforms {
    pub base_color_factor: [f32; 4],
    pub emissive_factor: [f32; 3],
    pub occlusion_strength: f32,
    pub metallic_factor: f32,
    pub roughness_factor: f32,
    pub _padding: [f32; 2],
}

impl From<&MaterialData> for MaterialUniforms {
    fn from(material: &MaterialData) -> Self {
        Self {
            base_color_factor: material.base_color_factor,
            emissive_factor: material.emissive_factor,
            occlusion_strength: material.occlusion_strength,
            metallic_factor: material.metallic_factor,
            roughness_factor: material.roughness_factor,
            _padding: [0.0; 2],
        }
    }
}

pub fn create_material_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    let texture_entry = |binding| wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    };

    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Material Bind Group Layout"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            texture_entry(1),
            texture_entry(2),
            texture_entry(3),
            texture_entry(4),
            wgpu::BindGroupLayoutEntry {
                binding: 5,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
    })
}

pub struct GpuMesh {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub index_count: u32,
    pub material: usize,
}

/// Device-side copy of a decoded model: one buffer pair per mesh and one bind
/// group per material. Textures shared between slots are uploaded once.
pub struct GpuModel {
    pub meshes: Vec<GpuMesh>,
    pub materials: Vec<wgpu::BindGroup>,
}

impl GpuModel {
    pub fn upload(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: &wgpu::BindGroupLayout,
        sampler: &wgpu::Sampler,
        data: &ModelData,
    ) -> Self {
        let white_srgb = texture::create_white_texture(device, queue, true);
        let white_linear = texture::create_white_texture(device, queue, false);
        let mut views: HashMap<(usize, bool), wgpu::TextureView> = HashMap::new();

        let mut view_for = |index: Option<usize>, srgb: bool| -> Option<(usize, bool)> {
            let index = index.filter(|&i| i < data.textures.len())?;
            views.entry((index, srgb)).or_insert_with(|| {
                texture::create_rgba8_texture(device, queue, &format!("Model Texture {index}"), &data.textures[index], srgb)
            });
            Some((index, srgb))
        };

        let slots: Vec<[Option<(usize, bool)>; 4]> = data
            .materials
            .iter()
            .map(|material| {
                [
                    view_for(material.base_color_texture, true),
                    view_for(material.metallic_roughness_texture, false),
                    view_for(material.occlusion_texture, false),
                    view_for(material.emissive_texture, true),
                ]
            })
            .collect();

        let materials = data
            .materials
            .iter()
            .zip(&slots)
            .enumerate()
            .map(|(index, (material, slot))| {
                let uniforms = MaterialUniforms::from(material);
                let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Material Uniform Buffer"),
                    contents: bytemuck::cast_slice(&[uniforms]),
                    usage: wgpu::BufferUsages::UNIFORM,
                });

                device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some(&format!("Material Bind Group {index}")),
                    layout,
                    entries: &[
                        wgpu::BindGroupEntry { binding: 0, resource: buffer.as_entire_binding() },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: wgpu::BindingResource::TextureView(resolve_view(&views, slot[0], &white_srgb)),
                        },
                        wgpu::BindGroupEntry {
                            binding: 2,
                            resource: wgpu::BindingResource::TextureView(resolve_view(&views, slot[1], &white_linear)),
                        },
                        wgpu::BindGroupEntry {
                            binding: 3,
                            resource: wgpu::BindingResource::TextureView(resolve_view(&views, slot[2], &white_linear)),
                        },
                        wgpu::BindGroupEntry {
                            binding: 4,
                            resource: wgpu::BindingResource::TextureView(resolve_view(&views, slot[3], &white_srgb)),
                        },
                        wgpu::BindGroupEntry { binding: 5, resource: wgpu::BindingResource::Sampler(sampler) },
                    ],
                })
            })
            .collect();

        let meshes = data
            .meshes
            .iter()
            .filter(|mesh| !mesh.indices.is_empty())
            .map(|mesh| GpuMesh {
                vertex_buffer: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Mesh Vertex Buffer"),
                    contents: bytemuck::cast_slice(&mesh.vertices),
                    usage: wgpu::BufferUsages::VERTEX,
                }),
                index_buffer: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Mesh Index Buffer"),
                    contents: bytemuck::cast_slice(&mesh.indices),
                    usage: wgpu::BufferUsages::INDEX,
                }),
                index_count: mesh.indices.len() as u32,
                material: mesh.material,
            })
            .collect();

        Self { meshes, materials }
    }

    pub fn draw(&self, render_pass: &mut wgpu::RenderPass<'_>) {
        for mesh in &self.meshes {
            let Some(material) = self.materials.get(mesh.material) else {
                continue;
            };
            render_pass.set_bind_group(2, material, &[]);
            render_pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
            render_pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            render_pass.draw_indexed(0..mesh.index_count, 0, 0..1);
        }
    }
}

fn resolve_view<'a>(
    views: &'a HashMap<(usize, bool), wgpu::TextureView>,
    key: Option<(usize, bool)>,
    fallback: &'a wgpu::TextureView,
) -> &'a wgpu::TextureView {
    key.and_then(|key| views.get(&key)).unwrap_or(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn material_uniforms_match_shader_layout() {
        // vec4 + vec3 + 3 scalars, rounded up to 16 bytes
        assert_eq!(std::mem::size_of::<MaterialUniforms>(), 48);
    }

    #[test]
    fn vertex_layout_covers_whole_vertex() {
        let layout = Vertex::desc();
        assert_eq!(layout.array_stride, 32);
        assert_eq!(layout.attributes.len(), 3);
        assert_eq!(layout.attributes[2].offset, 24);
    }

    #[test]
    fn uniforms_copy_material_factors() {
        let material = MaterialData { metallic_factor: 0.25, roughness_factor: 0.75, ..Default::default() };
        let uniforms = MaterialUniforms::from(&material);
        assert_eq!(uniforms.metallic_factor, 0.25);
        assert_eq!(uniforms.roughness_factor, 0.75);
        assert_eq!(uniforms.base_color_factor, material.base_color_factor);
    }
}
