use bytemuck::{Pod, Zeroable};
use glam::{EulerRot, Mat4, Vec2, Vec3};

use crate::assets::EnvironmentMap;
use crate::config::{CAMERA_DEPTH_DESKTOP, CAMERA_FAR, CAMERA_FOV_DEGREES, CAMERA_NEAR};

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable, PartialEq)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

// ======================================
// === CAMERA ===
// ======================================

pub struct Camera {
    pub fov_degrees: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub position: Vec3,
    pub target: Vec3,
    pub proj_matrix: Mat4,
    pub view_matrix: Mat4,
}

impl Camera {
    pub fn new(aspect: f32) -> Self {
        let mut camera = Self {
            fov_degrees: CAMERA_FOV_DEGREES,
            aspect,
            near: CAMERA_NEAR,
            far: CAMERA_FAR,
            position: Vec3::new(0.0, 0.0, CAMERA_DEPTH_DESKTOP),
            target: Vec3::ZERO,
            proj_matrix: Mat4::IDENTITY,
            view_matrix: Mat4::IDENTITY,
        };
        camera.update_projection_matrix();
        camera.update_view_matrix();
        camera
    }

    pub fn update_projection_matrix(&mut self) {
        self.proj_matrix =
            Mat4::perspective_rh(self.fov_degrees.to_radians(), self.aspect, self.near, self.far);
    }

    pub fn update_view_matrix(&mut self) {
        self.view_matrix = Mat4::look_at_rh(self.position, self.target, Vec3::Y);
    }

    pub fn set_depth(&mut self, depth: f32) {
        self.position.z = depth;
        self.update_view_matrix();
    }

    #[inline(always)]
    pub fn view_proj(&self) -> Mat4 {
        self.proj_matrix * self.view_matrix
    }
}

// ======================================
// === MODEL DATA ===
// ======================================

/// Decoded RGBA8 image, row-major from the top.
#[derive(Clone, Debug, PartialEq)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MaterialData {
    pub base_color_factor: [f32; 4],
    pub base_color_texture: Option<usize>,
    pub metallic_factor: f32,
    pub roughness_factor: f32,
    pub metallic_roughness_texture: Option<usize>,
    pub occlusion_texture: Option<usize>,
    pub occlusion_strength: f32,
    pub emissive_factor: [f32; 3],
    pub emissive_texture: Option<usize>,
}

impl Default for MaterialData {
    fn default() -> Self {
        Self {
            base_color_factor: [1.0; 4],
            base_color_texture: None,
            metallic_factor: 1.0,
            roughness_factor: 1.0,
            metallic_roughness_texture: None,
            occlusion_texture: None,
            occlusion_strength: 1.0,
            emissive_factor: [0.0; 3],
            emissive_texture: None,
        }
    }
}

/// One triangle list with node transforms already applied.
#[derive(Clone, Debug, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub material: usize,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModelData {
    pub meshes: Vec<MeshData>,
    pub materials: Vec<MaterialData>,
    pub textures: Vec<TextureData>,
}

impl ModelData {
    pub fn triangle_count(&self) -> usize {
        self.meshes.iter().map(|mesh| mesh.indices.len() / 3).sum()
    }
}

pub struct Model {
    pub data: ModelData,
    /// x = pitch, y = yaw, in radians.
    pub rotation: Vec2,
}

impl Model {
    pub fn new(data: ModelData) -> Self {
        Self { data, rotation: Vec2::ZERO }
    }

    pub fn transform(&self) -> Mat4 {
        Mat4::from_euler(EulerRot::XYZ, self.rotation.x, self.rotation.y, 0.0)
    }
}

// ======================================
// === SCENE ===
// ======================================

#[derive(Default)]
pub struct Scene {
    /// Lighting only; never drawn as a background.
    pub environment: Option<EnvironmentMap>,
    pub model: Option<Model>,
}

impl Scene {
    pub fn set_environment(&mut self, environment: EnvironmentMap) {
        self.environment = Some(environment);
    }

    pub fn add_model(&mut self, data: ModelData) {
        self.model = Some(Model::new(data));
    }
}
