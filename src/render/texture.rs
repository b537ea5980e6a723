use image::imageops::{self, FilterType};
use wgpu::util::DeviceExt;

use crate::assets::EnvironmentMap;
use crate::scene::TextureData;

pub const HDR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24Plus;
pub const ENVIRONMENT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;

const WHITE: TextureData = TextureData { width: 1, height: 1, pixels: Vec::new() };

/// Full RGBA8 mip chain, level 0 first, as one contiguous buffer.
pub fn mip_chain(texture: &TextureData) -> (u32, Vec<u8>) {
    let Some(base) = image::RgbaImage::from_raw(texture.width, texture.height, texture.pixels.clone()) else {
        log::warn!("Texture {}x{} has a short pixel buffer, using white", texture.width, texture.height);
        return (1, vec![255; 4]);
    };

    let mut levels = 1;
    let mut data = base.as_raw().clone();
    let (mut width, mut height) = base.dimensions();
    let mut previous = base;
    while width > 1 || height > 1 {
        width = (width / 2).max(1);
        height = (height / 2).max(1);
        let next = imageops::resize(&previous, width, height, FilterType::Triangle);
        data.extend_from_slice(next.as_raw());
        previous = next;
        levels += 1;
    }
    (levels, data)
}

pub fn create_rgba8_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    label: &str,
    texture: &TextureData,
    srgb: bool,
) -> wgpu::TextureView {
    let (width, height, levels, data) = if texture.pixels.is_empty() {
        (1, 1, 1, vec![255u8; 4])
    } else {
        let (levels, data) = mip_chain(texture);
        if levels == 1 && data.len() == 4 {
            (1, 1, 1, data)
        } else {
            (texture.width, texture.height, levels, data)
        }
    };

    let format = if srgb {
        wgpu::TextureFormat::Rgba8UnormSrgb
    } else {
        wgpu::TextureFormat::Rgba8Unorm
    };
    let gpu_texture = device.create_texture_with_data(
        queue,
        &wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
            mip_level_count: levels,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        },
        wgpu::util::TextureDataOrder::LayerMajor,
        &data,
    );
    gpu_texture.create_view(&wgpu::TextureViewDescriptor::default())
}

/// 1x1 white stand-in for material slots without a texture.
pub fn create_white_texture(device: &wgpu::Device, queue: &wgpu::Queue, srgb: bool) -> wgpu::TextureView {
    create_rgba8_texture(device, queue, "White Texture", &WHITE, srgb)
}

/// Uploads the environment radiance chain. Without an environment a single
/// black texel is bound and the shader falls back to flat lighting.
pub fn create_environment_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    environment: Option<&EnvironmentMap>,
) -> wgpu::TextureView {
    let (width, height, levels, texels) = match environment {
        Some(map) => {
            let texels: Vec<[f32; 4]> = map.levels.iter().flat_map(|level| level.texels.iter().copied()).collect();
            (map.width(), map.height(), map.level_count(), texels)
        }
        None => (1, 1, 1, vec![[0.0; 4]]),
    };

    let texture = device.create_texture_with_data(
        queue,
        &wgpu::TextureDescriptor {
            label: Some("Environment Texture"),
            size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
            mip_level_count: levels,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: ENVIRONMENT_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        },
        wgpu::util::TextureDataOrder::LayerMajor,
        bytemuck::cast_slice(&texels),
    );
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mip_chain_runs_down_to_one_texel() {
        let texture = TextureData { width: 8, height: 2, pixels: vec![200; 8 * 2 * 4] };
        let (levels, data) = mip_chain(&texture);
        // 8x2, 4x1, 2x1, 1x1
        assert_eq!(levels, 4);
        assert_eq!(data.len(), (16 + 4 + 2 + 1) * 4);
        assert!(data.iter().all(|&v| v == 200));
    }

    #[test]
    fn short_pixel_buffer_falls_back_to_white() {
        let texture = TextureData { width: 4, height: 4, pixels: vec![0; 7] };
        assert_eq!(mip_chain(&texture), (1, vec![255; 4]));
    }
}
