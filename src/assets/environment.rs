use image::ImageFormat;

use crate::error::AssetError;

// The chain stops once a level is this narrow.
const MIN_LEVEL_WIDTH: u32 = 8;

/// One level of the equirectangular radiance chain, RGBA32F rows from the top.
#[derive(Clone, Debug, PartialEq)]
pub struct EnvironmentLevel {
    pub width: u32,
    pub height: u32,
    pub texels: Vec<[f32; 4]>,
}

impl EnvironmentLevel {
    fn texel(&self, x: u32, y: u32) -> [f32; 4] {
        let x = x.min(self.width - 1);
        let y = y.min(self.height - 1);
        self.texels[(y * self.width + x) as usize]
    }

    /// Box-filtered half-resolution copy.
    fn downsample(&self) -> EnvironmentLevel {
        let width = (self.width / 2).max(1);
        let height = (self.height / 2).max(1);
        let mut texels = Vec::with_capacity((width * height) as usize);
        for y in 0..height {
            for x in 0..width {
                let mut sum = [0.0f32; 4];
                for (dx, dy) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
                    let texel = self.texel(x * 2 + dx, y * 2 + dy);
                    for c in 0..4 {
                        sum[c] += texel[c];
                    }
                }
                texels.push(sum.map(|v| v * 0.25));
            }
        }
        EnvironmentLevel { width, height, texels }
    }
}

/// HDR environment used for image-based lighting. Level 0 is full resolution,
/// each following level halves it; rough surfaces sample further down the chain.
#[derive(Clone, Debug, PartialEq)]
pub struct EnvironmentMap {
    pub levels: Vec<EnvironmentLevel>,
}

impl EnvironmentMap {
    pub fn from_texels(width: u32, height: u32, texels: Vec<[f32; 4]>) -> Result<Self, AssetError> {
        if width == 0 || height == 0 || texels.len() != (width * height) as usize {
            return Err(AssetError::Unsupported(format!(
                "environment of {width}x{height} with {} texels",
                texels.len()
            )));
        }

        let mut levels = vec![EnvironmentLevel { width, height, texels }];
        while let Some(last) = levels.last() {
            if last.width <= MIN_LEVEL_WIDTH || last.height <= 1 {
                break;
            }
            let next = last.downsample();
            levels.push(next);
        }
        Ok(Self { levels })
    }

    pub fn width(&self) -> u32 {
        self.levels[0].width
    }

    pub fn height(&self) -> u32 {
        self.levels[0].height
    }

    pub fn level_count(&self) -> u32 {
        self.levels.len() as u32
    }
}

/// Decodes a Radiance `.hdr` image into an environment map.
pub fn decode_hdr(bytes: &[u8]) -> Result<EnvironmentMap, AssetError> {
    let image = image::load_from_memory_with_format(bytes, ImageFormat::Hdr)?.to_rgba32f();
    let (width, height) = image.dimensions();
    let texels = image
        .into_raw()
        .chunks_exact(4)
        .map(|c| [c[0], c[1], c[2], 1.0])
        .collect();
    EnvironmentMap::from_texels(width, height, texels)
}
