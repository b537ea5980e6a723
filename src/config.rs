use std::f32::consts::PI;

// === CONSTANTS ===
pub const DIMX: u32 = 1280;
pub const DIMY: u32 = 720;
pub const WINDOW_TITLE: &str = "WViewer v0.1.0";
pub const CANVAS_ID: &str = "canvas";

pub const ENVIRONMENT_URL: &str =
    "https://dl.polyhaven.org/file/ph-assets/HDRIs/hdr/1k/pond_bridge_night_1k.hdr";
pub const MODEL_URL: &str = "./texture/DamagedHelmet.gltf";

pub const CAMERA_FOV_DEGREES: f32 = 40.0;
pub const CAMERA_NEAR: f32 = 0.1;
pub const CAMERA_FAR: f32 = 100.0;
pub const CAMERA_DEPTH_DESKTOP: f32 = 3.5;
pub const CAMERA_DEPTH_MOBILE: f32 = 7.0;
pub const MOBILE_MAX_WIDTH: f64 = 768.0; // Logical pixels, inclusive.

pub const ROTATION_RANGE: f32 = PI * 0.17;
pub const ROTATION_DURATION: f32 = 0.9; // Seconds
pub const RGB_SHIFT_AMOUNT: f32 = 0.0025;
pub const RGB_SHIFT_ANGLE: f32 = 0.0;
pub const TONE_MAPPING_EXPOSURE: f32 = 1.0;
pub const PIXEL_RATIO_CAP: f64 = 2.0;
pub const MSAA_SAMPLES: u32 = 4;

pub const SCROLL_LERP: f32 = 0.1;
pub const SCROLL_WHEEL_MULTIPLIER: f32 = 1.0;
pub const SCROLL_LINE_HEIGHT: f32 = 100.0 / 6.0;

pub const STATS_UPDATE_INTERVAL: f32 = 0.75; // Seconds between FPS log lines

/// How the camera depth reacts to viewport changes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DepthPolicy {
    /// Depth is 3.5 at startup and never touched again.
    FixedAtStartup,
    /// Depth follows the mobile/desktop threshold at startup and on every resize.
    RecomputeOnResize,
}

impl DepthPolicy {
    /// Camera depth for a viewport of `logical_width`, if this policy drives it.
    pub fn depth_for_width(self, logical_width: f64) -> Option<f32> {
        match self {
            DepthPolicy::FixedAtStartup => None,
            DepthPolicy::RecomputeOnResize => Some(if logical_width <= MOBILE_MAX_WIDTH {
                CAMERA_DEPTH_MOBILE
            } else {
                CAMERA_DEPTH_DESKTOP
            }),
        }
    }
}

/// Ordered post-processing passes. The base pass always comes first.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PostPass {
    Render,
    RgbShift { amount: f32, angle: f32 },
}

#[derive(Clone, Debug, PartialEq)]
pub struct RenderSettings {
    pub exposure: f32,
    pub srgb_output: bool,
    pub pixel_ratio_cap: f64,
    pub msaa_samples: u32,
    pub passes: Vec<PostPass>,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            exposure: TONE_MAPPING_EXPOSURE,
            srgb_output: true,
            pixel_ratio_cap: PIXEL_RATIO_CAP,
            msaa_samples: MSAA_SAMPLES,
            passes: vec![
                PostPass::Render,
                PostPass::RgbShift { amount: RGB_SHIFT_AMOUNT, angle: RGB_SHIFT_ANGLE },
            ],
        }
    }
}

impl RenderSettings {
    /// Channel shift of the first `RgbShift` pass as (amount, angle), zero when absent.
    pub fn rgb_shift(&self) -> (f32, f32) {
        self.passes
            .iter()
            .find_map(|pass| match pass {
                PostPass::RgbShift { amount, angle } => Some((*amount, *angle)),
                PostPass::Render => None,
            })
            .unwrap_or((0.0, 0.0))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ViewerConfig {
    pub model_url: String,
    pub environment_url: String,
    pub canvas_id: String,
    pub depth_policy: DepthPolicy,
    pub render: RenderSettings,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            model_url: MODEL_URL.to_owned(),
            environment_url: ENVIRONMENT_URL.to_owned(),
            canvas_id: CANVAS_ID.to_owned(),
            depth_policy: DepthPolicy::RecomputeOnResize,
            render: RenderSettings::default(),
        }
    }
}

impl ViewerConfig {
    pub fn with_depth_policy(mut self, depth_policy: DepthPolicy) -> Self {
        self.depth_policy = depth_policy;
        self
    }
}

/// Window size in physical pixels plus the device pixel ratio it was reported with.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    pub scale_factor: f64,
}

impl Viewport {
    pub fn new(width: u32, height: u32, scale_factor: f64) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            scale_factor: if scale_factor > 0.0 { scale_factor } else { 1.0 },
        }
    }

    pub fn logical_width(&self) -> f64 {
        self.width as f64 / self.scale_factor
    }

    pub fn logical_height(&self) -> f64 {
        self.height as f64 / self.scale_factor
    }

    pub fn aspect(&self) -> f32 {
        (self.logical_width() / self.logical_height()) as f32
    }

    pub fn pixel_ratio(&self, cap: f64) -> f64 {
        self.scale_factor.min(cap)
    }

    /// Offscreen render size: logical size times the capped pixel ratio.
    pub fn render_size(&self, cap: f64) -> (u32, u32) {
        let ratio = self.pixel_ratio(cap);
        let width = (self.logical_width() * ratio).round() as u32;
        let height = (self.logical_height() * ratio).round() as u32;
        (width.max(1), height.max(1))
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(DIMX, DIMY, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recompute_policy_switches_at_mobile_threshold() {
        let policy = DepthPolicy::RecomputeOnResize;
        assert_eq!(policy.depth_for_width(320.0), Some(CAMERA_DEPTH_MOBILE));
        assert_eq!(policy.depth_for_width(768.0), Some(CAMERA_DEPTH_MOBILE));
        assert_eq!(policy.depth_for_width(768.5), Some(CAMERA_DEPTH_DESKTOP));
        assert_eq!(policy.depth_for_width(1920.0), Some(CAMERA_DEPTH_DESKTOP));
    }

    #[test]
    fn fixed_policy_never_drives_depth() {
        assert_eq!(DepthPolicy::FixedAtStartup.depth_for_width(320.0), None);
        assert_eq!(DepthPolicy::FixedAtStartup.depth_for_width(1920.0), None);
    }

    #[test]
    fn pixel_ratio_is_capped_at_two() {
        assert_eq!(Viewport::new(800, 600, 1.0).pixel_ratio(PIXEL_RATIO_CAP), 1.0);
        assert_eq!(Viewport::new(800, 600, 1.5).pixel_ratio(PIXEL_RATIO_CAP), 1.5);
        assert_eq!(Viewport::new(1200, 900, 3.0).pixel_ratio(PIXEL_RATIO_CAP), 2.0);
    }

    #[test]
    fn render_size_uses_capped_ratio() {
        // 400x300 logical at 3x density renders at 2x.
        let viewport = Viewport::new(1200, 900, 3.0);
        assert_eq!(viewport.render_size(PIXEL_RATIO_CAP), (800, 600));
        assert_eq!(viewport.logical_width(), 400.0);
    }

    #[test]
    fn zero_sized_viewport_is_clamped() {
        let viewport = Viewport::new(0, 0, 0.0);
        assert_eq!((viewport.width, viewport.height), (1, 1));
        assert_eq!(viewport.scale_factor, 1.0);
    }

    #[test]
    fn default_chain_is_render_then_shift() {
        let settings = RenderSettings::default();
        assert_eq!(settings.passes[0], PostPass::Render);
        assert_eq!(settings.rgb_shift(), (RGB_SHIFT_AMOUNT, RGB_SHIFT_ANGLE));
    }
}
