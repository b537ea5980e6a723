use bitflags::bitflags;
use winit::event::{MouseScrollDelta, TouchPhase};

use crate::assets::{AssetEvent, EnvironmentMap};
use crate::config::{CAMERA_DEPTH_DESKTOP, ROTATION_DURATION, ViewerConfig, Viewport};
use crate::error::AssetError;
use crate::input::{TouchTracker, rotation_target};
use crate::scene::{Camera, ModelData, Scene};
use crate::scroll::{SmoothScroll, wheel_delta_pixels};
use crate::tween::{Easing, RotationTween};

bitflags! {
    /// What the renderer has to re-upload before the next frame.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct DirtyFlags: u8 {
        const SURFACE = 1 << 0;
        const ENVIRONMENT = 1 << 1;
        const MODEL = 1 << 2;
    }
}

/// Everything the handlers mutate: one per viewer, passed to each handler
/// explicitly. Holds no GPU state, the renderer reads it once per frame.
pub struct ViewerContext {
    pub config: ViewerConfig,
    pub viewport: Viewport,
    pub scene: Scene,
    pub camera: Camera,
    pub rotation: RotationTween,
    pub scroll: SmoothScroll,
    pub touch: TouchTracker,
    pub dirty: DirtyFlags,
}

impl ViewerContext {
    /// Builds the context and runs the startup resize so the first frame already
    /// has the right camera depth.
    pub fn new(config: ViewerConfig, viewport: Viewport) -> Self {
        let mut context = Self {
            camera: Camera::new(viewport.aspect()),
            config,
            viewport,
            scene: Scene::default(),
            rotation: RotationTween::new(ROTATION_DURATION, Easing::Power3Out),
            scroll: SmoothScroll::default(),
            touch: TouchTracker::default(),
            dirty: DirtyFlags::empty(),
        };
        context.camera.set_depth(CAMERA_DEPTH_DESKTOP);
        context.handle_resize(viewport);
        context
    }

    pub fn pixel_ratio(&self) -> f64 {
        self.viewport.pixel_ratio(self.config.render.pixel_ratio_cap)
    }

    pub fn render_size(&self) -> (u32, u32) {
        self.viewport.render_size(self.config.render.pixel_ratio_cap)
    }

    // === INPUT HANDLERS ===

    pub fn handle_resize(&mut self, viewport: Viewport) {
        self.viewport = viewport;

        self.camera.aspect = viewport.aspect();
        self.camera.update_projection_matrix();
        if let Some(depth) = self.config.depth_policy.depth_for_width(viewport.logical_width()) {
            self.camera.set_depth(depth);
        }

        self.dirty |= DirtyFlags::SURFACE;
    }

    /// Retargets the model rotation toward the pointer. No-op until a model exists.
    pub fn handle_pointer_move(&mut self, x: f64, y: f64, now: f32) -> bool {
        if self.scene.model.is_none() {
            return false;
        }
        self.rotation.retarget(now, rotation_target(x, y, &self.viewport));
        true
    }

    pub fn handle_touch(&mut self, id: u64, phase: TouchPhase, x: f64, y: f64, now: f32) -> bool {
        if self.scene.model.is_none() {
            return false;
        }
        self.touch.on_touch(id, phase) && self.handle_pointer_move(x, y, now)
    }

    pub fn handle_wheel(&mut self, delta: MouseScrollDelta) {
        self.scroll.on_wheel(wheel_delta_pixels(delta));
    }

    // === LOAD COMPLETION ===

    pub fn handle_asset(&mut self, event: AssetEvent) {
        match event {
            AssetEvent::Environment(result) => self.complete_environment_load(result),
            AssetEvent::Model(result) => self.complete_model_load(result),
        }
    }

    pub fn complete_environment_load(&mut self, result: Result<EnvironmentMap, AssetError>) {
        match result {
            Ok(environment) => {
                log::info!(
                    "Environment ready: {}x{} with {} levels",
                    environment.width(),
                    environment.height(),
                    environment.level_count()
                );
                self.scene.set_environment(environment);
                self.dirty |= DirtyFlags::ENVIRONMENT;
            }
            Err(err) => log::warn!("Environment unavailable, using flat lighting: {err}"),
        }
    }

    pub fn complete_model_load(&mut self, result: Result<ModelData, AssetError>) {
        match result {
            Ok(data) => {
                log::info!(
                    "Model ready: {} meshes, {} triangles",
                    data.meshes.len(),
                    data.triangle_count()
                );
                self.scene.add_model(data);
                self.dirty |= DirtyFlags::MODEL;
            }
            Err(err) => log::error!("An error happened: {err}"),
        }
    }

    // === FRAME ===

    /// Per-frame state advance, scroll first. Returns the new page scroll offset
    /// when it moved.
    pub fn advance_frame(&mut self, now: f32) -> Option<f32> {
        let scrolled = self.scroll.raf(now as f64 * 1000.0);
        if let Some(model) = self.scene.model.as_mut() {
            model.rotation = self.rotation.advance(now);
        }
        scrolled
    }

    pub fn take_dirty(&mut self) -> DirtyFlags {
        std::mem::replace(&mut self.dirty, DirtyFlags::empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CAMERA_DEPTH_MOBILE, DepthPolicy};
    use glam::Vec2;
    use std::cell::RefCell;

    thread_local! {
        static RECORDS: RefCell<Vec<(log::Level, String)>> = const { RefCell::new(Vec::new()) };
    }

    struct CaptureLogger;

    impl log::Log for CaptureLogger {
        fn enabled(&self, _: &log::Metadata) -> bool {
            true
        }

        fn log(&self, record: &log::Record) {
            RECORDS.with(|records| records.borrow_mut().push((record.level(), record.args().to_string())));
        }

        fn flush(&self) {}
    }

    static LOGGER: CaptureLogger = CaptureLogger;

    fn capture_logs() {
        let _ = log::set_logger(&LOGGER);
        log::set_max_level(log::LevelFilter::Trace);
        RECORDS.with(|records| records.borrow_mut().clear());
    }

    fn diagnostics() -> Vec<(log::Level, String)> {
        RECORDS.with(|records| {
            records
                .borrow()
                .iter()
                .filter(|(level, _)| *level <= log::Level::Warn)
                .cloned()
                .collect()
        })
    }

    fn desktop() -> Viewport {
        Viewport::new(1280, 720, 1.0)
    }

    fn loaded_context() -> ViewerContext {
        let mut context = ViewerContext::new(ViewerConfig::default(), desktop());
        context.complete_model_load(Ok(ModelData::default()));
        context
    }

    #[test]
    fn startup_depth_follows_policy() {
        let phone = Viewport::new(750, 1334, 2.0); // 375 logical
        let recompute = ViewerContext::new(ViewerConfig::default(), phone);
        assert_eq!(recompute.camera.position.z, CAMERA_DEPTH_MOBILE);

        let fixed_config = ViewerConfig::default().with_depth_policy(DepthPolicy::FixedAtStartup);
        let fixed = ViewerContext::new(fixed_config, phone);
        assert_eq!(fixed.camera.position.z, CAMERA_DEPTH_DESKTOP);
    }

    #[test]
    fn resize_recomputes_depth_only_when_enabled() {
        let mut recompute = ViewerContext::new(ViewerConfig::default(), desktop());
        recompute.handle_resize(Viewport::new(700, 900, 1.0));
        assert_eq!(recompute.camera.position.z, CAMERA_DEPTH_MOBILE);
        recompute.handle_resize(Viewport::new(769, 900, 1.0));
        assert_eq!(recompute.camera.position.z, CAMERA_DEPTH_DESKTOP);

        let fixed_config = ViewerConfig::default().with_depth_policy(DepthPolicy::FixedAtStartup);
        let mut fixed = ViewerContext::new(fixed_config, desktop());
        fixed.handle_resize(Viewport::new(700, 900, 1.0));
        assert_eq!(fixed.camera.position.z, CAMERA_DEPTH_DESKTOP);
    }

    #[test]
    fn resize_sets_aspect_and_capped_pixel_ratio() {
        let mut context = ViewerContext::new(ViewerConfig::default(), desktop());
        context.take_dirty();

        context.handle_resize(Viewport::new(3000, 1500, 3.0));
        assert_eq!(context.camera.aspect, 1000.0 / 500.0);
        assert_eq!(context.pixel_ratio(), 2.0);
        assert_eq!(context.render_size(), (2000, 1000));
        assert!(context.take_dirty().contains(DirtyFlags::SURFACE));

        context.handle_resize(Viewport::new(1024, 768, 1.0));
        assert_eq!(context.camera.aspect, 1024.0 / 768.0);
        assert_eq!(context.pixel_ratio(), 1.0);
    }

    #[test]
    fn pointer_before_model_is_ignored() {
        let mut context = ViewerContext::new(ViewerConfig::default(), desktop());
        assert!(!context.handle_pointer_move(0.0, 0.0, 0.0));
        assert!(!context.handle_touch(1, TouchPhase::Moved, 10.0, 10.0, 0.0));
        assert!(!context.rotation.is_animating());
        assert!(context.touch.primary().is_none());
        context.advance_frame(1.0);
        assert!(context.scene.model.is_none());
    }

    #[test]
    fn pointer_after_model_animates_to_target() {
        let mut context = loaded_context();
        assert!(context.handle_pointer_move(1280.0, 360.0, 0.0));

        context.advance_frame(0.45);
        let halfway = context.scene.model.as_ref().unwrap().rotation;
        assert!(halfway.y > 0.0 && halfway.y < crate::config::ROTATION_RANGE * 0.5);

        context.advance_frame(1.0);
        let settled = context.scene.model.as_ref().unwrap().rotation;
        assert!((settled - Vec2::new(0.0, crate::config::ROTATION_RANGE * 0.5)).length() < 1e-6);
    }

    #[test]
    fn later_pointer_event_wins() {
        let mut context = loaded_context();
        context.handle_pointer_move(1280.0, 360.0, 0.0);
        context.handle_pointer_move(0.0, 360.0, 0.1);
        context.advance_frame(2.0);
        let rotation = context.scene.model.as_ref().unwrap().rotation;
        assert!(rotation.y < 0.0);
    }

    #[test]
    fn touch_end_holds_rotation() {
        let mut context = loaded_context();
        context.handle_touch(3, TouchPhase::Started, 640.0, 360.0, 0.0);
        assert!(context.handle_touch(3, TouchPhase::Moved, 0.0, 0.0, 0.0));
        context.advance_frame(1.0);
        let held = context.scene.model.as_ref().unwrap().rotation;

        assert!(!context.handle_touch(3, TouchPhase::Ended, 640.0, 360.0, 1.0));
        context.advance_frame(3.0);
        assert_eq!(context.scene.model.as_ref().unwrap().rotation, held);
    }

    #[test]
    fn model_failure_logs_once_and_leaves_scene_untouched() {
        capture_logs();
        let mut context = ViewerContext::new(ViewerConfig::default(), desktop());
        context.take_dirty();

        context.complete_model_load(Err(AssetError::MissingAttribute("POSITION")));

        let logged = diagnostics();
        assert_eq!(logged.len(), 1);
        assert_eq!(logged[0].0, log::Level::Error);
        assert!(context.scene.model.is_none());
        assert!(context.take_dirty().is_empty());
    }

    #[test]
    fn environment_failure_keeps_rendering_flat() {
        capture_logs();
        let mut context = ViewerContext::new(ViewerConfig::default(), desktop());
        context.handle_asset(AssetEvent::Environment(Err(AssetError::Status {
            url: "https://example.invalid/env.hdr".to_owned(),
            status: 404,
        })));
        assert!(context.scene.environment.is_none());
        assert_eq!(diagnostics().len(), 1);
    }

    #[test]
    fn successful_loads_mark_uploads() {
        let mut context = ViewerContext::new(ViewerConfig::default(), desktop());
        context.take_dirty();
        let environment = EnvironmentMap::from_texels(2, 1, vec![[1.0; 4]; 2]).unwrap();
        context.handle_asset(AssetEvent::Environment(Ok(environment)));
        context.handle_asset(AssetEvent::Model(Ok(ModelData::default())));
        let dirty = context.take_dirty();
        assert!(dirty.contains(DirtyFlags::ENVIRONMENT | DirtyFlags::MODEL));
        assert!(context.scene.environment.is_some() && context.scene.model.is_some());
    }

    #[test]
    fn wheel_moves_scroll_on_next_frame() {
        let mut context = ViewerContext::new(ViewerConfig::default(), desktop());
        context.scroll.set_limit(500.0);
        context.advance_frame(0.0);
        context.handle_wheel(MouseScrollDelta::PixelDelta(winit::dpi::PhysicalPosition::new(0.0, -100.0)));
        let moved = context.advance_frame(1.0 / 60.0);
        assert!(moved.is_some_and(|offset| offset > 0.0 && offset < 100.0));
    }
}
