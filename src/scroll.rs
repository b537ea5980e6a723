use winit::event::MouseScrollDelta;

use crate::config::{SCROLL_LERP, SCROLL_LINE_HEIGHT, SCROLL_WHEEL_MULTIPLIER};

// Below this distance (px) the animation snaps to its target and stops.
const SETTLE_DISTANCE: f32 = 0.5;

/// Frame-rate independent exponential approach of `current` toward `target`.
pub fn damp(current: f32, target: f32, lambda: f32, dt: f32) -> f32 {
    let t = 1.0 - (-lambda * dt).exp();
    current + (target - current) * t
}

/// Wheel delta in page pixels; positive scrolls down the page.
pub fn wheel_delta_pixels(delta: MouseScrollDelta) -> f32 {
    match delta {
        MouseScrollDelta::LineDelta(_, y) => -y * SCROLL_LINE_HEIGHT,
        MouseScrollDelta::PixelDelta(position) => -position.y as f32,
    }
}

/// Inertial scroll: wheel input moves a target, each frame eases the visible
/// position toward it.
#[derive(Clone, Debug)]
pub struct SmoothScroll {
    animated: f32,
    target: f32,
    limit: f32,
    lerp: f32,
    wheel_multiplier: f32,
    last_time_ms: Option<f64>,
    scrolling: bool,
}

impl Default for SmoothScroll {
    fn default() -> Self {
        Self::new(SCROLL_LERP, SCROLL_WHEEL_MULTIPLIER)
    }
}

impl SmoothScroll {
    pub fn new(lerp: f32, wheel_multiplier: f32) -> Self {
        Self {
            animated: 0.0,
            target: 0.0,
            limit: 0.0,
            lerp,
            wheel_multiplier,
            last_time_ms: None,
            scrolling: false,
        }
    }

    #[cfg(test)]
    pub(crate) fn position(&self) -> f32 {
        self.animated
    }

    #[cfg(test)]
    pub(crate) fn target(&self) -> f32 {
        self.target
    }

    pub fn is_scrolling(&self) -> bool {
        self.scrolling
    }

    /// Maximum scroll offset; zero when there is nothing to scroll.
    pub fn set_limit(&mut self, limit: f32) {
        self.limit = limit.max(0.0);
        self.target = self.target.clamp(0.0, self.limit);
        if self.animated > self.limit {
            self.animated = self.limit;
        }
    }

    /// Adopts a position the page reached on its own (keyboard, scrollbar drag).
    /// Ignored while an animation is in flight.
    pub fn sync(&mut self, position: f32) {
        if self.is_scrolling() {
            return;
        }
        let position = position.clamp(0.0, self.limit);
        self.animated = position;
        self.target = position;
    }

    pub fn on_wheel(&mut self, delta_pixels: f32) {
        let target = (self.target + delta_pixels * self.wheel_multiplier).clamp(0.0, self.limit);
        if target != self.target || target != self.animated {
            self.target = target;
            self.scrolling = true;
        }
    }

    /// Advances the animation to `time_ms`. Returns the new position when it moved.
    pub fn raf(&mut self, time_ms: f64) -> Option<f32> {
        let dt = match self.last_time_ms.replace(time_ms) {
            Some(last) => ((time_ms - last) / 1000.0).max(0.0) as f32,
            None => 0.0,
        };
        if !self.scrolling {
            return None;
        }

        self.animated = damp(self.animated, self.target, self.lerp * 60.0, dt);
        if (self.animated - self.target).abs() < SETTLE_DISTANCE {
            self.animated = self.target;
            self.scrolling = false;
        }
        Some(self.animated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use winit::dpi::PhysicalPosition;

    fn run_frames(scroll: &mut SmoothScroll, start_ms: f64, frames: usize) -> Vec<f32> {
        (1..=frames)
            .filter_map(|i| scroll.raf(start_ms + i as f64 * 1000.0 / 60.0))
            .collect()
    }

    #[test]
    fn damp_is_frame_rate_independent() {
        let one_step = damp(0.0, 100.0, 6.0, 0.1);
        let two_steps = damp(damp(0.0, 100.0, 6.0, 0.05), 100.0, 6.0, 0.05);
        assert!((one_step - two_steps).abs() < 1e-3);
    }

    #[test]
    fn wheel_eases_toward_target_and_settles() {
        let mut scroll = SmoothScroll::default();
        scroll.set_limit(1000.0);
        scroll.raf(0.0);
        scroll.on_wheel(200.0);

        let positions = run_frames(&mut scroll, 0.0, 240);
        assert!(positions.windows(2).all(|w| w[1] >= w[0]));
        assert!(positions[0] > 0.0 && positions[0] < 200.0);
        assert_eq!(scroll.position(), 200.0);
        assert!(!scroll.is_scrolling());
    }

    #[test]
    fn target_is_clamped_to_limit() {
        let mut scroll = SmoothScroll::default();
        scroll.set_limit(50.0);
        scroll.on_wheel(500.0);
        assert_eq!(scroll.target(), 50.0);
        scroll.on_wheel(-900.0);
        assert_eq!(scroll.target(), 0.0);
    }

    #[test]
    fn wheel_after_sync_eases_from_page_position() {
        let mut scroll = SmoothScroll::default();
        scroll.set_limit(1000.0);
        scroll.raf(0.0);
        scroll.sync(300.0);
        scroll.on_wheel(100.0);
        assert_eq!(scroll.target(), 400.0);

        let positions = run_frames(&mut scroll, 0.0, 240);
        assert!(positions[0] > 300.0 && positions[0] < 400.0);
        assert_eq!(scroll.position(), 400.0);
    }

    #[test]
    fn sync_is_ignored_mid_animation() {
        let mut scroll = SmoothScroll::default();
        scroll.set_limit(1000.0);
        scroll.raf(0.0);
        scroll.on_wheel(200.0);
        scroll.raf(1000.0 / 60.0);
        let position = scroll.position();

        scroll.sync(900.0);
        assert_eq!(scroll.position(), position);
        assert_eq!(scroll.target(), 200.0);
    }

    #[test]
    fn nothing_to_scroll_without_limit() {
        let mut scroll = SmoothScroll::default();
        scroll.on_wheel(120.0);
        assert!(!scroll.is_scrolling());
        assert_eq!(scroll.raf(16.0), None);
        assert_eq!(scroll.position(), 0.0);
    }

    #[test]
    fn wheel_deltas_point_down_the_page() {
        assert!(wheel_delta_pixels(MouseScrollDelta::LineDelta(0.0, -1.0)) > 0.0);
        assert_eq!(
            wheel_delta_pixels(MouseScrollDelta::PixelDelta(PhysicalPosition::new(0.0, 40.0))),
            -40.0
        );
    }
}
