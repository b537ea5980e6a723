use glam::Vec2;
use winit::event::TouchPhase;

use crate::config::{ROTATION_RANGE, Viewport};

/// Rotation target for a pointer at physical position (`x`, `y`).
///
/// Each axis is normalized to [-0.5, 0.5] across the viewport and scaled by
/// `ROTATION_RANGE`. Returns (x = pitch from vertical, y = yaw from horizontal).
pub fn rotation_target(x: f64, y: f64, viewport: &Viewport) -> Vec2 {
    let nx = (x / viewport.width as f64 - 0.5) as f32;
    let ny = (y / viewport.height as f64 - 0.5) as f32;
    Vec2::new(ny * ROTATION_RANGE, nx * ROTATION_RANGE)
}

/// Follows the first active finger; later fingers are ignored until it lifts.
#[derive(Clone, Copy, Debug, Default)]
pub struct TouchTracker {
    primary: Option<u64>,
}

impl TouchTracker {
    #[cfg(test)]
    pub(crate) fn primary(&self) -> Option<u64> {
        self.primary
    }

    /// Feeds one touch event. Returns true when the event's position should drive rotation.
    pub fn on_touch(&mut self, id: u64, phase: TouchPhase) -> bool {
        match phase {
            TouchPhase::Started => {
                if self.primary.is_none() {
                    self.primary = Some(id);
                }
                false
            }
            TouchPhase::Moved => {
                // A move from a finger we never saw start still counts if nothing is tracked.
                if self.primary.is_none() {
                    self.primary = Some(id);
                }
                self.primary == Some(id)
            }
            TouchPhase::Ended | TouchPhase::Cancelled => {
                if self.primary == Some(id) {
                    self.primary = None;
                }
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    const EPS: f32 = 1e-6;

    #[test]
    fn center_maps_to_zero_rotation() {
        let viewport = Viewport::new(1280, 720, 1.0);
        let target = rotation_target(640.0, 360.0, &viewport);
        assert_eq!(target, Vec2::ZERO);
    }

    #[test]
    fn horizontal_edges_map_to_half_range_yaw() {
        let viewport = Viewport::new(1000, 800, 2.0);
        let right = rotation_target(1000.0, 400.0, &viewport);
        let left = rotation_target(0.0, 400.0, &viewport);
        assert!((right.y - 0.17 * PI * 0.5).abs() < EPS);
        assert!((left.y + 0.17 * PI * 0.5).abs() < EPS);
        assert!(right.x.abs() < EPS && left.x.abs() < EPS);
    }

    #[test]
    fn vertical_position_drives_pitch() {
        let viewport = Viewport::new(1000, 800, 1.0);
        let bottom = rotation_target(500.0, 800.0, &viewport);
        assert!((bottom.x - ROTATION_RANGE * 0.5).abs() < EPS);
        assert!(bottom.y.abs() < EPS);
    }

    #[test]
    fn only_first_finger_drives_rotation() {
        let mut touches = TouchTracker::default();
        assert!(!touches.on_touch(1, TouchPhase::Started));
        assert!(!touches.on_touch(2, TouchPhase::Started));
        assert!(touches.on_touch(1, TouchPhase::Moved));
        assert!(!touches.on_touch(2, TouchPhase::Moved));

        assert!(!touches.on_touch(1, TouchPhase::Ended));
        assert_eq!(touches.primary(), None);
        // Remaining finger takes over on its next move.
        assert!(touches.on_touch(2, TouchPhase::Moved));
    }

    #[test]
    fn cancel_releases_primary() {
        let mut touches = TouchTracker::default();
        touches.on_touch(7, TouchPhase::Started);
        touches.on_touch(7, TouchPhase::Cancelled);
        assert_eq!(touches.primary(), None);
    }
}
