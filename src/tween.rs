use glam::Vec2;

/// Maps elapsed fraction `t` in [0, 1] to interpolation fraction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Easing {
    /// Quartic deceleration, `1 - (1 - t)^4`.
    Power3Out,
}

impl Easing {
    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Power3Out => 1.0 - (1.0 - t).powi(4),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum TweenState {
    Idle { value: Vec2 },
    Animating { from: Vec2, to: Vec2, start: f32 },
}

/// Restartable interpolation of an angle pair (x = pitch, y = yaw).
///
/// `retarget` starts from wherever the current animation is at that instant, so a
/// stream of pointer events yields a continuous follow with no jumps.
#[derive(Clone, Debug)]
pub struct RotationTween {
    state: TweenState,
    duration: f32,
    easing: Easing,
}

impl RotationTween {
    pub fn new(duration: f32, easing: Easing) -> Self {
        Self {
            state: TweenState::Idle { value: Vec2::ZERO },
            duration: duration.max(f32::EPSILON),
            easing,
        }
    }

    pub fn is_animating(&self) -> bool {
        matches!(self.state, TweenState::Animating { .. })
    }

    pub fn target(&self) -> Vec2 {
        match self.state {
            TweenState::Idle { value } => value,
            TweenState::Animating { to, .. } => to,
        }
    }

    /// Value at `now` seconds, without advancing the state.
    pub fn sample(&self, now: f32) -> Vec2 {
        match self.state {
            TweenState::Idle { value } => value,
            TweenState::Animating { from, to, start } => {
                let t = (now - start) / self.duration;
                from + (to - from) * self.easing.apply(t)
            }
        }
    }

    /// Supersedes any animation in flight with one heading to `target`.
    pub fn retarget(&mut self, now: f32, target: Vec2) {
        let from = self.sample(now);
        self.state = TweenState::Animating { from, to: target, start: now };
    }

    /// Samples at `now` and settles to idle once the duration has elapsed.
    pub fn advance(&mut self, now: f32) -> Vec2 {
        let value = self.sample(now);
        if let TweenState::Animating { to, start, .. } = self.state {
            if now - start >= self.duration {
                self.state = TweenState::Idle { value: to };
                return to;
            }
        }
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn power3_out_endpoints_and_shape() {
        assert_eq!(Easing::Power3Out.apply(0.0), 0.0);
        assert_eq!(Easing::Power3Out.apply(1.0), 1.0);
        assert!((Easing::Power3Out.apply(0.5) - 0.9375).abs() < 1e-6);
        assert!((Easing::Power3Out.apply(0.25) - 0.683_593_75).abs() < 1e-6);
        assert_eq!(Easing::Power3Out.apply(2.0), 1.0);
        assert_eq!(Easing::Power3Out.apply(-1.0), 0.0);
    }

    #[test]
    fn reaches_target_within_duration() {
        let mut tween = RotationTween::new(0.9, Easing::Power3Out);
        let target = Vec2::new(0.2, -0.3);
        tween.retarget(1.0, target);
        assert!(tween.is_animating());
        assert_eq!(tween.advance(2.0), target);
        assert!(!tween.is_animating());
        assert_eq!(tween.sample(5.0), target);
    }

    #[test]
    fn monotonic_without_overshoot() {
        let mut tween = RotationTween::new(0.9, Easing::Power3Out);
        let target = Vec2::new(0.25, -0.25);
        tween.retarget(0.0, target);

        let mut previous = Vec2::ZERO;
        for step in 1..=90 {
            let value = tween.sample(step as f32 * 0.01);
            assert!(value.x >= previous.x && value.x <= target.x);
            assert!(value.y <= previous.y && value.y >= target.y);
            previous = value;
        }
        assert!((previous - target).length() < 1e-5);
    }

    #[test]
    fn retarget_continues_from_current_value() {
        let mut tween = RotationTween::new(0.9, Easing::Power3Out);
        tween.retarget(0.0, Vec2::new(1.0, 0.0));
        let midway = tween.sample(0.3);

        tween.retarget(0.3, Vec2::new(-1.0, 0.5));
        assert_eq!(tween.sample(0.3), midway);
        assert_eq!(tween.target(), Vec2::new(-1.0, 0.5));
        assert_eq!(tween.advance(1.5), Vec2::new(-1.0, 0.5));
    }

    #[test]
    fn idle_tween_holds_value() {
        let mut tween = RotationTween::new(0.9, Easing::Power3Out);
        assert_eq!(tween.advance(10.0), Vec2::ZERO);
        assert!(!tween.is_animating());
    }
}
