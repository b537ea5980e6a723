#[cfg(not(target_arch = "wasm32"))]
use std::time::Instant;

use crate::config::STATS_UPDATE_INTERVAL;

const STATS_WINDOW: usize = 60;

/// Monotonic clock shared by the frame driver and the input handlers.
pub struct Clock {
    #[cfg(not(target_arch = "wasm32"))]
    start: Instant,
    #[cfg(target_arch = "wasm32")]
    start_time_ms: f64,
}

impl Clock {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_arch = "wasm32"))]
            start: Instant::now(),
            #[cfg(target_arch = "wasm32")]
            start_time_ms: Self::now_ms(),
        }
    }

    pub fn elapsed_seconds(&self) -> f32 {
        #[cfg(not(target_arch = "wasm32"))]
        {
            self.start.elapsed().as_secs_f32()
        }

        #[cfg(target_arch = "wasm32")]
        {
            let now_ms = Self::now_ms();
            ((now_ms - self.start_time_ms) / 1000.0) as f32
        }
    }

    #[cfg(target_arch = "wasm32")]
    fn now_ms() -> f64 {
        web_sys::window()
            .and_then(|w| w.performance())
            .map(|p| p.now())
            .unwrap_or_else(js_sys::Date::now)
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

/// Rolling frame-time window; reports FPS once per `STATS_UPDATE_INTERVAL`.
pub struct FrameStats {
    frame_times: [f32; STATS_WINDOW],
    frame_index: usize,
    update_timer: f32,
    last_frame_time: Option<f32>,
    pub frame_count: u64,
}

impl Default for FrameStats {
    fn default() -> Self {
        Self {
            frame_times: [0.0; STATS_WINDOW],
            frame_index: 0,
            update_timer: 0.0,
            last_frame_time: None,
            frame_count: 0,
        }
    }
}

impl FrameStats {
    /// Records a frame at `now` seconds. Returns the averaged FPS when a report is due.
    pub fn record(&mut self, now: f32) -> Option<f32> {
        let delta = match self.last_frame_time.replace(now) {
            Some(last) => (now - last).max(0.0),
            None => return None,
        };
        self.frame_count += 1;

        self.frame_times[self.frame_index] = delta;
        self.frame_index = (self.frame_index + 1) % STATS_WINDOW;
        self.update_timer += delta;

        if self.update_timer < STATS_UPDATE_INTERVAL {
            return None;
        }
        self.update_timer = 0.0;

        let samples = (self.frame_count as usize).min(STATS_WINDOW);
        let avg_frame_time = self.frame_times.iter().take(samples).sum::<f32>() / samples as f32;
        if avg_frame_time > 0.0 { Some(1.0 / avg_frame_time) } else { None }
    }
}
