// src/fps_counter.rs
use std::time::Instant;

/// Ring-buffer frame timer. `tick` once per frame, read averages whenever.
pub struct FpsCounter {
    frame_times: [f32; 128], // last N frame times (ms)
    index: usize,
    last_instant: Instant,
    frames: usize,
}

impl FpsCounter {
    pub fn new() -> Self {
        Self {
            frame_times: [0.0; 128],
            index: 0,
            last_instant: Instant::now(),
            frames: 0,
        }
    }

    /// Call once per frame to record timing. Returns seconds since the
    /// previous tick.
    pub fn tick(&mut self) -> f32 {
        let now = Instant::now();
        let dt = now.duration_since(self.last_instant).as_secs_f32();
        self.last_instant = now;
        self.frame_times[self.index] = dt * 1000.0;
        self.index = (self.index + 1) % self.frame_times.len();
        self.frames += 1;
        dt
    }

    /// Averaged (fps, frame time ms) over the buffer.
    pub fn averaged(&self) -> (f32, f32) {
        let mut sum = 0.0f32;
        let mut count = 0;
        for &v in &self.frame_times {
            if v > 0.0 {
                sum += v;
                count += 1;
            }
        }
        if count == 0 {
            return (0.0, 0.0);
        }
        let avg_ms = sum / count as f32;
        (1000.0 / avg_ms, avg_ms)
    }

    /// Periodic log every N frames.
    pub fn log_every(&self, every: usize) {
        if every > 0 && self.frames % every == 0 {
            let (fps, ms) = self.averaged();
            log::info!("fps: {fps:.1}, frame time: {ms:.3} ms");
        }
    }
}

impl Default for FpsCounter {
    fn default() -> Self {
        Self::new()
    }
}
