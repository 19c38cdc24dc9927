use std::time::{Duration, Instant};

const WINDOW: Duration = Duration::from_secs(1);

/// Counts render ticks per rolling one-second window.
#[derive(Clone, Debug)]
pub struct FpsCounter {
    window_start: Instant,
    ticks: u32,
    fps: u32,
}

impl FpsCounter {
    pub fn new(now: Instant) -> Self {
        Self {
            window_start: now,
            ticks: 0,
            fps: 0,
        }
    }

    /// Records one tick. Returns the new rate when a window closes.
    pub fn tick(&mut self, now: Instant) -> Option<u32> {
        self.ticks += 1;
        if now.duration_since(self.window_start) < WINDOW {
            return None;
        }
        self.fps = self.ticks;
        self.ticks = 0;
        self.window_start = now;
        Some(self.fps)
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }
}
