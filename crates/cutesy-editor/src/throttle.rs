use std::time::Duration;
use std::time::Instant;

/// Leading-edge rate limiter.
///
/// The first call in a window is admitted and opens the window; later calls inside it are
/// dropped. The first call after the window elapses opens the next one.
#[derive(Debug, Clone)]
pub struct Throttle {
    interval: Duration,
    window_start: Option<Instant>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            window_start: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn admit(&mut self) -> bool {
        self.admit_at(Instant::now())
    }

    pub fn admit_at(&mut self, now: Instant) -> bool {
        if let Some(start) = self.window_start {
            if now.saturating_duration_since(start) < self.interval {
                return false;
            }
        }
        self.window_start = Some(now);
        true
    }

    pub fn reset(&mut self) {
        self.window_start = None;
    }
}
