use std::collections::VecDeque;
use std::time::Instant;

/// Compteur FPS par fenêtre glissante. Zéro allocation après init.
///
/// # Example
/// ```
/// use gg_render::fps::FpsCounter;
/// let mut counter = FpsCounter::new(30);
/// counter.tick();
/// assert!(counter.fps() >= 0.0);
/// ```
pub struct FpsCounter {
    /// Timestamps des dernières N frames.
    timestamps: VecDeque<Instant>,
    window: usize,
    fps: f64,
    /// Temps de la dernière frame en ms.
    pub frame_time_ms: f64,
}

impl FpsCounter {
    /// Counter averaging over the last `window` frames (at least 2).
    #[must_use]
    pub fn new(window: usize) -> Self {
        let window = window.max(2);
        Self {
            timestamps: VecDeque::with_capacity(window + 1),
            window,
            fps: 0.0,
            frame_time_ms: 0.0,
        }
    }

    /// Appeler une fois par frame, après la présentation.
    pub fn tick(&mut self) {
        self.tick_at(Instant::now());
    }

    /// Same as [`FpsCounter::tick`] with an explicit timestamp.
    pub fn tick_at(&mut self, now: Instant) {
        if let Some(&last) = self.timestamps.back() {
            self.frame_time_ms = now.saturating_duration_since(last).as_secs_f64() * 1000.0;
        }
        self.timestamps.push_back(now);
        if self.timestamps.len() > self.window {
            self.timestamps.pop_front();
        }
        if let Some(&first) = self.timestamps.front() {
            let secs = now.saturating_duration_since(first).as_secs_f64();
            if self.timestamps.len() >= 2 && secs > 0.0 {
                self.fps = (self.timestamps.len() - 1) as f64 / secs;
            }
        }
    }

    /// FPS moyen sur la fenêtre.
    #[must_use]
    pub fn fps(&self) -> f64 {
        self.fps
    }
}
