use std::time::{Duration, Instant};

/// Horloge de frame : mesure le delta entre deux ticks de la boucle.
///
/// Le delta est borné pour qu'une pause (breakpoint, fenêtre suspendue) ne
/// fasse pas sauter le temps de l'effet.
///
/// # Example
/// ```
/// use std::time::{Duration, Instant};
/// use gg_core::clock::FrameClock;
/// let start = Instant::now();
/// let mut clock = FrameClock::starting_at(start);
/// let dt = clock.tick_at(start + Duration::from_millis(40));
/// assert_eq!(dt, Duration::from_millis(40));
/// assert_eq!(clock.frames(), 1);
/// ```
pub struct FrameClock {
    last: Instant,
    frames: u64,
    max_delta: Duration,
}

impl FrameClock {
    /// Start the clock now.
    #[must_use]
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    /// Start the clock at `start`.
    #[must_use]
    pub fn starting_at(start: Instant) -> Self {
        Self {
            last: start,
            frames: 0,
            max_delta: Duration::from_millis(250),
        }
    }

    /// Advance to now and return the elapsed delta.
    pub fn tick(&mut self) -> Duration {
        self.tick_at(Instant::now())
    }

    /// Advance to `now` and return the elapsed delta (capped at 250 ms).
    pub fn tick_at(&mut self, now: Instant) -> Duration {
        let delta = now.saturating_duration_since(self.last).min(self.max_delta);
        self.last = now;
        self.frames += 1;
        delta
    }

    /// Ticks since start.
    #[must_use]
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}
