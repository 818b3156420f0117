//! Fixed-interval generation pacing.

use std::time::Duration;

/// Upper bound on generations released by a single [`StepClock::update`].
pub const MAX_STEPS_PER_UPDATE: usize = 240;

/// Default wall-clock time per generation.
pub const DEFAULT_STEP_INTERVAL: Duration = Duration::from_millis(100);

/// Converts elapsed wall-clock time into a whole number of generations.
///
/// Leftover time carries over to the next update. The accumulator is capped
/// so that a long stall releases at most `max_steps` generations instead of a
/// burst proportional to the stall.
#[derive(Debug, Clone)]
pub struct StepClock {
    step_interval: Duration,
    max_steps: usize,
    speed_multiplier: f32,
    paused: bool,
    accumulator: Duration,
}

impl Default for StepClock {
    fn default() -> Self {
        Self::new(DEFAULT_STEP_INTERVAL)
    }
}

impl StepClock {
    #[must_use]
    pub fn new(step_interval: Duration) -> Self {
        Self {
            step_interval,
            max_steps: MAX_STEPS_PER_UPDATE,
            speed_multiplier: 1.0,
            paused: false,
            accumulator: Duration::ZERO,
        }
    }

    #[must_use]
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    #[must_use]
    pub const fn step_interval(&self) -> Duration {
        self.step_interval
    }

    pub fn set_step_interval(&mut self, step_interval: Duration) {
        self.step_interval = step_interval;
    }

    #[must_use]
    pub const fn speed_multiplier(&self) -> f32 {
        self.speed_multiplier
    }

    /// Scale simulated time; negative and non-finite values stop the clock.
    pub fn set_speed_multiplier(&mut self, speed: f32) {
        self.speed_multiplier = if speed.is_finite() { speed.max(0.0) } else { 0.0 };
    }

    #[must_use]
    pub const fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn toggle_pause(&mut self) -> bool {
        self.paused = !self.paused;
        self.paused
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    /// Time banked towards the next generation, in seconds.
    #[must_use]
    pub fn pending_seconds(&self) -> f32 {
        self.accumulator.as_secs_f32()
    }

    /// Feed elapsed time and return how many generations are due.
    pub fn update(&mut self, delta: Duration) -> usize {
        if self.paused || self.speed_multiplier <= f32::EPSILON || self.step_interval.is_zero() {
            return 0;
        }

        let scaled = if self.speed_multiplier == 1.0 {
            delta
        } else {
            Duration::try_from_secs_f64(delta.as_secs_f64() * f64::from(self.speed_multiplier))
                .unwrap_or(Duration::MAX)
        };
        let max_steps = u32::try_from(self.max_steps).unwrap_or(u32::MAX);
        let max_accumulator = self.step_interval.saturating_mul(max_steps);
        self.accumulator = self.accumulator.saturating_add(scaled).min(max_accumulator);

        let due = self.accumulator.as_nanos() / self.step_interval.as_nanos();
        let steps = u32::try_from(due).unwrap_or(u32::MAX).min(max_steps);
        self.accumulator -= self.step_interval.saturating_mul(steps);
        steps as usize
    }
}
