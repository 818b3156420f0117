//! Per-cell voice parameters for an additive synth.
//!
//! The bank only tracks control values (gain, pitch, pan). Sample generation
//! belongs to whichever audio backend consumes it.

use cellsynth_core::{Cell, CellObserver, Grid};
use rand::{Rng, SeedableRng, rngs::SmallRng};
use tracing::warn;

/// Default time for a voice to glide to a new gain.
pub const DEFAULT_RAMP_SECONDS: f32 = 0.05;

/// Just-intonation ratios of the chromatic scale, unison to octave.
pub const JUST_RATIOS: [f32; 13] = [
    1.0,
    16.0 / 15.0,
    9.0 / 8.0,
    6.0 / 5.0,
    5.0 / 4.0,
    4.0 / 3.0,
    45.0 / 32.0,
    3.0 / 2.0,
    8.0 / 5.0,
    5.0 / 3.0,
    16.0 / 9.0,
    15.0 / 8.0,
    2.0,
];

/// Control state of one oscillator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Voice {
    gain: f32,
    target_gain: f32,
    ramp_rate: f32,
    cell_frequency: f32,
    pan: f32,
}

impl Voice {
    /// Current (ramped) gain.
    #[must_use]
    pub const fn gain(&self) -> f32 {
        self.gain
    }

    #[must_use]
    pub const fn target_gain(&self) -> f32 {
        self.target_gain
    }

    /// Frequency of the backing cell before the base multiplier.
    #[must_use]
    pub const fn cell_frequency(&self) -> f32 {
        self.cell_frequency
    }

    /// Stereo position in `[-1, 1]`.
    #[must_use]
    pub const fn pan(&self) -> f32 {
        self.pan
    }

    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.gain == self.target_gain
    }

    fn retarget(&mut self, target_gain: f32, ramp_seconds: f32) {
        self.target_gain = target_gain;
        if ramp_seconds > 0.0 {
            self.ramp_rate = (target_gain - self.gain).abs() / ramp_seconds;
        } else {
            self.gain = target_gain;
            self.ramp_rate = 0.0;
        }
    }

    fn advance(&mut self, dt: f32) {
        if self.is_settled() {
            return;
        }
        let step = self.ramp_rate * dt;
        let remaining = self.target_gain - self.gain;
        if remaining.abs() <= step {
            self.gain = self.target_gain;
        } else {
            self.gain += step.copysign(remaining);
        }
    }
}

/// One voice per grid cell, kept in step with the grid through observation.
#[derive(Debug, Clone)]
pub struct VoiceBank {
    voices: Vec<Voice>,
    width: u32,
    base: f32,
    ramp_seconds: f32,
}

impl VoiceBank {
    /// Build a silent bank sized for `grid`, then sync it to the grid's cells.
    ///
    /// Voice pans are drawn from `pan_seed` so a given seed always yields the
    /// same stereo image.
    #[must_use]
    pub fn from_grid(grid: &Grid, pan_seed: u64) -> Self {
        let mut rng = SmallRng::seed_from_u64(pan_seed);
        let voices = (0..grid.cells().len())
            .map(|_| Voice {
                gain: 0.0,
                target_gain: 0.0,
                ramp_rate: 0.0,
                cell_frequency: 0.0,
                pan: rng.random_range(-1.0..=1.0),
            })
            .collect();
        let mut bank = Self {
            voices,
            width: grid.width(),
            base: JUST_RATIOS[0],
            ramp_seconds: DEFAULT_RAMP_SECONDS,
        };
        for cell in grid.cells() {
            bank.track(cell);
        }
        bank
    }

    #[must_use]
    pub fn with_ramp_seconds(mut self, ramp_seconds: f32) -> Self {
        if ramp_seconds.is_finite() && ramp_seconds >= 0.0 {
            self.ramp_seconds = ramp_seconds;
        } else {
            warn!(ramp_seconds, "ignoring invalid ramp time");
        }
        self
    }

    #[must_use]
    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    #[must_use]
    pub fn voice(&self, x: u32, y: u32) -> Option<&Voice> {
        if x >= self.width {
            return None;
        }
        self.voices
            .get(y as usize * self.width as usize + x as usize)
    }

    #[must_use]
    pub const fn base(&self) -> f32 {
        self.base
    }

    /// Set the pitch multiplier applied to every voice.
    pub fn set_base(&mut self, ratio: f32) {
        if !ratio.is_finite() || ratio <= 0.0 {
            warn!(ratio, "ignoring invalid base ratio");
            return;
        }
        self.base = ratio;
    }

    /// Select a base from [`JUST_RATIOS`]; degrees past the octave wrap around.
    pub fn set_base_degree(&mut self, degree: usize) {
        self.set_base(JUST_RATIOS[degree % JUST_RATIOS.len()]);
    }

    /// Output pitch of a voice: its cell frequency times the base.
    #[must_use]
    pub fn frequency(&self, voice: &Voice) -> f32 {
        voice.cell_frequency * self.base
    }

    /// Move every voice's gain towards its target by `dt` seconds.
    pub fn advance_ramps(&mut self, dt: f32) {
        if !dt.is_finite() || dt <= 0.0 {
            return;
        }
        for voice in &mut self.voices {
            voice.advance(dt);
        }
    }

    /// Voices with an audible gain.
    #[must_use]
    pub fn active_voices(&self) -> usize {
        self.voices.iter().filter(|voice| voice.gain > 0.0).count()
    }

    /// Sum of current gains; never exceeds one.
    #[must_use]
    pub fn total_gain(&self) -> f32 {
        self.voices.iter().map(|voice| voice.gain).sum()
    }

    fn track(&mut self, cell: &Cell) {
        let count = self.voices.len().max(1) as f32;
        let position = cell.position();
        let index = position.y as usize * self.width as usize + position.x as usize;
        let ramp_seconds = self.ramp_seconds;
        if let Some(voice) = self.voices.get_mut(index) {
            voice.cell_frequency = cell.frequency();
            voice.retarget(cell.amplitude() / count, ramp_seconds);
        }
    }
}

impl CellObserver for VoiceBank {
    fn on_cell_changed(&mut self, cell: &Cell) {
        self.track(cell);
    }
}
