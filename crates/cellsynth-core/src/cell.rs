//! Atomic simulation unit with double-buffered amplitude and frequency.

use serde::{Deserialize, Serialize};

/// Clamp an amplitude into `[0, 1]`, mapping non-finite values to zero.
#[inline]
#[must_use]
pub fn clamp_amplitude(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Returns `true` when `hz` describes an assigned tone.
///
/// Zero means "no tone"; negative and non-finite values are treated the same way.
#[inline]
#[must_use]
pub fn is_tone(hz: f32) -> bool {
    hz.is_finite() && hz > 0.0
}

/// Normalises a frequency so that anything that is not a tone becomes zero.
#[inline]
#[must_use]
pub fn sanitize_frequency(hz: f32) -> f32 {
    if is_tone(hz) { hz } else { 0.0 }
}

/// Grid coordinate of a cell; fixed for the cell's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellPosition {
    pub x: u32,
    pub y: u32,
}

impl CellPosition {
    #[must_use]
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// The observable part of a cell, used to detect changes across a commit.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CellState {
    pub amplitude: f32,
    pub frequency: f32,
}

impl CellState {
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.amplitude > 0.0
    }
}

/// A single automaton cell.
///
/// Committed fields are what every reader sees. The `next_*` fields are
/// staging slots written once per generation and applied together at commit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cell {
    position: CellPosition,
    amplitude: f32,
    frequency: f32,
    next_amplitude: f32,
    next_frequency: f32,
}

impl Cell {
    /// A dead cell with no tone.
    #[must_use]
    pub(crate) const fn dormant(position: CellPosition) -> Self {
        Self {
            position,
            amplitude: 0.0,
            frequency: 0.0,
            next_amplitude: 0.0,
            next_frequency: 0.0,
        }
    }

    #[must_use]
    pub const fn position(&self) -> CellPosition {
        self.position
    }

    #[must_use]
    pub const fn amplitude(&self) -> f32 {
        self.amplitude
    }

    /// Frequency in Hz; zero when the cell has never been assigned a tone.
    #[must_use]
    pub const fn frequency(&self) -> f32 {
        self.frequency
    }

    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.amplitude > 0.0
    }

    #[must_use]
    pub const fn state(&self) -> CellState {
        CellState {
            amplitude: self.amplitude,
            frequency: self.frequency,
        }
    }

    /// Directly set the committed amplitude, bypassing staging.
    pub(crate) fn set_amplitude(&mut self, amplitude: f32) {
        self.amplitude = clamp_amplitude(amplitude);
        self.next_amplitude = self.amplitude;
    }

    /// Directly set the committed frequency, bypassing staging.
    pub(crate) fn set_frequency(&mut self, hz: f32) {
        self.frequency = sanitize_frequency(hz);
        self.next_frequency = self.frequency;
    }

    pub(crate) fn stage(&mut self, amplitude: f32, frequency: f32) {
        self.next_amplitude = clamp_amplitude(amplitude);
        self.next_frequency = sanitize_frequency(frequency);
    }

    /// Values waiting for the next commit.
    #[must_use]
    pub const fn staged(&self) -> CellState {
        CellState {
            amplitude: self.next_amplitude,
            frequency: self.next_frequency,
        }
    }

    /// Promote staged values to committed ones, returning whether anything observable changed.
    pub(crate) fn apply_next(&mut self) -> bool {
        let before = self.state();
        self.amplitude = self.next_amplitude;
        self.frequency = self.next_frequency;
        self.state() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amplitude_is_clamped_on_every_write() {
        let mut cell = Cell::dormant(CellPosition::new(0, 0));
        cell.set_amplitude(3.5);
        assert_eq!(cell.amplitude(), 1.0);
        cell.set_amplitude(-0.2);
        assert_eq!(cell.amplitude(), 0.0);
        cell.set_amplitude(f32::NAN);
        assert_eq!(cell.amplitude(), 0.0);
        cell.stage(f32::INFINITY, 440.0);
        assert_eq!(cell.staged().amplitude, 0.0);
    }

    #[test]
    fn staging_is_invisible_until_applied() {
        let mut cell = Cell::dormant(CellPosition::new(2, 3));
        cell.stage(0.75, 220.0);
        assert!(!cell.is_alive());
        assert_eq!(cell.frequency(), 0.0);

        assert!(cell.apply_next());
        assert!(cell.is_alive());
        assert_eq!(cell.amplitude(), 0.75);
        assert_eq!(cell.frequency(), 220.0);

        cell.stage(0.75, 220.0);
        assert!(!cell.apply_next());
    }

    #[test]
    fn frequencies_that_are_not_tones_collapse_to_zero() {
        assert_eq!(sanitize_frequency(-3.0), 0.0);
        assert_eq!(sanitize_frequency(f32::NAN), 0.0);
        assert_eq!(sanitize_frequency(f32::INFINITY), 0.0);
        assert_eq!(sanitize_frequency(55.0), 55.0);
        assert!(!is_tone(0.0));
    }
}
