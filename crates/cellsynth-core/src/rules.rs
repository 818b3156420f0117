//! Per-cell transition rules.
//!
//! Evaluation is a pure function of the committed snapshot: it reads neighbor
//! amplitudes and frequencies, never staged values, and performs no random
//! draws. Fresh frequencies for newborn cells are drawn by the grid after the
//! whole generation has been staged.

use std::fmt;
use std::str::FromStr;

use cellsynth_index::{MOORE_SIZE, Neighborhood};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cell::{Cell, clamp_amplitude, is_tone};
use crate::resonance::{ResonanceConfig, resonance};

/// Errors raised when parsing rule notation such as `B3/S23`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RuleParseError {
    #[error("rule notation must look like `B3/S23`, got `{0}`")]
    Malformed(String),
    #[error("neighbor count {0} exceeds the eight cells of a Moore neighborhood")]
    CountOutOfRange(u32),
}

/// Set of neighbor counts in `0..=8`, stored as a bit mask.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<u8>", into = "Vec<u8>")]
pub struct NeighborCounts(u16);

impl NeighborCounts {
    /// Build a set from explicit counts.
    pub fn from_counts(counts: &[u8]) -> Result<Self, RuleParseError> {
        let mut mask = 0u16;
        for &count in counts {
            if usize::from(count) > MOORE_SIZE {
                return Err(RuleParseError::CountOutOfRange(u32::from(count)));
            }
            mask |= 1 << count;
        }
        Ok(Self(mask))
    }

    #[must_use]
    pub const fn contains(self, count: u32) -> bool {
        count as usize <= MOORE_SIZE && self.0 & (1 << count) != 0
    }

    pub fn iter(self) -> impl Iterator<Item = u8> {
        (0..=MOORE_SIZE as u8).filter(move |&count| self.contains(u32::from(count)))
    }

    fn parse_digits(digits: &str) -> Result<Self, RuleParseError> {
        let mut counts = Vec::with_capacity(digits.len());
        for ch in digits.chars() {
            let digit = ch
                .to_digit(10)
                .ok_or_else(|| RuleParseError::Malformed(digits.to_string()))?;
            counts.push(digit as u8);
        }
        Self::from_counts(&counts)
    }
}

impl TryFrom<Vec<u8>> for NeighborCounts {
    type Error = RuleParseError;

    fn try_from(counts: Vec<u8>) -> Result<Self, Self::Error> {
        Self::from_counts(&counts)
    }
}

impl From<NeighborCounts> for Vec<u8> {
    fn from(counts: NeighborCounts) -> Self {
        counts.iter().collect()
    }
}

impl fmt::Display for NeighborCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for count in self.iter() {
            write!(f, "{count}")?;
        }
        Ok(())
    }
}

/// Birth and survival neighbor counts in `B…/S…` notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LifeNotation {
    pub birth: NeighborCounts,
    pub survival: NeighborCounts,
}

impl FromStr for LifeNotation {
    type Err = RuleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || RuleParseError::Malformed(s.to_string());
        let (birth, survival) = s.trim().split_once('/').ok_or_else(malformed)?;
        let birth = birth
            .strip_prefix(['B', 'b'])
            .ok_or_else(malformed)?;
        let survival = survival
            .strip_prefix(['S', 's'])
            .ok_or_else(malformed)?;
        Ok(Self {
            birth: NeighborCounts::parse_digits(birth)?,
            survival: NeighborCounts::parse_digits(survival)?,
        })
    }
}

impl fmt::Display for LifeNotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "B{}/S{}", self.birth, self.survival)
    }
}

/// What decides whether a dead cell is born.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BirthRule {
    /// Born when the alive neighbor count is in [`RuleConfig::birth`].
    NeighborCount,
    /// Born when summed neighbor amplitude reaches `threshold`.
    AmplitudeSum { threshold: f32 },
}

/// Where a newborn cell's frequency comes from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FrequencySource {
    /// Log-uniform over the configured audible range.
    Fresh,
    /// Mean of the alive neighbors' tones, jittered by `±spread × mean`.
    NeighborCentered { spread: f32 },
}

/// How death decay and birth energy relate to the grid's balance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecayCoupling {
    /// Use [`RuleConfig::death_decay`] and [`RuleConfig::birth_energy`] as configured.
    #[default]
    Fixed,
    /// Both become `1 - balance`, so raising balance trades decay and birth
    /// energy for resonance.
    Balanced,
}

/// Audible range newborn frequencies are drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrequencyRange {
    pub min_hz: f32,
    pub max_hz: f32,
}

impl Default for FrequencyRange {
    fn default() -> Self {
        Self {
            min_hz: 20.0,
            max_hz: 20_000.0,
        }
    }
}

impl FrequencyRange {
    #[must_use]
    pub fn contains(&self, hz: f32) -> bool {
        (self.min_hz..=self.max_hz).contains(&hz)
    }

    #[must_use]
    pub fn clamp(&self, hz: f32) -> f32 {
        if hz.is_finite() {
            hz.clamp(self.min_hz, self.max_hz)
        } else {
            self.min_hz
        }
    }

    /// Draw a frequency uniformly in log2 space, so every octave is equally likely.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f32 {
        let low = f64::from(self.min_hz).log2();
        let high = f64::from(self.max_hz).log2();
        let t: f64 = rng.random();
        self.clamp((low + (high - low) * t).exp2() as f32)
    }

    /// Draw around `center`, spreading by `±spread × center` before clamping into range.
    pub fn sample_centered<R: Rng + ?Sized>(&self, rng: &mut R, center: f32, spread: f32) -> f32 {
        let jitter: f32 = rng.random_range(-1.0..=1.0);
        self.clamp(center + center * spread * jitter)
    }
}

/// Tunable constants of the transition rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleConfig {
    /// Alive neighbor counts that give birth to a dead cell.
    pub birth: NeighborCounts,
    /// Alive neighbor counts under which a living cell only decays slowly.
    pub survival: NeighborCounts,
    /// Amplitude lost per generation by a cell within the survival band.
    pub survival_decay: f32,
    /// Amplitude lost per generation by a cell outside the survival band.
    pub death_decay: f32,
    /// Amplitude assigned at birth and by direct external activation.
    pub birth_energy: f32,
    pub birth_rule: BirthRule,
    pub frequency_source: FrequencySource,
    pub decay_coupling: DecayCoupling,
}

impl Default for RuleConfig {
    fn default() -> Self {
        let classic = Self::classic();
        Self {
            survival_decay: 0.02,
            death_decay: 0.5,
            ..classic
        }
    }
}

impl RuleConfig {
    /// Discrete B3/S23: survivors keep their amplitude, everyone else dies in one step.
    #[must_use]
    pub fn classic() -> Self {
        Self {
            birth: NeighborCounts(1 << 3),
            survival: NeighborCounts((1 << 2) | (1 << 3)),
            survival_decay: 0.0,
            death_decay: 1.0,
            birth_energy: 1.0,
            birth_rule: BirthRule::NeighborCount,
            frequency_source: FrequencySource::Fresh,
            decay_coupling: DecayCoupling::Fixed,
        }
    }

    /// Death decay in effect at `balance`.
    #[must_use]
    pub fn death_decay_at(&self, balance: f32) -> f32 {
        match self.decay_coupling {
            DecayCoupling::Fixed => self.death_decay,
            DecayCoupling::Balanced => coupled_power(balance),
        }
    }

    /// Birth energy in effect at `balance`; zero means nothing can be born.
    #[must_use]
    pub fn birth_energy_at(&self, balance: f32) -> f32 {
        match self.decay_coupling {
            DecayCoupling::Fixed => self.birth_energy,
            DecayCoupling::Balanced => coupled_power(balance),
        }
    }

    /// Replace birth/survival counts with the ones described by `notation`.
    pub fn with_notation(mut self, notation: &str) -> Result<Self, RuleParseError> {
        let parsed: LifeNotation = notation.parse()?;
        self.birth = parsed.birth;
        self.survival = parsed.survival;
        Ok(self)
    }

    #[must_use]
    pub fn notation(&self) -> LifeNotation {
        LifeNotation {
            birth: self.birth,
            survival: self.survival,
        }
    }
}

fn coupled_power(balance: f32) -> f32 {
    if balance.is_nan() {
        return 0.0;
    }
    (1.0 - balance).clamp(0.0, 1.0)
}

/// Neighbor aggregates gathered for one cell.
///
/// `alive` and `resonant` are tracked separately: an alive neighbor without a
/// tone counts towards the population but contributes no resonance.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NeighborStats {
    pub alive: u32,
    pub resonant: u32,
    pub resonance_sum: f32,
    pub amplitude_sum: f32,
    pub toned: u32,
    pub tone_sum: f32,
}

impl NeighborStats {
    /// Mean frequency of alive neighbors that carry a tone.
    #[must_use]
    pub fn mean_tone(&self) -> Option<f32> {
        (self.toned > 0).then(|| self.tone_sum / self.toned as f32)
    }
}

/// Outcome category of one cell's evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Transition {
    /// Dead and stays dead.
    Dormant,
    /// Dead and becomes alive; needs a fresh frequency.
    Born,
    /// Alive inside the survival band and still alive.
    Survive,
    /// Alive outside the survival band but not yet extinguished.
    Decline,
    /// Alive and reaches zero amplitude.
    Die,
}

/// Next-generation values computed for one cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StagedCell {
    pub transition: Transition,
    pub amplitude: f32,
    /// Mean neighbor tone, kept for [`FrequencySource::NeighborCentered`] births.
    pub neighbor_tone: Option<f32>,
}

impl Default for StagedCell {
    fn default() -> Self {
        Self {
            transition: Transition::Dormant,
            amplitude: 0.0,
            neighbor_tone: None,
        }
    }
}

/// Evaluates the transition rule for one generation.
#[derive(Debug, Clone, Copy)]
pub struct RuleEngine<'a> {
    rules: &'a RuleConfig,
    resonance: &'a ResonanceConfig,
    balance: f32,
}

impl<'a> RuleEngine<'a> {
    #[must_use]
    pub fn new(rules: &'a RuleConfig, resonance: &'a ResonanceConfig, balance: f32) -> Self {
        Self {
            rules,
            resonance,
            balance,
        }
    }

    /// Aggregate the neighbors of `index` in the topology's fixed order.
    #[must_use]
    pub fn gather<N>(&self, cells: &[Cell], topology: &N, index: usize) -> NeighborStats
    where
        N: Neighborhood + ?Sized,
    {
        let own_frequency = cells[index].frequency();
        let mut stats = NeighborStats::default();
        topology.visit_neighbors(index, &mut |neighbor| {
            let cell = &cells[neighbor];
            if !cell.is_alive() {
                return;
            }
            stats.alive += 1;
            stats.amplitude_sum += cell.amplitude();
            if is_tone(cell.frequency()) {
                stats.toned += 1;
                stats.tone_sum += cell.frequency();
            }
            if let Some(score) = resonance(own_frequency, cell.frequency(), self.resonance) {
                stats.resonant += 1;
                stats.resonance_sum += score;
            }
        });
        stats
    }

    /// Apply the transition rule to `cell` given its neighbor aggregates.
    #[must_use]
    pub fn evaluate(&self, cell: &Cell, stats: &NeighborStats) -> StagedCell {
        let neighbor_tone = stats.mean_tone();
        if cell.is_alive() {
            let in_band = self.rules.survival.contains(stats.alive);
            let decay = if in_band {
                self.rules.survival_decay
            } else {
                self.rules.death_decay_at(self.balance)
            };
            let harmonic = stats.resonance_sum / stats.alive.max(1) as f32 * self.balance;
            let harmonic = if harmonic.is_finite() { harmonic } else { 0.0 };
            let amplitude = clamp_amplitude(cell.amplitude() - decay + harmonic);
            let transition = match (amplitude > 0.0, in_band) {
                (false, _) => Transition::Die,
                (true, true) => Transition::Survive,
                (true, false) => Transition::Decline,
            };
            return StagedCell {
                transition,
                amplitude,
                neighbor_tone,
            };
        }

        let born = match self.rules.birth_rule {
            BirthRule::NeighborCount => self.rules.birth.contains(stats.alive),
            BirthRule::AmplitudeSum { threshold } => stats.amplitude_sum >= threshold,
        };
        let energy = clamp_amplitude(self.rules.birth_energy_at(self.balance));
        if born && energy > 0.0 {
            StagedCell {
                transition: Transition::Born,
                amplitude: energy,
                neighbor_tone,
            }
        } else {
            StagedCell {
                transition: Transition::Dormant,
                amplitude: 0.0,
                neighbor_tone,
            }
        }
    }

    /// Gather and evaluate in one call.
    #[must_use]
    pub fn stage<N>(&self, cells: &[Cell], topology: &N, index: usize) -> StagedCell
    where
        N: Neighborhood + ?Sized,
    {
        let stats = self.gather(cells, topology, index);
        self.evaluate(&cells[index], &stats)
    }
}
