//! Resonant cellular automaton engine.
//!
//! A [`Grid`] owns a torus of [`Cell`]s carrying continuous amplitude and
//! frequency. Each call to [`Grid::advance`] stages every cell against the
//! same committed snapshot, commits all staged values at once, and then tells
//! attached [`CellObserver`]s which cells changed.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};

use cellsynth_index::{Neighborhood, TopologyError, Torus};
use rand::{Rng, SeedableRng, rngs::SmallRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace, warn};

pub mod cell;
pub mod observer;
pub mod resonance;
pub mod rules;

pub use cell::{Cell, CellPosition, CellState, is_tone};
pub use observer::{CellObserver, ObserverId, ObserverSet, SharedObserver};
pub use resonance::{ResonanceConfig, ResonanceRange, resonance};
pub use rules::{
    BirthRule, DecayCoupling, FrequencySource, FrequencyRange, LifeNotation, NeighborCounts, NeighborStats,
    RuleConfig, RuleEngine, RuleParseError, StagedCell, Transition,
};

/// Largest number of cells a grid may hold (a 4096 × 4096 torus).
pub const MAX_CELLS: u64 = 1 << 24;

/// Errors raised by grid construction and validated mutations.
#[derive(Debug, Error)]
pub enum GridError {
    /// Indicates an invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    /// Indicates an argument outside the accepted domain.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    /// A traversal order that does not visit every cell exactly once.
    #[error("traversal must be a permutation of {expected} cells (got {found} entries)")]
    InvalidTraversal { expected: usize, found: usize },
    #[error(transparent)]
    Topology(#[from] TopologyError),
    #[error(transparent)]
    Rule(#[from] RuleParseError),
}

/// Static configuration for a grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Number of columns.
    pub width: u32,
    /// Number of rows.
    pub height: u32,
    /// Trade-off between decay and harmonic diffusion. Scales the resonance
    /// term, and with [`DecayCoupling::Balanced`] also sets death decay and
    /// birth energy to `1 - balance`.
    pub balance: f32,
    /// Optional RNG seed for reproducible runs.
    pub rng_seed: Option<u64>,
    /// Range fresh frequencies are drawn from.
    pub frequency_range: FrequencyRange,
    pub rules: RuleConfig,
    pub resonance: ResonanceConfig,
    /// Maximum number of generation summaries retained in memory.
    pub history_capacity: usize,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            width: 64,
            height: 64,
            balance: 0.5,
            rng_seed: None,
            frequency_range: FrequencyRange::default(),
            rules: RuleConfig::default(),
            resonance: ResonanceConfig::default(),
            history_capacity: 256,
        }
    }
}

impl GridConfig {
    /// Validates the configuration, returning the topology it describes.
    pub fn validate(&self) -> Result<Torus, GridError> {
        if self.width == 0 || self.height == 0 {
            return Err(GridError::InvalidConfig("grid dimensions must be non-zero"));
        }
        if u64::from(self.width) * u64::from(self.height) > MAX_CELLS {
            return Err(GridError::InvalidConfig(
                "grid exceeds the maximum cell count",
            ));
        }
        let topology = Torus::new(self.width, self.height)?;
        if !self.balance.is_finite() {
            return Err(GridError::InvalidConfig("balance must be finite"));
        }
        let range = &self.frequency_range;
        if !range.min_hz.is_finite() || !range.max_hz.is_finite() || range.min_hz <= 0.0 {
            return Err(GridError::InvalidConfig(
                "frequency range must be finite and strictly positive",
            ));
        }
        if range.max_hz < range.min_hz {
            return Err(GridError::InvalidConfig(
                "frequency range maximum cannot be below its minimum",
            ));
        }

        let rules = &self.rules;
        if !rules.survival_decay.is_finite()
            || !rules.death_decay.is_finite()
            || rules.survival_decay < 0.0
            || rules.death_decay < 0.0
        {
            return Err(GridError::InvalidConfig(
                "decay rates must be finite and non-negative",
            ));
        }
        if !rules.birth_energy.is_finite() || rules.birth_energy <= 0.0 || rules.birth_energy > 1.0
        {
            return Err(GridError::InvalidConfig("birth_energy must be in (0, 1]"));
        }
        if let BirthRule::AmplitudeSum { threshold } = rules.birth_rule
            && (!threshold.is_finite() || threshold <= 0.0)
        {
            return Err(GridError::InvalidConfig(
                "amplitude-sum birth threshold must be finite and positive",
            ));
        }
        if let FrequencySource::NeighborCentered { spread } = rules.frequency_source
            && (!spread.is_finite() || spread < 0.0)
        {
            return Err(GridError::InvalidConfig(
                "neighbor-centered spread must be finite and non-negative",
            ));
        }

        let resonance = &self.resonance;
        if !resonance.sharpness.is_finite() || resonance.sharpness <= 0.0 {
            return Err(GridError::InvalidConfig(
                "resonance sharpness must be finite and positive",
            ));
        }
        if !resonance.harmonic_falloff.is_finite() || resonance.harmonic_falloff < 0.0 {
            return Err(GridError::InvalidConfig(
                "resonance harmonic_falloff must be finite and non-negative",
            ));
        }
        if self.history_capacity == 0 {
            return Err(GridError::InvalidConfig("history_capacity must be non-zero"));
        }
        Ok(topology)
    }

    /// Returns the configured RNG, seeding from entropy if no seed is set.
    fn seeded_rng(&self) -> SmallRng {
        match self.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => {
                let seed: u64 = rand::random();
                SmallRng::seed_from_u64(seed)
            }
        }
    }
}

/// Aggregate statistics emitted after each generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationSummary {
    pub generation: u64,
    pub alive: usize,
    pub births: usize,
    pub deaths: usize,
    /// Cells whose observable state differs from the previous generation.
    pub changed: usize,
    pub total_amplitude: f32,
    /// Mean amplitude over alive cells; zero when nothing is alive.
    pub mean_amplitude: f32,
    pub balance: f32,
}

/// The automaton: a torus of cells plus the rule parameters driving it.
pub struct Grid {
    config: GridConfig,
    topology: Torus,
    cells: Vec<Cell>,
    balance: f32,
    generation: u64,
    rng: SmallRng,
    observers: ObserverSet,
    staged: Vec<StagedCell>,
    visited: Vec<bool>,
    changed: Vec<usize>,
    history: VecDeque<GenerationSummary>,
}

impl fmt::Debug for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Grid")
            .field("width", &self.topology.width())
            .field("height", &self.topology.height())
            .field("balance", &self.balance)
            .field("generation", &self.generation)
            .field("observers", &self.observers)
            .finish()
    }
}

impl Grid {
    /// Create an all-dead grid with default rules.
    pub fn new(width: u32, height: u32, balance: f32) -> Result<Self, GridError> {
        Self::with_config(GridConfig {
            width,
            height,
            balance,
            ..GridConfig::default()
        })
    }

    /// Create an all-dead grid from a full configuration.
    pub fn with_config(config: GridConfig) -> Result<Self, GridError> {
        let topology = config.validate()?;
        let len = topology.len();
        let cells = (0..len)
            .map(|index| {
                let (x, y) = topology.coords(index);
                Cell::dormant(CellPosition::new(x, y))
            })
            .collect();
        let rng = config.seeded_rng();
        debug!(
            width = topology.width(),
            height = topology.height(),
            balance = config.balance,
            rules = %config.rules.notation(),
            "created grid"
        );
        Ok(Self {
            balance: config.balance,
            topology,
            cells,
            generation: 0,
            rng,
            observers: ObserverSet::new(),
            staged: vec![StagedCell::default(); len],
            visited: vec![false; len],
            changed: Vec::with_capacity(len),
            history: VecDeque::with_capacity(config.history_capacity),
            config,
        })
    }

    #[must_use]
    pub const fn width(&self) -> u32 {
        self.topology.width()
    }

    #[must_use]
    pub const fn height(&self) -> u32 {
        self.topology.height()
    }

    #[must_use]
    pub const fn topology(&self) -> &Torus {
        &self.topology
    }

    #[must_use]
    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    /// Cell at `(x, y)`, wrapped onto the torus.
    #[must_use]
    pub fn cell(&self, x: i64, y: i64) -> &Cell {
        &self.cells[self.topology.index(x, y)]
    }

    /// All cells in row-major order.
    #[must_use]
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    #[must_use]
    pub const fn balance(&self) -> f32 {
        self.balance
    }

    /// Number of completed generations.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn alive_count(&self) -> usize {
        self.cells.iter().filter(|cell| cell.is_alive()).count()
    }

    /// Iterate over retained generation summaries, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &GenerationSummary> {
        self.history.iter()
    }

    /// Register an observer; the grid keeps only a weak reference to it.
    pub fn attach_observer<O>(&mut self, observer: &Arc<Mutex<O>>) -> ObserverId
    where
        O: CellObserver + 'static,
    {
        self.observers.attach(observer)
    }

    /// Register an already type-erased observer.
    pub fn attach_shared_observer(&mut self, observer: &SharedObserver) -> ObserverId {
        self.observers.attach_shared(observer)
    }

    pub fn detach_observer(&mut self, id: ObserverId) -> bool {
        self.observers.detach(id)
    }

    /// Number of attached observers that are still alive.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Adjust the balance parameter; takes effect on the next generation.
    pub fn inc_param(&mut self, delta: f32) {
        self.set_balance(self.balance + delta);
    }

    /// Replace the balance parameter; takes effect on the next generation.
    pub fn set_balance(&mut self, value: f32) {
        if !value.is_finite() {
            warn!(value, "ignoring non-finite balance");
            return;
        }
        self.balance = value;
    }

    /// Kill every cell. Frequencies are kept as quiescent values.
    pub fn reset(&mut self) {
        self.changed.clear();
        for (index, cell) in self.cells.iter_mut().enumerate() {
            let before = cell.state();
            cell.set_amplitude(0.0);
            if cell.state() != before {
                self.changed.push(index);
            }
        }
        debug!(cleared = self.changed.len(), "reset grid");
        self.observers.notify_cells(&self.cells, &self.changed);
    }

    /// Randomise the grid: each cell is alive with probability `bias`.
    ///
    /// Cells made alive receive the activation energy and a fresh frequency. Returns
    /// the number of alive cells afterwards.
    pub fn shuffle(&mut self, bias: f32) -> Result<usize, GridError> {
        if !bias.is_finite() {
            return Err(GridError::InvalidArgument("shuffle bias must be finite"));
        }
        let bias = f64::from(bias.clamp(0.0, 1.0));
        let birth_energy = self.activation_energy();
        let range = self.config.frequency_range;

        self.changed.clear();
        let mut alive = 0usize;
        for (index, cell) in self.cells.iter_mut().enumerate() {
            let before = cell.state();
            if self.rng.random_bool(bias) {
                cell.set_amplitude(birth_energy);
                cell.set_frequency(range.sample(&mut self.rng));
                alive += 1;
            } else {
                cell.set_amplitude(0.0);
            }
            if cell.state() != before {
                self.changed.push(index);
            }
        }
        debug!(bias, alive, "shuffled grid");
        self.observers.notify_cells(&self.cells, &self.changed);
        Ok(alive)
    }

    /// Directly switch a cell on or off, bypassing the rule engine.
    ///
    /// Activated cells receive the activation energy; a cell without a tone
    /// also receives a fresh frequency.
    pub fn set_cell_alive(&mut self, x: i64, y: i64, alive: bool) -> &Cell {
        let index = self.topology.index(x, y);
        let birth_energy = self.activation_energy();
        let range = self.config.frequency_range;
        let cell = &mut self.cells[index];
        let before = cell.state();
        if alive {
            cell.set_amplitude(birth_energy);
            if !is_tone(cell.frequency()) {
                cell.set_frequency(range.sample(&mut self.rng));
            }
        } else {
            cell.set_amplitude(0.0);
        }
        if cell.state() != before {
            self.observers.notify_cells(&self.cells, &[index]);
        }
        &self.cells[index]
    }

    /// Amplitude given to externally activated cells at the current balance.
    ///
    /// Balanced coupling can drive birth energy to zero; activation still
    /// leaves the cell alive with the smallest positive amplitude.
    fn activation_energy(&self) -> f32 {
        let energy = self.config.rules.birth_energy_at(self.balance);
        if energy > 0.0 { energy } else { f32::MIN_POSITIVE }
    }

    /// Directly retune a cell. Values that are not tones clear the cell's frequency.
    pub fn set_cell_frequency(&mut self, x: i64, y: i64, hz: f32) -> &Cell {
        let index = self.topology.index(x, y);
        let cell = &mut self.cells[index];
        let before = cell.state();
        cell.set_frequency(hz);
        if cell.state() != before {
            self.observers.notify_cells(&self.cells, &[index]);
        }
        &self.cells[index]
    }

    /// Advance one generation evaluating cells in row-major order.
    pub fn advance(&mut self) -> GenerationSummary {
        self.step(0..self.cells.len())
    }

    /// Advance one generation evaluating cells in the given order.
    ///
    /// `order` must be a permutation of `0..width * height`. The result is the
    /// same for every permutation; this entry point exists so that callers can
    /// verify that.
    pub fn advance_ordered(&mut self, order: &[usize]) -> Result<GenerationSummary, GridError> {
        let expected = self.cells.len();
        let invalid = GridError::InvalidTraversal {
            expected,
            found: order.len(),
        };
        if order.len() != expected {
            return Err(invalid);
        }
        self.visited.fill(false);
        for &index in order {
            match self.visited.get_mut(index) {
                Some(seen) if !*seen => *seen = true,
                _ => return Err(invalid),
            }
        }
        Ok(self.step(order.iter().copied()))
    }

    fn step(&mut self, order: impl Iterator<Item = usize>) -> GenerationSummary {
        self.stage_evaluate(order);
        let (births, deaths) = self.stage_next();
        self.stage_commit();
        self.generation += 1;

        let summary = self.summarize(births, deaths);
        trace!(
            generation = summary.generation,
            alive = summary.alive,
            births,
            deaths,
            changed = summary.changed,
            "advanced generation"
        );
        self.observers.notify_cells(&self.cells, &self.changed);
        self.observers.notify_generation(&summary);
        if self.history.len() >= self.config.history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(summary);
        summary
    }

    /// Evaluate every cell against the committed snapshot.
    fn stage_evaluate(&mut self, order: impl Iterator<Item = usize>) {
        let engine = RuleEngine::new(&self.config.rules, &self.config.resonance, self.balance);
        for index in order {
            self.staged[index] = engine.stage(&self.cells, &self.topology, index);
        }
    }

    /// Write staged values into each cell's next-state slots.
    ///
    /// Newborn frequencies are drawn here in row-major order, so the RNG
    /// sequence is independent of the evaluation order.
    fn stage_next(&mut self) -> (usize, usize) {
        let range = self.config.frequency_range;
        let source = self.config.rules.frequency_source;
        let mut births = 0usize;
        let mut deaths = 0usize;
        for (cell, staged) in self.cells.iter_mut().zip(&self.staged) {
            let frequency = match staged.transition {
                Transition::Born => {
                    births += 1;
                    match (source, staged.neighbor_tone) {
                        (FrequencySource::NeighborCentered { spread }, Some(center)) => {
                            range.sample_centered(&mut self.rng, center, spread)
                        }
                        _ => range.sample(&mut self.rng),
                    }
                }
                Transition::Die => {
                    deaths += 1;
                    cell.frequency()
                }
                Transition::Dormant | Transition::Survive | Transition::Decline => cell.frequency(),
            };
            cell.stage(staged.amplitude, frequency);
        }
        (births, deaths)
    }

    /// Apply all staged values at once, recording which cells changed.
    fn stage_commit(&mut self) {
        self.changed.clear();
        for (index, cell) in self.cells.iter_mut().enumerate() {
            if cell.apply_next() {
                self.changed.push(index);
            }
        }
    }

    fn summarize(&self, births: usize, deaths: usize) -> GenerationSummary {
        let mut alive = 0usize;
        let mut total_amplitude = 0.0f32;
        for cell in self.cells.iter().filter(|cell| cell.is_alive()) {
            alive += 1;
            total_amplitude += cell.amplitude();
        }
        let mean_amplitude = if alive > 0 {
            total_amplitude / alive as f32
        } else {
            0.0
        };
        GenerationSummary {
            generation: self.generation,
            alive,
            births,
            deaths,
            changed: self.changed.len(),
            total_amplitude,
            mean_amplitude,
            balance: self.balance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classic_config(width: u32, height: u32) -> GridConfig {
        GridConfig {
            width,
            height,
            balance: 0.0,
            rng_seed: Some(7),
            rules: RuleConfig::classic(),
            ..GridConfig::default()
        }
    }

    #[derive(Default)]
    struct Recorder {
        positions: Vec<CellPosition>,
        summaries: Vec<GenerationSummary>,
    }

    impl CellObserver for Recorder {
        fn on_cell_changed(&mut self, cell: &Cell) {
            self.positions.push(cell.position());
        }

        fn on_generation(&mut self, summary: &GenerationSummary) {
            self.summaries.push(*summary);
        }
    }

    #[test]
    fn rejects_zero_dimensions() {
        assert!(matches!(
            Grid::new(0, 4, 0.5),
            Err(GridError::InvalidConfig(_))
        ));
        assert!(matches!(
            Grid::new(4, 0, 0.5),
            Err(GridError::InvalidConfig(_))
        ));
    }

    #[test]
    fn rejects_grids_beyond_cell_cap() {
        assert!(matches!(
            Grid::new(u32::MAX, u32::MAX, 0.5),
            Err(GridError::InvalidConfig(_))
        ));
        let side = 1u32 << 12;
        assert_eq!(u64::from(side) * u64::from(side), MAX_CELLS);
        assert!(matches!(
            Grid::new(side + 1, side, 0.5),
            Err(GridError::InvalidConfig(_))
        ));
        let config = GridConfig {
            width: side,
            height: side,
            ..GridConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn balanced_coupling_scales_activation_energy() {
        let mut grid = Grid::with_config(GridConfig {
            width: 3,
            height: 3,
            balance: 0.25,
            rng_seed: Some(3),
            rules: RuleConfig {
                decay_coupling: DecayCoupling::Balanced,
                ..RuleConfig::default()
            },
            ..GridConfig::default()
        })
        .expect("grid");
        assert_eq!(grid.set_cell_alive(0, 0, true).amplitude(), 0.75);
        grid.set_balance(0.5);
        assert_eq!(grid.shuffle(1.0).expect("shuffle"), 9);
        assert!(grid.cells().iter().all(|cell| cell.amplitude() == 0.5));
        grid.set_balance(2.0);
        assert!(grid.set_cell_alive(1, 1, false).amplitude() == 0.0);
        assert!(grid.set_cell_alive(1, 1, true).is_alive());
    }

    #[test]
    fn config_validation_detects_errors() {
        let cases = [
            GridConfig {
                balance: f32::NAN,
                ..GridConfig::default()
            },
            GridConfig {
                frequency_range: FrequencyRange {
                    min_hz: 0.0,
                    max_hz: 100.0,
                },
                ..GridConfig::default()
            },
            GridConfig {
                frequency_range: FrequencyRange {
                    min_hz: 500.0,
                    max_hz: 100.0,
                },
                ..GridConfig::default()
            },
            GridConfig {
                rules: RuleConfig {
                    death_decay: -0.5,
                    ..RuleConfig::default()
                },
                ..GridConfig::default()
            },
            GridConfig {
                rules: RuleConfig {
                    birth_energy: 1.5,
                    ..RuleConfig::default()
                },
                ..GridConfig::default()
            },
            GridConfig {
                rules: RuleConfig {
                    birth_rule: BirthRule::AmplitudeSum { threshold: 0.0 },
                    ..RuleConfig::default()
                },
                ..GridConfig::default()
            },
            GridConfig {
                rules: RuleConfig {
                    frequency_source: FrequencySource::NeighborCentered { spread: -1.0 },
                    ..RuleConfig::default()
                },
                ..GridConfig::default()
            },
            GridConfig {
                resonance: ResonanceConfig {
                    sharpness: 0.0,
                    ..ResonanceConfig::default()
                },
                ..GridConfig::default()
            },
            GridConfig {
                history_capacity: 0,
                ..GridConfig::default()
            },
        ];
        for config in cases {
            assert!(
                matches!(config.validate(), Err(GridError::InvalidConfig(_))),
                "expected rejection for {config:?}"
            );
        }
        assert!(GridConfig::default().validate().is_ok());
    }

    #[test]
    fn new_grid_is_dead_and_silent() {
        let grid = Grid::new(3, 2, 0.5).expect("grid");
        assert_eq!(grid.width(), 3);
        assert_eq!(grid.height(), 2);
        assert_eq!(grid.generation(), 0);
        assert_eq!(grid.alive_count(), 0);
        assert!(grid.cells().iter().all(|cell| cell.frequency() == 0.0));
        assert_eq!(grid.cell(-1, -1).position(), CellPosition::new(2, 1));
    }

    #[test]
    fn balance_mutations_ignore_non_finite_values() {
        let mut grid = Grid::new(2, 2, 0.25).expect("grid");
        grid.inc_param(0.5);
        assert!((grid.balance() - 0.75).abs() < 1e-6);
        grid.inc_param(f32::NAN);
        grid.set_balance(f32::INFINITY);
        assert!((grid.balance() - 0.75).abs() < 1e-6);
        grid.set_balance(-2.0);
        assert_eq!(grid.balance(), -2.0);
    }

    #[test]
    fn set_cell_alive_wraps_and_assigns_tone() {
        let mut grid = Grid::with_config(classic_config(4, 4)).expect("grid");
        let cell = *grid.set_cell_alive(5, -1, true);
        assert_eq!(cell.position(), CellPosition::new(1, 3));
        assert!(cell.is_alive());
        assert_eq!(cell.amplitude(), 1.0);
        assert!(grid.config().frequency_range.contains(cell.frequency()));

        let tone = cell.frequency();
        grid.set_cell_alive(1, 3, false);
        assert!(!grid.cell(1, 3).is_alive());
        assert_eq!(grid.cell(1, 3).frequency(), tone);

        grid.set_cell_alive(1, 3, true);
        assert_eq!(grid.cell(1, 3).frequency(), tone);
    }

    #[test]
    fn set_cell_frequency_sanitises_input() {
        let mut grid = Grid::new(2, 2, 0.5).expect("grid");
        assert_eq!(grid.set_cell_frequency(0, 0, 440.0).frequency(), 440.0);
        assert_eq!(grid.set_cell_frequency(0, 0, f32::NAN).frequency(), 0.0);
        assert_eq!(grid.set_cell_frequency(0, 0, -10.0).frequency(), 0.0);
    }

    #[test]
    fn shuffle_rejects_non_finite_bias() {
        let mut grid = Grid::new(2, 2, 0.5).expect("grid");
        assert!(matches!(
            grid.shuffle(f32::NAN),
            Err(GridError::InvalidArgument(_))
        ));
        assert_eq!(grid.shuffle(0.0).expect("shuffle"), 0);
        assert_eq!(grid.shuffle(7.0).expect("shuffle"), 4);
    }

    #[test]
    fn advance_ordered_rejects_non_permutations() {
        let mut grid = Grid::new(2, 2, 0.5).expect("grid");
        assert!(matches!(
            grid.advance_ordered(&[0, 1, 2]),
            Err(GridError::InvalidTraversal {
                expected: 4,
                found: 3
            })
        ));
        assert!(grid.advance_ordered(&[0, 1, 1, 3]).is_err());
        assert!(grid.advance_ordered(&[0, 1, 2, 4]).is_err());
        assert_eq!(grid.generation(), 0);
        assert!(grid.advance_ordered(&[3, 2, 1, 0]).is_ok());
        assert_eq!(grid.generation(), 1);
    }

    #[test]
    fn births_and_deaths_are_counted() {
        let mut grid = Grid::with_config(classic_config(6, 6)).expect("grid");
        for y in 0..3 {
            grid.set_cell_alive(1, y, true);
        }
        let summary = grid.advance();
        assert_eq!(summary.generation, 1);
        assert_eq!(summary.births, 2);
        assert_eq!(summary.deaths, 2);
        assert_eq!(summary.alive, 3);
        assert_eq!(summary.changed, 4);
        assert!((summary.mean_amplitude - 1.0).abs() < 1e-6);
    }

    #[test]
    fn observers_see_changes_and_summaries() {
        let mut grid = Grid::with_config(classic_config(6, 6)).expect("grid");
        let recorder = Arc::new(Mutex::new(Recorder::default()));
        grid.attach_observer(&recorder);
        for y in 0..3 {
            grid.set_cell_alive(1, y, true);
        }
        // re-activating a live cell is not a change
        grid.set_cell_alive(1, 1, true);
        assert_eq!(recorder.lock().unwrap().positions.len(), 3);

        recorder.lock().unwrap().positions.clear();
        grid.advance();
        let recorder = recorder.lock().unwrap();
        assert_eq!(
            recorder.positions,
            vec![
                CellPosition::new(1, 0),
                CellPosition::new(0, 1),
                CellPosition::new(2, 1),
                CellPosition::new(1, 2),
            ]
        );
        assert_eq!(recorder.summaries.len(), 1);
        assert_eq!(recorder.summaries[0].generation, 1);
    }

    #[test]
    fn history_is_bounded() {
        let config = GridConfig {
            history_capacity: 3,
            ..classic_config(4, 4)
        };
        let mut grid = Grid::with_config(config).expect("grid");
        for _ in 0..5 {
            grid.advance();
        }
        let generations: Vec<u64> = grid.history().map(|s| s.generation).collect();
        assert_eq!(generations, vec![3, 4, 5]);
    }

    #[test]
    fn neighbor_centered_births_stay_in_range() {
        let config = GridConfig {
            rules: RuleConfig {
                frequency_source: FrequencySource::NeighborCentered { spread: 0.7 },
                ..RuleConfig::classic()
            },
            ..classic_config(6, 6)
        };
        let mut grid = Grid::with_config(config).expect("grid");
        for y in 0..3 {
            grid.set_cell_alive(1, y, true);
            grid.set_cell_frequency(1, y, 19_500.0);
        }
        grid.advance();
        for (x, y) in [(0, 1), (2, 1)] {
            let cell = grid.cell(x, y);
            assert!(cell.is_alive());
            assert!(grid.config().frequency_range.contains(cell.frequency()));
            assert!(cell.frequency() >= 19_500.0 * 0.3 - 1.0);
        }
    }
}
