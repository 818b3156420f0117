//! JSON report emitted by headless runs.

use std::fs::{self, File};
use std::path::Path;

use anyhow::{Context, Result};
use cellsynth_core::{GenerationSummary, Grid};
use serde::Serialize;

use crate::audio::VoiceBank;

#[derive(Debug, Clone, Serialize)]
pub struct HeadlessReport {
    pub initial: GenerationStats,
    pub generations: Vec<GenerationStats>,
    pub summary: ReportSummary,
}

impl HeadlessReport {
    #[must_use]
    pub fn new(initial: GenerationStats) -> Self {
        Self {
            initial,
            generations: Vec::new(),
            summary: ReportSummary::default(),
        }
    }

    pub fn record(&mut self, stats: GenerationStats) {
        self.generations.push(stats);
    }

    pub fn finalize(&mut self, frames_rendered: u64, buffer_uploads: u64) {
        self.summary = ReportSummary::from(&self.initial, &self.generations);
        self.summary.frames_rendered = frames_rendered;
        self.summary.buffer_uploads = buffer_uploads;
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let file =
            File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
        serde_json::to_writer_pretty(file, self).context("failed to serialize headless report")?;
        Ok(())
    }
}

/// Per-generation statistics, including the audio adapter's view.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GenerationStats {
    pub generation: u64,
    pub alive: usize,
    pub births: usize,
    pub deaths: usize,
    pub changed: usize,
    pub mean_amplitude: f32,
    pub balance: f32,
    pub active_voices: usize,
    pub target_gain: f32,
}

impl GenerationStats {
    /// Stats for the grid's current state, outside of any generation step.
    #[must_use]
    pub fn from_grid(grid: &Grid, voices: &VoiceBank) -> Self {
        let (alive, total) = grid
            .cells()
            .iter()
            .filter(|cell| cell.is_alive())
            .fold((0usize, 0.0f32), |(count, sum), cell| {
                (count + 1, sum + cell.amplitude())
            });
        let summary = GenerationSummary {
            generation: grid.generation(),
            alive,
            total_amplitude: total,
            mean_amplitude: if alive > 0 { total / alive as f32 } else { 0.0 },
            balance: grid.balance(),
            ..GenerationSummary::default()
        };
        Self::from_summary(&summary, voices)
    }

    #[must_use]
    pub fn from_summary(summary: &GenerationSummary, voices: &VoiceBank) -> Self {
        Self {
            generation: summary.generation,
            alive: summary.alive,
            births: summary.births,
            deaths: summary.deaths,
            changed: summary.changed,
            mean_amplitude: summary.mean_amplitude,
            balance: summary.balance,
            active_voices: voices
                .voices()
                .iter()
                .filter(|voice| voice.target_gain() > 0.0)
                .count(),
            target_gain: voices.voices().iter().map(|voice| voice.target_gain()).sum(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReportSummary {
    pub generation_count: usize,
    pub final_generation: u64,
    pub final_alive: usize,
    pub peak_alive: usize,
    pub total_births: usize,
    pub total_deaths: usize,
    pub mean_amplitude_mean: f32,
    pub mean_amplitude_min: f32,
    pub mean_amplitude_max: f32,
    /// First generation with no living cells, if the run went extinct.
    pub extinct_at: Option<u64>,
    pub frames_rendered: u64,
    pub buffer_uploads: u64,
}

impl ReportSummary {
    #[must_use]
    pub fn from(initial: &GenerationStats, generations: &[GenerationStats]) -> Self {
        let Some(final_stats) = generations.last() else {
            return Self {
                final_generation: initial.generation,
                final_alive: initial.alive,
                peak_alive: initial.alive,
                mean_amplitude_mean: initial.mean_amplitude,
                mean_amplitude_min: initial.mean_amplitude,
                mean_amplitude_max: initial.mean_amplitude,
                extinct_at: (initial.alive == 0).then_some(initial.generation),
                ..Self::default()
            };
        };

        let mut min_amplitude = f32::INFINITY;
        let mut max_amplitude = f32::NEG_INFINITY;
        let mut amplitude_sum = 0.0_f32;
        for stats in generations {
            min_amplitude = min_amplitude.min(stats.mean_amplitude);
            max_amplitude = max_amplitude.max(stats.mean_amplitude);
            amplitude_sum += stats.mean_amplitude;
        }

        Self {
            generation_count: generations.len(),
            final_generation: final_stats.generation,
            final_alive: final_stats.alive,
            peak_alive: generations
                .iter()
                .map(|stats| stats.alive)
                .fold(initial.alive, usize::max),
            total_births: generations.iter().map(|stats| stats.births).sum(),
            total_deaths: generations.iter().map(|stats| stats.deaths).sum(),
            mean_amplitude_mean: amplitude_sum / generations.len() as f32,
            mean_amplitude_min: min_amplitude,
            mean_amplitude_max: max_amplitude,
            extinct_at: std::iter::once(initial)
                .chain(generations)
                .find(|stats| stats.alive == 0)
                .map(|stats| stats.generation),
            frames_rendered: 0,
            buffer_uploads: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(generation: u64, alive: usize, births: usize, deaths: usize) -> GenerationStats {
        GenerationStats {
            generation,
            alive,
            births,
            deaths,
            changed: births + deaths,
            mean_amplitude: if alive > 0 { 0.1 * generation as f32 } else { 0.0 },
            balance: 0.5,
            active_voices: alive,
            target_gain: 0.0,
        }
    }

    #[test]
    fn summary_aggregates_generations() {
        let initial = stats(0, 4, 0, 0);
        let generations = [stats(1, 6, 3, 1), stats(2, 5, 1, 2), stats(3, 0, 0, 5)];
        let summary = ReportSummary::from(&initial, &generations);
        assert_eq!(summary.generation_count, 3);
        assert_eq!(summary.final_generation, 3);
        assert_eq!(summary.final_alive, 0);
        assert_eq!(summary.peak_alive, 6);
        assert_eq!(summary.total_births, 4);
        assert_eq!(summary.total_deaths, 8);
        assert_eq!(summary.extinct_at, Some(3));
        assert_eq!(summary.mean_amplitude_min, 0.0);
        assert!((summary.mean_amplitude_max - 0.2).abs() < 1e-6);
        assert!((summary.mean_amplitude_mean - 0.1).abs() < 1e-6);
    }

    #[test]
    fn empty_run_falls_back_to_initial() {
        let initial = stats(7, 0, 0, 0);
        let summary = ReportSummary::from(&initial, &[]);
        assert_eq!(summary.generation_count, 0);
        assert_eq!(summary.final_generation, 7);
        assert_eq!(summary.extinct_at, Some(7));
    }
}
