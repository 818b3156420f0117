//! Frame loop without a window or audio device.
//!
//! Simulated frames feed a [`StepClock`], the released generations advance the
//! grid, and both adapters follow along as observers exactly as they would in
//! an interactive session.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::{Result, bail};
use cellsynth_core::Grid;
use tracing::{debug, info};

use crate::audio::VoiceBank;
use crate::clock::{DEFAULT_STEP_INTERVAL, StepClock};
use crate::render::CellStateBuffer;
use crate::report::{GenerationStats, HeadlessReport};

/// Most frames a single generation may span; finer frame intervals are rejected.
pub const MAX_FRAMES_PER_GENERATION: u128 = 10_000;

/// Parameters of a headless run.
#[derive(Debug, Clone)]
pub struct HeadlessOptions {
    /// Generations to simulate before stopping.
    pub generations: u64,
    pub step_interval: Duration,
    /// Simulated wall-clock time between frames.
    pub frame_interval: Duration,
    pub pan_seed: u64,
}

impl Default for HeadlessOptions {
    fn default() -> Self {
        Self {
            generations: 120,
            step_interval: DEFAULT_STEP_INTERVAL,
            frame_interval: Duration::from_millis(16),
            pan_seed: 0xCE11_5A7E,
        }
    }
}

/// Run `grid` forward and collect a report.
pub fn run_headless(grid: &mut Grid, options: &HeadlessOptions) -> Result<HeadlessReport> {
    if options.step_interval.is_zero() || options.frame_interval.is_zero() {
        bail!("step and frame intervals must be non-zero");
    }
    let frames_per_generation = options
        .step_interval
        .as_nanos()
        .div_ceil(options.frame_interval.as_nanos());
    if frames_per_generation > MAX_FRAMES_PER_GENERATION {
        bail!(
            "frame interval {:?} is too fine for step interval {:?} (over {MAX_FRAMES_PER_GENERATION} frames per generation)",
            options.frame_interval,
            options.step_interval
        );
    }

    let buffer = Arc::new(Mutex::new(CellStateBuffer::from_grid(grid)));
    let voices = Arc::new(Mutex::new(VoiceBank::from_grid(grid, options.pan_seed)));
    let buffer_id = grid.attach_observer(&buffer);
    let voices_id = grid.attach_observer(&voices);

    let mut clock = StepClock::new(options.step_interval);
    let mut report = HeadlessReport::new(GenerationStats::from_grid(
        grid,
        &voices.lock().unwrap_or_else(PoisonError::into_inner),
    ));
    let target = grid.generation() + options.generations;
    let frame_seconds = options.frame_interval.as_secs_f32();
    let mut frames = 0u64;
    let mut uploads = 0u64;

    while grid.generation() < target {
        let due = clock.update(options.frame_interval) as u64;
        let steps = due.min(target - grid.generation());
        for _ in 0..steps {
            let summary = grid.advance();
            let voices = voices.lock().unwrap_or_else(PoisonError::into_inner);
            report.record(GenerationStats::from_summary(&summary, &voices));
        }
        voices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .advance_ramps(frame_seconds);
        if buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take_dirty()
        {
            uploads += 1;
        }
        frames += 1;
        if steps > 0 {
            debug!(frame = frames, generation = grid.generation(), steps, "headless frame");
        }
    }

    grid.detach_observer(buffer_id);
    grid.detach_observer(voices_id);
    report.finalize(frames, uploads);
    info!(
        generations = report.summary.generation_count,
        frames,
        final_alive = report.summary.final_alive,
        "headless run complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellsynth_core::{GridConfig, RuleConfig};

    fn seeded_grid() -> Grid {
        let mut grid = Grid::with_config(GridConfig {
            width: 16,
            height: 16,
            rng_seed: Some(21),
            ..GridConfig::default()
        })
        .expect("grid");
        grid.shuffle(0.3).expect("shuffle");
        grid
    }

    #[test]
    fn runs_requested_generations() {
        let mut grid = seeded_grid();
        let options = HeadlessOptions {
            generations: 25,
            ..HeadlessOptions::default()
        };
        let report = run_headless(&mut grid, &options).expect("run");
        assert_eq!(report.generations.len(), 25);
        assert_eq!(report.summary.final_generation, 25);
        assert_eq!(grid.generation(), 25);
        assert_eq!(grid.observer_count(), 0);
        // 100 ms per generation at 16 ms per frame
        assert!(report.summary.frames_rendered >= 25 * 6);
        assert!(report.summary.buffer_uploads <= report.summary.frames_rendered);
    }

    #[test]
    fn zero_intervals_are_rejected() {
        let mut grid = seeded_grid();
        let options = HeadlessOptions {
            frame_interval: Duration::ZERO,
            ..HeadlessOptions::default()
        };
        assert!(run_headless(&mut grid, &options).is_err());
    }

    #[test]
    fn tiny_step_interval_completes() {
        let mut grid = seeded_grid();
        let options = HeadlessOptions {
            generations: 3,
            step_interval: Duration::from_nanos(100),
            ..HeadlessOptions::default()
        };
        let report = run_headless(&mut grid, &options).expect("run");
        assert_eq!(report.generations.len(), 3);
        assert_eq!(report.summary.frames_rendered, 1);
    }

    #[test]
    fn frame_interval_too_fine_for_step_is_rejected() {
        let mut grid = seeded_grid();
        let options = HeadlessOptions {
            generations: 3,
            frame_interval: Duration::from_nanos(1),
            ..HeadlessOptions::default()
        };
        assert!(run_headless(&mut grid, &options).is_err());
        assert_eq!(grid.generation(), 0);
        assert_eq!(grid.observer_count(), 0);

        let options = HeadlessOptions {
            generations: 2,
            step_interval: Duration::from_millis(10),
            frame_interval: Duration::from_micros(1),
            ..HeadlessOptions::default()
        };
        let report = run_headless(&mut grid, &options).expect("run");
        assert_eq!(report.summary.frames_rendered, 20_000);
    }

    #[test]
    fn generation_stats_track_voice_gain() {
        let mut grid = Grid::with_config(GridConfig {
            width: 4,
            height: 4,
            balance: 0.0,
            rng_seed: Some(5),
            rules: RuleConfig::classic(),
            ..GridConfig::default()
        })
        .expect("grid");
        for x in 0..3 {
            grid.set_cell_alive(x, 1, true);
        }
        let options = HeadlessOptions {
            generations: 1,
            ..HeadlessOptions::default()
        };
        let report = run_headless(&mut grid, &options).expect("run");
        assert_eq!(report.initial.alive, 3);
        assert_eq!(report.initial.active_voices, 3);
        let stats = report.generations[0];
        assert_eq!(stats.active_voices, stats.alive);
        assert!((stats.target_gain - stats.alive as f32 / 16.0).abs() < 1e-6);
    }
}
