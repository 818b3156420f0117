//! Integration layer between the CellSynth engine and its consumers.
//!
//! The core grid knows nothing about frames, textures, or oscillators. This
//! crate paces generations against wall-clock time and mirrors grid state into
//! render and audio adapters through the observer interface.

pub mod audio;
pub mod clock;
pub mod headless;
pub mod render;
pub mod report;

pub use audio::{DEFAULT_RAMP_SECONDS, JUST_RATIOS, Voice, VoiceBank};
pub use clock::{DEFAULT_STEP_INTERVAL, MAX_STEPS_PER_UPDATE, StepClock};
pub use headless::{HeadlessOptions, run_headless};
pub use render::{CHANNELS, CellStateBuffer};
pub use report::{GenerationStats, HeadlessReport, ReportSummary};
