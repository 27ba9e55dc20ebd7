// THEORY:
// This file is the main entry point for the `form_vision` library crate.
// It defines the public API exposed to whatever owns the frame source: a video
// decoder feeding a pose model, a live capture loop, or a test harness.
//
// The primary goal is to export the `AnalysisSession` and its associated data
// structures (`AnalysisConfig`, `SessionReport`, `FrameAnalysis`, etc.) as the
// clean, high-level interface for the whole engine. The per-frame machinery in
// `core_modules` (angles, smoothing, the rep state machine, form rules) stays
// reachable for callers that want to compose their own pipeline, but the session
// is the only component that owns a report.

pub mod config;
pub mod core_modules;
pub mod error;
pub mod parallel_pipeline;
pub mod session;

pub use config::AnalysisConfig;
pub use core_modules::exercise::{ExerciseInfo, ExerciseType};
pub use core_modules::form_rules::{FormIssue, Severity};
pub use core_modules::joint::{Joint, JointFrame, JointName, Side};
pub use error::{AnalysisError, ConfigError, FrameFault, Result};
pub use session::{AnalysisSession, FrameAnalysis, IssueSummary, SessionReport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
