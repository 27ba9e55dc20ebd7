// THEORY:
// The `session` module is the final, top-level API for the engine. An
// `AnalysisSession` is one athlete performing one exercise: frames are pushed in
// with `ingest` and a `SessionReport` comes out of `finalize`. It owns every piece
// of mutable state for that run, so independent sessions share nothing and may run
// on different threads.
//
// Key architectural principles:
// 1.  **Push based**: The session never pulls frames or blocks on I/O. The caller
//     decides when frames arrive and when to stop; `finalize` works on whatever
//     has been seen so far.
// 2.  **Strict ordering**: Frame indices must strictly increase. A frame that
//     breaks the order is rejected with an error and otherwise ignored.
// 3.  **Terminal finalize**: A report is produced exactly once. Any later `ingest`
//     or `finalize` is a programming error and fails with `FinalizedSessionReuse`.
// 4.  **Aggregation only**: Per-frame judgement lives in the `ExerciseAnalyzer`.
//     The session folds its output into counters, the issue ledger and timing.

use std::time::Instant;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::AnalysisConfig;
use crate::core_modules::analyzer::ExerciseAnalyzer;
use crate::core_modules::exercise::ExerciseType;
use crate::core_modules::form_rules::Severity;
use crate::core_modules::issue_ledger::{IssueLedger, MAX_SCORE};
use crate::core_modules::joint::JointFrame;
use crate::error::{AnalysisError, Result};

pub use crate::core_modules::analyzer::FrameAnalysis;

/// One distinct issue code in the final report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IssueSummary {
    pub code: &'static str,
    pub severity: Severity,
    pub message: &'static str,
    /// Number of times the code was raised across all analyzed frames.
    pub occurrences: u64,
}

/// The immutable outcome of a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionReport {
    pub exercise: ExerciseType,
    pub rep_count: u32,
    /// `100 − Σ deduction` over distinct issue codes, clamped to [0, 100].
    pub form_score: u8,
    /// Mean of the per-frame scores; 100 when no frame was analyzed.
    pub average_frame_score: f64,
    pub worst_frame_score: u8,
    pub frames_received: u64,
    pub frames_analyzed: u64,
    pub processing_time_seconds: f64,
    /// Distinct feedback messages, worst first.
    pub feedback: Vec<String>,
    pub issues: Vec<IssueSummary>,
    /// Cycles dropped by timeout, signal loss, a failed position gate or a safety rule.
    pub reps_discarded: u32,
    /// Longest continuous hold, for hold exercises.
    pub hold_seconds: Option<f64>,
}

/// Accumulates one exercise set into a `SessionReport`.
pub struct AnalysisSession {
    analyzer: ExerciseAnalyzer,
    frame_stride: u64,
    ledger: IssueLedger,
    last_frame_index: Option<u64>,
    frames_received: u64,
    frames_analyzed: u64,
    frame_score_total: u64,
    worst_frame_score: Option<u8>,
    started_at: Instant,
    finalized: bool,
}

impl AnalysisSession {
    /// Starts a session after validating `config`.
    pub fn new(exercise: ExerciseType, config: AnalysisConfig) -> Result<Self> {
        config.validate()?;
        info!(%exercise, "analysis session started");
        Ok(Self {
            frame_stride: config.frame_stride,
            analyzer: ExerciseAnalyzer::new(exercise, config),
            ledger: IssueLedger::new(),
            last_frame_index: None,
            frames_received: 0,
            frames_analyzed: 0,
            frame_score_total: 0,
            worst_frame_score: None,
            started_at: Instant::now(),
            finalized: false,
        })
    }

    /// Starts a session from an exercise selector such as `"squat"`.
    pub fn from_selector(selector: &str, config: AnalysisConfig) -> Result<Self> {
        let exercise = selector.parse::<ExerciseType>()?;
        Self::new(exercise, config)
    }

    pub fn exercise(&self) -> ExerciseType {
        self.analyzer.exercise()
    }

    pub fn rep_count(&self) -> u32 {
        self.analyzer.rep_count()
    }

    pub fn frames_analyzed(&self) -> u64 {
        self.frames_analyzed
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Feeds the next frame.
    ///
    /// Returns `Ok(None)` for frames skipped by the frame stride.
    ///
    /// # Errors
    ///
    /// [`AnalysisError::FinalizedSessionReuse`] after `finalize`, and
    /// [`AnalysisError::OutOfOrderFrame`] when the index does not increase. A rejected
    /// frame leaves the session unchanged.
    pub fn ingest(&mut self, frame: &JointFrame) -> Result<Option<FrameAnalysis>> {
        if self.finalized {
            return Err(AnalysisError::FinalizedSessionReuse);
        }
        if let Some(previous) = self.last_frame_index {
            if frame.frame_index <= previous {
                warn!(previous, received = frame.frame_index, "rejected out-of-order frame");
                return Err(AnalysisError::OutOfOrderFrame {
                    previous,
                    received: frame.frame_index,
                });
            }
        }
        self.last_frame_index = Some(frame.frame_index);
        self.frames_received += 1;

        if frame.frame_index % self.frame_stride != 0 {
            return Ok(None);
        }

        let analysis = self.analyzer.analyze(frame);
        self.frames_analyzed += 1;
        self.frame_score_total += u64::from(analysis.frame_score);
        self.worst_frame_score = Some(
            self.worst_frame_score
                .map_or(analysis.frame_score, |worst| worst.min(analysis.frame_score)),
        );
        self.ledger.record_all(&analysis.issues);
        Ok(Some(analysis))
    }

    /// Produces the report. The session cannot be used afterwards.
    ///
    /// # Errors
    ///
    /// [`AnalysisError::FinalizedSessionReuse`] when called a second time.
    pub fn finalize(&mut self) -> Result<SessionReport> {
        if self.finalized {
            return Err(AnalysisError::FinalizedSessionReuse);
        }
        self.finalized = true;

        let average_frame_score = if self.frames_analyzed == 0 {
            f64::from(MAX_SCORE)
        } else {
            self.frame_score_total as f64 / self.frames_analyzed as f64
        };
        let issues = self
            .ledger
            .ordered()
            .into_iter()
            .map(|entry| IssueSummary {
                code: entry.issue.code,
                severity: entry.issue.severity,
                message: entry.issue.message,
                occurrences: entry.occurrences,
            })
            .collect();

        let report = SessionReport {
            exercise: self.analyzer.exercise(),
            rep_count: self.analyzer.rep_count(),
            form_score: self.ledger.form_score(),
            average_frame_score,
            worst_frame_score: self.worst_frame_score.unwrap_or(MAX_SCORE as u8),
            frames_received: self.frames_received,
            frames_analyzed: self.frames_analyzed,
            processing_time_seconds: self.started_at.elapsed().as_secs_f64(),
            feedback: self.ledger.feedback(),
            issues,
            reps_discarded: self.analyzer.reps_discarded(),
            hold_seconds: self.analyzer.longest_hold(),
        };
        info!(
            exercise = %report.exercise,
            reps = report.rep_count,
            form_score = report.form_score,
            frames = report.frames_analyzed,
            "analysis session finalized"
        );
        Ok(report)
    }
}
