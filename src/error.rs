// THEORY:
// Two families of failure exist in this engine and they must never be confused.
//
// 1.  **Session-fatal errors** (`AnalysisError`) are returned as `Err`. They mean the
//     caller asked for something impossible: an unknown exercise, a session that was
//     already finalized, a frame that arrived out of order, or a configuration that
//     cannot describe a valid state machine.
// 2.  **Per-frame faults** (`FrameFault`) are ordinary data. Poor joint confidence,
//     a signal that has gone stale, or a rep that took too long are expected in real
//     footage. They are reported alongside the frame result and folded into the final
//     report's feedback; they never abort a session.

use std::path::PathBuf;

use serde::Serialize;

/// Common result type for analysis operations
pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Unified error type for session-level failures.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// The exercise selector is not one of the supported exercise types.
    #[error("Unknown exercise type: {0}")]
    InvalidExerciseType(String),

    /// `ingest` or `finalize` was called on a session that has already been finalized.
    #[error("Session has already been finalized")]
    FinalizedSessionReuse,

    /// Frames must arrive in strictly increasing index order.
    #[error("Frame {received} arrived after frame {previous}")]
    OutOfOrderFrame { previous: u64, received: u64 },

    /// The configuration failed validation.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A background session task stopped before it could answer.
    #[error("Analysis worker is no longer running")]
    WorkerUnavailable,
}

/// Errors produced while loading or validating an `AnalysisConfig`.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A field has an invalid value.
    #[error("Invalid value for `{field}`: {reason}")]
    InvalidValue {
        /// Name of the field.
        field: &'static str,
        /// Human-readable reason.
        reason: String,
    },

    /// A configuration file could not be read from disk.
    #[error("Cannot read config file `{path}`: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A configuration file contains malformed JSON.
    #[error("Cannot parse config file `{path}`: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl ConfigError {
    pub fn invalid_value(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}

/// A recoverable, per-frame condition. Reported with the frame, never returned as `Err`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FrameFault {
    /// A joint contributing to this signal was below the confidence threshold.
    /// The signal holds its last value and the state machine does not transition.
    UndefinedAngle { signal: &'static str },
    /// The signal has been undefined for more consecutive frames than the stale limit.
    /// Rep detection pauses and the in-progress rep is dropped.
    SignalLost { signal: &'static str },
    /// The in-progress cycle exceeded the maximum rep duration and was discarded.
    RepTimeout { elapsed_seconds: f64 },
}
