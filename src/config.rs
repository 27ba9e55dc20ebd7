// THEORY:
// Every number the engine compares an angle against lives here. The defaults are a
// starting calibration, not ground truth, so they are exposed as one plain,
// serializable record that callers can load from JSON and override piecemeal.
//
// Key architectural principles:
// 1.  **Plain data**: `AnalysisConfig` is a struct of `pub` fields with a `Default`.
//     There is no builder and no hidden state.
// 2.  **Partial overrides**: Every record is `#[serde(default)]`, so a JSON file that
//     names only `squat.cycle.peak_angle` keeps every other default.
// 3.  **Validate once**: `validate` rejects configurations that cannot describe a
//     working state machine (inverted hysteresis bands, a zero frame stride, an
//     alpha outside (0, 1]). Sessions validate on construction and never re-check.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core_modules::joint::Side;
use crate::core_modules::rep_machine::CycleDirection;
use crate::error::ConfigError;

/// Top-level configuration for an analysis session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Joints below this confidence make any angle they contribute to undefined.
    pub angle_confidence_threshold: f64,
    /// Weight of the newest sample in the exponential smoother, in (0, 1].
    pub smoothing_alpha: f64,
    /// Consecutive undefined frames tolerated before a signal is declared lost.
    pub stale_frame_limit: u32,
    /// Number of recent smoothed values each signal retains.
    pub signal_history_window: usize,
    /// A rep cycle that takes longer than this is discarded.
    pub max_rep_duration_seconds: f64,
    /// Analyze only frames whose index is a multiple of this value.
    pub frame_stride: u64,
    /// The body side facing the camera; single-sided measurements use its joints.
    pub body_side: Side,
    /// Ankles below this confidence count as out of frame.
    pub framing_visibility_threshold: f64,
    /// Minimum shoulder-to-ankle height, as a fraction of the frame, before the
    /// athlete is considered too close to the camera.
    pub min_body_height: f64,
    pub squat: SquatThresholds,
    pub pushup: PushupThresholds,
    pub plank: PlankThresholds,
    pub lunge: LungeThresholds,
    pub deadlift: DeadliftThresholds,
    pub bicep_curl: BicepCurlThresholds,
    pub shoulder_raise: ShoulderRaiseThresholds,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            angle_confidence_threshold: 0.5,
            smoothing_alpha: 0.3,
            stale_frame_limit: 10,
            signal_history_window: 30,
            max_rep_duration_seconds: 8.0,
            frame_stride: 1,
            body_side: Side::Right,
            framing_visibility_threshold: 0.3,
            min_body_height: 0.25,
            squat: SquatThresholds::default(),
            pushup: PushupThresholds::default(),
            plank: PlankThresholds::default(),
            lunge: LungeThresholds::default(),
            deadlift: DeadliftThresholds::default(),
            bicep_curl: BicepCurlThresholds::default(),
            shoulder_raise: ShoulderRaiseThresholds::default(),
        }
    }
}

/// The hysteresis band of one rep cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CycleThresholds {
    /// The rest zone starts here.
    pub rest_angle: f64,
    /// The peak zone starts here.
    pub peak_angle: f64,
    /// Travel past `rest_angle` that turns an abandoned cycle into a partial rep.
    #[serde(default = "default_partial_rep_margin")]
    pub partial_rep_margin: f64,
}

fn default_partial_rep_margin() -> f64 {
    20.0
}

impl CycleThresholds {
    pub const fn new(rest_angle: f64, peak_angle: f64) -> Self {
        Self {
            rest_angle,
            peak_angle,
            partial_rep_margin: 20.0,
        }
    }

    fn validate(&self, field: &'static str, direction: CycleDirection) -> Result<(), ConfigError> {
        for angle in [self.rest_angle, self.peak_angle] {
            if !(0.0..=180.0).contains(&angle) {
                return Err(ConfigError::invalid_value(field, "angles must be within [0, 180]"));
            }
        }
        let ordered = match direction {
            CycleDirection::Flexion => self.rest_angle > self.peak_angle,
            CycleDirection::Extension => self.rest_angle < self.peak_angle,
        };
        if !ordered {
            let reason = match direction {
                CycleDirection::Flexion => "rest_angle must be greater than peak_angle",
                CycleDirection::Extension => "rest_angle must be less than peak_angle",
            };
            return Err(ConfigError::invalid_value(field, reason));
        }
        if self.partial_rep_margin < 0.0 {
            return Err(ConfigError::invalid_value(field, "partial_rep_margin must be >= 0.0"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SquatThresholds {
    /// Knee angle (hip-knee-ankle).
    pub cycle: CycleThresholds,
    /// Torso angle from horizontal below which the athlete is leaning forward.
    pub back_lean_warning: f64,
    pub back_lean_critical: f64,
    /// Knee width below this fraction of ankle width is knee cave.
    pub knee_cave_ratio: f64,
    /// Heel above the toe by more than this (normalized units) is a heel lift.
    pub heel_lift: f64,
}

impl Default for SquatThresholds {
    fn default() -> Self {
        Self {
            cycle: CycleThresholds::new(160.0, 90.0),
            back_lean_warning: 60.0,
            back_lean_critical: 45.0,
            knee_cave_ratio: 0.7,
            heel_lift: 0.03,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PushupThresholds {
    /// Elbow angle (shoulder-elbow-wrist).
    pub cycle: CycleThresholds,
    /// Shoulder-hip-ankle angle required before any rep may count.
    pub alignment_min: f64,
    /// Largest vertical shoulder-hip gap still considered a horizontal torso.
    pub max_torso_rise: f64,
    /// Shoulder-hip-ankle angle below which hips sag or pike.
    pub hip_line_min: f64,
    /// Horizontal elbow-to-shoulder distance that counts as flared elbows.
    pub elbow_flare: f64,
    /// Nose below the shoulder by more than this is a dropped head.
    pub head_drop: f64,
}

impl Default for PushupThresholds {
    fn default() -> Self {
        Self {
            cycle: CycleThresholds::new(155.0, 100.0),
            alignment_min: 150.0,
            max_torso_rise: 0.2,
            hip_line_min: 165.0,
            elbow_flare: 0.25,
            head_drop: 0.15,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlankThresholds {
    /// Body-line angle at which a hold begins.
    pub hold_enter_angle: f64,
    /// Body-line angle below which a hold breaks.
    pub hold_exit_angle: f64,
    /// Body-line angle below which hips are flagged as sagging or piking.
    pub body_line_min: f64,
    pub max_torso_rise: f64,
}

impl Default for PlankThresholds {
    fn default() -> Self {
        Self {
            hold_enter_angle: 160.0,
            hold_exit_angle: 150.0,
            body_line_min: 160.0,
            max_torso_rise: 0.2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LungeThresholds {
    /// Front knee angle.
    pub cycle: CycleThresholds,
    pub front_knee_min: f64,
    pub back_knee_min: f64,
}

impl Default for LungeThresholds {
    fn default() -> Self {
        Self {
            cycle: CycleThresholds::new(150.0, 100.0),
            front_knee_min: 70.0,
            back_knee_min: 80.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeadliftThresholds {
    /// Hip angle (shoulder-hip-knee).
    pub cycle: CycleThresholds,
    /// Back angles outside `[safe_back_min, safe_back_max]` are unsafe on any frame.
    pub safe_back_min: f64,
    pub safe_back_max: f64,
    /// Ear-shoulder-hip angle thresholds for a rounding spine.
    pub spine_warning: f64,
    pub spine_critical: f64,
    /// Mid-cycle, a knee angle this far below the hip angle means the lift is squatted.
    pub knee_dominance_margin: f64,
    /// Horizontal shoulder-to-knee distance that means the load drifts off the legs.
    pub bar_drift: f64,
}

impl Default for DeadliftThresholds {
    fn default() -> Self {
        Self {
            cycle: CycleThresholds::new(165.0, 120.0),
            safe_back_min: 50.0,
            safe_back_max: 180.0,
            spine_warning: 155.0,
            spine_critical: 135.0,
            knee_dominance_margin: 0.0,
            bar_drift: 0.2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BicepCurlThresholds {
    /// Elbow angle.
    pub cycle: CycleThresholds,
    /// Horizontal elbow-to-shoulder distance that counts as a swinging elbow.
    pub elbow_drift: f64,
}

impl Default for BicepCurlThresholds {
    fn default() -> Self {
        Self {
            cycle: CycleThresholds::new(140.0, 70.0),
            elbow_drift: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShoulderRaiseThresholds {
    /// Arm angle (hip-shoulder-elbow), extension direction.
    pub cycle: CycleThresholds,
    pub too_high: f64,
}

impl Default for ShoulderRaiseThresholds {
    fn default() -> Self {
        Self {
            cycle: CycleThresholds::new(30.0, 70.0),
            too_high: 110.0,
        }
    }
}

impl AnalysisConfig {
    /// Load an [`AnalysisConfig`] from a JSON file at `path` and validate it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::FileRead`] if the file cannot be read,
    /// [`ConfigError::Parse`] if the JSON is malformed and
    /// [`ConfigError::InvalidValue`] if validation fails.
    pub fn from_json(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config: AnalysisConfig = serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all fields and return the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.angle_confidence_threshold) {
            return Err(ConfigError::invalid_value(
                "angle_confidence_threshold",
                "must be within [0.0, 1.0]",
            ));
        }
        if !(self.smoothing_alpha > 0.0 && self.smoothing_alpha <= 1.0) {
            return Err(ConfigError::invalid_value("smoothing_alpha", "must be within (0.0, 1.0]"));
        }
        if self.signal_history_window == 0 {
            return Err(ConfigError::invalid_value("signal_history_window", "must be > 0"));
        }
        if self.max_rep_duration_seconds <= 0.0 {
            return Err(ConfigError::invalid_value("max_rep_duration_seconds", "must be > 0.0"));
        }
        if self.frame_stride == 0 {
            return Err(ConfigError::invalid_value("frame_stride", "must be > 0"));
        }
        if !(0.0..=1.0).contains(&self.framing_visibility_threshold) {
            return Err(ConfigError::invalid_value(
                "framing_visibility_threshold",
                "must be within [0.0, 1.0]",
            ));
        }
        if !(0.0..=1.0).contains(&self.min_body_height) {
            return Err(ConfigError::invalid_value("min_body_height", "must be within [0.0, 1.0]"));
        }

        self.squat.cycle.validate("squat.cycle", CycleDirection::Flexion)?;
        if self.squat.back_lean_critical > self.squat.back_lean_warning {
            return Err(ConfigError::invalid_value(
                "squat.back_lean_critical",
                "must be <= back_lean_warning",
            ));
        }

        self.pushup.cycle.validate("pushup.cycle", CycleDirection::Flexion)?;

        if self.plank.hold_exit_angle > self.plank.hold_enter_angle {
            return Err(ConfigError::invalid_value(
                "plank.hold_exit_angle",
                "must be <= hold_enter_angle",
            ));
        }

        self.lunge.cycle.validate("lunge.cycle", CycleDirection::Flexion)?;

        self.deadlift.cycle.validate("deadlift.cycle", CycleDirection::Flexion)?;
        if self.deadlift.safe_back_min >= self.deadlift.safe_back_max {
            return Err(ConfigError::invalid_value(
                "deadlift.safe_back_min",
                "must be < safe_back_max",
            ));
        }
        if self.deadlift.spine_critical > self.deadlift.spine_warning {
            return Err(ConfigError::invalid_value(
                "deadlift.spine_critical",
                "must be <= spine_warning",
            ));
        }

        self.bicep_curl.cycle.validate("bicep_curl.cycle", CycleDirection::Flexion)?;
        self.shoulder_raise
            .cycle
            .validate("shoulder_raise.cycle", CycleDirection::Extension)?;

        Ok(())
    }
}
