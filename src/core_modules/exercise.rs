// THEORY:
// The `exercise` module is where exercises stop being code and become data. Each
// supported movement is an `ExerciseProfile`: which angle signals to measure, what
// drives the rep counter (a cycle or a hold), which position gate must pass, and
// whether the framing check applies. The shared `ExerciseAnalyzer` reads a profile
// and never branches on the exercise name for anything but its rule set.
//
// Key architectural principles:
// 1.  **Closed selector set**: `ExerciseType` is an enum. Unknown names are rejected
//     by `FromStr` before any session exists.
// 2.  **Named signals**: A `Signal` is a measured angle with a stable name. Signals
//     on the body side facing the camera resolve their joints from the configured
//     `Side`; the lunge tracks both knees explicitly.
// 3.  **Descriptors from configuration**: Profiles are built from `AnalysisConfig`,
//     so recalibrating an exercise never touches engine code.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::config::{AnalysisConfig, CycleThresholds};
use crate::core_modules::angle::JointTriple;
use crate::core_modules::joint::{JointName, Limb, Side};
use crate::core_modules::rep_machine::{CycleDescriptor, CycleDirection, PhaseLabels};
use crate::error::AnalysisError;

/// The supported exercises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseType {
    Squat,
    Pushup,
    Plank,
    Lunge,
    Deadlift,
    BicepCurl,
    ShoulderRaise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Difficulty {
    Beginner,
    Intermediate,
}

/// Catalog entry describing an exercise to a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExerciseInfo {
    pub selector: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub difficulty: Difficulty,
    pub muscle_groups: &'static [&'static str],
}

impl ExerciseType {
    pub const ALL: [ExerciseType; 7] = [
        ExerciseType::Squat,
        ExerciseType::Pushup,
        ExerciseType::Plank,
        ExerciseType::Lunge,
        ExerciseType::Deadlift,
        ExerciseType::BicepCurl,
        ExerciseType::ShoulderRaise,
    ];

    /// The selector string accepted by `FromStr`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExerciseType::Squat => "squat",
            ExerciseType::Pushup => "pushup",
            ExerciseType::Plank => "plank",
            ExerciseType::Lunge => "lunge",
            ExerciseType::Deadlift => "deadlift",
            ExerciseType::BicepCurl => "bicep_curl",
            ExerciseType::ShoulderRaise => "shoulder_raise",
        }
    }

    pub fn info(&self) -> ExerciseInfo {
        let selector = self.as_str();
        match self {
            ExerciseType::Squat => ExerciseInfo {
                selector,
                name: "Squat",
                description: "Lower body compound exercise targeting quads, glutes, and hamstrings",
                difficulty: Difficulty::Beginner,
                muscle_groups: &["Quadriceps", "Glutes", "Hamstrings", "Core"],
            },
            ExerciseType::Pushup => ExerciseInfo {
                selector,
                name: "Push-up",
                description: "Upper body compound exercise targeting chest, shoulders, and triceps",
                difficulty: Difficulty::Beginner,
                muscle_groups: &["Chest", "Shoulders", "Triceps", "Core"],
            },
            ExerciseType::Plank => ExerciseInfo {
                selector,
                name: "Plank",
                description: "Isometric core exercise for stability and strength",
                difficulty: Difficulty::Beginner,
                muscle_groups: &["Core", "Shoulders", "Back"],
            },
            ExerciseType::Lunge => ExerciseInfo {
                selector,
                name: "Lunge",
                description: "Lower body unilateral exercise for balance and strength",
                difficulty: Difficulty::Beginner,
                muscle_groups: &["Quadriceps", "Glutes", "Hamstrings"],
            },
            ExerciseType::Deadlift => ExerciseInfo {
                selector,
                name: "Deadlift",
                description: "Full body compound exercise built on the hip hinge pattern",
                difficulty: Difficulty::Intermediate,
                muscle_groups: &["Hamstrings", "Glutes", "Back", "Core"],
            },
            ExerciseType::BicepCurl => ExerciseInfo {
                selector,
                name: "Bicep Curl",
                description: "Arm isolation exercise for biceps",
                difficulty: Difficulty::Beginner,
                muscle_groups: &["Biceps"],
            },
            ExerciseType::ShoulderRaise => ExerciseInfo {
                selector,
                name: "Shoulder Raise",
                description: "Shoulder isolation exercise",
                difficulty: Difficulty::Beginner,
                muscle_groups: &["Shoulders"],
            },
        }
    }
}

impl fmt::Display for ExerciseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExerciseType {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        let alias = match normalized.as_str() {
            "push_up" => "pushup",
            "curl" => "bicep_curl",
            other => other,
        };
        ExerciseType::ALL
            .iter()
            .copied()
            .find(|exercise| exercise.as_str() == alias)
            .ok_or_else(|| AnalysisError::InvalidExerciseType(s.to_string()))
    }
}

/// A named angle signal the engine can smooth and track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Signal {
    /// hip-knee-ankle on the camera side
    Knee,
    /// shoulder-hip-knee on the camera side
    Hip,
    /// shoulder-elbow-wrist on the camera side
    Elbow,
    /// shoulder-hip-ankle on the camera side
    BodyLine,
    /// ear-shoulder-hip on the camera side
    Spine,
    /// hip-shoulder-elbow on the camera side
    Arm,
    LeftKnee,
    RightKnee,
}

impl Signal {
    pub fn name(&self) -> &'static str {
        match self {
            Signal::Knee => "knee",
            Signal::Hip => "hip",
            Signal::Elbow => "elbow",
            Signal::BodyLine => "body_line",
            Signal::Spine => "spine",
            Signal::Arm => "arm",
            Signal::LeftKnee => "left_knee",
            Signal::RightKnee => "right_knee",
        }
    }

    /// The knee signal of a specific leg.
    pub fn knee_of(side: Side) -> Signal {
        match side {
            Side::Left => Signal::LeftKnee,
            Side::Right => Signal::RightKnee,
        }
    }

    /// Resolves the joints of this signal for the body side facing the camera.
    pub fn triple(&self, side: Side) -> JointTriple {
        let on = |limb| JointName::of(limb, side);
        match self {
            Signal::Knee => JointTriple::new(on(Limb::Hip), on(Limb::Knee), on(Limb::Ankle)),
            Signal::Hip => JointTriple::new(on(Limb::Shoulder), on(Limb::Hip), on(Limb::Knee)),
            Signal::Elbow => JointTriple::new(on(Limb::Shoulder), on(Limb::Elbow), on(Limb::Wrist)),
            Signal::BodyLine => JointTriple::new(on(Limb::Shoulder), on(Limb::Hip), on(Limb::Ankle)),
            Signal::Spine => JointTriple::new(on(Limb::Ear), on(Limb::Shoulder), on(Limb::Hip)),
            Signal::Arm => JointTriple::new(on(Limb::Hip), on(Limb::Shoulder), on(Limb::Elbow)),
            Signal::LeftKnee => JointTriple::new(JointName::LeftHip, JointName::LeftKnee, JointName::LeftAnkle),
            Signal::RightKnee => JointTriple::new(JointName::RightHip, JointName::RightKnee, JointName::RightAnkle),
        }
    }
}

/// The fresh smoothed values available on one frame. Held or lost signals are absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiveSignals {
    values: BTreeMap<Signal, f64>,
}

impl LiveSignals {
    pub fn insert(&mut self, signal: Signal, value: f64) {
        self.values.insert(signal, value);
    }

    pub fn get(&self, signal: Signal) -> Option<f64> {
        self.values.get(&signal).copied()
    }
}

/// What drives the exercise's counter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Tracking {
    /// A rep cycle on one signal. `Signal::LeftKnee`/`RightKnee` here means "the front knee".
    Cycle { signal: Signal, descriptor: CycleDescriptor },
    /// A timed isometric hold on one signal.
    Hold { signal: Signal, enter_angle: f64, exit_angle: f64 },
}

/// Position requirement checked before reps or holds may progress.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionGate {
    /// Minimum shoulder-hip-ankle angle, if alignment is required.
    pub alignment_min: Option<f64>,
    /// Largest vertical shoulder-hip gap of a horizontal torso.
    pub max_torso_rise: f64,
}

/// Everything the shared analyzer needs to know about one exercise.
#[derive(Debug, Clone, PartialEq)]
pub struct ExerciseProfile {
    pub exercise: ExerciseType,
    pub signals: &'static [Signal],
    pub tracking: Tracking,
    pub gate: Option<PositionGate>,
    /// Standing exercises check that the feet are in frame.
    pub framing_check: bool,
    /// Any critical issue discards the in-progress cycle.
    pub critical_invalidates: bool,
    /// Cycle signal follows the classified front leg.
    pub tracks_front_leg: bool,
}

impl ExerciseProfile {
    pub fn for_exercise(exercise: ExerciseType, config: &AnalysisConfig) -> Self {
        let max_rep_duration = config.max_rep_duration_seconds;
        let flexion = |cycle: &CycleThresholds, labels| CycleDescriptor {
            direction: CycleDirection::Flexion,
            rest_angle: cycle.rest_angle,
            peak_angle: cycle.peak_angle,
            partial_rep_margin: cycle.partial_rep_margin,
            max_rep_duration,
            labels,
        };

        let base = ExerciseProfile {
            exercise,
            signals: &[],
            tracking: Tracking::Hold {
                signal: Signal::BodyLine,
                enter_angle: config.plank.hold_enter_angle,
                exit_angle: config.plank.hold_exit_angle,
            },
            gate: None,
            framing_check: false,
            critical_invalidates: false,
            tracks_front_leg: false,
        };

        match exercise {
            ExerciseType::Squat => ExerciseProfile {
                signals: &[Signal::Knee],
                tracking: Tracking::Cycle {
                    signal: Signal::Knee,
                    descriptor: flexion(&config.squat.cycle, SQUAT_LABELS),
                },
                framing_check: true,
                ..base
            },
            ExerciseType::Pushup => ExerciseProfile {
                signals: &[Signal::Elbow, Signal::BodyLine],
                tracking: Tracking::Cycle {
                    signal: Signal::Elbow,
                    descriptor: flexion(&config.pushup.cycle, PUSHUP_LABELS),
                },
                gate: Some(PositionGate {
                    alignment_min: Some(config.pushup.alignment_min),
                    max_torso_rise: config.pushup.max_torso_rise,
                }),
                ..base
            },
            ExerciseType::Plank => ExerciseProfile {
                signals: &[Signal::BodyLine],
                gate: Some(PositionGate {
                    alignment_min: None,
                    max_torso_rise: config.plank.max_torso_rise,
                }),
                ..base
            },
            ExerciseType::Lunge => ExerciseProfile {
                signals: &[Signal::LeftKnee, Signal::RightKnee],
                tracking: Tracking::Cycle {
                    signal: Signal::knee_of(config.body_side),
                    descriptor: flexion(&config.lunge.cycle, LUNGE_LABELS),
                },
                framing_check: true,
                tracks_front_leg: true,
                ..base
            },
            ExerciseType::Deadlift => ExerciseProfile {
                signals: &[Signal::Hip, Signal::Knee, Signal::Spine],
                tracking: Tracking::Cycle {
                    signal: Signal::Hip,
                    descriptor: flexion(&config.deadlift.cycle, DEADLIFT_LABELS),
                },
                framing_check: true,
                critical_invalidates: true,
                ..base
            },
            ExerciseType::BicepCurl => ExerciseProfile {
                signals: &[Signal::Elbow],
                tracking: Tracking::Cycle {
                    signal: Signal::Elbow,
                    descriptor: flexion(&config.bicep_curl.cycle, CURL_LABELS),
                },
                ..base
            },
            ExerciseType::ShoulderRaise => ExerciseProfile {
                signals: &[Signal::Arm],
                tracking: Tracking::Cycle {
                    signal: Signal::Arm,
                    descriptor: CycleDescriptor {
                        direction: CycleDirection::Extension,
                        ..flexion(&config.shoulder_raise.cycle, RAISE_LABELS)
                    },
                },
                ..base
            },
        }
    }
}

const SQUAT_LABELS: PhaseLabels = PhaseLabels {
    setup: "setup",
    rest: "standing",
    leaving: "descending",
    peak: "bottom",
    returning: "ascending",
};

const PUSHUP_LABELS: PhaseLabels = PhaseLabels {
    setup: "setup",
    rest: "plank",
    leaving: "lowering",
    peak: "bottom",
    returning: "raising",
};

const LUNGE_LABELS: PhaseLabels = PhaseLabels {
    setup: "setup",
    rest: "standing",
    leaving: "descending",
    peak: "bottom",
    returning: "ascending",
};

const DEADLIFT_LABELS: PhaseLabels = PhaseLabels {
    setup: "setup",
    rest: "lockout",
    leaving: "hinging",
    peak: "bottom",
    returning: "lifting",
};

const CURL_LABELS: PhaseLabels = PhaseLabels {
    setup: "setup",
    rest: "extended",
    leaving: "curling",
    peak: "top",
    returning: "lowering",
};

const RAISE_LABELS: PhaseLabels = PhaseLabels {
    setup: "setup",
    rest: "arms_down",
    leaving: "raising",
    peak: "top",
    returning: "lowering",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selectors_parse_with_aliases() {
        for exercise in ExerciseType::ALL {
            assert_eq!(exercise.as_str().parse::<ExerciseType>().unwrap(), exercise);
        }
        assert_eq!("Push-Up".parse::<ExerciseType>().unwrap(), ExerciseType::Pushup);
        assert_eq!("bicep curl".parse::<ExerciseType>().unwrap(), ExerciseType::BicepCurl);
    }

    #[test]
    fn unknown_selector_is_rejected() {
        let err = "burpee".parse::<ExerciseType>().unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidExerciseType(name) if name == "burpee"));
    }

    #[test]
    fn catalog_describes_every_exercise() {
        for exercise in ExerciseType::ALL {
            let info = exercise.info();
            assert_eq!(info.selector, exercise.as_str());
            assert!(!info.muscle_groups.is_empty());
        }
        assert_eq!(ExerciseType::Deadlift.info().difficulty, Difficulty::Intermediate);
    }

    #[test]
    fn profiles_follow_configuration() {
        let mut config = AnalysisConfig::default();
        config.squat.cycle.peak_angle = 80.0;
        let profile = ExerciseProfile::for_exercise(ExerciseType::Squat, &config);
        match profile.tracking {
            Tracking::Cycle { signal, descriptor } => {
                assert_eq!(signal, Signal::Knee);
                assert_eq!(descriptor.peak_angle, 80.0);
                assert_eq!(descriptor.max_rep_duration, 8.0);
            }
            other => panic!("unexpected tracking {other:?}"),
        }
        assert!(profile.framing_check);
    }

    #[test]
    fn plank_holds_and_shoulder_raise_extends() {
        let config = AnalysisConfig::default();
        let plank = ExerciseProfile::for_exercise(ExerciseType::Plank, &config);
        assert!(matches!(plank.tracking, Tracking::Hold { signal: Signal::BodyLine, .. }));

        let raise = ExerciseProfile::for_exercise(ExerciseType::ShoulderRaise, &config);
        match raise.tracking {
            Tracking::Cycle { descriptor, .. } => {
                assert_eq!(descriptor.direction, CycleDirection::Extension);
                assert_eq!(descriptor.rest_angle, 30.0);
            }
            other => panic!("unexpected tracking {other:?}"),
        }
    }

    #[test]
    fn side_signals_resolve_to_the_camera_side() {
        let knee = Signal::Knee.triple(Side::Left);
        assert_eq!(knee.vertex, JointName::LeftKnee);
        assert_eq!(Signal::RightKnee.triple(Side::Left).vertex, JointName::RightKnee);
    }
}
