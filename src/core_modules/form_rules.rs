// THEORY:
// The Form Evaluator turns one frame's geometry into zero or more `FormIssue`s.
// It is the engine's "judge": it knows what a good squat looks like, but nothing
// about reps, history or scores. Those belong to the machine and the aggregator.
//
// Key architectural principles:
// 1.  **Independent rules**: Each rule is a threshold comparison that either fires
//     or does not. Rules never read each other's output, so their order is irrelevant.
// 2.  **Never fails**: A rule whose joints are missing or below confidence is simply
//     skipped for that frame. Angle rules only see fresh smoothed values, except the
//     deadlift safety check, which reads the unsmoothed angle so that a single unsafe
//     frame is flagged on that frame.
// 3.  **A fixed catalog**: Every issue the engine can raise is a constant below with
//     a stable `code`, a severity, a user-facing message and its score deduction.
//     Two constants may share a code at different severities; the aggregator keeps
//     the worst.

use serde::Serialize;

use crate::config::AnalysisConfig;
use crate::core_modules::angle::offset_from_line;
use crate::core_modules::exercise::{ExerciseType, LiveSignals, Signal};
use crate::core_modules::joint::{Joint, JointFrame, JointName, Limb, Side};

/// How serious a form issue is. Ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// One observed form problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FormIssue {
    pub code: &'static str,
    pub severity: Severity,
    pub message: &'static str,
    /// Points removed from the form score if this code is the worst seen for its code.
    pub deduction: u32,
}

impl FormIssue {
    pub const fn new(code: &'static str, severity: Severity, message: &'static str, deduction: u32) -> Self {
        Self {
            code,
            severity,
            message,
            deduction,
        }
    }
}

pub const NOT_IN_POSITION: FormIssue = FormIssue::new("not_in_position", Severity::Info, "Get in position", 0);
pub const SIGNAL_LOST: FormIssue = FormIssue::new(
    "signal_lost",
    Severity::Info,
    "Tracking lost, keep your whole body in view",
    0,
);
pub const REP_TIMEOUT: FormIssue = FormIssue::new(
    "rep_timeout",
    Severity::Info,
    "Rep took too long and was not counted",
    0,
);
pub const FEET_NOT_VISIBLE: FormIssue = FormIssue::new(
    "feet_not_visible",
    Severity::Info,
    "Step back so your feet are visible",
    0,
);
pub const TOO_CLOSE: FormIssue = FormIssue::new("too_close", Severity::Info, "Step back, too close to the camera", 0);
pub const PARTIAL_REP: FormIssue = FormIssue::new("partial_rep", Severity::Warning, "Go deeper to complete the rep", 10);

pub const BACK_LEAN: FormIssue = FormIssue::new("back_lean", Severity::Warning, "Watch your back angle", 10);
pub const BACK_LEAN_SEVERE: FormIssue = FormIssue::new(
    "back_lean",
    Severity::Critical,
    "Back too bent, stand more upright",
    25,
);
pub const KNEE_CAVE: FormIssue = FormIssue::new("knee_cave", Severity::Warning, "Push your knees out over your toes", 15);
pub const HEEL_LIFT: FormIssue = FormIssue::new("heel_lift", Severity::Warning, "Keep your heels on the ground", 10);

pub const HIPS_SAGGING: FormIssue = FormIssue::new("hips_sagging", Severity::Warning, "Hips sagging, engage your core", 15);
pub const HIPS_PIKING: FormIssue = FormIssue::new("hips_piking", Severity::Warning, "Hips too high, lower them", 15);
pub const ELBOW_FLARE: FormIssue = FormIssue::new("elbow_flare", Severity::Warning, "Elbows flaring out too much", 15);
pub const HEAD_DROP: FormIssue = FormIssue::new("head_drop", Severity::Warning, "Head too low, look ahead", 10);

pub const FRONT_KNEE_TOO_BENT: FormIssue =
    FormIssue::new("front_knee_too_bent", Severity::Warning, "Front knee too bent", 20);
pub const BACK_KNEE_TOO_LOW: FormIssue = FormIssue::new(
    "back_knee_too_low",
    Severity::Warning,
    "Back knee dropping too far, extend the back leg",
    10,
);

pub const UNSAFE_BACK_ANGLE: FormIssue = FormIssue::new(
    "unsafe_back_angle",
    Severity::Critical,
    "Stop, unsafe back angle",
    50,
);
pub const BACK_ROUNDING: FormIssue = FormIssue::new("back_rounding", Severity::Warning, "Back rounding detected", 20);
pub const BACK_ROUNDING_SEVERE: FormIssue = FormIssue::new(
    "back_rounding",
    Severity::Critical,
    "Back rounding, injury risk",
    50,
);
pub const KNEE_DOMINANT: FormIssue = FormIssue::new(
    "knee_dominant",
    Severity::Warning,
    "Too much knee bend, hinge at the hips",
    15,
);
pub const BAR_DRIFT: FormIssue = FormIssue::new("bar_drift", Severity::Warning, "Bar too far, keep it close", 10);

pub const ELBOW_DRIFT: FormIssue = FormIssue::new(
    "elbow_drift",
    Severity::Warning,
    "Keep your elbows pinned to your sides",
    10,
);
pub const RAISE_TOO_HIGH: FormIssue =
    FormIssue::new("raise_too_high", Severity::Warning, "Don't raise above shoulder height", 10);

/// Ankle spreads narrower than this cannot be used to judge knee cave.
const MIN_ANKLE_WIDTH: f64 = 0.05;

/// Everything a rule may look at on one frame.
pub struct RuleInput<'a> {
    pub frame: &'a JointFrame,
    pub config: &'a AnalysisConfig,
    pub live: &'a LiveSignals,
    /// Unsmoothed angles defined on this frame.
    pub raw: &'a LiveSignals,
    /// A rep cycle is currently in progress.
    pub in_cycle: bool,
    /// The classified lunge front leg, if known.
    pub front_leg: Option<Side>,
}

impl<'a> RuleInput<'a> {
    fn joint(&self, limb: Limb) -> Option<&'a Joint> {
        self.named(JointName::of(limb, self.config.body_side))
    }

    fn named(&self, name: JointName) -> Option<&'a Joint> {
        self.frame.visible(name, self.config.angle_confidence_threshold)
    }
}

/// Runs every rule of `exercise` against one frame.
pub fn evaluate(exercise: ExerciseType, input: &RuleInput<'_>) -> Vec<FormIssue> {
    let mut issues = Vec::new();
    match exercise {
        ExerciseType::Squat => squat_rules(input, &mut issues),
        ExerciseType::Pushup => pushup_rules(input, &mut issues),
        ExerciseType::Plank => plank_rules(input, &mut issues),
        ExerciseType::Lunge => lunge_rules(input, &mut issues),
        ExerciseType::Deadlift => deadlift_rules(input, &mut issues),
        ExerciseType::BicepCurl => curl_rules(input, &mut issues),
        ExerciseType::ShoulderRaise => raise_rules(input, &mut issues),
    }
    issues
}

/// Framing problems that make standing exercises unreliable to judge.
pub fn framing_issues(frame: &JointFrame, config: &AnalysisConfig) -> Vec<FormIssue> {
    let ankles_hidden = [JointName::LeftAnkle, JointName::RightAnkle]
        .iter()
        .all(|ankle| frame.confidence(*ankle) < config.framing_visibility_threshold);
    if ankles_hidden {
        return vec![FEET_NOT_VISIBLE];
    }

    let side = config.body_side;
    let shoulder = frame.visible(JointName::of(Limb::Shoulder, side), config.framing_visibility_threshold);
    let ankle = frame.visible(JointName::of(Limb::Ankle, side), config.framing_visibility_threshold);
    match (shoulder, ankle) {
        (Some(shoulder), Some(ankle)) if (ankle.y - shoulder.y).abs() < config.min_body_height => vec![TOO_CLOSE],
        _ => Vec::new(),
    }
}

/// Angle of the shoulder-hip segment above the horizontal, in degrees [0, 90].
fn torso_elevation(shoulder: &Joint, hip: &Joint) -> f64 {
    (shoulder.y - hip.y).abs().atan2((shoulder.x - hip.x).abs()).to_degrees()
}

fn squat_rules(input: &RuleInput<'_>, issues: &mut Vec<FormIssue>) {
    let thresholds = &input.config.squat;

    if let (Some(shoulder), Some(hip)) = (input.joint(Limb::Shoulder), input.joint(Limb::Hip)) {
        let elevation = torso_elevation(shoulder, hip);
        if elevation < thresholds.back_lean_critical {
            issues.push(BACK_LEAN_SEVERE);
        } else if elevation < thresholds.back_lean_warning {
            issues.push(BACK_LEAN);
        }
    }

    let knees = (input.named(JointName::LeftKnee), input.named(JointName::RightKnee));
    let ankles = (input.named(JointName::LeftAnkle), input.named(JointName::RightAnkle));
    if let ((Some(left_knee), Some(right_knee)), (Some(left_ankle), Some(right_ankle))) = (knees, ankles) {
        let ankle_width = (left_ankle.x - right_ankle.x).abs();
        let knee_width = (left_knee.x - right_knee.x).abs();
        if ankle_width >= MIN_ANKLE_WIDTH && knee_width < thresholds.knee_cave_ratio * ankle_width {
            issues.push(KNEE_CAVE);
        }
    }

    if let (Some(heel), Some(toe)) = (input.joint(Limb::Heel), input.joint(Limb::FootIndex)) {
        if toe.y - heel.y > thresholds.heel_lift {
            issues.push(HEEL_LIFT);
        }
    }
}

/// Sag or pike of the hips relative to the shoulder-ankle line.
fn hip_line_issue(input: &RuleInput<'_>, min_angle: f64) -> Option<FormIssue> {
    let body_line = input.live.get(Signal::BodyLine)?;
    if body_line >= min_angle {
        return None;
    }
    let offset = offset_from_line(
        input.joint(Limb::Shoulder)?,
        input.joint(Limb::Hip)?,
        input.joint(Limb::Ankle)?,
    )?;
    Some(if offset > 0.0 { HIPS_SAGGING } else { HIPS_PIKING })
}

fn pushup_rules(input: &RuleInput<'_>, issues: &mut Vec<FormIssue>) {
    let thresholds = &input.config.pushup;

    issues.extend(hip_line_issue(input, thresholds.hip_line_min));

    if let (Some(shoulder), Some(elbow)) = (input.joint(Limb::Shoulder), input.joint(Limb::Elbow)) {
        if (elbow.x - shoulder.x).abs() > thresholds.elbow_flare {
            issues.push(ELBOW_FLARE);
        }
    }

    if let (Some(nose), Some(shoulder)) = (input.named(JointName::Nose), input.joint(Limb::Shoulder)) {
        if nose.y - shoulder.y > thresholds.head_drop {
            issues.push(HEAD_DROP);
        }
    }
}

fn plank_rules(input: &RuleInput<'_>, issues: &mut Vec<FormIssue>) {
    issues.extend(hip_line_issue(input, input.config.plank.body_line_min));
}

fn lunge_rules(input: &RuleInput<'_>, issues: &mut Vec<FormIssue>) {
    let Some(front) = input.front_leg else {
        return;
    };
    let thresholds = &input.config.lunge;

    if let Some(front_knee) = input.live.get(Signal::knee_of(front)) {
        if front_knee < thresholds.front_knee_min {
            issues.push(FRONT_KNEE_TOO_BENT);
        }
    }
    if let Some(back_knee) = input.live.get(Signal::knee_of(front.opposite())) {
        if back_knee < thresholds.back_knee_min {
            issues.push(BACK_KNEE_TOO_LOW);
        }
    }
}

/// Back angles outside the safe range. Checked on every frame against the
/// unsmoothed angle, whatever the rep state.
pub fn deadlift_safety(input: &RuleInput<'_>) -> Option<FormIssue> {
    let thresholds = &input.config.deadlift;
    let back = input.raw.get(Signal::Hip)?;
    (back < thresholds.safe_back_min || back > thresholds.safe_back_max).then_some(UNSAFE_BACK_ANGLE)
}

fn deadlift_rules(input: &RuleInput<'_>, issues: &mut Vec<FormIssue>) {
    let thresholds = &input.config.deadlift;

    issues.extend(deadlift_safety(input));

    if let Some(spine) = input.live.get(Signal::Spine) {
        if spine < thresholds.spine_critical {
            issues.push(BACK_ROUNDING_SEVERE);
        } else if spine < thresholds.spine_warning {
            issues.push(BACK_ROUNDING);
        }
    }

    if input.in_cycle {
        if let (Some(hip), Some(knee)) = (input.live.get(Signal::Hip), input.live.get(Signal::Knee)) {
            if knee < hip - thresholds.knee_dominance_margin {
                issues.push(KNEE_DOMINANT);
            }
        }
    }

    if let (Some(shoulder), Some(knee)) = (input.joint(Limb::Shoulder), input.joint(Limb::Knee)) {
        if (shoulder.x - knee.x).abs() > thresholds.bar_drift {
            issues.push(BAR_DRIFT);
        }
    }
}

fn curl_rules(input: &RuleInput<'_>, issues: &mut Vec<FormIssue>) {
    if let (Some(shoulder), Some(elbow)) = (input.joint(Limb::Shoulder), input.joint(Limb::Elbow)) {
        if (elbow.x - shoulder.x).abs() > input.config.bicep_curl.elbow_drift {
            issues.push(ELBOW_DRIFT);
        }
    }
}

fn raise_rules(input: &RuleInput<'_>, issues: &mut Vec<FormIssue>) {
    if let Some(arm) = input.live.get(Signal::Arm) {
        if arm > input.config.shoulder_raise.too_high {
            issues.push(RAISE_TOO_HIGH);
        }
    }
}
