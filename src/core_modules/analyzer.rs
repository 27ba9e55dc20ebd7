// THEORY:
// The `ExerciseAnalyzer` is the per-frame engine shared by every exercise. It is
// to a workout what the `GridManager` is to a video grid: not an analyzer of its
// own, but the orchestrator that pushes each frame through the smoothers, the
// counter and the rules in the right order, and hands back one `FrameAnalysis`.
//
// Key architectural principles:
// 1.  **Profile driven**: Everything exercise-specific comes from the
//     `ExerciseProfile`: which signals to measure, what drives the counter, which
//     gate and checks apply. The analyzer itself has no per-exercise branches
//     beyond dispatching to the rule set.
// 2.  **Fixed stage order**: measure → smooth → classify stance → gate → rules →
//     counter. Rules see the phase as it was before this frame's transition, and a
//     cycle invalidated by a critical issue cannot complete on the same frame.
// 3.  **Faults are data**: Undefined angles, lost signals and timeouts become
//     `FrameFault`s on the returned analysis. Nothing here returns an error.
// 4.  **Loss pauses, never guesses**: A lost driver signal interrupts the cycle (or
//     breaks the hold). Held values only advance timers.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::AnalysisConfig;
use crate::core_modules::exercise::{ExerciseProfile, ExerciseType, LiveSignals, PositionGate, Signal, Tracking};
use crate::core_modules::form_rules::{self, FormIssue, RuleInput, Severity};
use crate::core_modules::hold_timer::{HoldState, HoldTimer};
use crate::core_modules::issue_ledger::frame_score;
use crate::core_modules::joint::{JointFrame, JointName, Limb};
use crate::core_modules::rep_machine::{RepEvent, RepMachine};
use crate::core_modules::smoother::{SignalReading, SignalSmoother};
use crate::core_modules::stance::StanceTracker;
use crate::error::FrameFault;

/// The result of analyzing one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameAnalysis {
    pub frame_index: u64,
    pub timestamp: f64,
    /// Display name of the current phase ("bottom", "held", ...).
    pub phase: &'static str,
    pub rep_count: u32,
    /// True on the frame a rep was counted.
    pub rep_completed: bool,
    /// Seconds in the current hold, for hold exercises.
    pub hold_seconds: Option<f64>,
    pub issues: Vec<FormIssue>,
    pub faults: Vec<FrameFault>,
    /// 100 minus this frame's deductions, clamped to [0, 100].
    pub frame_score: u8,
}

/// The thing an exercise counts.
#[derive(Debug, Clone)]
enum Counter {
    Reps(RepMachine),
    Hold(HoldTimer),
}

/// Per-frame engine for one exercise.
#[derive(Debug, Clone)]
pub struct ExerciseAnalyzer {
    profile: ExerciseProfile,
    config: AnalysisConfig,
    smoothers: BTreeMap<Signal, SignalSmoother>,
    lost: BTreeSet<Signal>,
    counter: Counter,
    stance: StanceTracker,
}

impl ExerciseAnalyzer {
    pub fn new(exercise: ExerciseType, config: AnalysisConfig) -> Self {
        let profile = ExerciseProfile::for_exercise(exercise, &config);
        let smoothers = profile
            .signals
            .iter()
            .map(|signal| {
                (
                    *signal,
                    SignalSmoother::new(
                        config.smoothing_alpha,
                        config.stale_frame_limit,
                        config.signal_history_window,
                    ),
                )
            })
            .collect();
        let counter = match profile.tracking {
            Tracking::Cycle { descriptor, .. } => Counter::Reps(RepMachine::new(descriptor)),
            Tracking::Hold {
                enter_angle, exit_angle, ..
            } => Counter::Hold(HoldTimer::new(enter_angle, exit_angle)),
        };
        Self {
            profile,
            config,
            smoothers,
            lost: BTreeSet::new(),
            counter,
            stance: StanceTracker::default(),
        }
    }

    pub fn exercise(&self) -> ExerciseType {
        self.profile.exercise
    }

    pub fn rep_count(&self) -> u32 {
        match &self.counter {
            Counter::Reps(machine) => machine.rep_count(),
            Counter::Hold(_) => 0,
        }
    }

    pub fn reps_discarded(&self) -> u32 {
        match &self.counter {
            Counter::Reps(machine) => machine.reps_discarded(),
            Counter::Hold(_) => 0,
        }
    }

    /// Longest continuous hold so far, for hold exercises.
    pub fn longest_hold(&self) -> Option<f64> {
        match &self.counter {
            Counter::Reps(_) => None,
            Counter::Hold(timer) => Some(timer.longest_hold()),
        }
    }

    pub fn phase_label(&self) -> &'static str {
        match &self.counter {
            Counter::Reps(machine) => machine.phase_label(),
            Counter::Hold(timer) => match timer.state() {
                HoldState::Held => "held",
                HoldState::Broken => "broken",
            },
        }
    }

    /// The smoothing state of one tracked signal.
    pub fn signal(&self, signal: Signal) -> Option<&SignalSmoother> {
        self.smoothers.get(&signal)
    }

    /// Runs one frame through every stage.
    pub fn analyze(&mut self, frame: &JointFrame) -> FrameAnalysis {
        let mut issues = Vec::new();
        let mut faults = Vec::new();

        let (readings, raw) = self.measure(frame, &mut issues, &mut faults);
        let mut live = LiveSignals::default();
        for (signal, reading) in &readings {
            if let Some(value) = reading.live() {
                live.insert(*signal, value);
            }
        }

        let front_leg = if self.profile.tracks_front_leg {
            let may_switch = match &self.counter {
                Counter::Reps(machine) => !machine.phase().in_cycle(),
                Counter::Hold(_) => true,
            };
            let latest = |signal| readings.get(&signal).and_then(SignalReading::latest);
            self.stance.observe(
                frame,
                self.config.angle_confidence_threshold,
                latest(Signal::LeftKnee),
                latest(Signal::RightKnee),
                may_switch,
            )
        } else {
            None
        };

        let in_position = match self.profile.gate {
            Some(gate) => self.passes_gate(&gate, frame, &live),
            None => true,
        };

        let in_cycle = matches!(&self.counter, Counter::Reps(machine) if machine.phase().in_cycle());
        let rule_input = RuleInput {
            frame,
            config: &self.config,
            live: &live,
            raw: &raw,
            in_cycle,
            front_leg,
        };
        issues.extend(form_rules::evaluate(self.profile.exercise, &rule_input));
        if self.profile.framing_check {
            issues.extend(form_rules::framing_issues(frame, &self.config));
        }
        let has_critical = issues.iter().any(|issue| issue.severity == Severity::Critical);

        let driver = match self.profile.tracking {
            Tracking::Cycle { signal, .. } => match (self.profile.tracks_front_leg, front_leg) {
                (true, Some(side)) => Signal::knee_of(side),
                _ => signal,
            },
            Tracking::Hold { signal, .. } => signal,
        };
        let reading = readings.get(&driver).copied().unwrap_or(SignalReading::Empty);

        let mut rep_completed = false;
        if !in_position {
            issues.push(form_rules::NOT_IN_POSITION);
            match &mut self.counter {
                Counter::Reps(machine) => machine.reset_cycle(),
                Counter::Hold(timer) => timer.break_hold(),
            }
        } else {
            let events = self.advance_counter(reading, frame.timestamp, has_critical);
            for event in events {
                rep_completed |= self.handle_event(event, frame, &mut issues, &mut faults);
            }
        }

        FrameAnalysis {
            frame_index: frame.frame_index,
            timestamp: frame.timestamp,
            phase: self.phase_label(),
            rep_count: self.rep_count(),
            rep_completed,
            hold_seconds: match &self.counter {
                Counter::Reps(_) => None,
                Counter::Hold(timer) => Some(timer.current_hold()),
            },
            frame_score: frame_score(&issues),
            issues,
            faults,
        }
    }

    /// Measures and smooths every tracked signal, reporting undefined and lost ones.
    /// Also returns this frame's unsmoothed angles.
    fn measure(
        &mut self,
        frame: &JointFrame,
        issues: &mut Vec<FormIssue>,
        faults: &mut Vec<FrameFault>,
    ) -> (BTreeMap<Signal, SignalReading>, LiveSignals) {
        let threshold = self.config.angle_confidence_threshold;
        let side = self.config.body_side;
        let mut readings = BTreeMap::new();
        let mut measured = LiveSignals::default();

        for (signal, smoother) in self.smoothers.iter_mut() {
            let raw = signal.triple(side).measure(frame, threshold);
            if let Some(angle) = raw {
                measured.insert(*signal, angle);
            }
            let reading = smoother.update(raw);
            let name = signal.name();

            if reading.is_lost() {
                faults.push(FrameFault::SignalLost { signal: name });
                if self.lost.insert(*signal) {
                    warn!(
                        exercise = %self.profile.exercise,
                        frame = frame.frame_index,
                        signal = name,
                        "signal lost"
                    );
                    issues.push(form_rules::SIGNAL_LOST);
                }
            } else if raw.is_none() {
                faults.push(FrameFault::UndefinedAngle { signal: name });
            } else if self.lost.remove(signal) {
                debug!(frame = frame.frame_index, signal = name, "signal recovered");
            }
            readings.insert(*signal, reading);
        }
        (readings, measured)
    }

    /// A check that cannot be judged this frame (joints not visible) does not fail the gate.
    fn passes_gate(&self, gate: &PositionGate, frame: &JointFrame, live: &LiveSignals) -> bool {
        let threshold = self.config.angle_confidence_threshold;
        let side = self.config.body_side;

        let torso_level = match (
            frame.visible(JointName::of(Limb::Shoulder, side), threshold),
            frame.visible(JointName::of(Limb::Hip, side), threshold),
        ) {
            (Some(shoulder), Some(hip)) => Some((shoulder.y - hip.y).abs() <= gate.max_torso_rise),
            _ => None,
        };
        let aligned = gate
            .alignment_min
            .and_then(|min| live.get(Signal::BodyLine).map(|line| line >= min));

        torso_level != Some(false) && aligned != Some(false)
    }

    fn advance_counter(&mut self, reading: SignalReading, timestamp: f64, has_critical: bool) -> Vec<RepEvent> {
        let invalidate = has_critical && self.profile.critical_invalidates;
        match &mut self.counter {
            Counter::Reps(machine) => {
                if invalidate {
                    return machine.invalidate().into_iter().collect();
                }
                let event = match reading {
                    SignalReading::Live(angle) => machine.update(angle, timestamp),
                    SignalReading::Lost { .. } => machine.interrupt(),
                    SignalReading::Held { .. } | SignalReading::Empty => machine.tick(timestamp),
                };
                event.into_iter().collect()
            }
            Counter::Hold(timer) => {
                match reading {
                    SignalReading::Live(angle) => {
                        timer.update(angle, timestamp);
                    }
                    SignalReading::Held { .. } => timer.tick(timestamp),
                    SignalReading::Lost { .. } => timer.break_hold(),
                    SignalReading::Empty => {}
                }
                Vec::new()
            }
        }
    }

    /// Returns true when the event counted a rep.
    fn handle_event(
        &self,
        event: RepEvent,
        frame: &JointFrame,
        issues: &mut Vec<FormIssue>,
        faults: &mut Vec<FrameFault>,
    ) -> bool {
        let exercise = self.profile.exercise;
        match event {
            RepEvent::Completed {
                rep,
                duration,
                extreme_angle,
            } => {
                info!(%exercise, frame = frame.frame_index, rep, duration, extreme_angle, "rep counted");
                true
            }
            RepEvent::Partial { extreme_angle } => {
                debug!(%exercise, frame = frame.frame_index, extreme_angle, "partial rep");
                issues.push(form_rules::PARTIAL_REP);
                false
            }
            RepEvent::TimedOut { elapsed } => {
                warn!(%exercise, frame = frame.frame_index, elapsed, "rep timed out");
                faults.push(FrameFault::RepTimeout {
                    elapsed_seconds: elapsed,
                });
                issues.push(form_rules::REP_TIMEOUT);
                false
            }
            RepEvent::Interrupted => {
                warn!(%exercise, frame = frame.frame_index, "rep interrupted by signal loss");
                false
            }
            RepEvent::Invalidated => {
                warn!(%exercise, frame = frame.frame_index, "rep invalidated by a critical form issue");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::joint::Side;
    use crate::core_modules::test_support::{cycles, frames, ramp, Pose, FPS};
    use proptest::prelude::*;

    fn run(exercise: ExerciseType, frames: &[JointFrame]) -> (ExerciseAnalyzer, Vec<FrameAnalysis>) {
        let mut analyzer = ExerciseAnalyzer::new(exercise, AnalysisConfig::default());
        let results = frames.iter().map(|frame| analyzer.analyze(frame)).collect();
        (analyzer, results)
    }

    fn has_issue(results: &[FrameAnalysis], code: &str) -> bool {
        results.iter().any(|r| r.issues.iter().any(|issue| issue.code == code))
    }

    /// Squat trace with a confidence dropout of `dropout` frames at the bottom.
    fn squat_with_dropout(dropout: usize) -> Vec<JointFrame> {
        let mut angles = vec![170.0; 5];
        angles.extend(ramp(170.0, 80.0, 15));
        let dropout_start = angles.len();
        angles.extend(std::iter::repeat_n(80.0, dropout + 5));
        angles.extend(ramp(80.0, 170.0, 15));
        angles.extend(std::iter::repeat_n(170.0, 10));

        angles
            .iter()
            .enumerate()
            .map(|(i, angle)| {
                let pose = Pose::squat(*angle);
                let pose = if (dropout_start..dropout_start + dropout).contains(&i) {
                    pose.with_confidence(JointName::RightKnee, 0.0)
                } else {
                    pose
                };
                pose.frame(i as u64, i as f64 / FPS)
            })
            .collect()
    }

    #[test]
    fn five_squats_count_five_reps() {
        let (analyzer, results) = run(ExerciseType::Squat, &frames(&cycles(170.0, 80.0, 5), Pose::squat));
        assert_eq!(analyzer.rep_count(), 5);
        assert_eq!(results.iter().filter(|r| r.rep_completed).count(), 5);
        assert!(results.iter().all(|r| r.issues.is_empty()), "clean squats raise no issues");
    }

    proptest! {
        #[test]
        fn five_squats_count_five_for_any_band_the_trace_reaches(
            low in 80.0f64..=90.0,
            high in 160.0f64..=170.0,
        ) {
            let mut config = AnalysisConfig::default();
            config.squat.cycle.peak_angle = low;
            config.squat.cycle.rest_angle = high;
            let mut analyzer = ExerciseAnalyzer::new(ExerciseType::Squat, config);
            for frame in frames(&cycles(170.0, 80.0, 5), Pose::squat) {
                analyzer.analyze(&frame);
            }
            prop_assert_eq!(analyzer.rep_count(), 5);
        }
    }

    #[test]
    fn band_edges_on_the_trace_extremes_still_count() {
        for (low, high) in [(80.0, 160.0), (85.0, 170.0), (90.0, 170.0), (80.0, 170.0)] {
            let mut config = AnalysisConfig::default();
            config.squat.cycle.peak_angle = low;
            config.squat.cycle.rest_angle = high;
            let mut analyzer = ExerciseAnalyzer::new(ExerciseType::Squat, config);
            for frame in frames(&cycles(170.0, 80.0, 5), Pose::squat) {
                analyzer.analyze(&frame);
            }
            assert_eq!(analyzer.rep_count(), 5, "band [{low}, {high}]");
        }
    }

    #[test]
    fn rep_count_never_decreases() {
        let (_, results) = run(ExerciseType::Squat, &frames(&cycles(170.0, 80.0, 3), Pose::squat));
        assert!(results.windows(2).all(|pair| pair[0].rep_count <= pair[1].rep_count));
    }

    #[test]
    fn oscillating_inside_the_band_counts_nothing() {
        let mut angles = vec![170.0; 5];
        angles.extend(ramp(170.0, 97.5, 15));
        for _ in 0..40 {
            angles.extend([95.0, 100.0]);
        }
        let (analyzer, _) = run(ExerciseType::Squat, &frames(&angles, Pose::squat));
        assert_eq!(analyzer.rep_count(), 0);
    }

    #[test]
    fn long_dropout_mid_rep_loses_the_rep() {
        let (analyzer, results) = run(ExerciseType::Squat, &squat_with_dropout(11));
        assert_eq!(analyzer.rep_count(), 0);
        assert_eq!(analyzer.reps_discarded(), 1);
        assert!(results.iter().any(|r| r
            .faults
            .contains(&FrameFault::SignalLost { signal: "knee" })));
        assert!(has_issue(&results, "signal_lost"));
    }

    #[test]
    fn short_dropout_holds_the_rep() {
        let (analyzer, results) = run(ExerciseType::Squat, &squat_with_dropout(10));
        assert_eq!(analyzer.rep_count(), 1);
        assert!(results.iter().any(|r| r
            .faults
            .contains(&FrameFault::UndefinedAngle { signal: "knee" })));
        assert!(!has_issue(&results, "signal_lost"));
        let knee = analyzer.signal(Signal::Knee).unwrap();
        assert_eq!(knee.stale_frames(), 0);
        assert!(!knee.history().is_empty());
    }

    #[test]
    fn slow_rep_times_out() {
        let mut angles = vec![170.0; 5];
        angles.extend(ramp(170.0, 80.0, 15));
        angles.extend(std::iter::repeat_n(80.0, 9 * FPS as usize));
        angles.extend(ramp(80.0, 170.0, 15));
        angles.extend(std::iter::repeat_n(170.0, 10));

        let (analyzer, results) = run(ExerciseType::Squat, &frames(&angles, Pose::squat));
        assert_eq!(analyzer.rep_count(), 0);
        assert!(results
            .iter()
            .any(|r| r.faults.iter().any(|fault| matches!(fault, FrameFault::RepTimeout { .. }))));
        assert!(has_issue(&results, "rep_timeout"));
    }

    #[test]
    fn pushups_require_alignment() {
        let (analyzer, _) = run(ExerciseType::Pushup, &frames(&cycles(170.0, 80.0, 3), Pose::pushup));
        assert_eq!(analyzer.rep_count(), 3);

        let piked = |elbow| Pose::pushup(elbow).with(JointName::RightHip, 0.50, 0.45);
        let (analyzer, results) = run(ExerciseType::Pushup, &frames(&cycles(170.0, 80.0, 3), piked));
        assert_eq!(analyzer.rep_count(), 0);
        assert!(has_issue(&results, "not_in_position"));
    }

    #[test]
    fn plank_accumulates_hold_time_until_it_breaks() {
        let mut trace: Vec<JointFrame> = (0..90).map(|i| Pose::plank().frame(i, i as f64 / FPS)).collect();
        let sagging = Pose::plank().with(JointName::RightHip, 0.50, 0.75);
        trace.extend((90..120).map(|i| sagging.frame(i, i as f64 / FPS)));

        let (analyzer, results) = run(ExerciseType::Plank, &trace);
        let longest = analyzer.longest_hold().unwrap();
        assert!((longest - 89.0 / FPS).abs() < 0.2, "longest hold {longest}");
        assert_eq!(results[60].phase, "held");
        assert_eq!(results.last().unwrap().phase, "broken");
        assert_eq!(results.last().unwrap().hold_seconds, Some(0.0));
        assert!(has_issue(&results, "hips_sagging"));
        assert_eq!(analyzer.rep_count(), 0);
    }

    #[test]
    fn lunges_count_on_the_front_knee() {
        let angles = cycles(170.0, 90.0, 2);
        let pose = |knee: f64| Pose::lunge(Side::Left, knee, knee + 10.0);
        let (analyzer, results) = run(ExerciseType::Lunge, &frames(&angles, pose));
        assert_eq!(analyzer.rep_count(), 2);
        assert!(!has_issue(&results, "front_knee_too_bent"));
    }

    #[test]
    fn unsafe_deadlift_is_critical_and_not_counted() {
        let (analyzer, results) = run(ExerciseType::Deadlift, &frames(&cycles(175.0, 100.0, 2), Pose::deadlift));
        assert_eq!(analyzer.rep_count(), 2);
        assert!(results.iter().all(|r| r.issues.is_empty()));

        let (analyzer, results) = run(ExerciseType::Deadlift, &frames(&cycles(175.0, 40.0, 1), Pose::deadlift));
        assert_eq!(analyzer.rep_count(), 0);
        let unsafe_frame = results
            .iter()
            .find(|r| r.issues.iter().any(|issue| issue.code == "unsafe_back_angle"))
            .unwrap();
        assert!(unsafe_frame.issues.iter().any(|issue| issue.severity == Severity::Critical));
        assert!(unsafe_frame.frame_score <= 50);
    }

    #[test]
    fn single_unsafe_deadlift_frame_is_flagged_on_that_frame() {
        let mut angles = vec![170.0; 30];
        angles.push(40.0);
        angles.extend([170.0; 10]);
        let (_, results) = run(ExerciseType::Deadlift, &frames(&angles, Pose::deadlift));

        assert!(!has_issue(&results[..30], "unsafe_back_angle"));
        assert!(results[30].issues.contains(&form_rules::UNSAFE_BACK_ANGLE));
        assert!(results[30].frame_score <= 50);
    }

    #[test]
    fn unsafe_dip_mid_rep_discards_the_rep() {
        let mut angles = cycles(175.0, 100.0, 1);
        // Bottom hold of the only cycle.
        angles[5 + 20] = 40.0;
        let (analyzer, results) = run(ExerciseType::Deadlift, &frames(&angles, Pose::deadlift));

        assert!(has_issue(&results[25..26], "unsafe_back_angle"));
        assert_eq!(analyzer.rep_count(), 0);
        assert_eq!(analyzer.reps_discarded(), 1);
    }

    #[test]
    fn curls_and_raises_use_the_same_engine() {
        let (analyzer, _) = run(ExerciseType::BicepCurl, &frames(&cycles(170.0, 40.0, 2), Pose::curl));
        assert_eq!(analyzer.rep_count(), 2);

        let (analyzer, results) = run(ExerciseType::ShoulderRaise, &frames(&cycles(15.0, 90.0, 2), Pose::raise));
        assert_eq!(analyzer.rep_count(), 2);
        assert!(!has_issue(&results, "raise_too_high"));
    }

    #[test]
    fn shallow_squat_reports_a_partial_rep() {
        let (analyzer, results) = run(ExerciseType::Squat, &frames(&cycles(170.0, 120.0, 1), Pose::squat));
        assert_eq!(analyzer.rep_count(), 0);
        assert!(has_issue(&results, "partial_rep"));
    }

    #[test]
    fn hidden_feet_are_reported_for_standing_exercises() {
        let hidden = |knee| {
            Pose::squat(knee)
                .with_confidence(JointName::LeftAnkle, 0.1)
                .with_confidence(JointName::RightAnkle, 0.1)
        };
        let (_, results) = run(ExerciseType::Squat, &frames(&[170.0, 170.0], hidden));
        assert!(has_issue(&results, "feet_not_visible"));
        assert_eq!(results[0].frame_score, 100);
    }
}
