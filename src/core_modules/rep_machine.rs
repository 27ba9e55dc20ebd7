// THEORY:
// The `RepMachine` is the generic hysteresis-cycle engine behind every repetition
// exercise. A squat, a push-up, a curl and a lateral raise are the same machine
// with different thresholds: the body leaves a rest posture, reaches a peak
// posture, and comes back. Only the numbers and the phase names change, so each
// exercise is a declarative `CycleDescriptor` rather than its own script.
//
// Key architectural principles:
// 1.  **Hysteresis**: Rest and peak are separate zones with a dead band between
//     them. A signal that wobbles inside the band never changes phase, so jitter
//     near a single threshold cannot produce phantom reps.
// 2.  **Count on return**: A rep is counted exactly once, on the Returning → Rest
//     transition. Nothing mid-cycle ever increments the counter.
// 3.  **Arming**: The machine starts in `Setup` and only arms once the signal enters
//     the rest zone. A stream that starts mid-rep does not count that rep.
// 4.  **Bounded cycles**: A cycle that outlives the maximum rep duration is
//     discarded. Timeouts are checked on every frame via `tick`, including frames
//     whose signal is only held, while held values themselves never transition.
// 5.  **Direction agnostic**: `Flexion` cycles close a joint (rest is the large
//     angle), `Extension` cycles open one (rest is the small angle).

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Zone boundaries are inclusive up to this many degrees of floating-point error,
/// so a posture held exactly on a threshold counts as inside it.
const ZONE_EPSILON: f64 = 1e-6;

/// Which way the angle moves when leaving rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleDirection {
    /// Rest is an open joint (large angle); the peak closes it.
    Flexion,
    /// Rest is a closed joint (small angle); the peak opens it.
    Extension,
}

/// Display names for the phases of one exercise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseLabels {
    pub setup: &'static str,
    pub rest: &'static str,
    pub leaving: &'static str,
    pub peak: &'static str,
    pub returning: &'static str,
}

/// Declarative description of one exercise's rep cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleDescriptor {
    pub direction: CycleDirection,
    /// Boundary of the rest zone, in degrees.
    pub rest_angle: f64,
    /// Boundary of the peak zone, in degrees.
    pub peak_angle: f64,
    /// How far past `rest_angle` an abandoned cycle must travel to be reported as a partial rep.
    pub partial_rep_margin: f64,
    /// Longest a single cycle may take, in seconds.
    pub max_rep_duration: f64,
    pub labels: PhaseLabels,
}

impl CycleDescriptor {
    fn in_rest_zone(&self, angle: f64) -> bool {
        match self.direction {
            CycleDirection::Flexion => angle >= self.rest_angle - ZONE_EPSILON,
            CycleDirection::Extension => angle <= self.rest_angle + ZONE_EPSILON,
        }
    }

    fn in_peak_zone(&self, angle: f64) -> bool {
        match self.direction {
            CycleDirection::Flexion => angle <= self.peak_angle + ZONE_EPSILON,
            CycleDirection::Extension => angle >= self.peak_angle - ZONE_EPSILON,
        }
    }

    /// Degrees travelled beyond the rest boundary towards the peak.
    fn travel(&self, angle: f64) -> f64 {
        match self.direction {
            CycleDirection::Flexion => self.rest_angle - angle,
            CycleDirection::Extension => angle - self.rest_angle,
        }
    }

    /// Whichever angle lies further along the cycle.
    fn further(&self, a: f64, b: f64) -> f64 {
        match self.direction {
            CycleDirection::Flexion => a.min(b),
            CycleDirection::Extension => a.max(b),
        }
    }
}

/// The discrete posture classification of a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepPhase {
    Setup,
    Rest,
    Leaving,
    Peak,
    Returning,
}

impl RepPhase {
    /// True while a cycle is in progress.
    pub fn in_cycle(self) -> bool {
        matches!(self, RepPhase::Leaving | RepPhase::Peak | RepPhase::Returning)
    }
}

/// Something noteworthy that happened on a machine update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RepEvent {
    /// A full cycle finished and was counted.
    Completed { rep: u32, duration: f64, extreme_angle: f64 },
    /// The cycle went back to rest without reaching the peak but travelled far enough to matter.
    Partial { extreme_angle: f64 },
    /// The in-progress cycle exceeded the maximum duration and was discarded.
    TimedOut { elapsed: f64 },
    /// The signal was lost mid-cycle; the cycle was discarded.
    Interrupted,
    /// A safety rule rejected the in-progress cycle.
    Invalidated,
}

#[derive(Debug, Clone, Copy)]
struct CycleProgress {
    started_at: f64,
    extreme_angle: f64,
}

/// One live rep state machine.
#[derive(Debug, Clone)]
pub struct RepMachine {
    descriptor: CycleDescriptor,
    phase: RepPhase,
    rep_count: u32,
    reps_discarded: u32,
    cycle: Option<CycleProgress>,
}

impl RepMachine {
    pub fn new(descriptor: CycleDescriptor) -> Self {
        Self {
            descriptor,
            phase: RepPhase::Setup,
            rep_count: 0,
            reps_discarded: 0,
            cycle: None,
        }
    }

    pub fn phase(&self) -> RepPhase {
        self.phase
    }

    pub fn phase_label(&self) -> &'static str {
        let labels = &self.descriptor.labels;
        match self.phase {
            RepPhase::Setup => labels.setup,
            RepPhase::Rest => labels.rest,
            RepPhase::Leaving => labels.leaving,
            RepPhase::Peak => labels.peak,
            RepPhase::Returning => labels.returning,
        }
    }

    pub fn rep_count(&self) -> u32 {
        self.rep_count
    }

    /// Cycles dropped by timeout, signal loss, safety invalidation or a failed position gate.
    pub fn reps_discarded(&self) -> u32 {
        self.reps_discarded
    }

    pub fn descriptor(&self) -> &CycleDescriptor {
        &self.descriptor
    }

    /// Checks the in-progress cycle against the maximum rep duration.
    pub fn tick(&mut self, timestamp: f64) -> Option<RepEvent> {
        let cycle = self.cycle?;
        let elapsed = timestamp - cycle.started_at;
        if elapsed <= self.descriptor.max_rep_duration {
            return None;
        }
        self.drop_cycle();
        Some(RepEvent::TimedOut { elapsed })
    }

    /// Feeds one fresh (live) angle into the machine.
    pub fn update(&mut self, angle: f64, timestamp: f64) -> Option<RepEvent> {
        if let Some(event) = self.tick(timestamp) {
            return Some(event);
        }

        let descriptor = self.descriptor;
        if let Some(cycle) = self.cycle.as_mut() {
            cycle.extreme_angle = descriptor.further(cycle.extreme_angle, angle);
        }

        match self.phase {
            RepPhase::Setup => {
                if descriptor.in_rest_zone(angle) {
                    self.transition(RepPhase::Rest);
                }
                None
            }
            RepPhase::Rest => {
                if !descriptor.in_rest_zone(angle) {
                    self.cycle = Some(CycleProgress {
                        started_at: timestamp,
                        extreme_angle: angle,
                    });
                    if descriptor.in_peak_zone(angle) {
                        self.transition(RepPhase::Peak);
                    } else {
                        self.transition(RepPhase::Leaving);
                    }
                }
                None
            }
            RepPhase::Leaving => {
                if descriptor.in_peak_zone(angle) {
                    self.transition(RepPhase::Peak);
                    None
                } else if descriptor.in_rest_zone(angle) {
                    let extreme_angle = self.cycle.take().map_or(angle, |cycle| cycle.extreme_angle);
                    self.transition(RepPhase::Rest);
                    (descriptor.travel(extreme_angle) >= descriptor.partial_rep_margin)
                        .then_some(RepEvent::Partial { extreme_angle })
                } else {
                    None
                }
            }
            RepPhase::Peak => {
                if !descriptor.in_peak_zone(angle) {
                    self.transition(RepPhase::Returning);
                }
                None
            }
            RepPhase::Returning => {
                if descriptor.in_peak_zone(angle) {
                    self.transition(RepPhase::Peak);
                    None
                } else if descriptor.in_rest_zone(angle) {
                    let cycle = self.cycle.take();
                    self.rep_count += 1;
                    self.transition(RepPhase::Rest);
                    Some(RepEvent::Completed {
                        rep: self.rep_count,
                        duration: cycle.map_or(0.0, |cycle| timestamp - cycle.started_at),
                        extreme_angle: cycle.map_or(angle, |cycle| cycle.extreme_angle),
                    })
                } else {
                    None
                }
            }
        }
    }

    /// The driving signal was lost. The machine must see rest again before counting.
    pub fn interrupt(&mut self) -> Option<RepEvent> {
        let was_in_cycle = self.phase.in_cycle();
        self.drop_cycle();
        was_in_cycle.then_some(RepEvent::Interrupted)
    }

    /// A safety rule fired. Any in-progress cycle is discarded.
    pub fn invalidate(&mut self) -> Option<RepEvent> {
        if !self.phase.in_cycle() {
            return None;
        }
        self.drop_cycle();
        Some(RepEvent::Invalidated)
    }

    /// The athlete is out of position. Re-arms without emitting an event.
    pub fn reset_cycle(&mut self) {
        self.drop_cycle();
    }

    fn drop_cycle(&mut self) {
        if self.phase.in_cycle() {
            self.reps_discarded += 1;
        }
        self.cycle = None;
        self.transition(RepPhase::Setup);
    }

    fn transition(&mut self, next: RepPhase) {
        if self.phase != next {
            debug!(from = ?self.phase, to = ?next, "rep phase transition");
            self.phase = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LABELS: PhaseLabels = PhaseLabels {
        setup: "setup",
        rest: "standing",
        leaving: "descending",
        peak: "bottom",
        returning: "ascending",
    };

    fn squat() -> RepMachine {
        RepMachine::new(CycleDescriptor {
            direction: CycleDirection::Flexion,
            rest_angle: 160.0,
            peak_angle: 90.0,
            partial_rep_margin: 20.0,
            max_rep_duration: 8.0,
            labels: LABELS,
        })
    }

    fn feed(machine: &mut RepMachine, angles: &[f64], start: f64) -> Vec<RepEvent> {
        angles
            .iter()
            .enumerate()
            .filter_map(|(i, angle)| machine.update(*angle, start + i as f64 * 0.1))
            .collect()
    }

    #[test]
    fn full_cycle_counts_once_on_return_to_rest() {
        let mut machine = squat();
        let events = feed(&mut machine, &[170.0, 150.0, 120.0, 85.0, 100.0, 130.0, 165.0, 170.0], 0.0);

        assert_eq!(machine.rep_count(), 1);
        assert_eq!(events.len(), 1);
        match events[0] {
            RepEvent::Completed { rep, extreme_angle, .. } => {
                assert_eq!(rep, 1);
                assert_eq!(extreme_angle, 85.0);
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(machine.phase_label(), "standing");
    }

    #[test]
    fn zone_boundaries_are_inclusive() {
        let mut machine = squat();
        feed(&mut machine, &[160.0, 120.0, 90.0, 120.0, 160.0], 0.0);
        assert_eq!(machine.rep_count(), 1);
    }

    #[test]
    fn jitter_inside_the_band_never_counts() {
        let mut machine = squat();
        let mut angles = vec![170.0];
        for _ in 0..20 {
            angles.extend([95.0, 100.0]);
        }
        angles.push(170.0);
        feed(&mut machine, &angles, 0.0);
        assert_eq!(machine.rep_count(), 0);
    }

    #[test]
    fn machine_waits_for_rest_before_arming() {
        let mut machine = squat();
        feed(&mut machine, &[85.0, 120.0, 170.0], 0.0);
        assert_eq!(machine.rep_count(), 0);
        assert_eq!(machine.phase(), RepPhase::Rest);
    }

    #[test]
    fn bouncing_at_the_bottom_counts_a_single_rep() {
        let mut machine = squat();
        feed(&mut machine, &[170.0, 120.0, 85.0, 95.0, 85.0, 95.0, 170.0], 0.0);
        assert_eq!(machine.rep_count(), 1);
    }

    #[test]
    fn shallow_cycle_reports_a_partial_rep() {
        let mut machine = squat();
        let events = feed(&mut machine, &[170.0, 150.0, 130.0, 150.0, 170.0], 0.0);
        assert_eq!(events, vec![RepEvent::Partial { extreme_angle: 130.0 }]);
        assert_eq!(machine.rep_count(), 0);
    }

    #[test]
    fn tiny_dip_is_not_a_partial_rep() {
        let mut machine = squat();
        let events = feed(&mut machine, &[170.0, 155.0, 170.0], 0.0);
        assert!(events.is_empty());
    }

    #[test]
    fn slow_cycle_times_out_and_is_not_counted() {
        let mut machine = squat();
        machine.update(170.0, 0.0);
        machine.update(120.0, 0.5);
        machine.update(85.0, 1.0);
        let event = machine.tick(9.0);
        assert!(matches!(event, Some(RepEvent::TimedOut { .. })));
        assert_eq!(machine.phase(), RepPhase::Setup);

        machine.update(170.0, 9.5);
        assert_eq!(machine.rep_count(), 0);
        assert_eq!(machine.reps_discarded(), 1);
    }

    #[test]
    fn interruption_drops_the_cycle() {
        let mut machine = squat();
        feed(&mut machine, &[170.0, 120.0, 85.0], 0.0);
        assert_eq!(machine.interrupt(), Some(RepEvent::Interrupted));

        feed(&mut machine, &[120.0, 170.0], 1.0);
        assert_eq!(machine.rep_count(), 0);

        // Re-armed at rest, so the next full cycle counts.
        feed(&mut machine, &[120.0, 85.0, 120.0, 170.0], 2.0);
        assert_eq!(machine.rep_count(), 1);
    }

    #[test]
    fn interruption_at_rest_is_silent() {
        let mut machine = squat();
        machine.update(170.0, 0.0);
        assert_eq!(machine.interrupt(), None);
        assert_eq!(machine.reps_discarded(), 0);
    }

    #[test]
    fn invalidated_cycle_is_not_counted() {
        let mut machine = squat();
        feed(&mut machine, &[170.0, 120.0, 85.0], 0.0);
        assert_eq!(machine.invalidate(), Some(RepEvent::Invalidated));
        feed(&mut machine, &[120.0, 170.0], 1.0);
        assert_eq!(machine.rep_count(), 0);
    }

    #[test]
    fn extension_cycles_open_the_joint() {
        let mut machine = RepMachine::new(CycleDescriptor {
            direction: CycleDirection::Extension,
            rest_angle: 30.0,
            peak_angle: 70.0,
            partial_rep_margin: 20.0,
            max_rep_duration: 8.0,
            labels: LABELS,
        });
        feed(&mut machine, &[15.0, 40.0, 80.0, 60.0, 20.0], 0.0);
        assert_eq!(machine.rep_count(), 1);

        let events = feed(&mut machine, &[40.0, 55.0, 25.0], 1.0);
        assert_eq!(events, vec![RepEvent::Partial { extreme_angle: 55.0 }]);
    }
}
