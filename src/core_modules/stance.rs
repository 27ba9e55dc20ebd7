// THEORY:
// A lunge is asymmetric: one leg steps forward and bends towards 90°, the other
// trails and drops its knee. Form rules and the rep cycle both need to know which
// leg is which, and the answer can change between reps when the athlete alternates.
//
// Key architectural principles:
// 1.  **Facing first**: The nose's horizontal offset from the hip midpoint tells
//     which way the athlete faces. The front leg is the one whose ankle sits further
//     out in that direction.
// 2.  **Knee fallback**: When the face is not visible the more-bent knee is taken as
//     the front knee. It is a weaker cue and only used when the primary one is unavailable.
// 3.  **Sticky between reps**: The classification may only change while no cycle is
//     in progress, so a rep is always judged against the leg it started with.

use crate::core_modules::joint::{JointFrame, JointName, Side};

/// Horizontal nose offsets smaller than this cannot tell facing direction.
const MIN_FACING_OFFSET: f64 = 0.01;

/// How the front leg was determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StanceCue {
    Facing,
    KneeBend,
}

/// Classifies the forward leg from one frame.
///
/// `left_knee` / `right_knee` are the current smoothed knee angles, used only for
/// the fallback cue.
pub fn classify_front_leg(
    frame: &JointFrame,
    threshold: f64,
    left_knee: Option<f64>,
    right_knee: Option<f64>,
) -> Option<(Side, StanceCue)> {
    facing_front_leg(frame, threshold)
        .map(|side| (side, StanceCue::Facing))
        .or_else(|| knee_front_leg(left_knee, right_knee).map(|side| (side, StanceCue::KneeBend)))
}

fn facing_front_leg(frame: &JointFrame, threshold: f64) -> Option<Side> {
    let nose = frame.visible(JointName::Nose, threshold)?;
    let left_hip = frame.visible(JointName::LeftHip, threshold)?;
    let right_hip = frame.visible(JointName::RightHip, threshold)?;
    let left_ankle = frame.visible(JointName::LeftAnkle, threshold)?;
    let right_ankle = frame.visible(JointName::RightAnkle, threshold)?;

    let hip_mid_x = (left_hip.x + right_hip.x) / 2.0;
    let facing_offset = nose.x - hip_mid_x;
    if facing_offset.abs() < MIN_FACING_OFFSET {
        return None;
    }
    let facing = facing_offset.signum();

    let left_reach = (left_ankle.x - hip_mid_x) * facing;
    let right_reach = (right_ankle.x - hip_mid_x) * facing;
    if left_reach >= right_reach {
        Some(Side::Left)
    } else {
        Some(Side::Right)
    }
}

fn knee_front_leg(left_knee: Option<f64>, right_knee: Option<f64>) -> Option<Side> {
    match (left_knee, right_knee) {
        (Some(left), Some(right)) if left <= right => Some(Side::Left),
        (Some(_), Some(_)) => Some(Side::Right),
        _ => None,
    }
}

/// Remembers the front leg across frames.
#[derive(Debug, Clone, Default)]
pub struct StanceTracker {
    front: Option<Side>,
}

impl StanceTracker {
    pub fn front(&self) -> Option<Side> {
        self.front
    }

    /// Reclassifies the front leg when `may_switch` is set; otherwise only fills in
    /// a classification that has never been made.
    pub fn observe(
        &mut self,
        frame: &JointFrame,
        threshold: f64,
        left_knee: Option<f64>,
        right_knee: Option<f64>,
        may_switch: bool,
    ) -> Option<Side> {
        if may_switch || self.front.is_none() {
            if let Some((side, _)) = classify_front_leg(frame, threshold, left_knee, right_knee) {
                self.front = Some(side);
            }
        }
        self.front
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::joint::Joint;

    fn lunge_frame(nose_x: f64, left_ankle_x: f64, right_ankle_x: f64) -> JointFrame {
        JointFrame::new(0, 0.0)
            .with_joint(JointName::Nose, Joint::new(nose_x, 0.1, 1.0))
            .with_joint(JointName::LeftHip, Joint::new(0.5, 0.5, 1.0))
            .with_joint(JointName::RightHip, Joint::new(0.5, 0.5, 1.0))
            .with_joint(JointName::LeftAnkle, Joint::new(left_ankle_x, 0.9, 1.0))
            .with_joint(JointName::RightAnkle, Joint::new(right_ankle_x, 0.9, 1.0))
    }

    #[test]
    fn front_leg_follows_facing_direction() {
        // Facing right (+x): the ankle further right is in front.
        let frame = lunge_frame(0.6, 0.3, 0.75);
        assert_eq!(classify_front_leg(&frame, 0.5, None, None), Some((Side::Right, StanceCue::Facing)));

        // Same feet, facing left: the left ankle leads.
        let frame = lunge_frame(0.4, 0.3, 0.75);
        assert_eq!(classify_front_leg(&frame, 0.5, None, None), Some((Side::Left, StanceCue::Facing)));
    }

    #[test]
    fn hidden_face_falls_back_to_the_more_bent_knee() {
        let mut frame = lunge_frame(0.6, 0.3, 0.75);
        frame.joints.remove(&JointName::Nose);
        assert_eq!(
            classify_front_leg(&frame, 0.5, Some(95.0), Some(130.0)),
            Some((Side::Left, StanceCue::KneeBend))
        );
        assert_eq!(classify_front_leg(&frame, 0.5, Some(95.0), None), None);
    }

    #[test]
    fn tracker_keeps_its_choice_mid_cycle() {
        let mut tracker = StanceTracker::default();
        assert_eq!(tracker.observe(&lunge_frame(0.6, 0.3, 0.75), 0.5, None, None, false), Some(Side::Right));
        assert_eq!(tracker.observe(&lunge_frame(0.4, 0.3, 0.75), 0.5, None, None, false), Some(Side::Right));
        assert_eq!(tracker.observe(&lunge_frame(0.4, 0.3, 0.75), 0.5, None, None, true), Some(Side::Left));
    }
}
