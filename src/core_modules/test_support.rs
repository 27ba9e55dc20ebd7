//! Synthetic skeletons posed with exact joint angles, for driving the engine in tests.

use std::collections::HashMap;

use crate::core_modules::joint::{Joint, JointFrame, JointName, Limb, Side};

pub(crate) const FPS: f64 = 30.0;

/// A mutable skeleton. Limb setters move both sides together.
#[derive(Debug, Clone)]
pub(crate) struct Pose {
    joints: HashMap<JointName, Joint>,
}

impl Pose {
    fn empty() -> Self {
        Self { joints: HashMap::new() }
    }

    fn set(mut self, limb: Limb, x: f64, y: f64) -> Self {
        for side in [Side::Left, Side::Right] {
            self.joints.insert(JointName::of(limb, side), Joint::new(x, y, 1.0));
        }
        self
    }

    pub(crate) fn with(mut self, name: JointName, x: f64, y: f64) -> Self {
        self.joints.insert(name, Joint::new(x, y, 1.0));
        self
    }

    pub(crate) fn with_confidence(mut self, name: JointName, confidence: f64) -> Self {
        if let Some(joint) = self.joints.get_mut(&name) {
            joint.confidence = confidence;
        }
        self
    }

    pub(crate) fn frame(&self, frame_index: u64, timestamp: f64) -> JointFrame {
        JointFrame {
            frame_index,
            timestamp,
            joints: self.joints.clone(),
        }
    }

    fn get(&self, name: JointName) -> (f64, f64) {
        self.joints.get(&name).map_or((0.0, 0.0), |joint| (joint.x, joint.y))
    }

    /// Upright, side-on, arms hanging.
    pub(crate) fn standing() -> Self {
        Self::empty()
            .with(JointName::Nose, 0.53, 0.10)
            .set(Limb::Ear, 0.50, 0.12)
            .set(Limb::Shoulder, 0.50, 0.25)
            .set(Limb::Elbow, 0.50, 0.40)
            .set(Limb::Wrist, 0.50, 0.55)
            .set(Limb::Hip, 0.50, 0.55)
            .set(Limb::Knee, 0.50, 0.72)
            .set(Limb::Ankle, 0.50, 0.90)
            .set(Limb::Heel, 0.48, 0.92)
            .set(Limb::FootIndex, 0.56, 0.92)
    }

    /// Tilts the torso forward about the hips to `degrees` above horizontal.
    pub(crate) fn with_torso_elevation(self, degrees: f64) -> Self {
        let (hip_x, hip_y) = self.get(JointName::RightHip);
        let (cos, sin) = (degrees.to_radians().cos(), degrees.to_radians().sin());
        let shoulder = (hip_x + 0.3 * cos, hip_y - 0.3 * sin);
        self.set(Limb::Shoulder, shoulder.0, shoulder.1)
            .set(Limb::Ear, shoulder.0 + 0.08 * cos, shoulder.1 - 0.08 * sin)
    }

    /// Standing pose with both knees bent to exactly `knee` degrees and an upright torso.
    pub(crate) fn squat(knee: f64) -> Self {
        let (sin, cos) = (knee.to_radians().sin(), knee.to_radians().cos());
        let hip = (0.50 + 0.17 * sin, 0.72 + 0.17 * cos);
        Self::standing()
            .set(Limb::Hip, hip.0, hip.1)
            .set(Limb::Shoulder, hip.0, hip.1 - 0.30)
            .set(Limb::Ear, hip.0, hip.1 - 0.38)
            .set(Limb::Elbow, hip.0, hip.1 - 0.15)
            .set(Limb::Wrist, hip.0, hip.1)
            .with(JointName::Nose, hip.0 + 0.03, hip.1 - 0.40)
    }

    /// Horizontal body facing +x, arms straight under the shoulders.
    pub(crate) fn plank() -> Self {
        Self::empty()
            .with(JointName::Nose, 0.88, 0.58)
            .set(Limb::Ear, 0.85, 0.57)
            .set(Limb::Shoulder, 0.80, 0.60)
            .set(Limb::Elbow, 0.80, 0.72)
            .set(Limb::Wrist, 0.80, 0.85)
            .set(Limb::Hip, 0.50, 0.60)
            .set(Limb::Knee, 0.35, 0.60)
            .set(Limb::Ankle, 0.20, 0.60)
            .set(Limb::Heel, 0.18, 0.58)
            .set(Limb::FootIndex, 0.19, 0.63)
    }

    /// Plank with the elbow bent to exactly `elbow` degrees.
    pub(crate) fn pushup(elbow: f64) -> Self {
        let (sin, cos) = (elbow.to_radians().sin(), elbow.to_radians().cos());
        Self::plank().set(Limb::Wrist, 0.80 + 0.13 * sin, 0.72 - 0.13 * cos)
    }

    /// Straight legs, torso hinged so that shoulder-hip-knee is exactly `hip` degrees.
    pub(crate) fn deadlift(hip: f64) -> Self {
        let (sin, cos) = (hip.to_radians().sin(), hip.to_radians().cos());
        let shoulder = (0.50 + 0.20 * sin, 0.55 + 0.20 * cos);
        let ear = (0.50 + 0.27 * sin, 0.55 + 0.27 * cos);
        Self::standing()
            .set(Limb::Hip, 0.50, 0.55)
            .set(Limb::Knee, 0.50, 0.75)
            .set(Limb::Ankle, 0.50, 0.95)
            .set(Limb::Heel, 0.48, 0.97)
            .set(Limb::FootIndex, 0.56, 0.97)
            .set(Limb::Shoulder, shoulder.0, shoulder.1)
            .set(Limb::Ear, ear.0, ear.1)
            .set(Limb::Elbow, shoulder.0, shoulder.1 + 0.15)
            .set(Limb::Wrist, shoulder.0, shoulder.1 + 0.30)
            .with(JointName::Nose, ear.0 + 0.02, ear.1)
    }

    /// Standing with the elbow bent to exactly `elbow` degrees.
    pub(crate) fn curl(elbow: f64) -> Self {
        let (sin, cos) = (elbow.to_radians().sin(), elbow.to_radians().cos());
        Self::standing().set(Limb::Wrist, 0.50 + 0.15 * sin, 0.40 - 0.15 * cos)
    }

    /// Standing with straight arms raised so hip-shoulder-elbow is exactly `arm` degrees.
    pub(crate) fn raise(arm: f64) -> Self {
        let (sin, cos) = (arm.to_radians().sin(), arm.to_radians().cos());
        Self::standing()
            .set(Limb::Elbow, 0.50 + 0.15 * sin, 0.25 + 0.15 * cos)
            .set(Limb::Wrist, 0.50 + 0.30 * sin, 0.25 + 0.30 * cos)
    }

    /// Split stance facing +x. `front` steps forward; each knee is bent to its exact angle.
    pub(crate) fn lunge(front: Side, front_knee: f64, back_knee: f64) -> Self {
        let front_hip = (
            0.65 - 0.17 * front_knee.to_radians().sin(),
            0.72 + 0.17 * front_knee.to_radians().cos(),
        );
        let back_hip = (
            0.30 + 0.17 * back_knee.to_radians().sin(),
            0.72 + 0.17 * back_knee.to_radians().cos(),
        );
        let mid = ((front_hip.0 + back_hip.0) / 2.0, (front_hip.1 + back_hip.1) / 2.0);
        let back = front.opposite();
        Self::standing()
            .with(JointName::of(Limb::Ankle, front), 0.65, 0.90)
            .with(JointName::of(Limb::Knee, front), 0.65, 0.72)
            .with(JointName::of(Limb::Hip, front), front_hip.0, front_hip.1)
            .with(JointName::of(Limb::Ankle, back), 0.30, 0.90)
            .with(JointName::of(Limb::Knee, back), 0.30, 0.72)
            .with(JointName::of(Limb::Hip, back), back_hip.0, back_hip.1)
            .set(Limb::Shoulder, mid.0, mid.1 - 0.30)
            .set(Limb::Ear, mid.0, mid.1 - 0.38)
            .with(JointName::Nose, mid.0 + 0.06, mid.1 - 0.40)
    }
}

/// Linear ramp from `from` to `to` over `steps` samples, excluding `from`.
pub(crate) fn ramp(from: f64, to: f64, steps: usize) -> Vec<f64> {
    (1..=steps)
        .map(|i| from + (to - from) * i as f64 / steps as f64)
        .collect()
}

/// One rep at 30 fps: ramp down over 15 frames, hold 10, ramp up over 15, hold 10.
pub(crate) fn cycle(high: f64, low: f64) -> Vec<f64> {
    let mut angles = ramp(high, low, 15);
    angles.extend(std::iter::repeat_n(low, 10));
    angles.extend(ramp(low, high, 15));
    angles.extend(std::iter::repeat_n(high, 10));
    angles
}

/// Initial rest hold followed by `reps` full cycles.
pub(crate) fn cycles(high: f64, low: f64, reps: usize) -> Vec<f64> {
    let mut angles = vec![high; 5];
    for _ in 0..reps {
        angles.extend(cycle(high, low));
    }
    angles
}

/// Turns an angle trace into consecutive frames at 30 fps.
pub(crate) fn frames(angles: &[f64], pose: impl Fn(f64) -> Pose) -> Vec<JointFrame> {
    angles
        .iter()
        .enumerate()
        .map(|(i, angle)| pose(*angle).frame(i as u64, i as f64 / FPS))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::exercise::Signal;

    fn measured(signal: Signal, frame: &JointFrame) -> f64 {
        signal.triple(Side::Right).measure(frame, 0.5).unwrap()
    }

    #[test]
    fn poses_hit_their_target_angles() {
        for angle in [80.0, 120.0, 170.0] {
            assert!((measured(Signal::Knee, &Pose::squat(angle).frame(0, 0.0)) - angle).abs() < 1e-6);
            assert!((measured(Signal::Elbow, &Pose::pushup(angle).frame(0, 0.0)) - angle).abs() < 1e-6);
            assert!((measured(Signal::Hip, &Pose::deadlift(angle).frame(0, 0.0)) - angle).abs() < 1e-6);
            assert!((measured(Signal::Elbow, &Pose::curl(angle).frame(0, 0.0)) - angle).abs() < 1e-6);
        }
        assert!((measured(Signal::Arm, &Pose::raise(60.0).frame(0, 0.0)) - 60.0).abs() < 1e-6);

        let lunge = Pose::lunge(Side::Left, 95.0, 110.0).frame(0, 0.0);
        let left = Signal::LeftKnee.triple(Side::Right).measure(&lunge, 0.5).unwrap();
        let right = Signal::RightKnee.triple(Side::Right).measure(&lunge, 0.5).unwrap();
        assert!((left - 95.0).abs() < 1e-6);
        assert!((right - 110.0).abs() < 1e-6);
    }

    #[test]
    fn cycle_trace_has_the_expected_shape() {
        let trace = cycle(170.0, 80.0);
        assert_eq!(trace.len(), 50);
        assert_eq!(trace[14], 80.0);
        assert_eq!(*trace.last().unwrap(), 170.0);
        let frames = frames(&trace, Pose::squat);
        assert_eq!(frames[30].frame_index, 30);
        assert!((frames[30].timestamp - 1.0).abs() < 1e-9);
    }
}
