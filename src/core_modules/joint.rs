// THEORY:
// The `joint` module is the most fundamental unit of the engine. A `Joint` is a
// "dumb" data container for one anatomical landmark as reported by the external
// pose model: a position plus the model's confidence that the landmark is visible.
// A `JointFrame` is the set of joints detected in a single video frame.
//
// Key architectural principles:
// 1.  **Single-frame scope**: Nothing here knows about other frames. Anything that
//     needs history (smoothing, state machines) lives in higher modules.
// 2.  **Named landmarks**: Joints are addressed by `JointName`, never by raw model
//     indices. `JointName::from_landmark_index` is the one bridge to the 33-point
//     MediaPipe layout most pose models emit.
// 3.  **Confidence gating at the edge**: `JointFrame::visible` is the single place
//     where the confidence threshold is applied to raw landmarks, so every consumer
//     treats low-confidence joints as absent in exactly the same way.
// 4.  **Immutability**: A frame is built once (by the collaborator or a test
//     harness) and only ever borrowed by the analysis pipeline.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which side of the body a joint or a measurement belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

/// The anatomical landmarks the engine knows how to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JointName {
    Nose,
    LeftEar,
    RightEar,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
    LeftHeel,
    RightHeel,
    LeftFootIndex,
    RightFootIndex,
}

/// A side-agnostic body part, resolved to a concrete `JointName` with a `Side`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limb {
    Ear,
    Shoulder,
    Elbow,
    Wrist,
    Hip,
    Knee,
    Ankle,
    Heel,
    FootIndex,
}

impl JointName {
    pub const ALL: [JointName; 19] = [
        JointName::Nose,
        JointName::LeftEar,
        JointName::RightEar,
        JointName::LeftShoulder,
        JointName::RightShoulder,
        JointName::LeftElbow,
        JointName::RightElbow,
        JointName::LeftWrist,
        JointName::RightWrist,
        JointName::LeftHip,
        JointName::RightHip,
        JointName::LeftKnee,
        JointName::RightKnee,
        JointName::LeftAnkle,
        JointName::RightAnkle,
        JointName::LeftHeel,
        JointName::RightHeel,
        JointName::LeftFootIndex,
        JointName::RightFootIndex,
    ];

    /// Resolves a side-agnostic limb to the joint on the given side.
    pub fn of(limb: Limb, side: Side) -> JointName {
        use JointName::*;
        match (limb, side) {
            (Limb::Ear, Side::Left) => LeftEar,
            (Limb::Ear, Side::Right) => RightEar,
            (Limb::Shoulder, Side::Left) => LeftShoulder,
            (Limb::Shoulder, Side::Right) => RightShoulder,
            (Limb::Elbow, Side::Left) => LeftElbow,
            (Limb::Elbow, Side::Right) => RightElbow,
            (Limb::Wrist, Side::Left) => LeftWrist,
            (Limb::Wrist, Side::Right) => RightWrist,
            (Limb::Hip, Side::Left) => LeftHip,
            (Limb::Hip, Side::Right) => RightHip,
            (Limb::Knee, Side::Left) => LeftKnee,
            (Limb::Knee, Side::Right) => RightKnee,
            (Limb::Ankle, Side::Left) => LeftAnkle,
            (Limb::Ankle, Side::Right) => RightAnkle,
            (Limb::Heel, Side::Left) => LeftHeel,
            (Limb::Heel, Side::Right) => RightHeel,
            (Limb::FootIndex, Side::Left) => LeftFootIndex,
            (Limb::FootIndex, Side::Right) => RightFootIndex,
        }
    }

    /// Maps an index of the 33-landmark MediaPipe pose layout to a joint name.
    /// Landmarks the engine does not use (eyes, mouth, fingers) map to `None`.
    pub fn from_landmark_index(index: usize) -> Option<JointName> {
        use JointName::*;
        let name = match index {
            0 => Nose,
            7 => LeftEar,
            8 => RightEar,
            11 => LeftShoulder,
            12 => RightShoulder,
            13 => LeftElbow,
            14 => RightElbow,
            15 => LeftWrist,
            16 => RightWrist,
            23 => LeftHip,
            24 => RightHip,
            25 => LeftKnee,
            26 => RightKnee,
            27 => LeftAnkle,
            28 => RightAnkle,
            29 => LeftHeel,
            30 => RightHeel,
            31 => LeftFootIndex,
            32 => RightFootIndex,
            _ => return None,
        };
        Some(name)
    }

    pub fn as_str(&self) -> &'static str {
        use JointName::*;
        match self {
            Nose => "nose",
            LeftEar => "left_ear",
            RightEar => "right_ear",
            LeftShoulder => "left_shoulder",
            RightShoulder => "right_shoulder",
            LeftElbow => "left_elbow",
            RightElbow => "right_elbow",
            LeftWrist => "left_wrist",
            RightWrist => "right_wrist",
            LeftHip => "left_hip",
            RightHip => "right_hip",
            LeftKnee => "left_knee",
            RightKnee => "right_knee",
            LeftAnkle => "left_ankle",
            RightAnkle => "right_ankle",
            LeftHeel => "left_heel",
            RightHeel => "right_heel",
            LeftFootIndex => "left_foot_index",
            RightFootIndex => "right_foot_index",
        }
    }
}

impl fmt::Display for JointName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JointName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JointName::ALL
            .iter()
            .copied()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| format!("unknown joint name `{s}`"))
    }
}

/// A single landmark reported by the pose model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Joint {
    /// Horizontal position, normalized to the frame width (0.0 = left edge).
    pub x: f64,
    /// Vertical position, normalized to the frame height (0.0 = top edge).
    pub y: f64,
    /// Relative depth. Carried for completeness; angle math uses the (x, y) projection.
    #[serde(default)]
    pub z: f64,
    /// Detection confidence / visibility in [0, 1].
    pub confidence: f64,
}

impl Joint {
    pub fn new(x: f64, y: f64, confidence: f64) -> Self {
        Self {
            x,
            y,
            z: 0.0,
            confidence,
        }
    }

    pub fn with_depth(mut self, z: f64) -> Self {
        self.z = z;
        self
    }

    pub fn is_visible(&self, threshold: f64) -> bool {
        self.confidence >= threshold
    }
}

/// All joints detected in one analyzed video frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointFrame {
    /// Position of this frame in the source stream. Strictly increasing.
    pub frame_index: u64,
    /// Presentation time of the frame in seconds from the start of the stream.
    pub timestamp: f64,
    /// The detected landmarks. A missing entry is treated like a zero-confidence joint.
    pub joints: HashMap<JointName, Joint>,
}

impl JointFrame {
    pub fn new(frame_index: u64, timestamp: f64) -> Self {
        Self {
            frame_index,
            timestamp,
            joints: HashMap::new(),
        }
    }

    /// Builder-style insertion, used by collaborators that assemble frames landmark by landmark.
    pub fn with_joint(mut self, name: JointName, joint: Joint) -> Self {
        self.joints.insert(name, joint);
        self
    }

    /// Builds a frame from a raw 33-landmark pose array of `[x, y, z, visibility]`.
    pub fn from_landmarks(frame_index: u64, timestamp: f64, landmarks: &[[f64; 4]]) -> Self {
        let joints = landmarks
            .iter()
            .enumerate()
            .filter_map(|(index, [x, y, z, confidence])| {
                JointName::from_landmark_index(index).map(|name| {
                    (
                        name,
                        Joint {
                            x: *x,
                            y: *y,
                            z: *z,
                            confidence: *confidence,
                        },
                    )
                })
            })
            .collect();
        Self {
            frame_index,
            timestamp,
            joints,
        }
    }

    pub fn get(&self, name: JointName) -> Option<&Joint> {
        self.joints.get(&name)
    }

    /// Returns the joint only if its confidence meets `threshold`.
    pub fn visible(&self, name: JointName, threshold: f64) -> Option<&Joint> {
        self.joints.get(&name).filter(|joint| joint.is_visible(threshold))
    }

    /// Confidence of a joint, 0.0 when the model did not report it.
    pub fn confidence(&self, name: JointName) -> f64 {
        self.joints.get(&name).map_or(0.0, |joint| joint.confidence)
    }
}
