// THEORY:
// The `angle` module turns three joints into the one number every exercise rule is
// written against: the interior angle at a vertex joint. It is the analytical
// wrapper around the "dumb" `Joint` data, much as a comparison lens sits on top of
// raw measurements.
//
// Key architectural principles:
// 1.  **Pure geometry**: `interior_angle` has no state and no side effects. It uses
//     the dot-product / arccos formula on the (x, y) projection; depth is ignored
//     because the engine assumes a primarily side-on camera.
// 2.  **Undefined is a value**: When any of the three joints is below the confidence
//     threshold, or two joints coincide, the result is `None`. Callers hold their
//     last known state instead of acting on a guess.
// 3.  **Named measurements**: A `JointTriple` binds a measurement name to the three
//     joints it reads, so the same triple can be sampled frame after frame and the
//     result tagged as an `AngleSample`.

use crate::core_modules::joint::{Joint, JointFrame, JointName};

/// Vectors shorter than this (in normalized image units) cannot define a direction.
const MIN_SEGMENT_LENGTH: f64 = 1e-6;

/// Interior angle at `b` formed by the segments b→a and b→c, in degrees [0, 180].
///
/// Returns `None` when either segment is degenerate.
pub fn interior_angle(a: &Joint, b: &Joint, c: &Joint) -> Option<f64> {
    let ba = (a.x - b.x, a.y - b.y);
    let bc = (c.x - b.x, c.y - b.y);

    let magnitude_ba = (ba.0 * ba.0 + ba.1 * ba.1).sqrt();
    let magnitude_bc = (bc.0 * bc.0 + bc.1 * bc.1).sqrt();
    if magnitude_ba < MIN_SEGMENT_LENGTH || magnitude_bc < MIN_SEGMENT_LENGTH {
        return None;
    }

    let cosine = ((ba.0 * bc.0 + ba.1 * bc.1) / (magnitude_ba * magnitude_bc)).clamp(-1.0, 1.0);
    Some(cosine.acos().to_degrees())
}

/// The three joints that define one angle measurement. `vertex` is the middle joint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JointTriple {
    pub first: JointName,
    pub vertex: JointName,
    pub last: JointName,
}

impl JointTriple {
    pub const fn new(first: JointName, vertex: JointName, last: JointName) -> Self {
        Self {
            first,
            vertex,
            last,
        }
    }

    /// Measures this triple on `frame`, honoring the confidence threshold.
    pub fn measure(&self, frame: &JointFrame, threshold: f64) -> Option<f64> {
        let a = frame.visible(self.first, threshold)?;
        let b = frame.visible(self.vertex, threshold)?;
        let c = frame.visible(self.last, threshold)?;
        interior_angle(a, b, c)
    }
}

/// One named angle measured on one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AngleSample {
    pub name: &'static str,
    /// Degrees in [0, 180], or `None` when the measurement was undefined.
    pub degrees: Option<f64>,
    pub frame_index: u64,
    pub timestamp: f64,
}

impl AngleSample {
    pub fn measure(name: &'static str, triple: &JointTriple, frame: &JointFrame, threshold: f64) -> Self {
        Self {
            name,
            degrees: triple.measure(frame, threshold),
            frame_index: frame.frame_index,
            timestamp: frame.timestamp,
        }
    }

    pub fn is_defined(&self) -> bool {
        self.degrees.is_some()
    }
}

/// Signed vertical offset of `point` from the straight line through `start` and `end`,
/// evaluated at `point.x`. Positive means `point` lies below the line in image space
/// (larger y). Returns `None` for a vertical line.
pub fn offset_from_line(start: &Joint, point: &Joint, end: &Joint) -> Option<f64> {
    let dx = end.x - start.x;
    if dx.abs() < MIN_SEGMENT_LENGTH {
        return None;
    }
    let t = (point.x - start.x) / dx;
    let line_y = start.y + t * (end.y - start.y);
    Some(point.y - line_y)
}
