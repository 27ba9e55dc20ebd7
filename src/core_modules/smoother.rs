// THEORY:
// The `SignalSmoother` is the temporal filter that sits between raw angle
// measurements and every decision the engine makes. Pose models jitter by several
// degrees from frame to frame; a state machine fed raw angles would count phantom
// reps every time the signal wobbled across a threshold.
//
// Key architectural principles:
// 1.  **Exponential moving average**: `smoothed = α·raw + (1−α)·previous`. A lower α
//     is smoother but slower. The first fresh sample seeds the filter directly.
//     Once the average is within `SETTLE_TOLERANCE` of a steady input it snaps to
//     it, so a held posture reaches its true angle instead of approaching it forever.
// 2.  **Hold, don't guess**: An undefined input (low-confidence joints) leaves the
//     filtered value untouched and increments a stale counter. The reading is
//     reported as `Held` so consumers know the value is old.
// 3.  **Declared loss**: Once the stale counter exceeds the configured limit the
//     signal is `Lost`. Consumers must pause rather than free-run on stale data. The
//     next fresh sample reseeds the filter instead of blending with a stale value.
// 4.  **Bounded memory**: A sliding window of recent filtered values is kept for
//     inspection; it never grows past its capacity.

use std::collections::VecDeque;

/// Degrees between sample and average below which the average snaps to the sample.
/// Well under the frame-to-frame jitter of pose models.
pub const SETTLE_TOLERANCE: f64 = 0.5;

/// The state of a smoothed signal after one update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SignalReading {
    /// Updated from a fresh sample this frame.
    Live(f64),
    /// No fresh sample this frame; the last filtered value is being held.
    Held { value: f64, stale_frames: u32 },
    /// Too many consecutive undefined frames. The last value is kept for reference only.
    Lost { last: Option<f64> },
    /// No sample has ever arrived and the stale limit has not been reached yet.
    Empty,
}

impl SignalReading {
    /// The value a rule may act on this frame. Only fresh readings qualify.
    pub fn live(&self) -> Option<f64> {
        match self {
            SignalReading::Live(value) => Some(*value),
            _ => None,
        }
    }

    /// The most recent filtered value, fresh or held.
    pub fn latest(&self) -> Option<f64> {
        match self {
            SignalReading::Live(value) => Some(*value),
            SignalReading::Held { value, .. } => Some(*value),
            SignalReading::Lost { last } => *last,
            SignalReading::Empty => None,
        }
    }

    pub fn is_lost(&self) -> bool {
        matches!(self, SignalReading::Lost { .. })
    }
}

/// Exponential smoother for one scalar angle signal.
#[derive(Debug, Clone)]
pub struct SignalSmoother {
    /// Weight of the newest sample, in (0, 1].
    alpha: f64,
    /// Number of consecutive undefined frames tolerated before the signal is lost.
    stale_frame_limit: u32,
    /// The current filtered value, if any sample has arrived.
    current: Option<f64>,
    /// Consecutive undefined frames since the last fresh sample.
    stale_frames: u32,
    /// Set once `stale_frames` passes the limit; cleared by the next fresh sample.
    lost: bool,
    /// A sliding window of recent filtered values.
    history: VecDeque<f64>,
    history_capacity: usize,
}

impl SignalSmoother {
    pub fn new(alpha: f64, stale_frame_limit: u32, history_capacity: usize) -> Self {
        Self {
            alpha: alpha.clamp(f64::EPSILON, 1.0),
            stale_frame_limit,
            current: None,
            stale_frames: 0,
            lost: false,
            history: VecDeque::with_capacity(history_capacity),
            history_capacity,
        }
    }

    /// Feeds one frame's raw measurement (or `None` when undefined) into the filter.
    pub fn update(&mut self, raw: Option<f64>) -> SignalReading {
        match raw {
            Some(value) => {
                let smoothed = match self.current {
                    Some(previous) if !self.lost => {
                        let blended = self.alpha * value + (1.0 - self.alpha) * previous;
                        if (value - blended).abs() < SETTLE_TOLERANCE { value } else { blended }
                    }
                    _ => value,
                };
                self.current = Some(smoothed);
                self.stale_frames = 0;
                self.lost = false;
                self.push_history(smoothed);
                SignalReading::Live(smoothed)
            }
            None => {
                self.stale_frames = self.stale_frames.saturating_add(1);
                if self.stale_frames > self.stale_frame_limit {
                    self.lost = true;
                }
                self.reading()
            }
        }
    }

    /// The current reading without feeding a new sample.
    pub fn reading(&self) -> SignalReading {
        if self.lost {
            return SignalReading::Lost { last: self.current };
        }
        match self.current {
            Some(value) if self.stale_frames == 0 => SignalReading::Live(value),
            Some(value) => SignalReading::Held {
                value,
                stale_frames: self.stale_frames,
            },
            None => SignalReading::Empty,
        }
    }

    pub fn history(&self) -> &VecDeque<f64> {
        &self.history
    }

    pub fn stale_frames(&self) -> u32 {
        self.stale_frames
    }

    fn push_history(&mut self, value: f64) {
        if self.history_capacity == 0 {
            return;
        }
        self.history.push_back(value);
        if self.history.len() > self.history_capacity {
            self.history.pop_front();
        }
    }
}
