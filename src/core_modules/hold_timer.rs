// THEORY:
// Isometric exercises have no repetitions, only a posture that is either held or
// broken. The `HoldTimer` is the binary sibling of the `RepMachine`: the same
// hysteresis idea applied to a single threshold pair, accumulating time instead of
// counting cycles.
//
// Key architectural principles:
// 1.  **Two thresholds**: The hold begins once the body line reaches the enter angle
//     and only breaks when it falls below the lower exit angle, so a body line
//     hovering at one value does not flicker between states.
// 2.  **Continuous holds**: Time accumulates from the frame the hold began. A break
//     resets the current hold; the longest hold seen so far is kept separately.
// 3.  **Loss breaks the hold**: Without a signal the engine cannot vouch for the
//     posture, so a lost signal or a failed position gate ends the hold.

use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldState {
    Held,
    Broken,
}

#[derive(Debug, Clone)]
pub struct HoldTimer {
    enter_angle: f64,
    exit_angle: f64,
    state: HoldState,
    hold_started_at: Option<f64>,
    current_hold: f64,
    longest_hold: f64,
}

impl HoldTimer {
    pub fn new(enter_angle: f64, exit_angle: f64) -> Self {
        Self {
            enter_angle,
            exit_angle,
            state: HoldState::Broken,
            hold_started_at: None,
            current_hold: 0.0,
            longest_hold: 0.0,
        }
    }

    pub fn state(&self) -> HoldState {
        self.state
    }

    /// Seconds in the hold that is currently running, 0 when broken.
    pub fn current_hold(&self) -> f64 {
        self.current_hold
    }

    pub fn longest_hold(&self) -> f64 {
        self.longest_hold
    }

    /// Feeds one fresh body-line angle.
    pub fn update(&mut self, angle: f64, timestamp: f64) -> HoldState {
        match self.state {
            HoldState::Broken if angle >= self.enter_angle => {
                debug!(timestamp, "hold started");
                self.state = HoldState::Held;
                self.hold_started_at = Some(timestamp);
                self.current_hold = 0.0;
            }
            HoldState::Held if angle < self.exit_angle => self.break_hold(),
            HoldState::Held => self.tick(timestamp),
            HoldState::Broken => {}
        }
        self.state
    }

    /// Extends a running hold to `timestamp` without a fresh angle.
    pub fn tick(&mut self, timestamp: f64) {
        if let Some(started_at) = self.hold_started_at {
            self.current_hold = (timestamp - started_at).max(0.0);
            self.longest_hold = self.longest_hold.max(self.current_hold);
        }
    }

    pub fn break_hold(&mut self) {
        if self.state == HoldState::Held {
            debug!(held_for = self.current_hold, "hold broken");
        }
        self.state = HoldState::Broken;
        self.hold_started_at = None;
        self.current_hold = 0.0;
    }
}
