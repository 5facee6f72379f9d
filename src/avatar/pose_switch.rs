//! Timed alternation between the rest pose and a sequence of poses.
//!
//! The switcher starts by switching: the first `tick` applies the first
//! pose. After that it waits `interval` seconds, falls back to the rest pose,
//! waits again, applies the next pose, and so on, wrapping around the
//! sequence.

/// Which pose to apply.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PoseTarget {
    Rest,
    /// Index into the pose sequence
    Pose(usize),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SwitchState {
    WaitingForNextSwitch { elapsed: f32 },
    Switching,
}

#[derive(Clone, Debug)]
pub struct PoseSwitcher {
    interval: f32,
    pose_count: usize,
    next_pose: usize,
    showing_rest: bool,
    state: SwitchState,
}

impl PoseSwitcher {
    /// Seconds between switches.
    pub const DEFAULT_INTERVAL: f32 = 3.0;

    /// `pose_count == 0` alternates the rest pose with itself, i.e. only
    /// ever yields `Rest`.
    pub fn new(pose_count: usize, interval: f32) -> Self {
        Self {
            interval: interval.max(0.0),
            pose_count,
            next_pose: 0,
            showing_rest: true,
            state: SwitchState::Switching,
        }
    }

    pub fn state(&self) -> SwitchState {
        self.state
    }

    /// Advance by `dt` seconds. Returns the pose to apply if a switch
    /// happened this tick.
    pub fn tick(&mut self, dt: f32) -> Option<PoseTarget> {
        match self.state {
            SwitchState::Switching => {
                let target = self.switch();
                self.state = SwitchState::WaitingForNextSwitch { elapsed: 0.0 };
                Some(target)
            }
            SwitchState::WaitingForNextSwitch { elapsed } => {
                let elapsed = elapsed + dt.max(0.0);
                if elapsed >= self.interval {
                    let target = self.switch();
                    // Carry the overshoot so long-run timing doesn't drift
                    self.state = SwitchState::WaitingForNextSwitch {
                        elapsed: (elapsed - self.interval).min(self.interval),
                    };
                    Some(target)
                } else {
                    self.state = SwitchState::WaitingForNextSwitch { elapsed };
                    None
                }
            }
        }
    }

    fn switch(&mut self) -> PoseTarget {
        let target = if self.showing_rest && self.pose_count > 0 {
            let i = self.next_pose;
            self.next_pose = (self.next_pose + 1) % self.pose_count;
            PoseTarget::Pose(i)
        } else {
            PoseTarget::Rest
        };
        self.showing_rest = !self.showing_rest;
        target
    }
}

impl Default for PoseSwitcher {
    fn default() -> Self {
        Self::new(0, Self::DEFAULT_INTERVAL)
    }
}
