//! Control Planner session state.
//!
//! Zero-sized type-state markers for the Planner's two states
//! (`SPEC_FULL.md` §4.3), generalized from the teacher's type-state robot
//! session pattern down to the two states this system needs.

use cobot_tools::Pose;

/// Waiting for the first valid robot feedback sample since the last
/// reset. No control poses are produced in this state.
pub struct Reset;

/// Armed: the base offsets between the remote controller's origin and
/// the robot's origin have been captured, and every subsequent target
/// update produces a control-pose series.
pub struct Armed {
    /// The robot's absolute pose, captured at arming time.
    pub base_robot: Pose,
    /// The remote controller's target pose, captured at arming time.
    pub base_target: Pose,
    /// The last target pose seen (used to detect no-op updates).
    pub last_target: Pose,
    /// The last control pose actually produced (the ramp's next `base`).
    pub last_control: Pose,
    /// Whether a control series has been produced yet since arming. The
    /// first post-arm update always produces a series even if its target
    /// equals the anchor (there is nothing yet to consider "no change
    /// from"); only later updates are checked against `last_target`.
    pub primed: bool,
}

/// The Control Planner's session state machine.
pub struct Planner<S> {
    state: S,
}

impl Planner<Reset> {
    pub fn new() -> Self {
        Planner { state: Reset }
    }

    /// Arms the planner once the first valid robot feedback sample
    /// arrives, capturing both origins.
    pub fn arm(self, base_robot: Pose, base_target: Pose) -> Planner<Armed> {
        Planner {
            state: Armed { base_robot, base_target, last_target: base_target, last_control: base_robot, primed: false },
        }
    }
}

impl Default for Planner<Reset> {
    fn default() -> Self {
        Self::new()
    }
}

impl Planner<Armed> {
    pub fn base_robot(&self) -> Pose {
        self.state.base_robot
    }

    pub fn base_target(&self) -> Pose {
        self.state.base_target
    }

    pub fn last_target(&self) -> Pose {
        self.state.last_target
    }

    pub fn last_control(&self) -> Pose {
        self.state.last_control
    }

    pub fn primed(&self) -> bool {
        self.state.primed
    }

    /// Records a newly produced control pose as the ramp's next base.
    pub fn advance(&mut self, target: Pose, new_control: Pose) {
        self.state.last_target = target;
        self.state.last_control = new_control;
        self.state.primed = true;
    }

    /// Drops back to `Reset`, discarding the captured origins. Called on
    /// an explicit reset pad press (`SPEC_FULL.md` §4.1).
    pub fn reset(self) -> Planner<Reset> {
        Planner::new()
    }
}
