//! The Control Planner: combines the session state machine with the
//! interpolator to turn target updates into control-pose series
//! (`SPEC_FULL.md` §4.3, grounded on `examples/original_source/denso_control.py`'s
//! `DensoControl.on_target`).

use crate::interpolator::{build_control_series, VelocityLimits};
use crate::state::{Armed, Planner, Reset};
use cobot_tools::Pose;

/// Configuration the planner needs to turn a relative target pose into a
/// control-pose series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlannerConfig {
    pub nominal_interval: f64,
    pub tick_period: f64,
    pub limits: VelocityLimits,
    /// When `true`, every target update produces a control series even
    /// if the target pose is unchanged from the last one seen.
    pub use_all_targets: bool,
}

/// One planner update: the anchor-relative diff the ramp was built from,
/// plus the interpolated series itself.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannerUpdate {
    pub diff: Pose,
    pub series: Vec<Pose>,
}

/// The planner's output for one target update: `None` when the update is
/// a no-op (unchanged target and `use_all_targets` is off) or the session
/// is not yet armed.
pub type PlanOutput = Option<PlannerUpdate>;

/// Owns the planner state machine across its whole session lifetime.
pub enum ControlPlanner {
    Reset(Planner<Reset>),
    Armed(Planner<Armed>),
}

impl ControlPlanner {
    pub fn new() -> Self {
        ControlPlanner::Reset(Planner::new())
    }

    /// Feeds one robot feedback sample. Arms the session on the first
    /// valid sample seen while in `Reset`; ignored while already armed.
    pub fn on_robot_feedback(&mut self, robot_pose: Pose, last_target: Pose) {
        if matches!(self, ControlPlanner::Armed(_)) {
            return;
        }
        let ControlPlanner::Reset(planner) = std::mem::replace(self, ControlPlanner::Reset(Planner::new())) else {
            unreachable!("checked above");
        };
        *self = ControlPlanner::Armed(planner.arm(robot_pose, last_target));
    }

    /// Drops the session back to `Reset` (a reset pad press).
    pub fn reset(&mut self) {
        let current = std::mem::replace(self, ControlPlanner::Reset(Planner::new()));
        *self = match current {
            ControlPlanner::Reset(p) => ControlPlanner::Reset(p),
            ControlPlanner::Armed(p) => ControlPlanner::Reset(p.reset()),
        };
    }

    pub fn is_armed(&self) -> bool {
        matches!(self, ControlPlanner::Armed(_))
    }

    /// Processes a new target pose (already in robot-frame axis
    /// convention, rotational components wrapped to `[0, 360)`).
    ///
    /// Returns the control-pose series to stream to the robot, or `None`
    /// if there is nothing to do this update (session not armed, or the
    /// target did not move and `use_all_targets` is off).
    pub fn on_target(&mut self, target: Pose, config: &PlannerConfig) -> PlanOutput {
        let armed = match self {
            ControlPlanner::Armed(p) => p,
            ControlPlanner::Reset(_) => return None,
        };

        // The first update after arming always produces a series (there is
        // nothing yet to consider "no change from"); only later updates are
        // checked against the last target seen.
        if armed.primed() && !config.use_all_targets && target == armed.last_target() {
            return None;
        }

        // Target's movement since arming, mapped onto the robot's own
        // frame via the captured origins, then compared against the last
        // pose actually commanded to get the ramp's diff.
        let target_rel = (target - armed.base_target()).wrap360_rot();
        let control_abs = (armed.base_robot() + target_rel).wrap360_rot();
        let diff = (control_abs - armed.last_control()).wrap180_rot();

        let series = build_control_series(
            armed.last_control(),
            diff,
            config.nominal_interval,
            config.tick_period,
            config.limits,
        );

        let last_control = *series.last().unwrap_or(&armed.last_control());
        armed.advance(target, last_control);
        Some(PlannerUpdate { diff, series })
    }
}

impl Default for ControlPlanner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> PlannerConfig {
        PlannerConfig {
            nominal_interval: 0.05,
            tick_period: 0.008,
            limits: VelocityLimits { v_lim_pos: 200.0, v_lim_rot: 60.0 },
            use_all_targets: false,
        }
    }

    #[test]
    fn unarmed_planner_produces_nothing() {
        let mut planner = ControlPlanner::new();
        let out = planner.on_target(Pose::new(1.0, 0.0, 0.0, 0.0, 0.0, 0.0), &config());
        assert!(out.is_none());
    }

    #[test]
    fn arming_then_a_moved_target_produces_a_series() {
        let mut planner = ControlPlanner::new();
        planner.on_robot_feedback(Pose::ZERO, Pose::ZERO);
        assert!(planner.is_armed());

        let out = planner.on_target(Pose::new(5.0, 0.0, 0.0, 0.0, 0.0, 0.0), &config());
        assert!(out.is_some());
        assert!(!out.unwrap().series.is_empty());
    }

    #[test]
    fn unchanged_target_is_a_no_op_unless_use_all_targets() {
        let mut planner = ControlPlanner::new();
        planner.on_robot_feedback(Pose::ZERO, Pose::ZERO);
        // First update after arming always produces a (trivial, zero-diff)
        // series, matching the "stationary" scenario.
        assert!(planner.on_target(Pose::ZERO, &config()).is_some());
        // Repeating the same target is now a no-op.
        assert!(planner.on_target(Pose::ZERO, &config()).is_none());

        let mut cfg = config();
        cfg.use_all_targets = true;
        assert!(planner.on_target(Pose::ZERO, &cfg).is_some());
    }

    #[test]
    fn reset_drops_back_to_unarmed() {
        let mut planner = ControlPlanner::new();
        planner.on_robot_feedback(Pose::ZERO, Pose::ZERO);
        assert!(planner.is_armed());
        planner.reset();
        assert!(!planner.is_armed());
    }
}
