//! Control Planner
//!
//! The "main" process half of the cobot teleoperation system
//! (`SPEC_FULL.md` §4.3): a two-state session (`Reset`/`Armed`) that
//! turns target pose updates into bounded-velocity control-pose series
//! via a Softplus ramp.
//!
//! Coordinate transform and the shared pose/target data model live in
//! `cobot-tools`; this crate owns only the session state machine and the
//! interpolator built on top of it.

pub mod interpolator;
pub mod planner;
pub mod state;

pub use interpolator::{build_control_series, VelocityLimits};
pub use planner::{ControlPlanner, PlanOutput, PlannerConfig, PlannerUpdate};
pub use state::{Armed, Planner, Reset};
