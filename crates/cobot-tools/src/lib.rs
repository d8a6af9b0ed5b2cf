//! # Cobot Tools - shared data structures and pure algorithms
//!
//! **Dependency rule**: only depends on `cobot-protocol`, never on
//! `cobot-client` or `cobot-driver`.
//!
//! ## Modules
//!
//! - `pose` - the `Pose`, `TargetMessage`, `PoseSeries` and `SharedFeedback`
//!   data model, angle wrapping, and the coordinate axis transform
//! - `velocity` - per-axis velocity limit configuration
//! - `recording` - JSON-Lines recording format and offline summary statistics
//! - `time` - wall-clock helpers shared by both feeder variants

// ⚠️ never import cobot-client from here
// use cobot_client::*;  // ❌ forbidden

pub mod pose;
pub mod recording;
pub mod time;
pub mod velocity;

pub use pose::{
    wrap180, wrap360, AxisMap, AxisMapError, FigureMode, Pad, Pose, PoseSeries, SharedFeedback, TargetMessage, Vec3,
};
pub use recording::{RecordEvent, Recorder, RecordingError, RecordingSummary};
pub use time::wall_now;
pub use velocity::VelocityLimits;
