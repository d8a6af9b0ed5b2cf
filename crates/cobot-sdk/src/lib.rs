//! Unified facade over the cobot teleoperation workspace.
//!
//! Re-exports the pieces most callers reach for so a binary or an
//! integration test only needs one `use cobot_sdk::prelude::*;` instead
//! of naming every crate in the workspace.

pub use cobot_client::{
    build_control_series, Armed, ControlPlanner, PlanOutput, Planner, PlannerConfig, PlannerUpdate, Reset,
    VelocityLimits,
};
pub use cobot_control::{
    AngleUnit, ChannelError, CoordinateConfig, FeedbackReader, FeedbackWriter, Feeder, FeederError, FeederHandle,
    HandoffReader, HandoffWriter, MqttFeeder, ReplayFeeder, SessionRunner, ShmRegion, TargetEvent,
};
pub use cobot_driver::{ControlSource, DriverError, FeedbackPublisher, ServoSession, TickRunner};
pub use cobot_link::{DummyLink, LinkError, RobotLink, VendorReply};
pub use cobot_protocol::error::{classify, FaultClass, VendorErrorCode};
pub use cobot_protocol::{RecvFormat, SlaveSubMode, VendorCommand};
pub use cobot_tools::{
    wall_now, wrap180, wrap360, AxisMap, AxisMapError, FigureMode, Pad, Pose, PoseSeries, RecordEvent, Recorder,
    RecordingError, RecordingSummary, SharedFeedback, TargetMessage, Vec3,
};

pub mod prelude {
    pub use crate::*;
}

/// Installs the workspace's usual `tracing_subscriber` setup: an
/// `EnvFilter` read from `RUST_LOG`, defaulting to `info` when unset.
/// Shared by `apps/teleop` and `apps/servo-driver` so both binaries log
/// identically.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
