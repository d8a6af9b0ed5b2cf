//! Cross-process plumbing between the "main" process (Target Feeder +
//! Control Planner) and the "servo" process (Servo Driver):
//! shared-memory channels, the target feeder, and the session wiring
//! that binds them together (`SPEC_FULL.md` §4, §9).

pub mod channel;
pub mod feedback;
pub mod feeder;
pub mod handoff;
pub mod session;
pub mod shm;

pub use channel::ChannelError;
pub use feedback::{FeedbackReader, FeedbackWriter, FEEDBACK_CHANNEL_NAME};
pub use feeder::{Feeder, FeederError, FeederHandle, MqttFeeder, ReplayFeeder, TargetEvent};
pub use handoff::{HandoffReader, HandoffWriter, HANDOFF_CHANNEL_NAME};
pub use session::{AngleUnit, CoordinateConfig, SessionRunner};
pub use shm::ShmRegion;
