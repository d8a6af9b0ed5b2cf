//! Servo Driver
//!
//! The "servo" process half of the cobot teleoperation system
//! (`SPEC_FULL.md` §4.6): owns the controller session, dispatches one
//! slave-mode pose per tick, and runs the automatic fault-recovery
//! procedure for transient faults. No hardware or shared-memory
//! dependency of its own — `cobot-link` abstracts the vendor RPC
//! transport, and the hand-off channel/feedback IPC are supplied by
//! `cobot-control` through the `ControlSource`/`FeedbackPublisher` seams
//! in `tick`.

pub mod error;
pub mod session;
pub mod tick;

pub use error::DriverError;
pub use session::{ServoSession, TEARDOWN_DISCONNECT_HRESULT};
pub use tick::{ControlSource, FeedbackPublisher, TickRunner};
