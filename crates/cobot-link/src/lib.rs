//! Vendor RPC transport abstraction.
//!
//! `RobotLink` is the single seam between typed vendor commands
//! (`cobot-protocol`) and whatever actually carries them to the
//! controller (SOAP/TCP for the real b-CAP wire protocol, an external
//! collaborator per `SPEC_FULL.md` §6 and not implemented here). Only a
//! deterministic in-memory backend is provided, for driving
//! `cobot-driver`'s session/recovery logic in tests without hardware.

use std::time::Duration;

use cobot_protocol::{RecvFormat, SlaveSubMode, VendorCommand, VendorErrorCode};
use thiserror::Error;

/// Transport-level failure talking to the controller.
#[derive(Error, Debug)]
pub enum LinkError {
    #[error("link timed out waiting for a reply")]
    Timeout,
    #[error("link is not connected")]
    NotConnected,
    #[error("controller rejected the command: {0}")]
    Rejected(VendorErrorCode),
    #[error("transport error: {0}")]
    Transport(String),
}

/// One RPC reply.
#[derive(Debug, Clone, PartialEq)]
pub enum VendorReply {
    /// Command accepted, no payload.
    Ack,
    /// Reply to `CurPos`.
    Pose([f64; 6]),
    /// Reply to `OutRange`: bitflags, one bit per axis outside its
    /// configured soft limit.
    OutRangeFlags(u32),
    /// Reply to `GetErrorDescription`.
    ErrorDescription(String),
}

/// Abstracts the vendor RPC transport: one blocking round-trip per call.
pub trait RobotLink {
    fn send(&mut self, command: VendorCommand) -> Result<VendorReply, LinkError>;

    fn set_call_timeout(&mut self, _timeout: Duration) {}

    fn send_timeout(&mut self, command: VendorCommand, timeout: Duration) -> Result<VendorReply, LinkError> {
        self.set_call_timeout(timeout);
        self.send(command)
    }
}

/// A deterministic in-memory `RobotLink`: tracks motor/slave-mode state
/// and the last commanded pose, with no real controller behind it.
/// Grounded on the teacher's mock-backend convention (a `mock` feature
/// with no hardware dependency, here promoted to the only backend this
/// crate ships).
#[derive(Debug, Default)]
pub struct DummyLink {
    motor_on: bool,
    slave_mode: Option<SlaveSubMode>,
    current_pose: [f64; 6],
    recv_format_set: bool,
    error_latched: bool,
    /// When set, the next `SlvMove` call fails with this error instead of
    /// succeeding, then clears. Lets tests drive the recovery path.
    pub inject_error: Option<VendorErrorCode>,
}

impl DummyLink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_pose(&self) -> [f64; 6] {
        self.current_pose
    }

    pub fn is_motor_on(&self) -> bool {
        self.motor_on
    }

    pub fn slave_mode(&self) -> Option<SlaveSubMode> {
        self.slave_mode
    }

    pub fn recv_format_set(&self) -> bool {
        self.recv_format_set
    }
}

impl RobotLink for DummyLink {
    fn send(&mut self, command: VendorCommand) -> Result<VendorReply, LinkError> {
        match command {
            VendorCommand::ManualReset => {
                self.error_latched = false;
                Ok(VendorReply::Ack)
            }
            VendorCommand::ClearError => {
                self.error_latched = false;
                Ok(VendorReply::Ack)
            }
            VendorCommand::Takearm | VendorCommand::Givearm => Ok(VendorReply::Ack),
            VendorCommand::ExtSpeed(_) => Ok(VendorReply::Ack),
            VendorCommand::Motor(on) => {
                self.motor_on = on;
                Ok(VendorReply::Ack)
            }
            VendorCommand::SlvChangeMode(mode) => {
                self.slave_mode = mode;
                Ok(VendorReply::Ack)
            }
            VendorCommand::SlvRecvFormat(RecvFormat::TimestampPosition) => {
                self.recv_format_set = true;
                Ok(VendorReply::Ack)
            }
            VendorCommand::SlvMove { pose, .. } => {
                if let Some(code) = self.inject_error.take() {
                    return Err(LinkError::Rejected(code));
                }
                if self.slave_mode.is_none() {
                    return Err(LinkError::Rejected(cobot_protocol::error::E_NOT_IN_SLAVE_MODE));
                }
                if !self.motor_on {
                    return Err(LinkError::Rejected(cobot_protocol::error::E_MOTOR_OFF));
                }
                self.current_pose = pose;
                Ok(VendorReply::Ack)
            }
            VendorCommand::CurPos => Ok(VendorReply::Pose(self.current_pose)),
            VendorCommand::OutRange => Ok(VendorReply::OutRangeFlags(0)),
            VendorCommand::GetErrorDescription(code) => {
                Ok(VendorReply::ErrorDescription(format!("simulated description for 0x{code:x}")))
            }
            VendorCommand::ServiceStart { .. } => Ok(VendorReply::Ack),
            VendorCommand::ServiceStop => {
                self.motor_on = false;
                self.slave_mode = None;
                Ok(VendorReply::Ack)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slv_move_is_rejected_outside_slave_mode() {
        let mut link = DummyLink::new();
        link.send(VendorCommand::Motor(true)).unwrap();
        let err = link.send(VendorCommand::SlvMove { pose: [0.0; 6], fig: None }).unwrap_err();
        assert!(matches!(err, LinkError::Rejected(code) if code == cobot_protocol::error::E_NOT_IN_SLAVE_MODE));
    }

    #[test]
    fn slv_move_is_rejected_with_motor_off() {
        let mut link = DummyLink::new();
        link.send(VendorCommand::SlvChangeMode(Some(SlaveSubMode::BufferedRetry))).unwrap();
        let err = link.send(VendorCommand::SlvMove { pose: [0.0; 6], fig: None }).unwrap_err();
        assert!(matches!(err, LinkError::Rejected(code) if code == cobot_protocol::error::E_MOTOR_OFF));
    }

    #[test]
    fn slv_move_updates_current_pose_once_armed() {
        let mut link = DummyLink::new();
        link.send(VendorCommand::Motor(true)).unwrap();
        link.send(VendorCommand::SlvChangeMode(Some(SlaveSubMode::BufferedRetry))).unwrap();
        link.send(VendorCommand::SlvMove { pose: [1.0, 2.0, 3.0, 4.0, 5.0, 6.0], fig: None }).unwrap();
        assert_eq!(link.current_pose(), [1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn injected_error_is_returned_once_then_clears() {
        let mut link = DummyLink::new();
        link.send(VendorCommand::Motor(true)).unwrap();
        link.send(VendorCommand::SlvChangeMode(Some(SlaveSubMode::BufferedRetry))).unwrap();
        link.inject_error = Some(cobot_protocol::error::E_BUF_FULL);
        assert!(link.send(VendorCommand::SlvMove { pose: [0.0; 6], fig: None }).is_err());
        assert!(link.send(VendorCommand::SlvMove { pose: [0.0; 6], fig: None }).is_ok());
    }

    #[test]
    fn service_stop_clears_motor_and_slave_mode() {
        let mut link = DummyLink::new();
        link.send(VendorCommand::Motor(true)).unwrap();
        link.send(VendorCommand::SlvChangeMode(Some(SlaveSubMode::BufferedRetry))).unwrap();
        link.send(VendorCommand::ServiceStop).unwrap();
        assert!(!link.is_motor_on());
        assert_eq!(link.slave_mode(), None);
    }
}
