//! Servo Driver error type.

use cobot_link::LinkError;
use cobot_protocol::VendorErrorCode;
use thiserror::Error;

/// Servo Driver error type (`SPEC_FULL.md` §7, §10.2).
#[derive(Error, Debug)]
pub enum DriverError {
    /// Transport-level failure talking to the controller.
    #[error("link error: {0}")]
    Link(#[from] LinkError),

    /// A vendor error code the automatic-recovery procedure could not
    /// clear, or that is not recoverable by policy.
    #[error("unrecovered vendor fault: {0}")]
    Fault(VendorErrorCode),

    /// The session is not in slave mode when a pose move was attempted.
    #[error("not in slave mode")]
    NotInServoMode,

    /// The controller handle was torn down; the teardown-only HRESULT
    /// was swallowed rather than surfaced.
    #[error("controller disconnected during teardown")]
    TeardownDisconnect,

    /// The link replied with a different payload than the command expects.
    #[error("link returned an unexpected reply")]
    UnexpectedReply,

    /// A blocking absolute move did not converge within its timeout.
    #[error("timed out waiting to reach the commanded pose")]
    MoveTimeout,
}
