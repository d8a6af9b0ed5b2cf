//! Typed vendor RPC commands.
//!
//! Carries exactly the command surface named in `SPEC_FULL.md` §6. Poses
//! are passed as plain `[f64; 6]` (plus an optional trailing figure code) so
//! that this crate has no dependency on the pose/data-model crate above it.

/// Slave-mode output format requested via `slvRecvFormat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RecvFormat {
    /// Timestamp + position, the only format this system uses.
    TimestampPosition,
}

/// A single typed vendor RPC command.
#[derive(Debug, Clone, PartialEq)]
pub enum VendorCommand {
    /// Clears the safety-stop (STO) condition.
    ManualReset,
    /// Clears the controller's latched error state.
    ClearError,
    /// Acquires exclusive control of the arm.
    Takearm,
    /// Releases exclusive control of the arm.
    Givearm,
    /// Sets the external speed override, as a percentage of rated speed.
    ExtSpeed(u8),
    /// Powers the motor on (`true`) or off (`false`).
    Motor(bool),
    /// Enters or leaves slave mode. `None` leaves slave mode (`0x000`).
    SlvChangeMode(Option<crate::mode::SlaveSubMode>),
    /// Sets the slave-mode output format.
    SlvRecvFormat(RecvFormat),
    /// Commands one absolute pose for the current tick, with an optional
    /// trailing figure code.
    SlvMove { pose: [f64; 6], fig: Option<i32> },
    /// Requests the controller's current pose.
    CurPos,
    /// Requests the controller's operating-range flags.
    OutRange,
    /// Requests a human-readable description for an error code.
    GetErrorDescription(i64),
    /// Session-level `service_start`, with the watchdog window in
    /// milliseconds (`,WDT=400` in the vendor wire syntax).
    ServiceStart { watchdog_ms: u32 },
    /// Session-level `service_stop`.
    ServiceStop,
}
