//! Servo session lifecycle, slave-mode move dispatch, and automatic fault
//! recovery (`SPEC_FULL.md` §4.6).
//!
//! The exact recovery sequence — clear safety-stop, clear error, bounded
//! motor-on retries, re-enter slave mode, a short quiesce sleep — is
//! taken from `examples/original_source/denso_robot.py`'s
//! `try_restart`/`_move_pose_servo_mode_1`/`enter_servo_mode_by_mode`.

use std::time::Duration;

use cobot_link::{LinkError, RobotLink, VendorReply};
use cobot_protocol::error::{classify, FaultClass};
use cobot_protocol::{RecvFormat, SlaveSubMode, VendorCommand, VendorErrorCode};
use tracing::{info, warn};

use crate::error::DriverError;

const MOTOR_ON_MAX_TRIALS: u32 = 3;
const RETRY_BACKOFF: Duration = Duration::from_millis(1);

/// The session-open watchdog window (`SPEC_FULL.md` §5/§6): the
/// controller-side `service_start` that governs the slave loop.
const SESSION_WATCHDOG_MS: u32 = 400;

/// External speed override applied on session open, as a percentage of
/// rated speed.
const SESSION_EXT_SPEED_PCT: u8 = 20;

/// Fixed pose the session homes to before entering slave mode.
pub const DEFAULT_POSE: [f64; 6] = [560.0, 150.0, 460.0, 180.0, 0.0, 90.0];

/// Per-axis convergence tolerance for the blocking move to `DEFAULT_POSE`.
const DEFAULT_POSE_TOLERANCE: f64 = 1.0;

/// How long the blocking move to `DEFAULT_POSE` waits before giving up.
const DEFAULT_POSE_TIMEOUT: Duration = Duration::from_secs(60);

const MOVE_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Teardown-only HRESULT the controller reports when its handle is
/// released; not in the public error manual, swallowed only here.
pub const TEARDOWN_DISCONNECT_HRESULT: i64 = -2147023170;

fn link_fault(err: &LinkError) -> Option<VendorErrorCode> {
    match err {
        LinkError::Rejected(code) => Some(*code),
        _ => None,
    }
}

/// Owns one controller session over a `RobotLink`, dispatching slave-mode
/// moves per the active sub-mode's retry policy and running the
/// automatic-recovery procedure on a recoverable fault.
pub struct ServoSession<L> {
    link: L,
    sub_mode: Option<SlaveSubMode>,
    motor_on: bool,
    recovery_quiesce: Duration,
}

impl<L: RobotLink> ServoSession<L> {
    pub fn new(link: L) -> Self {
        Self { link, sub_mode: None, motor_on: false, recovery_quiesce: Duration::from_secs(1) }
    }

    /// Overrides the recovery procedure's post-re-arm quiesce sleep;
    /// defaults to one second as in the original implementation. Tests
    /// use a shorter value to stay fast.
    pub fn set_recovery_quiesce(&mut self, duration: Duration) {
        self.recovery_quiesce = duration;
    }

    pub fn sub_mode(&self) -> Option<SlaveSubMode> {
        self.sub_mode
    }

    /// Starts the controller-side watchdog service that governs the slave
    /// loop (§9 `Robot::start`).
    pub fn start(&mut self) -> Result<(), DriverError> {
        self.link.send(VendorCommand::ServiceStart { watchdog_ms: SESSION_WATCHDOG_MS })?;
        Ok(())
    }

    /// Powers the motor on (§9 `Robot::enable`).
    pub fn enable(&mut self) -> Result<(), DriverError> {
        self.link.send(VendorCommand::Motor(true))?;
        self.motor_on = true;
        Ok(())
    }

    /// The fixed pose the session homes to before entering slave mode
    /// (§9 `Robot::default_pose_accessor`).
    pub fn default_pose_accessor(&self) -> [f64; 6] {
        DEFAULT_POSE
    }

    /// Queries the controller's current pose via `CurPos`, outside of the
    /// fault-recovery path.
    pub fn current_pose(&mut self) -> Result<[f64; 6], DriverError> {
        match self.link.send(VendorCommand::CurPos)? {
            VendorReply::Pose(pose) => Ok(pose),
            _ => Err(DriverError::UnexpectedReply),
        }
    }

    /// Which axes are currently outside their configured soft limits.
    pub fn out_of_range_flags(&mut self) -> Result<u32, DriverError> {
        match self.link.send(VendorCommand::OutRange)? {
            VendorReply::OutRangeFlags(flags) => Ok(flags),
            _ => Err(DriverError::UnexpectedReply),
        }
    }

    /// A human-readable description for a latched vendor error code, used
    /// for diagnostic logging when recovery fails.
    fn describe_fault(&mut self, fault: VendorErrorCode) -> String {
        match self.link.send(VendorCommand::GetErrorDescription(fault.documented_code())) {
            Ok(VendorReply::ErrorDescription(description)) => description,
            _ => format!("{fault}"),
        }
    }

    /// Commands an absolute move and blocks, polling `CurPos`, until every
    /// axis is within `tolerance` of `target` or `timeout` elapses
    /// (§9 `Robot::move_absolute_blocking`).
    pub fn move_absolute_blocking(
        &mut self,
        target: [f64; 6],
        tolerance: f64,
        timeout: Duration,
    ) -> Result<(), DriverError> {
        self.link.send(VendorCommand::SlvMove { pose: target, fig: None })?;
        let start = std::time::Instant::now();
        loop {
            let pose = self.current_pose()?;
            if pose.iter().zip(target.iter()).all(|(have, want)| (have - want).abs() <= tolerance) {
                return Ok(());
            }
            if start.elapsed() >= timeout {
                return Err(DriverError::MoveTimeout);
            }
            std::thread::sleep(MOVE_POLL_INTERVAL);
        }
    }

    /// Runs the full session-open sequence: starts the watchdog, clears the
    /// safety-stop and latched errors, takes exclusive control of the arm,
    /// sets the external speed override, powers the motor on, homes to
    /// `DEFAULT_POSE`, enters the given slave sub-mode, and sets the slave
    /// output format.
    ///
    /// `SlvMove` requires slave mode already be entered, so the home move
    /// runs after `SlvChangeMode` rather than strictly before it.
    pub fn enter_servo_mode(&mut self, sub_mode: SlaveSubMode) -> Result<(), DriverError> {
        self.start()?;
        self.link.send(VendorCommand::ManualReset)?;
        self.link.send(VendorCommand::ClearError)?;
        self.link.send(VendorCommand::Takearm)?;
        self.link.send(VendorCommand::ExtSpeed(SESSION_EXT_SPEED_PCT))?;
        self.enable()?;
        self.link.send(VendorCommand::SlvChangeMode(Some(sub_mode)))?;
        self.sub_mode = Some(sub_mode);
        self.move_absolute_blocking(DEFAULT_POSE, DEFAULT_POSE_TOLERANCE, DEFAULT_POSE_TIMEOUT)?;
        self.link.send(VendorCommand::SlvRecvFormat(RecvFormat::TimestampPosition))?;
        info!(?sub_mode, "entered slave mode");
        Ok(())
    }

    /// Leaves slave mode, powers the motor off, and releases exclusive
    /// control of the arm.
    pub fn leave_servo_mode(&mut self) -> Result<(), DriverError> {
        self.link.send(VendorCommand::SlvChangeMode(None))?;
        self.sub_mode = None;
        self.link.send(VendorCommand::Motor(false))?;
        self.motor_on = false;
        self.link.send(VendorCommand::Givearm)?;
        Ok(())
    }

    /// Commands one pose for the current tick, applying the active
    /// sub-mode's retry policy on a rejection.
    pub fn move_pose_servo(&mut self, pose: [f64; 6], fig: Option<i32>) -> Result<(), DriverError> {
        let sub_mode = self.sub_mode.ok_or(DriverError::NotInServoMode)?;
        match sub_mode {
            SlaveSubMode::BufferedRetry => self.move_pose_buffered_retry(pose, fig),
            SlaveSubMode::ExternallyPaced => self.move_pose_externally_paced(pose, fig),
            SlaveSubMode::ControllerPaced => self.move_pose_once(pose, fig),
        }
    }

    fn move_pose_once(&mut self, pose: [f64; 6], fig: Option<i32>) -> Result<(), DriverError> {
        self.link.send(VendorCommand::SlvMove { pose, fig }).map(|_| ()).map_err(DriverError::from)
    }

    /// `slvMove` retries the same call forever while the buffer is
    /// saturated (`E_BUF_FULL`), the sub-mode's own flow-control signal.
    fn move_pose_buffered_retry(&mut self, pose: [f64; 6], fig: Option<i32>) -> Result<(), DriverError> {
        loop {
            match self.link.send(VendorCommand::SlvMove { pose, fig }) {
                Ok(_) => return Ok(()),
                Err(err) => {
                    if link_fault(&err) == Some(cobot_protocol::error::E_BUF_FULL) {
                        continue;
                    }
                    return Err(err.into());
                }
            }
        }
    }

    /// A bounded motor-on retry loop absorbs the brief window where the
    /// motor reports itself still transitioning off; a second bounded
    /// retry re-enters slave mode if the motor dropped out entirely.
    fn move_pose_externally_paced(&mut self, pose: [f64; 6], fig: Option<i32>) -> Result<(), DriverError> {
        for _ in 0..MOTOR_ON_MAX_TRIALS {
            match self.link.send(VendorCommand::SlvMove { pose, fig }) {
                Ok(_) => return Ok(()),
                Err(err) => match link_fault(&err) {
                    Some(code) if code == cobot_protocol::error::E_MOTOR_ON_WHILE_OFF_TRANSITION => {
                        self.link.send(VendorCommand::ClearError)?;
                        std::thread::sleep(RETRY_BACKOFF);
                        continue;
                    }
                    Some(code) if code == cobot_protocol::error::E_MOTOR_OFF => {
                        self.link.send(VendorCommand::ClearError)?;
                        std::thread::sleep(RETRY_BACKOFF);
                        self.link.send(VendorCommand::SlvChangeMode(Some(SlaveSubMode::ExternallyPaced)))?;
                        continue;
                    }
                    _ => return Err(err.into()),
                },
            }
        }
        Err(DriverError::Fault(cobot_protocol::error::E_MOTOR_OFF))
    }

    /// Attempts the automatic-recovery procedure for one fault. Returns
    /// the robot's pose after recovery (queried via `CurPos`) on success.
    pub fn automatic_recovery(&mut self, fault: VendorErrorCode) -> Result<[f64; 6], DriverError> {
        let class = classify(fault);
        if !class.is_recoverable() {
            let description = self.describe_fault(fault);
            warn!(?fault, ?class, %description, "fault is not recoverable by policy");
            return Err(DriverError::Fault(fault));
        }
        warn!(?fault, ?class, "attempting automatic recovery");

        self.link.send(VendorCommand::ManualReset)?;
        self.link.send(VendorCommand::ClearError)?;

        for attempt in 0..MOTOR_ON_MAX_TRIALS {
            match self.link.send(VendorCommand::Motor(true)) {
                Ok(_) => {
                    self.motor_on = true;
                    break;
                }
                Err(_) if attempt + 1 < MOTOR_ON_MAX_TRIALS => {
                    self.link.send(VendorCommand::ClearError)?;
                    std::thread::sleep(RETRY_BACKOFF);
                }
                Err(err) => return Err(err.into()),
            }
        }

        let sub_mode = self.sub_mode.unwrap_or(SlaveSubMode::ExternallyPaced);
        self.link.send(VendorCommand::SlvChangeMode(Some(sub_mode)))?;
        self.sub_mode = Some(sub_mode);

        spin_sleep::sleep(self.recovery_quiesce);

        match self.link.send(VendorCommand::CurPos)? {
            VendorReply::Pose(pose) => Ok(pose),
            _ => Err(DriverError::Fault(fault)),
        }
    }

    /// Powers the motor off, swallowing the teardown-only disconnect
    /// HRESULT rather than surfacing it as a fault.
    pub fn disable(&mut self) -> Result<(), DriverError> {
        match self.link.send(VendorCommand::Motor(false)) {
            Ok(_) => {}
            Err(LinkError::Rejected(code)) if code == VendorErrorCode::from_hresult(TEARDOWN_DISCONNECT_HRESULT) => {
                info!("ignoring teardown disconnect HRESULT");
            }
            Err(err) => return Err(err.into()),
        }
        self.motor_on = false;
        Ok(())
    }

    /// Tears down the session: leaves slave mode, disables the motor,
    /// stops the controller service.
    pub fn stop(&mut self) -> Result<(), DriverError> {
        if self.sub_mode.is_some() {
            let _ = self.link.send(VendorCommand::SlvChangeMode(None));
            self.sub_mode = None;
        }
        self.disable()?;
        let _ = self.link.send(VendorCommand::Givearm);
        self.link.send(VendorCommand::ServiceStop)?;
        Ok(())
    }

    /// The nominal tick period this sub-mode expects the driver to pace
    /// itself at; `0` means the controller paces on its own.
    pub fn suggested_tick_period(&self) -> Duration {
        match self.sub_mode {
            Some(SlaveSubMode::BufferedRetry) | Some(SlaveSubMode::ExternallyPaced) => Duration::from_millis(8),
            Some(SlaveSubMode::ControllerPaced) | None => Duration::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cobot_link::DummyLink;

    fn session() -> ServoSession<DummyLink> {
        let mut s = ServoSession::new(DummyLink::new());
        s.set_recovery_quiesce(Duration::from_millis(1));
        s
    }

    #[test]
    fn entering_servo_mode_arms_the_motor() {
        let mut session = session();
        session.enter_servo_mode(SlaveSubMode::BufferedRetry).unwrap();
        assert_eq!(session.sub_mode(), Some(SlaveSubMode::BufferedRetry));
    }

    #[test]
    fn move_without_servo_mode_is_rejected() {
        let mut session = session();
        let err = session.move_pose_servo([0.0; 6], None).unwrap_err();
        assert!(matches!(err, DriverError::NotInServoMode));
    }

    #[test]
    fn move_succeeds_once_armed() {
        let mut session = session();
        session.enter_servo_mode(SlaveSubMode::BufferedRetry).unwrap();
        session.move_pose_servo([1.0, 2.0, 3.0, 4.0, 5.0, 6.0], None).unwrap();
    }

    #[test]
    fn suggested_tick_period_is_zero_for_controller_paced() {
        let mut session = session();
        session.enter_servo_mode(SlaveSubMode::ControllerPaced).unwrap();
        assert_eq!(session.suggested_tick_period(), Duration::ZERO);
    }

    #[test]
    fn automatic_recovery_refuses_unrecoverable_faults() {
        let mut session = session();
        session.enter_servo_mode(SlaveSubMode::ExternallyPaced).unwrap();
        let err = session.automatic_recovery(cobot_protocol::error::E_BUF_FULL).unwrap_err();
        assert!(matches!(err, DriverError::Fault(_)));
    }

    #[test]
    fn automatic_recovery_re_arms_on_a_recoverable_fault() {
        let mut session = session();
        session.enter_servo_mode(SlaveSubMode::ExternallyPaced).unwrap();
        let pose = session.automatic_recovery(cobot_protocol::error::E_NOT_IN_SLAVE_MODE).unwrap();
        assert_eq!(pose, DEFAULT_POSE);
        assert_eq!(session.sub_mode(), Some(SlaveSubMode::ExternallyPaced));
    }

    #[test]
    fn entering_servo_mode_homes_to_the_default_pose() {
        let mut session = session();
        session.enter_servo_mode(SlaveSubMode::ExternallyPaced).unwrap();
        assert_eq!(session.current_pose().unwrap(), DEFAULT_POSE);
    }

    #[test]
    fn default_pose_accessor_matches_the_session_open_target() {
        let session = session();
        assert_eq!(session.default_pose_accessor(), DEFAULT_POSE);
    }

    #[test]
    fn out_of_range_flags_are_clear_on_a_dummy_link() {
        let mut session = session();
        session.enter_servo_mode(SlaveSubMode::ExternallyPaced).unwrap();
        assert_eq!(session.out_of_range_flags().unwrap(), 0);
    }

    #[test]
    fn stop_tears_down_slave_mode_and_motor() {
        let mut session = session();
        session.enter_servo_mode(SlaveSubMode::BufferedRetry).unwrap();
        session.stop().unwrap();
        assert_eq!(session.sub_mode(), None);
    }
}
