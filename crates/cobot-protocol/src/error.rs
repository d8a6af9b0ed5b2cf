//! Vendor error code representation and fault classification
//! (`SPEC_FULL.md` §4.6, §7).

/// A raw vendor error code, represented the way the controller reports it:
/// an ORiN-style HRESULT. Negative HRESULTs are converted to the
/// documented positive form via `E + hr` with baseline `E = 0x1_0000_0000`,
/// matching the controller's own error-code listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VendorErrorCode(pub i64);

const BASELINE: i64 = 0x1_0000_0000;

impl VendorErrorCode {
    /// Builds a `VendorErrorCode` from a raw HRESULT as returned by the
    /// vendor RPC layer.
    pub fn from_hresult(hr: i64) -> Self {
        if hr < 0 { Self(BASELINE + hr) } else { Self(hr) }
    }

    /// The documented positive form, e.g. `0x84204051`.
    pub fn documented_code(self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for VendorErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

pub const E_BUF_FULL: VendorErrorCode = VendorErrorCode(0x8320_1483);
pub const E_ORDER_DELAY: VendorErrorCode = VendorErrorCode(0x8420_1482);
pub const E_MOTOR_ON_WHILE_OFF_TRANSITION: VendorErrorCode = VendorErrorCode(0x8350_106e);
pub const E_NOT_IN_SLAVE_MODE: VendorErrorCode = VendorErrorCode(0x8350_0121);
pub const E_MOTOR_OFF: VendorErrorCode = VendorErrorCode(0x8150_1003);

/// Per-joint command-acceleration-too-high codes, joints 1-8.
pub const E_ACCEL_LARGE_JOINTS: [VendorErrorCode; 8] = [
    VendorErrorCode(0x8420_4041),
    VendorErrorCode(0x8420_4042),
    VendorErrorCode(0x8420_4043),
    VendorErrorCode(0x8420_4044),
    VendorErrorCode(0x8420_4045),
    VendorErrorCode(0x8420_4046),
    VendorErrorCode(0x8420_4047),
    VendorErrorCode(0x8420_4048),
];

/// Per-joint command-velocity-too-high codes, joints 1-8.
pub const E_VEL_LARGE_JOINTS: [VendorErrorCode; 8] = [
    VendorErrorCode(0x8420_4051),
    VendorErrorCode(0x8420_4052),
    VendorErrorCode(0x8420_4053),
    VendorErrorCode(0x8420_4054),
    VendorErrorCode(0x8420_4055),
    VendorErrorCode(0x8420_4056),
    VendorErrorCode(0x8420_4057),
    VendorErrorCode(0x8420_4058),
];

/// Raw HRESULT that the controller may report from `Motor(0)`/teardown
/// paths and that is not in its public error manual; swallowed only during
/// teardown.
pub const E_TEARDOWN_DISCONNECT_HRESULT: i64 = -2147023170;

/// The recovery-policy bucket a vendor error code falls into
/// (`SPEC_FULL.md` §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultClass {
    /// Per-joint accel/velocity-too-high, command-generation delay:
    /// attempt automatic recovery.
    TransientOverload,
    /// The controller dropped out of slave mode: attempt automatic
    /// recovery.
    SlaveDroppedOut,
    /// The motor dropped out: attempt automatic recovery.
    MotorDroppedOut,
    /// Command buffer saturated in sub-mode `0x001`: retry the same call.
    BufferFull,
    /// Kinematic or configuration fault (out-of-range, singularity,
    /// soft-limit): fatal, stop the session.
    Fatal,
    /// The controller handle disappeared; logged and swallowed only during
    /// teardown.
    Disconnect,
    /// Not recognised by this taxonomy; treated as fatal.
    Unclassified,
}

impl FaultClass {
    /// Whether the servo driver's automatic-recovery procedure applies.
    pub fn is_recoverable(self) -> bool {
        matches!(self, FaultClass::TransientOverload | FaultClass::SlaveDroppedOut | FaultClass::MotorDroppedOut)
    }
}

/// Classifies a raw vendor error code into its recovery-policy bucket.
pub fn classify(code: VendorErrorCode) -> FaultClass {
    if code == E_BUF_FULL {
        return FaultClass::BufferFull;
    }
    if code == E_NOT_IN_SLAVE_MODE {
        return FaultClass::SlaveDroppedOut;
    }
    if code == E_MOTOR_OFF || code == E_MOTOR_ON_WHILE_OFF_TRANSITION {
        return FaultClass::MotorDroppedOut;
    }
    if code == E_ORDER_DELAY || E_ACCEL_LARGE_JOINTS.contains(&code) || E_VEL_LARGE_JOINTS.contains(&code) {
        return FaultClass::TransientOverload;
    }
    FaultClass::Unclassified
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_hresult_converts_via_baseline() {
        let code = VendorErrorCode::from_hresult(-2078261167);
        assert_eq!(code.documented_code(), 0x8420_4051);
        assert_eq!(code, E_VEL_LARGE_JOINTS[0]);
    }

    #[test]
    fn positive_hresult_passes_through() {
        let code = VendorErrorCode::from_hresult(0x8320_1483);
        assert_eq!(code, E_BUF_FULL);
    }

    #[test]
    fn classifies_known_recoverable_codes() {
        assert_eq!(classify(E_BUF_FULL), FaultClass::BufferFull);
        assert_eq!(classify(E_NOT_IN_SLAVE_MODE), FaultClass::SlaveDroppedOut);
        assert_eq!(classify(E_MOTOR_OFF), FaultClass::MotorDroppedOut);
        assert_eq!(classify(E_VEL_LARGE_JOINTS[3]), FaultClass::TransientOverload);
        assert_eq!(classify(E_ACCEL_LARGE_JOINTS[7]), FaultClass::TransientOverload);
        assert_eq!(classify(E_ORDER_DELAY), FaultClass::TransientOverload);
    }

    #[test]
    fn recoverable_classes_agree_with_is_recoverable() {
        assert!(FaultClass::TransientOverload.is_recoverable());
        assert!(FaultClass::SlaveDroppedOut.is_recoverable());
        assert!(FaultClass::MotorDroppedOut.is_recoverable());
        assert!(!FaultClass::BufferFull.is_recoverable());
        assert!(!FaultClass::Fatal.is_recoverable());
        assert!(!FaultClass::Disconnect.is_recoverable());
    }

    #[test]
    fn unknown_code_is_unclassified() {
        assert_eq!(classify(VendorErrorCode(0xdead_beef)), FaultClass::Unclassified);
    }

    #[test]
    fn display_formats_as_hex() {
        assert_eq!(format!("{}", E_BUF_FULL), "0x83201483");
    }
}
