//! Slave (servo) sub-mode semantics.

/// The slave sub-mode the controller is entered into before the tick loop
/// starts streaming poses (`SPEC_FULL.md` §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SlaveSubMode {
    /// `0x001`. `slvMove` may reject with `BufferFull` when the command
    /// buffer is saturated; the caller retries the same call until it is
    /// accepted.
    BufferedRetry,
    /// `0x101`. Per-call cadence is paced by the host rather than the
    /// controller; the driver sleeps for the nominal tick period between
    /// calls (the only pacing source available, see `SPEC_FULL.md` §11).
    ExternallyPaced,
    /// `0x201`. One call per tick, no retry; the controller paces
    /// internally.
    ControllerPaced,
}

impl SlaveSubMode {
    pub fn as_u32(self) -> u32 {
        match self {
            SlaveSubMode::BufferedRetry => 0x001,
            SlaveSubMode::ExternallyPaced => 0x101,
            SlaveSubMode::ControllerPaced => 0x201,
        }
    }

    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0x001 => Some(SlaveSubMode::BufferedRetry),
            0x101 => Some(SlaveSubMode::ExternallyPaced),
            0x201 => Some(SlaveSubMode::ControllerPaced),
            _ => None,
        }
    }

    /// Whether a `BufferFull` rejection from `slvMove` should be retried
    /// with the same pose rather than surfaced as a fault.
    pub fn retries_on_buffer_full(self) -> bool {
        matches!(self, SlaveSubMode::BufferedRetry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_raw_values() {
        for mode in [SlaveSubMode::BufferedRetry, SlaveSubMode::ExternallyPaced, SlaveSubMode::ControllerPaced] {
            assert_eq!(SlaveSubMode::from_u32(mode.as_u32()), Some(mode));
        }
    }

    #[test]
    fn rejects_unknown_raw_value() {
        assert_eq!(SlaveSubMode::from_u32(0x002), None);
    }

    #[test]
    fn only_mode_0_retries_buffer_full() {
        assert!(SlaveSubMode::BufferedRetry.retries_on_buffer_full());
        assert!(!SlaveSubMode::ExternallyPaced.retries_on_buffer_full());
        assert!(!SlaveSubMode::ControllerPaced.retries_on_buffer_full());
    }
}
