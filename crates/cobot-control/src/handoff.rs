//! Cross-process pose-series hand-off channel (`SPEC_FULL.md` §4.5):
//! the "main" process publishes a new `PoseSeries` whenever the planner
//! produces one; the "servo" process picks up the latest one each tick,
//! discarding any it never got to.

use cobot_driver::ControlSource;
use cobot_tools::PoseSeries;

use crate::channel::{ChannelError, SeqlockChannel};

/// Generous enough for a several-hundred-sample ramp-plus-hold series at
/// 48 bytes/pose plus bincode's `Vec` length-prefix overhead.
const HANDOFF_CAPACITY_BYTES: usize = 64 * 1024;

pub const HANDOFF_CHANNEL_NAME: &str = "handoff";

/// Writer side, used by the "main" process's session wiring.
pub struct HandoffWriter {
    channel: SeqlockChannel<PoseSeries>,
}

impl HandoffWriter {
    pub fn open(name: &str) -> Result<Self, ChannelError> {
        Ok(Self { channel: SeqlockChannel::open(name, HANDOFF_CAPACITY_BYTES)? })
    }

    pub fn publish(&mut self, series: &PoseSeries) -> Result<(), ChannelError> {
        self.channel.write(series)
    }
}

/// Reader side: implements `cobot_driver::ControlSource` so the Servo
/// Driver's tick loop can poll it directly.
pub struct HandoffReader {
    channel: SeqlockChannel<PoseSeries>,
    last_seen: u64,
}

impl HandoffReader {
    pub fn open(name: &str) -> Result<Self, ChannelError> {
        Ok(Self { channel: SeqlockChannel::open(name, HANDOFF_CAPACITY_BYTES)?, last_seen: 0 })
    }
}

impl ControlSource for HandoffReader {
    fn try_take_series(&mut self) -> Option<PoseSeries> {
        match self.channel.read_if_changed(&mut self.last_seen) {
            Ok(series) => series,
            Err(err) => {
                tracing::error!(?err, "hand-off channel decode failure");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cobot_tools::Pose;

    #[test]
    fn reader_only_sees_a_series_once() {
        let name = format!("handoff_test_{}", std::process::id());
        let mut writer = HandoffWriter::open(&name).unwrap();
        let mut reader = HandoffReader::open(&name).unwrap();

        assert!(reader.try_take_series().is_none());

        let series = PoseSeries::new(vec![Pose::new(1.0, 0.0, 0.0, 0.0, 0.0, 0.0)]).unwrap();
        writer.publish(&series).unwrap();

        assert_eq!(reader.try_take_series(), Some(series));
        assert!(reader.try_take_series().is_none());
    }
}
