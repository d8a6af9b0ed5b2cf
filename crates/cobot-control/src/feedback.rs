//! Cross-process `SharedFeedback` channel: the Servo Driver publishes the
//! robot's pose and validity each tick; the "main" process's planner
//! reads it to detect the first valid sample (arming) and for fault
//! diagnostics (`SPEC_FULL.md` §3, §9).

use cobot_driver::FeedbackPublisher;
use cobot_tools::{Pose, SharedFeedback};

use crate::channel::{ChannelError, SeqlockChannel};

/// A `SharedFeedback` bincodes to well under this.
const FEEDBACK_CAPACITY_BYTES: usize = 128;

pub const FEEDBACK_CHANNEL_NAME: &str = "feedback";

/// Writer side, implements `cobot_driver::FeedbackPublisher` so the
/// Servo Driver's tick loop can publish directly.
pub struct FeedbackWriter {
    channel: SeqlockChannel<SharedFeedback>,
}

impl FeedbackWriter {
    pub fn open(name: &str) -> Result<Self, ChannelError> {
        Ok(Self { channel: SeqlockChannel::open(name, FEEDBACK_CAPACITY_BYTES)? })
    }
}

impl FeedbackPublisher for FeedbackWriter {
    fn publish(&mut self, pose: Pose, valid: bool) {
        let feedback = SharedFeedback { last_robot_pose: pose, valid };
        if let Err(err) = self.channel.write(&feedback) {
            tracing::error!(?err, "feedback channel publish failure");
        }
    }
}

/// Reader side, used by the "main" process.
pub struct FeedbackReader {
    channel: SeqlockChannel<SharedFeedback>,
}

impl FeedbackReader {
    pub fn open(name: &str) -> Result<Self, ChannelError> {
        Ok(Self { channel: SeqlockChannel::open(name, FEEDBACK_CAPACITY_BYTES)? })
    }

    /// The latest feedback sample, or `SharedFeedback::invalid()` if the
    /// Servo Driver has never published one yet.
    pub fn read(&self) -> SharedFeedback {
        match self.channel.read() {
            Ok(Some(feedback)) => feedback,
            Ok(None) => SharedFeedback::invalid(),
            Err(err) => {
                tracing::error!(?err, "feedback channel read failure");
                SharedFeedback::invalid()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_sees_the_latest_published_sample() {
        let name = format!("feedback_test_{}", std::process::id());
        let mut writer = FeedbackWriter::open(&name).unwrap();
        let reader = FeedbackReader::open(&name).unwrap();

        assert!(!reader.read().valid);

        writer.publish(Pose::new(1.0, 2.0, 3.0, 0.0, 0.0, 0.0), true);
        let feedback = reader.read();
        assert!(feedback.valid);
        assert_eq!(feedback.last_robot_pose.x(), 1.0);
    }
}
