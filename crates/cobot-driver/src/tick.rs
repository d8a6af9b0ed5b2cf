//! The servo tick loop: drains the hand-off channel for a new pose
//! series, streams one pose per tick to the controller (holding the last
//! pose once a series is exhausted), and publishes feedback each tick
//! (`SPEC_FULL.md` §4.6.2, §9).
//!
//! This crate does not know how the hand-off channel or feedback
//! publication are actually carried (shared memory, in-process channel);
//! it only depends on the two trait seams below, which `cobot-control`
//! implements.

use cobot_link::RobotLink;
use cobot_protocol::error::classify;
use cobot_tools::{Pose, PoseSeries};
use tracing::{error, trace};

use crate::error::DriverError;
use crate::session::ServoSession;

/// Supplies the most recently produced pose series, if one has arrived
/// since the last poll. Non-blocking: a tick proceeds with the
/// previously-held series when nothing new has arrived.
pub trait ControlSource {
    fn try_take_series(&mut self) -> Option<PoseSeries>;
}

/// Publishes one feedback sample per tick.
pub trait FeedbackPublisher {
    fn publish(&mut self, pose: Pose, valid: bool);
}

/// Cursor over the currently-active pose series: advances one pose per
/// tick, holding the last pose once exhausted (`SPEC_FULL.md` §3's
/// "series exhausted" edge case).
struct SeriesCursor {
    series: PoseSeries,
    index: usize,
}

impl SeriesCursor {
    fn new(series: PoseSeries) -> Self {
        Self { series, index: 0 }
    }

    fn current(&self) -> Pose {
        let idx = self.index.min(self.series.len() - 1);
        *self.series.get(idx).expect("index clamped to series bounds")
    }

    fn advance(&mut self) {
        if self.index + 1 < self.series.len() {
            self.index += 1;
        }
    }
}

/// Runs the servo loop's per-tick body, reused by `apps/servo-driver`'s
/// real loop and by tests driving it directly without a thread.
pub struct TickRunner<L, C, F> {
    session: ServoSession<L>,
    source: C,
    feedback: F,
    cursor: Option<SeriesCursor>,
    default_fig: Option<i32>,
}

impl<L: RobotLink, C: ControlSource, F: FeedbackPublisher> TickRunner<L, C, F> {
    pub fn new(session: ServoSession<L>, source: C, feedback: F, default_fig: Option<i32>) -> Self {
        Self { session, source, feedback, cursor: None, default_fig }
    }

    /// Runs one tick: pick up a new series if one arrived, command the
    /// cursor's current pose, recover automatically on a recoverable
    /// fault, and publish feedback.
    pub fn tick(&mut self) -> Result<(), DriverError> {
        if let Some(series) = self.source.try_take_series() {
            self.cursor = Some(SeriesCursor::new(series));
        }

        let Some(cursor) = self.cursor.as_mut() else {
            // No active series yet: still read and publish the current pose,
            // so the planner's anchor poses can arm on `feedback.valid`.
            return match self.session.current_pose() {
                Ok(pose) => {
                    self.feedback.publish(Pose(pose), true);
                    Ok(())
                }
                Err(err) => {
                    self.feedback.publish(Pose([0.0; 6]), false);
                    Err(err)
                }
            };
        };

        let pose = cursor.current();
        match self.session.move_pose_servo(pose.0, self.default_fig) {
            Ok(()) => {
                cursor.advance();
                self.feedback.publish(pose, true);
                trace!(?pose, "tick commanded");
                Ok(())
            }
            Err(DriverError::Link(cobot_link::LinkError::Rejected(code))) => {
                let class = classify(code);
                if class.is_recoverable() {
                    match self.session.automatic_recovery(code) {
                        Ok(recovered) => {
                            self.feedback.publish(Pose(recovered), true);
                            Ok(())
                        }
                        Err(fatal) => {
                            error!(?fatal, "automatic recovery failed");
                            self.feedback.publish(pose, false);
                            Err(fatal)
                        }
                    }
                } else {
                    self.feedback.publish(pose, false);
                    Err(DriverError::Fault(code))
                }
            }
            Err(other) => {
                self.feedback.publish(pose, false);
                Err(other)
            }
        }
    }

    pub fn session_mut(&mut self) -> &mut ServoSession<L> {
        &mut self.session
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cobot_link::DummyLink;
    use cobot_protocol::SlaveSubMode;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct OnceSource {
        series: Option<PoseSeries>,
    }

    impl ControlSource for OnceSource {
        fn try_take_series(&mut self) -> Option<PoseSeries> {
            self.series.take()
        }
    }

    #[derive(Default, Clone)]
    struct RecordingFeedback {
        samples: Rc<RefCell<Vec<(Pose, bool)>>>,
    }

    impl FeedbackPublisher for RecordingFeedback {
        fn publish(&mut self, pose: Pose, valid: bool) {
            self.samples.borrow_mut().push((pose, valid));
        }
    }

    fn runner_with_series(series: Vec<Pose>) -> (TickRunner<DummyLink, OnceSource, RecordingFeedback>, RecordingFeedback) {
        let mut session = ServoSession::new(DummyLink::new());
        session.enter_servo_mode(SlaveSubMode::BufferedRetry).unwrap();
        let feedback = RecordingFeedback::default();
        let source = OnceSource { series: Some(PoseSeries::new(series).unwrap()) };
        (TickRunner::new(session, source, feedback.clone(), Some(-2)), feedback)
    }

    #[test]
    fn tick_commands_the_first_pose_then_holds_at_the_end() {
        let series = vec![Pose::new(1.0, 0.0, 0.0, 0.0, 0.0, 0.0), Pose::new(2.0, 0.0, 0.0, 0.0, 0.0, 0.0)];
        let (mut runner, feedback) = runner_with_series(series);

        runner.tick().unwrap();
        runner.tick().unwrap();
        runner.tick().unwrap(); // series exhausted, holds last pose

        let samples = feedback.samples.borrow();
        assert_eq!(samples.len(), 3);
        assert!(samples.iter().all(|(_, valid)| *valid));
        assert_eq!(samples[1].0.x(), 2.0);
        assert_eq!(samples[2].0.x(), 2.0);
    }

    #[test]
    fn tick_with_no_active_series_still_publishes_the_current_pose() {
        let mut session = ServoSession::new(DummyLink::new());
        session.enter_servo_mode(SlaveSubMode::BufferedRetry).unwrap();
        let expected = session.current_pose().unwrap();
        let feedback = RecordingFeedback::default();
        let source = OnceSource { series: None };
        let mut runner = TickRunner::new(session, source, feedback.clone(), None);
        runner.tick().unwrap();
        let samples = feedback.samples.borrow();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0], (Pose(expected), true));
    }

    #[test]
    fn idle_ticks_keep_publishing_without_ever_taking_a_series() {
        let mut session = ServoSession::new(DummyLink::new());
        session.enter_servo_mode(SlaveSubMode::ExternallyPaced).unwrap();
        let feedback = RecordingFeedback::default();
        let source = OnceSource { series: None };
        let mut runner = TickRunner::new(session, source, feedback.clone(), None);
        runner.tick().unwrap();
        runner.tick().unwrap();
        runner.tick().unwrap();
        assert_eq!(feedback.samples.borrow().len(), 3);
        assert!(feedback.samples.borrow().iter().all(|(_, valid)| *valid));
    }
}
