//! Session wiring: binds a [`crate::feeder::Feeder`]'s target events
//! through the Control Planner to the hand-off channel, and drains the
//! feedback channel to arm the planner on first contact
//! (`SPEC_FULL.md` §4, the "main" process's run loop).

use std::path::Path;
use std::time::Duration;

use cobot_client::{ControlPlanner, PlannerConfig};
use cobot_tools::{AxisMap, Pose, RecordEvent, Recorder, RecordingError};
use crossbeam_channel::Receiver;
use tracing::{info, warn};

use crate::feedback::FeedbackReader;
use crate::feeder::TargetEvent;
use crate::handoff::HandoffWriter;

/// The angular unit a feeder's raw targets arrive in. Converted to degrees
/// (this system's internal convention, `SPEC_FULL.md` §3) during
/// normalisation, before the axis map is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AngleUnit {
    Radians,
    Degrees,
}

impl Default for AngleUnit {
    fn default() -> Self {
        AngleUnit::Radians
    }
}

/// How target poses are normalised into the robot's frame before reaching
/// the planner: axis permutation, position scaling, and angular unit
/// conversion (`SPEC_FULL.md` §4.3 step 1, §6, §10.3).
pub struct CoordinateConfig {
    pub axis_map: AxisMap,
    /// Position scale factor applied before the axis map (`scale_mqtt_vs_real`).
    pub scale_pos: f64,
    pub angle_unit: AngleUnit,
}

impl CoordinateConfig {
    fn normalize(&self, raw: Pose) -> Pose {
        let unit_converted = match self.angle_unit {
            AngleUnit::Degrees => raw,
            AngleUnit::Radians => {
                Pose::new(raw.x(), raw.y(), raw.z(), raw.rx().to_degrees(), raw.ry().to_degrees(), raw.rz().to_degrees())
            }
        };
        let scaled = Pose::new(
            unit_converted.x() * self.scale_pos,
            unit_converted.y() * self.scale_pos,
            unit_converted.z() * self.scale_pos,
            unit_converted.rx(),
            unit_converted.ry(),
            unit_converted.rz(),
        );
        self.axis_map.apply(scaled).wrap360_rot()
    }
}

impl Default for CoordinateConfig {
    fn default() -> Self {
        Self { axis_map: AxisMap::default_live(), scale_pos: 1.0, angle_unit: AngleUnit::Radians }
    }
}

/// Drives one teleoperation session: pulls target events off a feeder,
/// maps their poses into the robot's frame, feeds them to the planner,
/// and publishes any resulting control series to the hand-off channel.
/// Polls `feedback` once per loop to arm the planner as soon as the
/// Servo Driver reports a valid pose.
pub struct SessionRunner {
    planner: ControlPlanner,
    config: PlannerConfig,
    coordinates: CoordinateConfig,
    handoff: HandoffWriter,
    feedback: FeedbackReader,
    recorder: Option<Recorder>,
}

impl SessionRunner {
    pub fn new(config: PlannerConfig, coordinates: CoordinateConfig, handoff: HandoffWriter, feedback: FeedbackReader) -> Self {
        Self { planner: ControlPlanner::new(), config, coordinates, handoff, feedback, recorder: None }
    }

    /// Opens a JSON-Lines recording file and appends `base`/`diff_control`/
    /// `control`/`state` events to it for every target processed from here
    /// on (`SPEC_FULL.md` §6).
    pub fn enable_recording<P: AsRef<Path>>(&mut self, path: P) -> Result<(), RecordingError> {
        self.recorder = Some(Recorder::create(path)?);
        Ok(())
    }

    /// Consumes one target event. An asserted origin-reset pad (`pad.bA`)
    /// drops the planner back to `Reset` and is otherwise a no-op; an
    /// asserted hold pad (`pad.b0`) freezes command emission entirely
    /// (the event is dropped before it reaches the planner). Otherwise
    /// the pose is mapped into the robot's frame, the planner is armed
    /// against the latest feedback sample if still unarmed, and any
    /// resulting series is published to the hand-off channel.
    pub fn on_target(&mut self, event: TargetEvent) {
        if event.pad.b_a {
            self.reset();
            return;
        }
        if event.pad.b0 {
            return;
        }

        let target = self.coordinates.normalize(event.pose);
        let sample = self.feedback.read();
        let now = cobot_tools::wall_now();

        if !self.planner.is_armed() {
            if !sample.valid {
                return;
            }
            info!("arming planner against first valid feedback sample");
            self.planner.on_robot_feedback(sample.last_robot_pose, target);
            self.log(RecordEvent::Base { time: now, pos: sample.last_robot_pose });
        }

        self.log(RecordEvent::State { time: now, pos: sample.last_robot_pose });

        if let Some(update) = self.planner.on_target(target, &self.config) {
            self.log(RecordEvent::DiffControl { time: now, pos: update.diff });
            self.log(RecordEvent::Control { time: now, pos: update.series.clone() });
            if let Ok(series) = cobot_tools::PoseSeries::new(update.series) {
                if let Err(err) = self.handoff.publish(&series) {
                    warn!(?err, "failed to publish control series");
                }
            }
        }
    }

    fn log(&mut self, event: RecordEvent) {
        if let Some(recorder) = self.recorder.as_mut() {
            if let Err(err) = recorder.log(&event) {
                warn!(?err, kind = event.kind(), "failed to log recording event");
            }
        }
    }

    /// Runs the session to completion, draining `targets` until the
    /// channel closes (the feeder shut down).
    pub fn run(&mut self, targets: Receiver<TargetEvent>) {
        for target in targets {
            self.on_target(target);
        }
    }

    /// Drops back to the unarmed state, e.g. on an operator-issued reset
    /// or an unrecoverable Servo Driver fault report.
    pub fn reset(&mut self) {
        self.planner.reset();
    }

    pub fn is_armed(&self) -> bool {
        self.planner.is_armed()
    }
}

/// Default planner cadence: a 50ms nominal control interval and an 8ms
/// tick period, matching the Servo Driver's buffered/externally-paced
/// slave modes (`SPEC_FULL.md` §4.3/§9).
pub const DEFAULT_NOMINAL_INTERVAL: f64 = 0.05;
pub const DEFAULT_TICK_PERIOD: f64 = 0.008;

pub fn default_tick_period() -> Duration {
    Duration::from_secs_f64(DEFAULT_TICK_PERIOD)
}
