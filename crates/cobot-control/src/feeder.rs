//! Target Feeder (`SPEC_FULL.md` §4.1): a background thread that
//! delivers target pose updates to a channel the session wiring drains.
//! Grounded on
//! `examples/original_source/mqtt_control_utils/mqtt_feeder/{mqtt_feeder,realtime_mqtt_feeder,replay_mqtt_feeder}.py`'s
//! `MQTTFeeder` interface and its two implementations.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver};
use rumqttc::{Client, Event, MqttOptions, Packet, QoS};
use thiserror::Error;
use tracing::{debug, warn};

use cobot_tools::{wall_now, Pad, Pose, RecordEvent, Recorder, TargetMessage};

#[derive(Debug, Error)]
pub enum FeederError {
    #[error("feeder is already running")]
    AlreadyRunning,
    #[error("target message did not deserialize: {0}")]
    Deserialize(#[from] serde_json::Error),
}

/// One target update delivered to the session wiring: the raw pose
/// (pre axis-map) plus the pad state carried alongside it. Replayed
/// events carry a default (all-`false`) pad, since the recording format
/// does not capture it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetEvent {
    pub pose: Pose,
    pub pad: Pad,
}

/// A running feeder's handle: join it on shutdown, or request a
/// cooperative stop (`SPEC_FULL.md` §4.1's `set_sink`/`start`/`stop`/`join`
/// contract).
pub struct FeederHandle {
    thread: Option<JoinHandle<()>>,
    cancel: Arc<AtomicBool>,
    client: Option<Client>,
}

impl FeederHandle {
    /// Requests the feeder stop at its next cooperative check point: the
    /// replay loop checks between events, and the MQTT loop disconnects its
    /// client to unblock `connection.iter()`, matching `ReplayMQTTFeeder`'s
    /// cancellation flag.
    pub fn stop(&self) {
        self.cancel.store(true, Ordering::SeqCst);
        if let Some(client) = self.client.as_ref() {
            let _ = client.disconnect();
        }
    }

    pub fn join(mut self) {
        if let Some(t) = self.thread.take() {
            let _ = t.join();
        }
    }
}

/// Live MQTT target feeder, subscribed to the `webxr/pose` topic.
pub struct MqttFeeder {
    host: String,
    port: u16,
    record_path: Option<PathBuf>,
}

impl MqttFeeder {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self { host: host.into(), port, record_path: None }
    }

    /// Appends every incoming target to a JSON-Lines recording file as it
    /// arrives, before axis-mapping (`SPEC_FULL.md` §4.1, §6).
    pub fn with_recording(mut self, path: impl AsRef<std::path::Path>) -> Self {
        self.record_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Starts the feeder's background thread. Returns a receiver the
    /// caller drains for target events (raw pose pre axis-map, plus pad
    /// state — `TargetMessage::as_raw_pose`), and a handle to join or stop
    /// on shutdown.
    pub fn start(&self) -> (Receiver<TargetEvent>, FeederHandle) {
        let (tx, rx) = unbounded();
        let mut options = MqttOptions::new("cobot-teleop", self.host.clone(), self.port);
        options.set_keep_alive(Duration::from_secs(60));

        let (client, mut connection) = Client::new(options, 10);
        if let Err(err) = client.subscribe("webxr/pose", QoS::AtMostOnce) {
            warn!(?err, "failed to subscribe to webxr/pose");
        }

        let cancel = Arc::new(AtomicBool::new(false));
        let thread_cancel = cancel.clone();
        let record_path = self.record_path.clone();

        let thread = std::thread::spawn(move || {
            let mut recorder = record_path.and_then(|path| match Recorder::create(&path) {
                Ok(r) => Some(r),
                Err(err) => {
                    warn!(?err, ?path, "failed to open target recording file");
                    None
                }
            });

            for notification in connection.iter() {
                if thread_cancel.load(Ordering::SeqCst) {
                    break;
                }
                match notification {
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        match serde_json::from_slice::<TargetMessage>(&publish.payload) {
                            Ok(target) => {
                                let pose = target.as_raw_pose();
                                if let Some(recorder) = recorder.as_mut() {
                                    let event = RecordEvent::Target { time: wall_now(), pos: pose };
                                    if let Err(err) = recorder.log(&event) {
                                        warn!(?err, "failed to log target recording event");
                                    }
                                }
                                let event = TargetEvent { pose, pad: target.pad };
                                if tx.send(event).is_err() {
                                    break;
                                }
                            }
                            Err(err) => warn!(?err, "unexpected target message JSON"),
                        }
                    }
                    Ok(_) => {}
                    Err(err) => {
                        warn!(?err, "mqtt connection error");
                        break;
                    }
                }
            }
        });

        (rx, FeederHandle { thread: Some(thread), cancel, client: Some(client) })
    }
}

/// Replays a previously recorded series of target poses, pacing each one
/// by the gap between its recorded timestamp and the previous sample's
/// (`SPEC_FULL.md` §6's recording/replay interface), rather than against
/// wall-clock start time. Grounded on `ReplayMQTTFeeder`'s
/// `_generate_by_diff`. Built directly from a recording's `Target`
/// events (`cobot_tools::recording::RecordEvent::Target`).
pub struct ReplayFeeder {
    events: Vec<(f64, Pose)>,
}

impl ReplayFeeder {
    pub fn new(events: Vec<(f64, Pose)>) -> Self {
        Self { events }
    }

    pub fn start(self) -> (Receiver<TargetEvent>, FeederHandle) {
        let (tx, rx) = unbounded();
        let cancel = Arc::new(AtomicBool::new(false));
        let thread_cancel = cancel.clone();

        let thread = std::thread::spawn(move || {
            let mut prev_time: Option<f64> = None;
            for (time, pose) in self.events {
                if thread_cancel.load(Ordering::SeqCst) {
                    break;
                }
                if let Some(prev) = prev_time {
                    let gap = (time - prev).max(0.0);
                    if !sleep_cooperatively(Duration::from_secs_f64(gap), &thread_cancel) {
                        break;
                    }
                }
                prev_time = Some(time);
                debug!(?pose, "replaying target");
                if tx.send(TargetEvent { pose, pad: Pad::default() }).is_err() {
                    break;
                }
            }
        });
        (rx, FeederHandle { thread: Some(thread), cancel, client: None })
    }
}

/// Sleeps for `duration`, checking `cancel` every 20ms so a replay waiting
/// out a long inter-target gap still stops promptly. Returns `false` if
/// cancelled before the full duration elapsed.
fn sleep_cooperatively(duration: Duration, cancel: &AtomicBool) -> bool {
    const POLL_INTERVAL: Duration = Duration::from_millis(20);
    let mut remaining = duration;
    while remaining > Duration::ZERO {
        if cancel.load(Ordering::SeqCst) {
            return false;
        }
        let step = remaining.min(POLL_INTERVAL);
        std::thread::sleep(step);
        remaining -= step;
    }
    !cancel.load(Ordering::SeqCst)
}

/// Lets callers parameterize session wiring over either feeder without
/// matching on a concrete type.
pub enum Feeder {
    Mqtt(MqttFeeder),
    Replay(ReplayFeeder),
}

impl Feeder {
    pub fn start(self) -> (Receiver<TargetEvent>, FeederHandle) {
        match self {
            Feeder::Mqtt(f) => f.start(),
            Feeder::Replay(f) => f.start(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replay_feeder_delivers_events_in_order() {
        let pose = |x: f64| Pose::new(x, 0.0, 0.0, 0.0, 0.0, 0.0);
        let events = vec![(0.0, pose(1.0)), (0.001, pose(2.0)), (0.002, pose(3.0))];
        let feeder = ReplayFeeder::new(events);
        let (rx, handle) = feeder.start();

        let first = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(first.pose.x(), 1.0);
        let second = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(second.pose.x(), 2.0);
        let third = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(third.pose.x(), 3.0);

        handle.join();
    }

    #[test]
    fn stop_interrupts_a_replay_waiting_out_a_long_gap() {
        let pose = |x: f64| Pose::new(x, 0.0, 0.0, 0.0, 0.0, 0.0);
        let events = vec![(0.0, pose(1.0)), (30.0, pose(2.0))];
        let feeder = ReplayFeeder::new(events);
        let (rx, handle) = feeder.start();

        let first = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(first.pose.x(), 1.0);

        handle.stop();
        assert!(rx.recv_timeout(Duration::from_secs(1)).is_err());
    }
}
