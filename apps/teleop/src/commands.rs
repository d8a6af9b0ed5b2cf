//! The `run` and `record-stats` subcommands.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::info;

use cobot_sdk::prelude::*;
use cobot_tools::recording::{read_events, RecordEvent};

use crate::config::TeleopConfig;
use crate::error::TeleopError;

/// Wires a feeder through the Control Planner to the hand-off and
/// feedback channels, and runs until the feeder stops or `Ctrl-C` is
/// pressed (`SPEC_FULL.md` §5's cooperative shutdown).
pub fn run(config: &TeleopConfig, replay_from: Option<&str>) -> Result<(), TeleopError> {
    let axis_map = config.build_axis_map()?;
    let coordinates = CoordinateConfig { axis_map, scale_pos: config.scale_pos, angle_unit: config.angle_unit };

    let planner_limits = VelocityLimits { v_lim_pos: config.v_lim_pos, v_lim_rot: config.v_lim_rot };
    let planner_config = PlannerConfig {
        nominal_interval: cobot_control::session::DEFAULT_NOMINAL_INTERVAL,
        tick_period: cobot_control::session::DEFAULT_TICK_PERIOD,
        limits: planner_limits,
        use_all_targets: false,
    };

    let feeder = match replay_from {
        Some(path) => {
            let events = read_events(path).map_err(|source| TeleopError::Config(source.to_string()))?;
            let targets: Vec<(f64, Pose)> = events
                .into_iter()
                .filter_map(|event| match event {
                    RecordEvent::Target { time, pos } => Some((time, pos)),
                    _ => None,
                })
                .collect();
            Feeder::Replay(ReplayFeeder::new(targets))
        }
        None => {
            let mut mqtt = MqttFeeder::new(config.broker_host.clone(), config.broker_port);
            if let Some(path) = config.record_path.as_ref() {
                mqtt = mqtt.with_recording(path);
            }
            Feeder::Mqtt(mqtt)
        }
    };

    let handoff = HandoffWriter::open(HANDOFF_CHANNEL_NAME)?;
    let feedback = FeedbackReader::open(FEEDBACK_CHANNEL_NAME)?;
    let mut runner = SessionRunner::new(planner_config, coordinates, handoff, feedback);
    if let Some(path) = config.record_path.as_ref() {
        runner.enable_recording(path).map_err(|err| TeleopError::Config(err.to_string()))?;
    }

    let (targets, handle) = feeder.start();

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_handler = shutdown.clone();
    ctrlc::set_handler(move || shutdown_handler.store(true, Ordering::SeqCst))
        .map_err(|err| TeleopError::Config(format!("failed to install Ctrl-C handler: {err}")))?;

    info!("teleop session running, waiting for targets");
    loop {
        if shutdown.load(Ordering::SeqCst) {
            info!("shutdown requested, stopping feeder");
            handle.stop();
            break;
        }
        match targets.recv_timeout(std::time::Duration::from_millis(200)) {
            Ok(event) => runner.on_target(event),
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => continue,
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
        }
    }
    handle.join();
    Ok(())
}

/// Reads a recording file and prints a text-only offline summary
/// (`SPEC_FULL.md` §10.5) — no trajectory plotting, no GUI.
pub fn record_stats(path: &str) -> Result<(), TeleopError> {
    let events = read_events(path).map_err(|source| TeleopError::Config(source.to_string()))?;
    let summary = cobot_sdk::RecordingSummary::summarize(&events);
    println!("{}", serde_json::to_string_pretty(&summary).map_err(|err| TeleopError::Config(err.to_string()))?);
    Ok(())
}
