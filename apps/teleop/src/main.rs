//! `teleop`: the "main" process — Target Feeder and Control Planner.
//!
//! Subscribes to (or replays) a stream of target poses, plans a bounded
//! control series against the robot's last reported feedback, and hands
//! the series off to the Servo Driver process over shared memory
//! (`SPEC_FULL.md` §4, §9).

mod commands;
mod config;
mod error;

use std::process::ExitCode;

use clap::{Parser, Subcommand};

use config::{FileConfig, SubModeArg, TeleopConfig};
use error::TeleopError;

#[derive(Debug, Parser)]
#[command(name = "teleop", about = "Target Feeder and Control Planner for the cobot teleoperation system")]
struct Cli {
    /// Optional TOML config file, merged under any CLI flags given.
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run a teleoperation session until `Ctrl-C` or the feeder stops.
    Run {
        #[arg(long)]
        broker_host: Option<String>,
        #[arg(long)]
        broker_port: Option<u16>,
        #[arg(long, value_enum)]
        sub_mode: Option<SubModeArg>,
        #[arg(long)]
        v_lim_pos: Option<f64>,
        #[arg(long)]
        v_lim_rot: Option<f64>,
        #[arg(long)]
        scale_pos: Option<f64>,
        #[arg(long)]
        angle_unit: Option<String>,
        /// Replay target poses from a previously recorded file instead of
        /// subscribing to the live MQTT feeder.
        #[arg(long)]
        replay_from: Option<String>,
        #[arg(long)]
        dummy_robot: bool,
    },
    /// Print a text-only offline summary of a recording file.
    RecordStats {
        path: String,
    },
}

fn main() -> ExitCode {
    cobot_sdk::init_tracing();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(%err, "fatal error");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), TeleopError> {
    match cli.command {
        Commands::RecordStats { path } => commands::record_stats(&path),
        Commands::Run { broker_host, broker_port, sub_mode, v_lim_pos, v_lim_rot, scale_pos, angle_unit, replay_from, dummy_robot } => {
            let mut config = match &cli.config {
                Some(path) => FileConfig::load(path)?.merge_into(TeleopConfig::default())?,
                None => TeleopConfig::default(),
            };

            if let Some(host) = broker_host {
                config.broker_host = host;
            }
            if let Some(port) = broker_port {
                config.broker_port = port;
            }
            if let Some(mode) = sub_mode {
                config.sub_mode = mode;
            }
            if let Some(v) = v_lim_pos {
                config.v_lim_pos = v;
            }
            if let Some(v) = v_lim_rot {
                config.v_lim_rot = v;
            }
            if let Some(v) = scale_pos {
                config.scale_pos = v;
            }
            if let Some(unit) = angle_unit {
                config.angle_unit = match unit.as_str() {
                    "radians" => cobot_sdk::AngleUnit::Radians,
                    "degrees" => cobot_sdk::AngleUnit::Degrees,
                    other => return Err(TeleopError::Config(format!("unrecognised --angle-unit `{other}`"))),
                };
            }
            config.dummy_robot = config.dummy_robot || dummy_robot;

            if config.v_lim_pos <= 0.0 || config.v_lim_rot <= 0.0 {
                return Err(TeleopError::Config(format!(
                    "velocity limits must be strictly positive, got v_lim_pos={} v_lim_rot={}",
                    config.v_lim_pos, config.v_lim_rot
                )));
            }

            commands::run(&config, replay_from.as_deref())
        }
    }
}
