//! `servo-driver`: the "servo" process — drains the hand-off channel and
//! drives the controller's real-time RPC loop, publishing feedback for
//! the "main" process to arm its planner against (`SPEC_FULL.md` §4.4,
//! §9).

use std::fs::OpenOptions;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use fs4::fs_std::FileExt;
use tracing::{error, info};

use cobot_control::{FeedbackWriter, HandoffReader, FEEDBACK_CHANNEL_NAME, HANDOFF_CHANNEL_NAME};
use cobot_sdk::{DummyLink, ServoSession, SlaveSubMode, TickRunner};

#[derive(Debug, Parser)]
#[command(name = "servo-driver", about = "Servo Driver process for the cobot teleoperation system")]
struct Args {
    /// Controller RPC endpoint, host:port.
    #[arg(long, default_value = "192.168.5.45:5007")]
    robot_endpoint: String,

    /// Slave sub-mode to enter on startup.
    #[arg(long, default_value = "externally-paced")]
    sub_mode: String,

    /// Figure/elbow configuration mode forwarded with every commanded pose.
    #[arg(long)]
    figure: Option<i32>,

    /// Run against the deterministic in-memory link instead of the real
    /// controller. The only backend this crate ships — see its module
    /// doc comment.
    #[arg(long, default_value_t = true)]
    dummy_robot: bool,

    /// Singleton lock file path. Defaults to an XDG-aware fallback chain.
    #[arg(long)]
    lock_file: Option<String>,
}

fn default_lock_file() -> String {
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        let path = std::path::Path::new(&runtime_dir).join("cobot_servo_driver.lock");
        if let Some(parent) = path.parent() {
            if parent.exists() || std::fs::create_dir_all(parent).is_ok() {
                return path.to_string_lossy().to_string();
            }
        }
    }

    let tmp_path = std::path::Path::new("/tmp").join("cobot_servo_driver.lock");
    if tmp_path.parent().map(|p| p.exists()).unwrap_or(false) {
        return tmp_path.to_string_lossy().to_string();
    }

    if let Ok(home) = std::env::var("HOME") {
        let cache_dir = std::path::Path::new(&home).join(".cache").join("cobot");
        if std::fs::create_dir_all(&cache_dir).is_ok() {
            return cache_dir.join("cobot_servo_driver.lock").to_string_lossy().to_string();
        }
    }

    "/tmp/cobot_servo_driver.lock".to_string()
}

fn parse_sub_mode(raw: &str) -> Result<SlaveSubMode, String> {
    match raw {
        "buffered-retry" => Ok(SlaveSubMode::BufferedRetry),
        "externally-paced" => Ok(SlaveSubMode::ExternallyPaced),
        "controller-paced" => Ok(SlaveSubMode::ControllerPaced),
        other => Err(format!("unrecognised --sub-mode `{other}`")),
    }
}

fn main() -> ExitCode {
    cobot_sdk::init_tracing();

    let args = Args::parse();
    let lock_path = args.lock_file.clone().unwrap_or_else(default_lock_file);

    let lock_file = match OpenOptions::new().create(true).truncate(false).write(true).open(&lock_path) {
        Ok(file) => file,
        Err(err) => {
            eprintln!("failed to open lock file {lock_path}: {err}");
            return ExitCode::FAILURE;
        }
    };
    match lock_file.try_lock_exclusive() {
        Ok(true) => {}
        Ok(false) => {
            eprintln!("another servo-driver instance already holds the lock at {lock_path}");
            return ExitCode::FAILURE;
        }
        Err(err) => {
            eprintln!("failed to acquire singleton lock at {lock_path}: {err}");
            return ExitCode::FAILURE;
        }
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "fatal error");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), String> {
    let sub_mode = parse_sub_mode(&args.sub_mode)?;

    if !args.dummy_robot {
        return Err(format!(
            "no real controller transport is wired for endpoint {} — only --dummy-robot is supported",
            args.robot_endpoint
        ));
    }

    eprintln!("cobot servo-driver starting");
    eprintln!("  robot endpoint: {} (dummy backend)", args.robot_endpoint);
    eprintln!("  sub mode: {}", args.sub_mode);

    let mut session = ServoSession::new(DummyLink::new());
    session.enter_servo_mode(sub_mode).map_err(|err| err.to_string())?;
    let tick_period = session.suggested_tick_period();

    let source = HandoffReader::open(HANDOFF_CHANNEL_NAME).map_err(|err| err.to_string())?;
    let feedback = FeedbackWriter::open(FEEDBACK_CHANNEL_NAME).map_err(|err| err.to_string())?;
    let mut runner = TickRunner::new(session, source, feedback, args.figure);

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_handler = shutdown.clone();
    ctrlc::set_handler(move || {
        eprintln!("received interrupt signal, shutting down");
        shutdown_handler.store(true, Ordering::SeqCst);
    })
    .map_err(|err| format!("failed to install Ctrl-C handler: {err}"))?;

    info!(?tick_period, "servo driver entering tick loop");
    while !shutdown.load(Ordering::SeqCst) {
        if let Err(err) = runner.tick() {
            error!(%err, "unrecoverable fault, stopping");
            return Err(err.to_string());
        }
        spin_sleep::sleep(tick_period);
    }

    Ok(())
}
