//! JSON-Lines recording format.
//!
//! Used two ways: the live feeder optionally appends every incoming target
//! to a recording file (for later replay), and the planner optionally
//! appends `target`/`base`/`diff_control`/`control`/`state` events for
//! off-line inspection. Neither is read back by the core control loop.

use crate::pose::Pose;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use thiserror::Error;

/// One line of a recording file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordEvent {
    /// A raw target, as received from the feeder before normalisation.
    Target { time: f64, pos: Pose },
    /// The anchor poses captured on `Reset -> Armed`.
    Base { time: f64, pos: Pose },
    /// The anchor-relative `diff` computed for one planner update.
    DiffControl { time: f64, pos: Pose },
    /// The full interpolated series enqueued for one planner update.
    Control { time: f64, pos: Vec<Pose> },
    /// The robot's observed pose at a tick where no new series was active,
    /// or after a recovered fault.
    State { time: f64, pos: Pose },
}

impl RecordEvent {
    pub fn time(&self) -> f64 {
        match self {
            RecordEvent::Target { time, .. }
            | RecordEvent::Base { time, .. }
            | RecordEvent::DiffControl { time, .. }
            | RecordEvent::Control { time, .. }
            | RecordEvent::State { time, .. } => *time,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RecordEvent::Target { .. } => "target",
            RecordEvent::Base { .. } => "base",
            RecordEvent::DiffControl { .. } => "diff_control",
            RecordEvent::Control { .. } => "control",
            RecordEvent::State { .. } => "state",
        }
    }
}

#[derive(Debug, Error)]
pub enum RecordingError {
    #[error("opening recording file: {0}")]
    Io(#[from] io::Error),
    #[error("encoding recording event: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Append-only JSON-Lines event recorder.
pub struct Recorder {
    writer: BufWriter<File>,
}

impl Recorder {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, RecordingError> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { writer: BufWriter::new(file) })
    }

    pub fn log(&mut self, event: &RecordEvent) -> Result<(), RecordingError> {
        let line = serde_json::to_string(event)?;
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Reads every event out of a JSON-Lines recording file, skipping lines
/// that fail to parse (consistent with the feeder's "malformed input is
/// skipped with a warning" policy rather than aborting the whole read).
pub fn read_events<P: AsRef<Path>>(path: P) -> Result<Vec<RecordEvent>, RecordingError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut events = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        if let Ok(event) = serde_json::from_str::<RecordEvent>(&line) {
            events.push(event);
        }
    }
    Ok(events)
}

/// A non-visual, text-only offline summary of a recording: event counts per
/// kind, wall-clock span, and a crude cadence-consistency measure. Not
/// trajectory plotting and not a GUI — see `SPEC_FULL.md` §10.5.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingSummary {
    pub target_count: usize,
    pub base_count: usize,
    pub diff_control_count: usize,
    pub control_count: usize,
    pub state_count: usize,
    pub span_seconds: f64,
    /// Mean absolute deviation of target inter-arrival gaps from the mean
    /// gap, in seconds. Zero or one target yields `0.0`.
    pub target_cadence_jitter: f64,
}

impl RecordingSummary {
    pub fn summarize(events: &[RecordEvent]) -> Self {
        let mut summary = RecordingSummary {
            target_count: 0,
            base_count: 0,
            diff_control_count: 0,
            control_count: 0,
            state_count: 0,
            span_seconds: 0.0,
            target_cadence_jitter: 0.0,
        };

        let mut min_time = f64::INFINITY;
        let mut max_time = f64::NEG_INFINITY;
        let mut target_times = Vec::new();

        for event in events {
            let t = event.time();
            min_time = min_time.min(t);
            max_time = max_time.max(t);
            match event {
                RecordEvent::Target { .. } => {
                    summary.target_count += 1;
                    target_times.push(t);
                }
                RecordEvent::Base { .. } => summary.base_count += 1,
                RecordEvent::DiffControl { .. } => summary.diff_control_count += 1,
                RecordEvent::Control { .. } => summary.control_count += 1,
                RecordEvent::State { .. } => summary.state_count += 1,
            }
        }

        if events.is_empty() {
            return summary;
        }
        summary.span_seconds = (max_time - min_time).max(0.0);

        if target_times.len() >= 2 {
            let gaps: Vec<f64> = target_times.windows(2).map(|w| w[1] - w[0]).collect();
            let mean = gaps.iter().sum::<f64>() / gaps.len() as f64;
            let mad = gaps.iter().map(|g| (g - mean).abs()).sum::<f64>() / gaps.len() as f64;
            summary.target_cadence_jitter = mad;
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pose() -> Pose {
        Pose::new(1.0, 2.0, 3.0, 4.0, 5.0, 6.0)
    }

    #[test]
    fn event_kind_and_time() {
        let e = RecordEvent::Target { time: 1.5, pos: pose() };
        assert_eq!(e.kind(), "target");
        assert_eq!(e.time(), 1.5);
    }

    #[test]
    fn roundtrips_through_json_lines_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rec.jsonl");

        let mut recorder = Recorder::create(&path).unwrap();
        recorder.log(&RecordEvent::Target { time: 0.0, pos: pose() }).unwrap();
        recorder.log(&RecordEvent::Base { time: 0.0, pos: pose() }).unwrap();
        recorder.log(&RecordEvent::Control { time: 0.01, pos: vec![pose(), pose()] }).unwrap();
        drop(recorder);

        let events = read_events(&path).unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[2].kind(), "control");
    }

    #[test]
    fn skips_malformed_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rec.jsonl");
        std::fs::write(&path, "not json\n{\"kind\":\"base\",\"time\":1.0,\"pos\":[0,0,0,0,0,0]}\n").unwrap();

        let events = read_events(&path).unwrap();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn summarize_counts_and_span() {
        let events = vec![
            RecordEvent::Target { time: 0.00, pos: pose() },
            RecordEvent::Target { time: 0.05, pos: pose() },
            RecordEvent::Target { time: 0.10, pos: pose() },
            RecordEvent::Base { time: 0.00, pos: pose() },
            RecordEvent::State { time: 0.10, pos: pose() },
        ];
        let summary = RecordingSummary::summarize(&events);
        assert_eq!(summary.target_count, 3);
        assert_eq!(summary.base_count, 1);
        assert_eq!(summary.state_count, 1);
        assert!((summary.span_seconds - 0.10).abs() < 1e-9);
        assert!(summary.target_cadence_jitter < 1e-9);
    }

    #[test]
    fn summarize_empty_is_zeroed() {
        let summary = RecordingSummary::summarize(&[]);
        assert_eq!(summary.target_count, 0);
        assert_eq!(summary.span_seconds, 0.0);
    }
}
