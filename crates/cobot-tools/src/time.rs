//! Wall-clock helpers shared by the target feeders and the recorder.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time, in seconds since the Unix epoch, as used to
/// stamp live MQTT targets and recording events.
pub fn wall_now() -> f64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs_f64()
}
