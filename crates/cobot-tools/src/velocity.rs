//! Per-axis velocity limit configuration, loaded from TOML and merged with
//! CLI overrides at the highest precedence (see `SPEC_FULL.md` §10.3).

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Velocity limits used by the interpolator's automatic time-stretch
/// (`SPEC_FULL.md` §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VelocityLimits {
    /// Positional speed limit, mm/s.
    pub v_lim_pos: f64,
    /// Rotational speed limit, deg/s.
    pub v_lim_rot: f64,
}

impl Default for VelocityLimits {
    fn default() -> Self {
        Self { v_lim_pos: 200.0, v_lim_rot: 60.0 }
    }
}

#[derive(Debug, Error)]
pub enum VelocityLimitsError {
    #[error("reading velocity limits file: {0}")]
    Io(#[from] std::io::Error),
    #[error("parsing velocity limits TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("velocity limits must be strictly positive, got v_lim_pos={v_lim_pos}, v_lim_rot={v_lim_rot}")]
    NonPositive { v_lim_pos: f64, v_lim_rot: f64 },
}

impl VelocityLimits {
    pub fn validate(&self) -> Result<(), VelocityLimitsError> {
        if self.v_lim_pos <= 0.0 || self.v_lim_rot <= 0.0 {
            return Err(VelocityLimitsError::NonPositive { v_lim_pos: self.v_lim_pos, v_lim_rot: self.v_lim_rot });
        }
        Ok(())
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, VelocityLimitsError> {
        let content = fs::read_to_string(path)?;
        let limits: Self = toml::from_str(&content)?;
        limits.validate()?;
        Ok(limits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_limits_are_valid() {
        assert!(VelocityLimits::default().validate().is_ok());
    }

    #[test]
    fn rejects_non_positive_limits() {
        let bad = VelocityLimits { v_lim_pos: 0.0, v_lim_rot: 60.0 };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn round_trips_through_toml() {
        let limits = VelocityLimits { v_lim_pos: 150.0, v_lim_rot: 45.0 };
        let text = toml::to_string(&limits).unwrap();
        let parsed: VelocityLimits = toml::from_str(&text).unwrap();
        assert_eq!(parsed, limits);
    }
}
