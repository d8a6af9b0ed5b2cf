//! Layered configuration: compiled-in defaults, overridden by an optional
//! TOML file, overridden by CLI flags (`SPEC_FULL.md` §10.3).

use serde::Deserialize;

use cobot_sdk::{AngleUnit, AxisMap};

use crate::error::TeleopError;

/// Everything a session needs, after CLI flags have been merged over any
/// file the user pointed at. Field names match the CLI flags 1:1.
#[derive(Debug, Clone)]
pub struct TeleopConfig {
    pub broker_host: String,
    pub broker_port: u16,
    pub sub_mode: SubModeArg,
    pub figure: Option<i32>,
    pub v_lim_pos: f64,
    pub v_lim_rot: f64,
    pub scale_pos: f64,
    pub angle_unit: AngleUnit,
    pub axis_map: [String; 6],
    pub record_path: Option<String>,
    pub dummy_robot: bool,
}

impl Default for TeleopConfig {
    fn default() -> Self {
        Self {
            broker_host: "192.168.207.22".to_string(),
            broker_port: 1883,
            sub_mode: SubModeArg::ExternallyPaced,
            figure: None,
            v_lim_pos: 200.0,
            v_lim_rot: 60.0,
            scale_pos: 1.0,
            angle_unit: AngleUnit::Radians,
            axis_map: ["-x", "z", "y", "-rx", "rz", "ry"].map(String::from),
            record_path: None,
            dummy_robot: false,
        }
    }
}

/// The subset of `TeleopConfig` that may come from a TOML file. Every
/// field is optional so a file only needs to mention what it overrides;
/// unset fields fall back to the compiled-in default and can still be
/// overridden by a CLI flag.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    pub broker_host: Option<String>,
    pub broker_port: Option<u16>,
    pub sub_mode: Option<String>,
    pub figure: Option<i32>,
    pub v_lim_pos: Option<f64>,
    pub v_lim_rot: Option<f64>,
    pub scale_pos: Option<f64>,
    pub angle_unit: Option<String>,
    pub axis_map: Option<[String; 6]>,
    pub record_path: Option<String>,
    pub dummy_robot: Option<bool>,
}

impl FileConfig {
    pub fn load(path: &str) -> Result<Self, TeleopError> {
        let content = std::fs::read_to_string(path).map_err(|source| TeleopError::ConfigRead { path: path.to_string(), source })?;
        toml::from_str(&content).map_err(|source| TeleopError::ConfigParse { path: path.to_string(), source })
    }

    pub fn merge_into(self, base: TeleopConfig) -> Result<TeleopConfig, TeleopError> {
        Ok(TeleopConfig {
            broker_host: self.broker_host.unwrap_or(base.broker_host),
            broker_port: self.broker_port.unwrap_or(base.broker_port),
            sub_mode: match self.sub_mode {
                Some(raw) => SubModeArg::parse(&raw)?,
                None => base.sub_mode,
            },
            figure: self.figure.or(base.figure),
            v_lim_pos: self.v_lim_pos.unwrap_or(base.v_lim_pos),
            v_lim_rot: self.v_lim_rot.unwrap_or(base.v_lim_rot),
            scale_pos: self.scale_pos.unwrap_or(base.scale_pos),
            angle_unit: match self.angle_unit {
                Some(raw) => parse_angle_unit(&raw)?,
                None => base.angle_unit,
            },
            axis_map: self.axis_map.unwrap_or(base.axis_map),
            record_path: self.record_path.or(base.record_path),
            dummy_robot: self.dummy_robot.unwrap_or(base.dummy_robot),
        })
    }
}

/// Which of the controller's three slave sub-modes to enter
/// (`SPEC_FULL.md` §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SubModeArg {
    BufferedRetry,
    ExternallyPaced,
    ControllerPaced,
}

impl SubModeArg {
    fn parse(raw: &str) -> Result<Self, TeleopError> {
        match raw {
            "buffered-retry" => Ok(SubModeArg::BufferedRetry),
            "externally-paced" => Ok(SubModeArg::ExternallyPaced),
            "controller-paced" => Ok(SubModeArg::ControllerPaced),
            other => Err(TeleopError::Config(format!("unrecognised sub_mode `{other}`"))),
        }
    }

    pub fn as_slave_sub_mode(self) -> cobot_sdk::SlaveSubMode {
        match self {
            SubModeArg::BufferedRetry => cobot_sdk::SlaveSubMode::BufferedRetry,
            SubModeArg::ExternallyPaced => cobot_sdk::SlaveSubMode::ExternallyPaced,
            SubModeArg::ControllerPaced => cobot_sdk::SlaveSubMode::ControllerPaced,
        }
    }
}

fn parse_angle_unit(raw: &str) -> Result<AngleUnit, TeleopError> {
    match raw {
        "radians" => Ok(AngleUnit::Radians),
        "degrees" => Ok(AngleUnit::Degrees),
        other => Err(TeleopError::Config(format!("unrecognised angle_unit `{other}`, expected `radians` or `degrees`"))),
    }
}

impl TeleopConfig {
    /// Builds the axis map this session will apply to every incoming
    /// target pose, from the configured signed-permutation spec strings.
    pub fn build_axis_map(&self) -> Result<AxisMap, TeleopError> {
        let spec: [&str; 6] = [
            &self.axis_map[0],
            &self.axis_map[1],
            &self.axis_map[2],
            &self.axis_map[3],
            &self.axis_map[4],
            &self.axis_map[5],
        ];
        Ok(AxisMap::from_spec(spec)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_config_overrides_only_what_it_mentions() {
        let file = FileConfig { broker_port: Some(9999), ..FileConfig::default() };
        let merged = file.merge_into(TeleopConfig::default()).unwrap();
        assert_eq!(merged.broker_port, 9999);
        assert_eq!(merged.broker_host, TeleopConfig::default().broker_host);
    }

    #[test]
    fn file_config_rejects_unrecognised_sub_mode() {
        let file = FileConfig { sub_mode: Some("not-a-mode".to_string()), ..FileConfig::default() };
        assert!(file.merge_into(TeleopConfig::default()).is_err());
    }

    #[test]
    fn loads_a_config_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("teleop.toml");
        std::fs::write(&path, "broker_host = \"10.0.0.5\"\nv_lim_pos = 50.0\n").unwrap();

        let loaded = FileConfig::load(path.to_str().unwrap()).unwrap();
        let merged = loaded.merge_into(TeleopConfig::default()).unwrap();
        assert_eq!(merged.broker_host, "10.0.0.5");
        assert_eq!(merged.v_lim_pos, 50.0);
    }

    #[test]
    fn default_axis_map_is_buildable() {
        assert!(TeleopConfig::default().build_axis_map().is_ok());
    }
}
