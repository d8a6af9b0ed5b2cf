//! Binary-level error type: configuration misuse surfaces before any
//! component starts, everything else propagates from the library crates
//! it wires together.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TeleopError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to read config file {path}: {source}")]
    ConfigRead { path: String, source: std::io::Error },

    #[error("failed to parse config file {path}: {source}")]
    ConfigParse { path: String, source: toml::de::Error },

    #[error("axis map error: {0}")]
    AxisMap(#[from] cobot_sdk::AxisMapError),

    #[error(transparent)]
    Channel(#[from] cobot_sdk::ChannelError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
