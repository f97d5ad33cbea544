use thiserror::Error;

use crate::types::{Direction, MentalCommand};

#[derive(Debug, Error)]
pub enum HeadsetError {
    #[error("EDK library unavailable: {0}")]
    LibraryUnavailable(String),
    #[error("{call} failed (EDK code {code:#06x})")]
    Sdk { call: &'static str, code: i32 },
    #[error("headset not connected")]
    NotConnected,
    #[error("profile path is not valid for the SDK: {0}")]
    InvalidPath(String),
    #[error("profile I/O failed: {0}")]
    Profile(String),
}

impl From<std::io::Error> for HeadsetError {
    fn from(value: std::io::Error) -> Self {
        HeadsetError::Profile(value.to_string())
    }
}

impl From<serde_json::Error> for HeadsetError {
    fn from(value: serde_json::Error) -> Self {
        HeadsetError::Profile(value.to_string())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BindingError {
    #[error("neutral is the resting state and cannot drive a direction")]
    NeutralNotBindable,
    #[error("{} is already bound to {}", .command.name(), .direction.name())]
    AlreadyBound {
        command: MentalCommand,
        direction: Direction,
    },
    #[error("no mental command selected for {}", .0.name())]
    Unbound(Direction),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("window capacity must be within [10, 10000], got {0}")]
    CapacityOutOfRange(usize),
    #[error("{field} must be greater than zero")]
    NonPositive { field: &'static str },
    #[error("sim_noise must be within [0, 1], got {0}")]
    NoiseOutOfRange(f64),
}
