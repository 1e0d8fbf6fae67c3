//! Launch-plan validation errors.

use thiserror::Error;

/// Result type alias for launch-plan validation.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while resolving a sweep request into a launch plan.
///
/// All of these are fatal and surface before any experiment is dispatched.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("excluded game not in the game roster: {0}")]
    UnknownExcludedGame(String),

    #[error("malformed override, expected key=value: {0:?}")]
    MalformedOverride(String),

    #[error("num_devices must be at least 1")]
    NoDevices,

    #[error("num_exp_per_device must be at least 1")]
    ZeroCapacity,
}
