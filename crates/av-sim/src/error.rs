//! Error types for the simulated room

use av_route::ConfigError;
use thiserror::Error;

/// Errors that can occur while driving a simulated room
#[derive(Debug, Error)]
pub enum SimError {
    /// Room description failed validation
    #[error("invalid room configuration: {0}")]
    Config(#[from] ConfigError),

    /// The controller actor has stopped
    #[error("room controller is not running")]
    ControllerClosed,

    /// No surface with that name
    #[error("unknown surface: {0}")]
    UnknownSurface(String),
}
