//! Error types for the routing core

use thiserror::Error;

use crate::registry::EndpointId;
use crate::state::OutputId;

/// Errors reported by the switch driver adapter
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DriverError {
    /// Switcher endpoint is not reachable
    #[error("switcher is offline")]
    Offline,

    /// No switcher link has been attached
    #[error("no switcher link attached")]
    NotAttached,

    /// Switcher link queue is full
    #[error("switcher command queue is full")]
    Busy,

    /// Switcher link was closed before the command completed
    #[error("switcher link closed")]
    LinkClosed,

    /// Switcher refused the command
    #[error("switcher rejected command: {0}")]
    Rejected(String),

    /// Switcher did not acknowledge in time
    #[error("switcher did not acknowledge within {0}ms")]
    Timeout(u64),
}

/// Errors that can occur while handling room events
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RouteError {
    /// Endpoint id is not registered
    #[error("unknown endpoint: {0}")]
    UnknownEndpoint(EndpointId),

    /// Select request referenced a source outside the catalog
    #[error("source index {index} outside catalog of {catalog_len} sources")]
    InvalidSourceIndex {
        /// Requested 1-based source index
        index: u32,
        /// Number of sources in the catalog
        catalog_len: usize,
    },
}

/// Errors found while loading or validating the room configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file could not be read
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration is not valid JSON for the room schema
    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// No sources configured
    #[error("source catalog is empty")]
    EmptyCatalog,

    /// No outputs configured
    #[error("no outputs configured")]
    NoOutputs,

    /// Output listed twice
    #[error("duplicate output: {0}")]
    DuplicateOutput(OutputId),

    /// Two endpoints share a name
    #[error("duplicate endpoint name: {0}")]
    DuplicateEndpoint(String),

    /// Button group references an output that is not configured
    #[error("surface {surface} references unknown output {output}")]
    UnknownOutput {
        /// Surface name
        surface: String,
        /// Output referenced by the group
        output: OutputId,
    },

    /// Button id used for more than one role on a surface
    #[error("surface {surface}: join {join} is assigned twice")]
    JoinConflict {
        /// Surface name
        surface: String,
        /// Conflicting join number
        join: u32,
    },

    /// Button group is malformed
    #[error("surface {surface}: {reason}")]
    InvalidButtonGroup {
        /// Surface name
        surface: String,
        /// What is wrong with the group
        reason: String,
    },

    /// A numeric setting is out of range
    #[error("invalid setting {name}: {reason}")]
    InvalidSetting {
        /// Setting name
        name: &'static str,
        /// Why it was rejected
        reason: String,
    },
}
