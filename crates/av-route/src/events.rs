//! Unified event stream for the controller
//!
//! Everything observers care about (endpoint lifecycle, selection changes,
//! switcher outcomes, rejected input) is emitted through a single channel.

use crate::engine::RouteCommand;
use crate::error::{DriverError, RouteError};
use crate::registry::EndpointId;
use crate::state::{OutputId, OutputState};

/// Event emitted by the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomEvent {
    // -------------------------------------------------------------------------
    // Endpoint lifecycle events
    // -------------------------------------------------------------------------
    /// An endpoint came online
    EndpointOnline {
        /// Endpoint id
        endpoint: EndpointId,
        /// Endpoint name
        name: String,
    },

    /// An endpoint went offline
    EndpointOffline {
        /// Endpoint id
        endpoint: EndpointId,
        /// Endpoint name
        name: String,
    },

    /// An endpoint's network address changed
    IdentityChanged {
        /// Endpoint id
        endpoint: EndpointId,
        /// New address (None when disconnected)
        address: Option<String>,
    },

    // -------------------------------------------------------------------------
    // Routing events
    // -------------------------------------------------------------------------
    /// The selection for an output was (re)asserted
    SelectionChanged {
        /// Output
        output: OutputId,
        /// New state
        state: OutputState,
        /// Number of surfaces the feedback reached
        surfaces_synced: usize,
    },

    /// The switcher acknowledged a command
    RouteApplied {
        /// Command that completed
        command: RouteCommand,
    },

    /// A switcher command failed; the selection is unchanged
    RouteFailed {
        /// Command that failed
        command: RouteCommand,
        /// Why it failed
        error: DriverError,
    },

    // -------------------------------------------------------------------------
    // Input errors
    // -------------------------------------------------------------------------
    /// A raw event was rejected
    SignalRejected {
        /// Endpoint that sent it
        endpoint: EndpointId,
        /// Why it was rejected
        error: RouteError,
    },
}

impl RoomEvent {
    /// Check if this is an endpoint lifecycle event
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            RoomEvent::EndpointOnline { .. }
                | RoomEvent::EndpointOffline { .. }
                | RoomEvent::IdentityChanged { .. }
        )
    }

    /// Check if this is a switcher outcome event
    pub fn is_driver_outcome(&self) -> bool {
        matches!(
            self,
            RoomEvent::RouteApplied { .. } | RoomEvent::RouteFailed { .. }
        )
    }

    /// Output this event concerns, if any
    pub fn output(&self) -> Option<OutputId> {
        match self {
            RoomEvent::SelectionChanged { output, .. } => Some(*output),
            RoomEvent::RouteApplied { command } | RoomEvent::RouteFailed { command, .. } => {
                Some(command.output())
            }
            _ => None,
        }
    }
}
