//! Raw endpoint events and the normalized event vocabulary
//!
//! Raw events are what the transport reports: join changes on a control
//! surface, reachability changes and network identity changes. The
//! [`SignalDispatcher`](crate::dispatcher::SignalDispatcher) turns them into
//! [`NormalizedEvent`]s for the routing engine.

use crate::registry::{EndpointDescriptor, EndpointId};
use crate::state::{OutputId, SourceIndex};

/// Value carried by a join change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalValue {
    /// Digital join (button press/release)
    Digital(bool),
    /// Analog join (unused by the core)
    Analog(u16),
    /// Serial join (unused by the core)
    Serial(String),
}

/// Event reported by an endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawEvent {
    /// A join changed on a control surface
    Signal {
        /// Reporting endpoint
        endpoint: EndpointId,
        /// Join number
        join: u32,
        /// New value
        value: SignalValue,
    },

    /// An endpoint went online or offline
    Reachability {
        /// Endpoint whose reachability changed
        endpoint: EndpointId,
        /// New state
        online: bool,
    },

    /// An endpoint acquired or lost its network address
    Identity {
        /// Endpoint whose identity changed
        endpoint: EndpointId,
        /// New address (None when disconnected)
        address: Option<String>,
    },
}

impl RawEvent {
    /// Digital press on a surface
    pub fn press(endpoint: EndpointId, join: u32) -> Self {
        Self::Signal {
            endpoint,
            join,
            value: SignalValue::Digital(true),
        }
    }

    /// Digital release on a surface
    pub fn release(endpoint: EndpointId, join: u32) -> Self {
        Self::Signal {
            endpoint,
            join,
            value: SignalValue::Digital(false),
        }
    }

    /// Endpoint that reported this event
    pub fn endpoint(&self) -> EndpointId {
        match self {
            Self::Signal { endpoint, .. }
            | Self::Reachability { endpoint, .. }
            | Self::Identity { endpoint, .. } => *endpoint,
        }
    }
}

/// Internal event consumed by the routing engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizedEvent {
    /// A surface asked to route a source to an output
    SelectRequested {
        /// Output to route
        output: OutputId,
        /// Source to route (validated against the catalog)
        source: SourceIndex,
        /// Surface the request came from
        origin: EndpointId,
    },

    /// A surface asked to clear an output
    ClearRequested {
        /// Output to clear
        output: OutputId,
        /// Surface the request came from
        origin: EndpointId,
    },

    /// An endpoint went online or offline
    ReachabilityChanged {
        /// Endpoint whose reachability changed
        endpoint: EndpointId,
        /// New state
        online: bool,
    },

    /// An endpoint's network identity changed
    IdentityChanged {
        /// Endpoint whose identity changed
        endpoint: EndpointId,
        /// Descriptor after the change
        descriptor: EndpointDescriptor,
    },
}

impl NormalizedEvent {
    /// Check if this event can change the selection
    pub fn is_routing_request(&self) -> bool {
        matches!(
            self,
            Self::SelectRequested { .. } | Self::ClearRequested { .. }
        )
    }
}
