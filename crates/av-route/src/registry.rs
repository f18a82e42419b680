//! Endpoint registry
//!
//! Holds every addressable device the controller talks to (control surfaces
//! and the matrix switcher) together with its reachability. Other components
//! refer to devices only through [`EndpointId`], never through device handles.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::RouteError;

/// Unique identifier for a registered endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EndpointId(pub u32);

impl EndpointId {
    /// Get the raw id value
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Kind of endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EndpointKind {
    /// Touch panel or software panel presenting selector buttons
    ControlSurface,
    /// Matrix video switcher
    Switcher,
}

/// Endpoint registration request
#[derive(Debug, Clone)]
pub struct Endpoint {
    /// Human-readable name
    pub name: String,
    /// Kind of device
    pub kind: EndpointKind,
    /// Control bus IP-ID
    pub ip_id: u8,
    /// Configured network address (switcher only)
    pub address: Option<String>,
}

impl Endpoint {
    /// Describe a control surface
    pub fn surface(name: impl Into<String>, ip_id: u8) -> Self {
        Self {
            name: name.into(),
            kind: EndpointKind::ControlSurface,
            ip_id,
            address: None,
        }
    }

    /// Describe a switcher at a network address
    pub fn switcher(name: impl Into<String>, ip_id: u8, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EndpointKind::Switcher,
            ip_id,
            address: Some(address.into()),
        }
    }
}

/// Current view of a registered endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointDescriptor {
    /// Assigned id
    pub id: EndpointId,
    /// Human-readable name
    pub name: String,
    /// Kind of device
    pub kind: EndpointKind,
    /// Control bus IP-ID
    pub ip_id: u8,
    /// Whether the endpoint is currently responding
    pub online: bool,
    /// Last-known network address
    pub address: Option<String>,
}

impl EndpointDescriptor {
    /// Check if this endpoint is a control surface
    pub fn is_surface(&self) -> bool {
        self.kind == EndpointKind::ControlSurface
    }
}

/// Registry of known endpoints
#[derive(Debug)]
pub struct EndpointRegistry {
    endpoints: BTreeMap<EndpointId, EndpointDescriptor>,
    next_id: u32,
}

impl Default for EndpointRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EndpointRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            endpoints: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Register an endpoint; it starts offline
    pub fn register(&mut self, endpoint: Endpoint) -> EndpointId {
        let id = EndpointId(self.next_id);
        self.next_id += 1;

        debug!(
            "Registered {:?} {} (IP-ID 0x{:02X}) as {}",
            endpoint.kind, endpoint.name, endpoint.ip_id, id
        );

        self.endpoints.insert(
            id,
            EndpointDescriptor {
                id,
                name: endpoint.name,
                kind: endpoint.kind,
                ip_id: endpoint.ip_id,
                online: false,
                address: endpoint.address,
            },
        );
        id
    }

    /// Update reachability, returning the previous state
    pub fn set_reachability(&mut self, id: EndpointId, online: bool) -> Result<bool, RouteError> {
        let endpoint = self
            .endpoints
            .get_mut(&id)
            .ok_or(RouteError::UnknownEndpoint(id))?;
        Ok(std::mem::replace(&mut endpoint.online, online))
    }

    /// Update the last-known network address, returning the previous one
    pub fn set_address(
        &mut self,
        id: EndpointId,
        address: Option<String>,
    ) -> Result<Option<String>, RouteError> {
        let endpoint = self
            .endpoints
            .get_mut(&id)
            .ok_or(RouteError::UnknownEndpoint(id))?;
        Ok(std::mem::replace(&mut endpoint.address, address))
    }

    /// Current descriptor for an endpoint
    pub fn identity(&self, id: EndpointId) -> Result<&EndpointDescriptor, RouteError> {
        self.endpoints
            .get(&id)
            .ok_or(RouteError::UnknownEndpoint(id))
    }

    /// Whether an endpoint is registered and online
    pub fn is_online(&self, id: EndpointId) -> bool {
        self.endpoints.get(&id).is_some_and(|e| e.online)
    }

    /// Ids of all endpoints of a kind, in registration order
    pub fn list_by_kind(&self, kind: EndpointKind) -> Vec<EndpointId> {
        self.endpoints
            .values()
            .filter(|e| e.kind == kind)
            .map(|e| e.id)
            .collect()
    }

    /// Find an endpoint by its configured name
    pub fn find_by_name(&self, name: &str) -> Option<EndpointId> {
        self.endpoints
            .values()
            .find(|e| e.name == name)
            .map(|e| e.id)
    }

    /// Iterate over all endpoints
    pub fn iter(&self) -> impl Iterator<Item = &EndpointDescriptor> {
        self.endpoints.values()
    }
}
