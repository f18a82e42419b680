//! Signal dispatcher
//!
//! Normalizes raw endpoint events. Digital presses are looked up in the
//! originating surface's [`ButtonMap`]; anything without a role is dropped.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::config::{ButtonMap, ButtonRole};
use crate::error::RouteError;
use crate::registry::{EndpointId, EndpointRegistry};
use crate::signal::{NormalizedEvent, RawEvent, SignalValue};
use crate::state::SourceCatalog;

/// Turns raw endpoint events into [`NormalizedEvent`]s
#[derive(Debug, Default)]
pub struct SignalDispatcher {
    surfaces: HashMap<EndpointId, ButtonMap>,
    catalog: SourceCatalog,
}

impl SignalDispatcher {
    /// Create a dispatcher validating selections against `catalog`
    pub fn new(catalog: SourceCatalog) -> Self {
        Self {
            surfaces: HashMap::new(),
            catalog,
        }
    }

    /// Bind a surface's button map
    pub fn bind_surface(&mut self, surface: EndpointId, buttons: ButtonMap) {
        self.surfaces.insert(surface, buttons);
    }

    /// Normalize one raw event
    ///
    /// Returns an empty list for signals the core ignores (releases, analog
    /// and serial joins, joins without a role).
    pub fn handle(
        &self,
        registry: &EndpointRegistry,
        event: RawEvent,
    ) -> Result<Vec<NormalizedEvent>, RouteError> {
        let endpoint = registry.identity(event.endpoint())?;

        match event {
            RawEvent::Signal {
                endpoint: origin,
                join,
                value,
            } => {
                let SignalValue::Digital(pressed) = value else {
                    debug!("Ignoring non-digital join {} from {}", join, endpoint.name);
                    return Ok(Vec::new());
                };
                if !pressed {
                    return Ok(Vec::new());
                }
                let Some(buttons) = self.surfaces.get(&origin) else {
                    debug!("Ignoring join {} from non-surface {}", join, endpoint.name);
                    return Ok(Vec::new());
                };

                match buttons.role(join) {
                    Some(ButtonRole::Select { output, slot }) => {
                        if !self.catalog.contains(slot) {
                            warn!(
                                "{} pressed join {} for source {} outside catalog",
                                endpoint.name, join, slot.0
                            );
                            return Err(RouteError::InvalidSourceIndex {
                                index: slot.0,
                                catalog_len: self.catalog.len(),
                            });
                        }
                        Ok(vec![NormalizedEvent::SelectRequested {
                            output,
                            source: slot,
                            origin,
                        }])
                    }
                    Some(ButtonRole::Clear { output }) => {
                        Ok(vec![NormalizedEvent::ClearRequested { output, origin }])
                    }
                    None => {
                        debug!("Ignoring unmapped join {} from {}", join, endpoint.name);
                        Ok(Vec::new())
                    }
                }
            }

            RawEvent::Reachability { endpoint, online } => {
                Ok(vec![NormalizedEvent::ReachabilityChanged { endpoint, online }])
            }

            RawEvent::Identity { endpoint: id, .. } => Ok(vec![NormalizedEvent::IdentityChanged {
                endpoint: id,
                descriptor: endpoint.clone(),
            }]),
        }
    }
}
