//! Room controller actor
//!
//! The controller owns the registry, dispatcher, routing engine, switch
//! driver and feedback synchronizer. All raw events from every endpoint are
//! funnelled through one `mpsc` queue and handled one at a time, so the
//! selection table has a single writer and events apply in arrival order.
//!
//! Switcher acknowledgements are awaited in spawned tasks; a slow or missing
//! switcher never holds up feedback to the panels.
//!
//! # Example
//!
//! ```rust,ignore
//! use av_route::{spawn_controller, Controller, ControllerCommand, RawEvent, RoomConfig};
//!
//! let controller = Controller::from_config(&RoomConfig::default())?;
//! let panel = controller.endpoint_id("Touch Panel").unwrap();
//! let (cmd_tx, mut event_rx, _task) = spawn_controller(controller);
//!
//! cmd_tx.send(ControllerCommand::Ingest { event: RawEvent::press(panel, 12) }).await?;
//! ```

use std::time::Duration;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::RoomConfig;
use crate::dispatcher::SignalDispatcher;
use crate::engine::{EngineAction, RouteCommand, RoutingEngine};
use crate::error::{ConfigError, RouteError};
use crate::events::RoomEvent;
use crate::feedback::{FeedbackSynchronizer, SurfaceLink};
use crate::registry::{Endpoint, EndpointDescriptor, EndpointId, EndpointKind, EndpointRegistry};
use crate::signal::{NormalizedEvent, RawEvent};
use crate::state::SelectionSnapshot;
use crate::switcher::{SwitchDriver, SwitcherLink};

/// Commands sent to the controller actor
#[derive(Debug)]
pub enum ControllerCommand {
    /// Raw event reported by an endpoint
    Ingest {
        /// The event
        event: RawEvent,
    },

    /// Attach the feedback link for a surface
    AttachSurface {
        /// Surface id
        surface: EndpointId,
        /// Link feedback frames are written to
        link: SurfaceLink,
    },

    /// Attach the switcher link
    AttachSwitcher {
        /// Link switcher requests are written to
        link: SwitcherLink,
    },

    /// Query the current selection table
    QuerySelection {
        /// Channel to send back the snapshot
        response: oneshot::Sender<SelectionSnapshot>,
    },

    /// Query an endpoint's descriptor
    QueryEndpoint {
        /// Endpoint to look up
        endpoint: EndpointId,
        /// Channel to send back the descriptor (None if unknown)
        response: oneshot::Sender<Option<EndpointDescriptor>>,
    },

    /// Shutdown the actor
    Shutdown,
}

/// Room controller state
#[derive(Debug)]
pub struct Controller {
    registry: EndpointRegistry,
    dispatcher: SignalDispatcher,
    engine: RoutingEngine,
    driver: SwitchDriver,
    feedback: FeedbackSynchronizer,
    switcher: EndpointId,
    queue_capacity: usize,
}

impl Controller {
    /// Validate a room description and register its endpoints
    pub fn from_config(config: &RoomConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let catalog = config.catalog();
        let mut registry = EndpointRegistry::new();
        let mut dispatcher = SignalDispatcher::new(catalog.clone());
        let mut feedback = FeedbackSynchronizer::new(
            catalog,
            config.no_selection_text.clone(),
            config.program_label.clone(),
        );

        for surface in &config.surfaces {
            let id = registry.register(Endpoint::surface(surface.name.clone(), surface.ip_id));
            dispatcher.bind_surface(id, surface.button_map());
            feedback.add_surface(id, surface);
        }

        let switcher = registry.register(Endpoint::switcher(
            config.switcher.name.clone(),
            config.switcher.ip_id,
            config.switcher.address.clone(),
        ));

        info!(
            "Configured room: {} sources, {} outputs, {} surfaces, switcher at {}",
            config.sources.len(),
            config.outputs.len(),
            config.surfaces.len(),
            config.switcher.address
        );

        Ok(Self {
            registry,
            dispatcher,
            engine: RoutingEngine::new(config.outputs.iter().copied()),
            driver: SwitchDriver::new(Duration::from_millis(config.command_timeout_ms)),
            feedback,
            switcher,
            queue_capacity: config.queue_capacity,
        })
    }

    /// Endpoint id for a configured name
    pub fn endpoint_id(&self, name: &str) -> Option<EndpointId> {
        self.registry.find_by_name(name)
    }

    /// The switcher's endpoint id
    pub fn switcher_id(&self) -> EndpointId {
        self.switcher
    }

    /// All control surface ids
    pub fn surface_ids(&self) -> Vec<EndpointId> {
        self.registry.list_by_kind(EndpointKind::ControlSurface)
    }

    /// Endpoint registry
    pub fn registry(&self) -> &EndpointRegistry {
        &self.registry
    }

    /// Routing engine
    pub fn engine(&self) -> &RoutingEngine {
        &self.engine
    }

    /// Attach a surface's feedback link
    pub fn attach_surface(&mut self, surface: EndpointId, link: SurfaceLink) -> Result<(), RouteError> {
        self.feedback.attach(surface, link)
    }

    /// Attach the switcher link
    pub fn attach_switcher(&mut self, link: SwitcherLink) {
        self.driver.attach(link);
    }

    /// Handle one raw event end to end
    ///
    /// Rejected events are reported as [`RoomEvent::SignalRejected`] and also
    /// returned as the error.
    pub async fn ingest(
        &mut self,
        event: RawEvent,
        event_tx: &mpsc::Sender<RoomEvent>,
    ) -> Result<(), RouteError> {
        let origin = event.endpoint();

        let normalized = match self.normalize(event) {
            Ok(normalized) => normalized,
            Err(error) => {
                warn!("Rejected event from {}: {}", origin, error);
                emit(
                    event_tx,
                    RoomEvent::SignalRejected {
                        endpoint: origin,
                        error: error.clone(),
                    },
                );
                return Err(error);
            }
        };

        for event in normalized {
            for action in self.engine.process(event) {
                self.perform(action, event_tx);
            }
        }
        Ok(())
    }

    /// Apply registry side effects, then normalize
    fn normalize(&mut self, event: RawEvent) -> Result<Vec<NormalizedEvent>, RouteError> {
        match &event {
            RawEvent::Reachability { endpoint, online } => {
                let previous = self.registry.set_reachability(*endpoint, *online)?;
                if *endpoint == self.switcher {
                    self.driver.set_online(*online);
                }
                if previous == *online {
                    debug!("Repeated reachability {} for {}", online, endpoint);
                }
            }
            RawEvent::Identity { endpoint, address } => {
                self.registry.set_address(*endpoint, address.clone())?;
            }
            RawEvent::Signal { .. } => {}
        }

        self.dispatcher.handle(&self.registry, event)
    }

    fn perform(&mut self, action: EngineAction, event_tx: &mpsc::Sender<RoomEvent>) {
        match action {
            EngineAction::Route(command) => self.dispatch_route(command, event_tx),
            EngineAction::Feedback(instruction) => {
                let (output, state) = instruction.display_state();
                let surfaces_synced = self.feedback.sync(&self.registry, output, state);
                debug!("Synced {} to {} surfaces", output, surfaces_synced);

                emit(
                    event_tx,
                    RoomEvent::SelectionChanged {
                        output,
                        state,
                        surfaces_synced,
                    },
                );
            }
            EngineAction::Notify(event) => self.notify(event, event_tx),
        }
    }

    fn dispatch_route(&self, command: RouteCommand, event_tx: &mpsc::Sender<RoomEvent>) {
        match self.driver.submit(&command) {
            Ok(pending) => {
                let event_tx = event_tx.clone();
                tokio::spawn(async move {
                    let event = match pending.outcome().await {
                        Ok(()) => {
                            debug!("Switcher acknowledged {:?}", command);
                            RoomEvent::RouteApplied { command }
                        }
                        Err(error) => {
                            warn!("Switcher command {:?} failed: {}", command, error);
                            RoomEvent::RouteFailed { command, error }
                        }
                    };
                    let _ = event_tx.send(event).await;
                });
            }
            Err(error) => {
                warn!("Could not send {:?} to switcher: {}", command, error);
                emit(event_tx, RoomEvent::RouteFailed { command, error });
            }
        }
    }

    fn notify(&self, event: NormalizedEvent, event_tx: &mpsc::Sender<RoomEvent>) {
        match event {
            NormalizedEvent::ReachabilityChanged { endpoint, online } => {
                let Ok(descriptor) = self.registry.identity(endpoint) else {
                    return;
                };
                let name = descriptor.name.clone();

                if online {
                    info!("{} is online", name);
                    if descriptor.is_surface() {
                        let snapshot = self.engine.snapshot();
                        if self.feedback.push_full(endpoint, &snapshot) {
                            debug!("Caught up {} with current selection", name);
                        }
                    }
                    emit(event_tx, RoomEvent::EndpointOnline { endpoint, name });
                } else {
                    warn!("{} is offline", name);
                    emit(event_tx, RoomEvent::EndpointOffline { endpoint, name });
                }
            }
            NormalizedEvent::IdentityChanged {
                endpoint,
                descriptor,
            } => {
                info!(
                    "IP information change: {} (IP-ID 0x{:02X}) -> {:?}",
                    descriptor.name, descriptor.ip_id, descriptor.address
                );
                emit(
                    event_tx,
                    RoomEvent::IdentityChanged {
                        endpoint,
                        address: descriptor.address,
                    },
                );
            }
            other => debug!("No informational handling for {:?}", other),
        }
    }
}

/// Hand an event to observers without waiting
///
/// A full queue drops the event; routing and feedback never wait on observers.
fn emit(event_tx: &mpsc::Sender<RoomEvent>, event: RoomEvent) {
    match event_tx.try_send(event) {
        Ok(()) => {}
        Err(TrySendError::Full(event)) => warn!("Event queue full, dropping {:?}", event),
        Err(TrySendError::Closed(_)) => debug!("Event queue closed"),
    }
}

/// Run the controller actor
///
/// Processes commands until `Shutdown` is received or every sender is dropped.
pub async fn run_controller(
    mut controller: Controller,
    mut cmd_rx: mpsc::Receiver<ControllerCommand>,
    event_tx: mpsc::Sender<RoomEvent>,
) {
    info!("Room controller started");

    while let Some(cmd) = cmd_rx.recv().await {
        match cmd {
            ControllerCommand::Ingest { event } => {
                // Failures are already reported on the event stream
                let _ = controller.ingest(event, &event_tx).await;
            }

            ControllerCommand::AttachSurface { surface, link } => {
                if let Err(e) = controller.attach_surface(surface, link) {
                    warn!("Failed to attach surface {}: {}", surface, e);
                } else {
                    debug!("Attached feedback link for {}", surface);
                }
            }

            ControllerCommand::AttachSwitcher { link } => {
                controller.attach_switcher(link);
                debug!("Attached switcher link");
            }

            ControllerCommand::QuerySelection { response } => {
                let _ = response.send(controller.engine.snapshot());
            }

            ControllerCommand::QueryEndpoint { endpoint, response } => {
                let _ = response.send(controller.registry.identity(endpoint).ok().cloned());
            }

            ControllerCommand::Shutdown => {
                info!("Room controller shutting down");
                break;
            }
        }
    }

    info!("Room controller stopped");
}

/// Spawn the controller actor with queues sized from the room configuration
///
/// Returns the command sender, the event receiver and the actor's task handle.
pub fn spawn_controller(
    controller: Controller,
) -> (
    mpsc::Sender<ControllerCommand>,
    mpsc::Receiver<RoomEvent>,
    JoinHandle<()>,
) {
    let (cmd_tx, cmd_rx) = mpsc::channel(controller.queue_capacity);
    let (event_tx, event_rx) = mpsc::channel(controller.queue_capacity);
    let task = tokio::spawn(run_controller(controller, cmd_rx, event_tx));
    (cmd_tx, event_rx, task)
}
