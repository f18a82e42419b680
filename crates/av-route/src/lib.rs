//! AV Room Routing Core
//!
//! This crate provides the control logic for a single-room AV switching
//! system: control surfaces (touch panels, software panels) select which
//! source is routed to each switcher output, and every surface shows the
//! same selection.
//!
//! # Architecture
//!
//! Raw events from all endpoints flow through one queue into the
//! [`Controller`] actor, which runs them through a fixed pipeline:
//!
//! - **Registry**: Tracks every endpoint, its reachability and address
//! - **Dispatcher**: Maps surface button presses to select/clear requests
//! - **Routing engine**: Interlock state machine, one selection per output
//! - **Switch driver**: Sends route commands to the switcher with a timeout
//! - **Feedback**: Rewrites the whole button group on every reachable surface
//!
//! Everything observers care about is emitted through a unified
//! [`RoomEvent`] stream.
//!
//! # Example
//!
//! ```rust,no_run
//! use av_route::{Controller, OutputId, RawEvent, RoomConfig};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let mut controller = Controller::from_config(&RoomConfig::default())?;
//! let panel = controller.endpoint_id("Touch Panel").unwrap();
//! let (event_tx, _event_rx) = tokio::sync::mpsc::channel(64);
//!
//! controller
//!     .ingest(RawEvent::Reachability { endpoint: panel, online: true }, &event_tx)
//!     .await?;
//! controller.ingest(RawEvent::press(panel, 12), &event_tx).await?;
//! assert!(controller.engine().state(OutputId(1)).is_some());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod controller;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod events;
pub mod feedback;
pub mod registry;
pub mod signal;
pub mod state;
pub mod switcher;

// Re-export actor types
pub use controller::{run_controller, spawn_controller, Controller, ControllerCommand};

// Re-export configuration
pub use config::{
    ButtonGroupConfig, ButtonMap, ButtonRole, RoomConfig, SurfaceConfig, SwitcherConfig,
    MAX_SPARE_BUTTONS,
};

// Re-export pipeline stages
pub use dispatcher::SignalDispatcher;
pub use engine::{EngineAction, FeedbackInstruction, RouteCommand, RoutingEngine};
pub use feedback::{FeedbackFrame, FeedbackSignal, FeedbackSynchronizer, SurfaceLink};
pub use registry::{Endpoint, EndpointDescriptor, EndpointId, EndpointKind, EndpointRegistry};
pub use switcher::{
    PendingCommand, SwitchDriver, SwitcherAck, SwitcherCommand, SwitcherLink, SwitcherRequest,
};

// Re-export event and state types
pub use error::{ConfigError, DriverError, RouteError};
pub use events::RoomEvent;
pub use signal::{NormalizedEvent, RawEvent, SignalValue};
pub use state::{OutputId, OutputState, SelectionSnapshot, Source, SourceCatalog, SourceIndex};
