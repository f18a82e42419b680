//! AV Room Simulation Library
//!
//! This crate provides a simulation layer for exercising the room controller
//! without touch panels or a matrix switcher on the network. It includes:
//!
//! - **VirtualPanel**: Applies feedback frames to a join table like a touch panel
//! - **VirtualSwitcher**: Tracks routes and can reject or stall commands
//! - **SimRoom**: Wires a controller to one of each per configured endpoint
//!
//! # Example
//!
//! ```rust,no_run
//! use av_route::RoomConfig;
//! use av_sim::SimRoom;
//!
//! # async fn demo() -> Result<(), av_sim::SimError> {
//! let room = SimRoom::start(&RoomConfig::default()).await?;
//! room.bring_all_online().await?;
//!
//! let panel = room.surface("Touch Panel")?;
//! room.press(panel, 12).await?;
//!
//! room.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod panel;
pub mod panel_task;
pub mod room;
pub mod switcher;
pub mod switcher_task;

pub use error::SimError;
pub use panel::VirtualPanel;
pub use panel_task::{run_virtual_panel_task, VirtualPanelCommand, VirtualPanelStateEvent};
pub use room::{wait_for_state, SimRoom};
pub use switcher::{SwitcherFault, VirtualSwitcher};
pub use switcher_task::{
    run_virtual_switcher_task, VirtualSwitcherCommand, VirtualSwitcherStateEvent,
};
