//! Simulated room
//!
//! Wires a room controller to one [`VirtualPanel`] per configured surface and
//! a [`VirtualSwitcher`], each running as its own actor task. The harness
//! plays the part of the transport: it forwards raw events to the controller
//! and hands out broadcast subscriptions for what the simulated devices show.

use std::collections::BTreeMap;
use std::time::Duration;

use av_route::{
    spawn_controller, Controller, ControllerCommand, EndpointDescriptor, EndpointId, RawEvent,
    RoomConfig, RoomEvent, SelectionSnapshot,
};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::SimError;
use crate::{
    run_virtual_panel_task, run_virtual_switcher_task, SwitcherFault, VirtualPanel,
    VirtualPanelCommand, VirtualPanelStateEvent, VirtualSwitcher, VirtualSwitcherCommand,
    VirtualSwitcherStateEvent,
};

/// Broadcast capacity for simulated device state
const STATE_CHANNEL_CAPACITY: usize = 64;

struct PanelHandle {
    cmd_tx: mpsc::Sender<VirtualPanelCommand>,
    state_tx: broadcast::Sender<VirtualPanelStateEvent>,
}

/// A controller plus simulated panels and switcher
pub struct SimRoom {
    cmd_tx: mpsc::Sender<ControllerCommand>,
    events: mpsc::Receiver<RoomEvent>,
    switcher: EndpointId,
    surfaces: BTreeMap<String, EndpointId>,
    switcher_cmd_tx: mpsc::Sender<VirtualSwitcherCommand>,
    switcher_state_tx: broadcast::Sender<VirtualSwitcherStateEvent>,
    panels: BTreeMap<EndpointId, PanelHandle>,
    tasks: Vec<JoinHandle<()>>,
}

impl SimRoom {
    /// Validate `config`, spawn every actor and attach the device links
    ///
    /// All endpoints start offline.
    pub async fn start(config: &RoomConfig) -> Result<Self, SimError> {
        let controller = Controller::from_config(config)?;
        let switcher = controller.switcher_id();
        let surfaces: BTreeMap<String, EndpointId> = config
            .surfaces
            .iter()
            .filter_map(|s| Some((s.name.clone(), controller.endpoint_id(&s.name)?)))
            .collect();

        let (cmd_tx, events, controller_task) = spawn_controller(controller);
        let mut tasks = vec![controller_task];
        let mut panels = BTreeMap::new();

        for (name, id) in &surfaces {
            let (link, frames) = mpsc::channel(config.queue_capacity);
            let (panel_cmd_tx, panel_cmd_rx) = mpsc::channel(8);
            let (state_tx, _) = broadcast::channel(STATE_CHANNEL_CAPACITY);

            let panel = VirtualPanel::new(name.clone(), *id);
            tasks.push(tokio::spawn(run_virtual_panel_task(
                frames,
                panel,
                panel_cmd_rx,
                state_tx.clone(),
            )));
            cmd_tx
                .send(ControllerCommand::AttachSurface { surface: *id, link })
                .await
                .map_err(|_| SimError::ControllerClosed)?;

            panels.insert(
                *id,
                PanelHandle {
                    cmd_tx: panel_cmd_tx,
                    state_tx,
                },
            );
        }

        let (link, requests) = mpsc::channel(config.queue_capacity);
        let (switcher_cmd_tx, switcher_cmd_rx) = mpsc::channel(8);
        let (switcher_state_tx, _) = broadcast::channel(STATE_CHANNEL_CAPACITY);
        let virtual_switcher = VirtualSwitcher::new(
            config.switcher.name.clone(),
            config.sources.len() as u32,
            config.outputs.iter().copied(),
        );
        tasks.push(tokio::spawn(run_virtual_switcher_task(
            requests,
            virtual_switcher,
            switcher_cmd_rx,
            switcher_state_tx.clone(),
        )));
        cmd_tx
            .send(ControllerCommand::AttachSwitcher { link })
            .await
            .map_err(|_| SimError::ControllerClosed)?;

        info!(
            "Simulated room started with {} panels and switcher {}",
            panels.len(),
            config.switcher.name
        );

        Ok(Self {
            cmd_tx,
            events,
            switcher,
            surfaces,
            switcher_cmd_tx,
            switcher_state_tx,
            panels,
            tasks,
        })
    }

    /// Surface id by configured name
    pub fn surface(&self, name: &str) -> Result<EndpointId, SimError> {
        self.surfaces
            .get(name)
            .copied()
            .ok_or_else(|| SimError::UnknownSurface(name.to_string()))
    }

    /// All surface ids, keyed by name
    pub fn surfaces(&self) -> &BTreeMap<String, EndpointId> {
        &self.surfaces
    }

    /// Switcher id
    pub fn switcher_id(&self) -> EndpointId {
        self.switcher
    }

    /// Forward a raw event to the controller
    pub async fn send(&self, event: RawEvent) -> Result<(), SimError> {
        self.cmd_tx
            .send(ControllerCommand::Ingest { event })
            .await
            .map_err(|_| SimError::ControllerClosed)
    }

    /// Report an endpoint's reachability
    pub async fn set_online(&self, endpoint: EndpointId, online: bool) -> Result<(), SimError> {
        self.send(RawEvent::Reachability { endpoint, online }).await
    }

    /// Bring the switcher and then every surface online
    pub async fn bring_all_online(&self) -> Result<(), SimError> {
        self.set_online(self.switcher, true).await?;
        for id in self.surfaces.values() {
            self.set_online(*id, true).await?;
        }
        Ok(())
    }

    /// Press and release a button the way a user would
    pub async fn press(&self, surface: EndpointId, join: u32) -> Result<(), SimError> {
        self.send(RawEvent::press(surface, join)).await?;
        self.send(RawEvent::release(surface, join)).await
    }

    /// Inject a switcher fault
    pub async fn set_switcher_fault(&self, fault: SwitcherFault) -> Result<(), SimError> {
        self.switcher_cmd_tx
            .send(VirtualSwitcherCommand::SetFault(fault))
            .await
            .map_err(|_| SimError::ControllerClosed)
    }

    /// Current selection table
    pub async fn selection(&self) -> Result<SelectionSnapshot, SimError> {
        let (response, rx) = oneshot::channel();
        self.cmd_tx
            .send(ControllerCommand::QuerySelection { response })
            .await
            .map_err(|_| SimError::ControllerClosed)?;
        rx.await.map_err(|_| SimError::ControllerClosed)
    }

    /// Registry entry for an endpoint
    pub async fn endpoint(&self, endpoint: EndpointId) -> Result<Option<EndpointDescriptor>, SimError> {
        let (response, rx) = oneshot::channel();
        self.cmd_tx
            .send(ControllerCommand::QueryEndpoint { endpoint, response })
            .await
            .map_err(|_| SimError::ControllerClosed)?;
        rx.await.map_err(|_| SimError::ControllerClosed)
    }

    /// Subscribe to what a panel shows
    pub fn subscribe_panel(&self, surface: EndpointId) -> Option<broadcast::Receiver<VirtualPanelStateEvent>> {
        self.panels.get(&surface).map(|p| p.state_tx.subscribe())
    }

    /// Subscribe to the switcher's routing table
    pub fn subscribe_switcher(&self) -> broadcast::Receiver<VirtualSwitcherStateEvent> {
        self.switcher_state_tx.subscribe()
    }

    /// Next controller event, if one arrives within `timeout`
    pub async fn next_event(&mut self, timeout: Duration) -> Option<RoomEvent> {
        tokio::time::timeout(timeout, self.events.recv()).await.ok().flatten()
    }

    /// First controller event matching `pred` within `timeout`
    ///
    /// Non-matching events are discarded.
    pub async fn wait_for_event<F>(&mut self, timeout: Duration, mut pred: F) -> Option<RoomEvent>
    where
        F: FnMut(&RoomEvent) -> bool,
    {
        let events = &mut self.events;
        tokio::time::timeout(timeout, async {
            while let Some(event) = events.recv().await {
                if pred(&event) {
                    return Some(event);
                }
            }
            None
        })
        .await
        .ok()
        .flatten()
    }

    /// Stop every actor and wait for them to finish
    pub async fn shutdown(self) {
        let _ = self.cmd_tx.send(ControllerCommand::Shutdown).await;
        let _ = self.switcher_cmd_tx.send(VirtualSwitcherCommand::Shutdown).await;
        for panel in self.panels.values() {
            let _ = panel.cmd_tx.send(VirtualPanelCommand::Shutdown).await;
        }

        // Outcome tasks may still be waiting on a full event queue
        drop(self.events);

        for task in self.tasks {
            if let Err(e) = task.await {
                debug!("Simulated room task ended abnormally: {}", e);
            }
        }
        info!("Simulated room stopped");
    }
}

/// First broadcast value matching `pred` within `timeout`
///
/// Lagged receivers skip ahead rather than fail.
pub async fn wait_for_state<T, F>(
    rx: &mut broadcast::Receiver<T>,
    timeout: Duration,
    mut pred: F,
) -> Option<T>
where
    T: Clone,
    F: FnMut(&T) -> bool,
{
    tokio::time::timeout(timeout, async {
        loop {
            match rx.recv().await {
                Ok(value) if pred(&value) => return Some(value),
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    })
    .await
    .ok()
    .flatten()
}
