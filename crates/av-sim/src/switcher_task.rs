//! Virtual switcher actor task
//!
//! Owns a [`VirtualSwitcher`] and serves the controller's switcher link. The
//! task uses a select! loop to:
//! - Execute requests from the link and acknowledge them
//! - Handle fault injection and shutdown commands from a channel
//! - Emit routing table changes via a broadcast channel

use std::collections::BTreeMap;

use av_route::{OutputId, SwitcherAck, SwitcherRequest};
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::{SwitcherFault, VirtualSwitcher};

/// Commands that can be sent to a virtual switcher actor
#[derive(Debug, Clone)]
pub enum VirtualSwitcherCommand {
    /// Inject a fault (or clear it with `SwitcherFault::None`)
    SetFault(SwitcherFault),
    /// Shutdown the virtual switcher actor
    Shutdown,
}

/// State event emitted when the routing table changes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualSwitcherStateEvent {
    /// Input routed to each output (None when disconnected)
    pub routes: BTreeMap<OutputId, Option<u32>>,
}

/// Run the virtual switcher actor task
///
/// Acknowledgements for commands received while stalled are held until the
/// stall is lifted or the task ends, so the controller observes a timeout
/// rather than a closed link.
pub async fn run_virtual_switcher_task(
    mut requests: mpsc::Receiver<SwitcherRequest>,
    mut switcher: VirtualSwitcher,
    mut cmd_rx: mpsc::Receiver<VirtualSwitcherCommand>,
    state_tx: broadcast::Sender<VirtualSwitcherStateEvent>,
) {
    let mut stalled: Vec<oneshot::Sender<SwitcherAck>> = Vec::new();

    info!("Starting virtual switcher task for {}", switcher.id());

    // Emit initial state
    let _ = state_tx.send(VirtualSwitcherStateEvent {
        routes: switcher.routes().clone(),
    });

    loop {
        tokio::select! {
            request = requests.recv() => {
                let Some(SwitcherRequest { command, ack }) = request else {
                    debug!("Switcher link closed for {}", switcher.id());
                    break;
                };

                let before = switcher.routes().clone();
                match switcher.process_command(command) {
                    Some(Ok(())) => {
                        debug!("Virtual switcher {} executed {:?}", switcher.id(), command);
                        let _ = ack.send(Ok(()));
                    }
                    Some(Err(reason)) => {
                        warn!("Virtual switcher {} rejected {:?}: {}", switcher.id(), command, reason);
                        let _ = ack.send(Err(reason));
                    }
                    None => {
                        debug!("Virtual switcher {} stalled on {:?}", switcher.id(), command);
                        stalled.push(ack);
                    }
                }

                if *switcher.routes() != before {
                    let _ = state_tx.send(VirtualSwitcherStateEvent {
                        routes: switcher.routes().clone(),
                    });
                }
            }

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(VirtualSwitcherCommand::SetFault(fault)) => {
                        info!("Virtual switcher {} fault set to {:?}", switcher.id(), fault);
                        if fault != SwitcherFault::Stall && !stalled.is_empty() {
                            // Commands taken while stalled were never executed
                            debug!(
                                "Virtual switcher {} dropping {} unanswered commands",
                                switcher.id(),
                                stalled.len()
                            );
                            stalled.clear();
                        }
                        switcher.set_fault(fault);
                    }
                    Some(VirtualSwitcherCommand::Shutdown) => {
                        info!("Shutdown requested for virtual switcher {}", switcher.id());
                        break;
                    }
                    None => {
                        debug!("Command channel closed for virtual switcher {}", switcher.id());
                        break;
                    }
                }
            }
        }
    }

    info!(
        "Virtual switcher task ended for {} ({} unanswered)",
        switcher.id(),
        stalled.len()
    );
}
