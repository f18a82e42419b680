//! Virtual panel actor task
//!
//! Owns a [`VirtualPanel`], applies frames from the controller's feedback
//! link and broadcasts what the panel shows after each frame.

use std::collections::BTreeMap;

use av_route::{EndpointId, FeedbackFrame};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info};

use crate::VirtualPanel;

/// Commands that can be sent to a virtual panel actor
#[derive(Debug, Clone)]
pub enum VirtualPanelCommand {
    /// Shutdown the virtual panel actor
    Shutdown,
}

/// What a panel shows after a frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualPanelStateEvent {
    /// Surface id
    pub surface: EndpointId,
    /// Lit digital joins, ascending
    pub lit: Vec<u32>,
    /// Serial join contents
    pub texts: BTreeMap<u32, String>,
}

impl VirtualPanelStateEvent {
    fn capture(panel: &VirtualPanel) -> Self {
        Self {
            surface: panel.surface(),
            lit: panel.lit_in(0..=u32::MAX),
            texts: panel.texts().clone(),
        }
    }

    /// Text on a serial join
    pub fn text(&self, join: u32) -> Option<&str> {
        self.texts.get(&join).map(String::as_str)
    }
}

/// Run the virtual panel actor task
pub async fn run_virtual_panel_task(
    mut frames: mpsc::Receiver<FeedbackFrame>,
    mut panel: VirtualPanel,
    mut cmd_rx: mpsc::Receiver<VirtualPanelCommand>,
    state_tx: broadcast::Sender<VirtualPanelStateEvent>,
) {
    info!("Starting virtual panel task for {}", panel.name());

    loop {
        tokio::select! {
            frame = frames.recv() => {
                let Some(frame) = frame else {
                    debug!("Feedback link closed for {}", panel.name());
                    break;
                };
                if panel.apply(&frame) {
                    let _ = state_tx.send(VirtualPanelStateEvent::capture(&panel));
                }
            }

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(VirtualPanelCommand::Shutdown) => {
                        info!("Shutdown requested for virtual panel {}", panel.name());
                        break;
                    }
                    None => {
                        debug!("Command channel closed for virtual panel {}", panel.name());
                        break;
                    }
                }
            }
        }
    }

    info!(
        "Virtual panel task ended for {} after {} frames",
        panel.name(),
        panel.frames_applied()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use av_route::FeedbackSignal;
    use std::time::Duration;

    #[tokio::test]
    async fn test_frames_are_applied_and_broadcast() {
        let (link, frames) = mpsc::channel(8);
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let (state_tx, mut state_rx) = broadcast::channel(8);
        let panel = VirtualPanel::new("Touch Panel", EndpointId(1));

        let task = tokio::spawn(run_virtual_panel_task(frames, panel, cmd_rx, state_tx));

        link.send(FeedbackFrame {
            surface: EndpointId(1),
            signals: vec![
                FeedbackSignal::Digital {
                    join: 13,
                    value: true,
                },
                FeedbackSignal::Serial {
                    join: 11,
                    text: "BrightSign".to_string(),
                },
            ],
        })
        .await
        .unwrap();

        let state = tokio::time::timeout(Duration::from_millis(100), state_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(state.lit, vec![13]);
        assert_eq!(state.text(11), Some("BrightSign"));

        cmd_tx.send(VirtualPanelCommand::Shutdown).await.unwrap();
        tokio::time::timeout(Duration::from_millis(100), task)
            .await
            .unwrap()
            .unwrap();
    }
}
