//! Switch driver adapter
//!
//! Translates [`RouteCommand`]s into [`SwitcherCommand`]s and hands them to
//! the switcher transport over an `mpsc` link. Each request carries a oneshot
//! acknowledgement. Queueing is synchronous so commands reach the switcher in
//! the order they were issued; waiting for the acknowledgement is a separate
//! future ([`PendingCommand::outcome`]) bounded by the command timeout.

use std::time::Duration;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::engine::RouteCommand;
use crate::error::DriverError;
use crate::state::{OutputId, SourceIndex};

/// Command as understood by the matrix switcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitcherCommand {
    /// Connect `input` to `output`'s video out
    SetVideoOut {
        /// Switcher output
        output: OutputId,
        /// Switcher input
        input: u32,
    },
    /// Disconnect `output`'s video out
    ClearVideoOut {
        /// Switcher output
        output: OutputId,
    },
}

impl From<&RouteCommand> for SwitcherCommand {
    fn from(cmd: &RouteCommand) -> Self {
        match *cmd {
            RouteCommand::ApplyRoute { output, source } => Self::SetVideoOut {
                output,
                input: source.as_u32(),
            },
            RouteCommand::ClearRoute { output } => Self::ClearVideoOut { output },
        }
    }
}

/// Switcher acknowledgement; `Err` carries the switcher's reason
pub type SwitcherAck = Result<(), String>;

/// Request sent over the switcher link
#[derive(Debug)]
pub struct SwitcherRequest {
    /// Command to execute
    pub command: SwitcherCommand,
    /// Where to send the acknowledgement
    pub ack: oneshot::Sender<SwitcherAck>,
}

/// Sender half of the switcher link
pub type SwitcherLink = mpsc::Sender<SwitcherRequest>;

/// A queued command awaiting acknowledgement
#[derive(Debug)]
pub struct PendingCommand {
    command: SwitcherCommand,
    ack: oneshot::Receiver<SwitcherAck>,
    timeout: Duration,
}

impl PendingCommand {
    /// Command that was queued
    pub fn command(&self) -> SwitcherCommand {
        self.command
    }

    /// Wait for the switcher's acknowledgement
    pub async fn outcome(self) -> Result<(), DriverError> {
        match tokio::time::timeout(self.timeout, self.ack).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(reason))) => Err(DriverError::Rejected(reason)),
            Ok(Err(_)) => Err(DriverError::LinkClosed),
            Err(_) => Err(DriverError::Timeout(self.timeout.as_millis() as u64)),
        }
    }
}

/// Adapter between the routing engine and the switcher transport
#[derive(Debug)]
pub struct SwitchDriver {
    link: Option<SwitcherLink>,
    online: bool,
    timeout: Duration,
}

impl SwitchDriver {
    /// Create a driver with the given acknowledgement timeout
    pub fn new(timeout: Duration) -> Self {
        Self {
            link: None,
            online: false,
            timeout,
        }
    }

    /// Attach the switcher link
    pub fn attach(&mut self, link: SwitcherLink) {
        self.link = Some(link);
    }

    /// Record switcher reachability
    pub fn set_online(&mut self, online: bool) {
        self.online = online;
    }

    /// Whether the switcher is reachable
    pub fn is_online(&self) -> bool {
        self.online
    }

    /// Acknowledgement timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Queue a routing command without waiting for it to complete
    pub fn submit(&self, cmd: &RouteCommand) -> Result<PendingCommand, DriverError> {
        if !self.online {
            return Err(DriverError::Offline);
        }
        let link = self.link.as_ref().ok_or(DriverError::NotAttached)?;

        let command = SwitcherCommand::from(cmd);
        let (ack_tx, ack_rx) = oneshot::channel();

        link.try_send(SwitcherRequest {
            command,
            ack: ack_tx,
        })
        .map_err(|e| match e {
            TrySendError::Full(_) => DriverError::Busy,
            TrySendError::Closed(_) => DriverError::LinkClosed,
        })?;

        debug!("Queued {:?}", command);
        Ok(PendingCommand {
            command,
            ack: ack_rx,
            timeout: self.timeout,
        })
    }

    /// Route `source` to `output` and wait for the acknowledgement
    pub async fn apply_route(&self, output: OutputId, source: SourceIndex) -> Result<(), DriverError> {
        self.submit(&RouteCommand::ApplyRoute { output, source })?
            .outcome()
            .await
    }

    /// Clear `output` and wait for the acknowledgement
    pub async fn clear_route(&self, output: OutputId) -> Result<(), DriverError> {
        self.submit(&RouteCommand::ClearRoute { output })?
            .outcome()
            .await
    }
}
