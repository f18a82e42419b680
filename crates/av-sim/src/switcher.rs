//! Virtual matrix switcher for testing
//!
//! Tracks which input is routed to each output based on the commands it
//! receives. Faults can be injected to exercise the controller's error paths.

use std::collections::BTreeMap;

use av_route::{OutputId, SwitcherAck, SwitcherCommand};
use tracing::debug;

/// Fault injected into a virtual switcher
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SwitcherFault {
    /// Behave normally
    #[default]
    None,
    /// Reject every command with the given reason
    Reject(String),
    /// Never acknowledge (the controller sees a timeout)
    Stall,
}

/// Virtual matrix switcher
///
/// Outputs hold `None` when disconnected. Every received command is kept for
/// test verification, including ones that were rejected.
#[derive(Debug)]
pub struct VirtualSwitcher {
    /// Identifier for logging
    id: String,
    inputs: u32,
    routes: BTreeMap<OutputId, Option<u32>>,
    fault: SwitcherFault,
    /// Commands received (for test verification)
    received_commands: Vec<SwitcherCommand>,
}

impl VirtualSwitcher {
    /// Create a switcher with `inputs` inputs and the given outputs, all disconnected
    pub fn new(id: impl Into<String>, inputs: u32, outputs: impl IntoIterator<Item = OutputId>) -> Self {
        Self {
            id: id.into(),
            inputs,
            routes: outputs.into_iter().map(|o| (o, None)).collect(),
            fault: SwitcherFault::None,
            received_commands: Vec::new(),
        }
    }

    /// Get the identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Input currently routed to `output`
    pub fn routed(&self, output: OutputId) -> Option<u32> {
        self.routes.get(&output).copied().flatten()
    }

    /// Full routing table
    pub fn routes(&self) -> &BTreeMap<OutputId, Option<u32>> {
        &self.routes
    }

    /// Current fault
    pub fn fault(&self) -> &SwitcherFault {
        &self.fault
    }

    /// Inject a fault
    pub fn set_fault(&mut self, fault: SwitcherFault) {
        self.fault = fault;
    }

    /// Commands received so far
    pub fn received_commands(&self) -> &[SwitcherCommand] {
        &self.received_commands
    }

    /// Execute a command and produce the acknowledgement
    ///
    /// Returns `None` when the switcher is stalled and must not answer.
    pub fn process_command(&mut self, command: SwitcherCommand) -> Option<SwitcherAck> {
        self.received_commands.push(command);

        match &self.fault {
            SwitcherFault::None => {}
            SwitcherFault::Reject(reason) => return Some(Err(reason.clone())),
            SwitcherFault::Stall => return None,
        }

        let (output, input) = match command {
            SwitcherCommand::SetVideoOut { output, input } => {
                if input == 0 || input > self.inputs {
                    return Some(Err(format!("no input {}", input)));
                }
                (output, Some(input))
            }
            SwitcherCommand::ClearVideoOut { output } => (output, None),
        };

        let Some(slot) = self.routes.get_mut(&output) else {
            return Some(Err(format!("no {}", output)));
        };
        *slot = input;
        debug!("Virtual switcher {} routed {:?} to {}", self.id, input, output);
        Some(Ok(()))
    }
}
