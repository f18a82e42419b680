//! Routing engine
//!
//! The interlock state machine. Each output is either unselected or routed to
//! exactly one source. Select and clear requests always produce a routing
//! command for the switch driver and a feedback instruction describing the
//! whole new display state of the output, so the panels can never be left
//! with two lit selector buttons.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::signal::NormalizedEvent;
use crate::state::{OutputId, OutputState, SelectionSnapshot, SourceIndex};

/// Command for the switch driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteCommand {
    /// Route a source to an output
    ApplyRoute {
        /// Output to route
        output: OutputId,
        /// Source to route
        source: SourceIndex,
    },
    /// Disconnect an output
    ClearRoute {
        /// Output to clear
        output: OutputId,
    },
}

impl RouteCommand {
    /// Output the command affects
    pub fn output(&self) -> OutputId {
        match self {
            Self::ApplyRoute { output, .. } | Self::ClearRoute { output } => *output,
        }
    }
}

/// Instruction for the feedback synchronizer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackInstruction {
    /// Show `source` as the only selected button for `output`
    SetSelectionFeedback {
        /// Output whose buttons change
        output: OutputId,
        /// Source to show as selected
        source: SourceIndex,
    },
    /// Show no selected button for `output`
    ClearSelectionFeedback {
        /// Output whose buttons change
        output: OutputId,
    },
}

impl FeedbackInstruction {
    /// Output and full display state described by this instruction
    pub fn display_state(&self) -> (OutputId, OutputState) {
        match self {
            Self::SetSelectionFeedback { output, source } => {
                (*output, OutputState::SelectedTo(*source))
            }
            Self::ClearSelectionFeedback { output } => (*output, OutputState::Unselected),
        }
    }
}

/// Action emitted by a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineAction {
    /// Send to the switch driver
    Route(RouteCommand),
    /// Send to the feedback synchronizer
    Feedback(FeedbackInstruction),
    /// Informational event passed through unchanged
    Notify(NormalizedEvent),
}

/// The interlock state machine; sole owner of the selection table
#[derive(Debug, Clone, Default)]
pub struct RoutingEngine {
    selection: BTreeMap<OutputId, OutputState>,
}

impl RoutingEngine {
    /// Create an engine with every output unselected
    pub fn new(outputs: impl IntoIterator<Item = OutputId>) -> Self {
        Self {
            selection: outputs
                .into_iter()
                .map(|o| (o, OutputState::Unselected))
                .collect(),
        }
    }

    /// Current state of an output
    pub fn state(&self, output: OutputId) -> Option<OutputState> {
        self.selection.get(&output).copied()
    }

    /// Copy of the whole selection table
    pub fn snapshot(&self) -> SelectionSnapshot {
        self.selection.clone()
    }

    /// Outputs under control
    pub fn outputs(&self) -> impl Iterator<Item = OutputId> + '_ {
        self.selection.keys().copied()
    }

    /// Apply one normalized event and return the resulting actions
    ///
    /// Select and clear are unconditional: repeating the current selection
    /// re-emits the same route and feedback.
    pub fn process(&mut self, event: NormalizedEvent) -> Vec<EngineAction> {
        match event {
            NormalizedEvent::SelectRequested {
                output,
                source,
                origin,
            } => {
                let Some(state) = self.selection.get_mut(&output) else {
                    warn!("Select for unknown {} from {}", output, origin);
                    return Vec::new();
                };
                let previous = std::mem::replace(state, OutputState::SelectedTo(source));
                if previous == OutputState::SelectedTo(source) {
                    debug!("Re-asserting {} on {} (from {})", source, output, origin);
                } else {
                    info!(
                        "Routing {} to {} (from {}, was {:?})",
                        source, output, origin, previous
                    );
                }

                vec![
                    EngineAction::Route(RouteCommand::ApplyRoute { output, source }),
                    EngineAction::Feedback(FeedbackInstruction::SetSelectionFeedback {
                        output,
                        source,
                    }),
                ]
            }

            NormalizedEvent::ClearRequested { output, origin } => {
                let Some(state) = self.selection.get_mut(&output) else {
                    warn!("Clear for unknown {} from {}", output, origin);
                    return Vec::new();
                };
                let previous = std::mem::replace(state, OutputState::Unselected);
                info!("Clearing {} (from {}, was {:?})", output, origin, previous);

                vec![
                    EngineAction::Route(RouteCommand::ClearRoute { output }),
                    EngineAction::Feedback(FeedbackInstruction::ClearSelectionFeedback {
                        output,
                    }),
                ]
            }

            event @ (NormalizedEvent::ReachabilityChanged { .. }
            | NormalizedEvent::IdentityChanged { .. }) => vec![EngineAction::Notify(event)],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::EndpointId;

    const PANEL: EndpointId = EndpointId(1);

    fn select(output: u32, source: u32) -> NormalizedEvent {
        NormalizedEvent::SelectRequested {
            output: OutputId(output),
            source: SourceIndex(source),
            origin: PANEL,
        }
    }

    fn clear(output: u32) -> NormalizedEvent {
        NormalizedEvent::ClearRequested {
            output: OutputId(output),
            origin: PANEL,
        }
    }

    #[test]
    fn test_starts_unselected() {
        let engine = RoutingEngine::new([OutputId(1), OutputId(2)]);
        assert_eq!(engine.state(OutputId(1)), Some(OutputState::Unselected));
        assert_eq!(engine.state(OutputId(2)), Some(OutputState::Unselected));
        assert_eq!(engine.state(OutputId(3)), None);
    }

    #[test]
    fn test_select_emits_route_then_feedback() {
        let mut engine = RoutingEngine::new([OutputId(1)]);

        let actions = engine.process(select(1, 3));
        assert_eq!(
            actions,
            vec![
                EngineAction::Route(RouteCommand::ApplyRoute {
                    output: OutputId(1),
                    source: SourceIndex(3),
                }),
                EngineAction::Feedback(FeedbackInstruction::SetSelectionFeedback {
                    output: OutputId(1),
                    source: SourceIndex(3),
                }),
            ]
        );
        assert_eq!(
            engine.state(OutputId(1)),
            Some(OutputState::SelectedTo(SourceIndex(3)))
        );
    }

    #[test]
    fn test_clear_from_any_state() {
        let mut engine = RoutingEngine::new([OutputId(1)]);

        // Clear while unselected still emits
        let actions = engine.process(clear(1));
        assert_eq!(actions.len(), 2);

        engine.process(select(1, 2));
        let actions = engine.process(clear(1));
        assert_eq!(
            actions,
            vec![
                EngineAction::Route(RouteCommand::ClearRoute {
                    output: OutputId(1)
                }),
                EngineAction::Feedback(FeedbackInstruction::ClearSelectionFeedback {
                    output: OutputId(1)
                }),
            ]
        );
        assert_eq!(engine.state(OutputId(1)), Some(OutputState::Unselected));
    }

    #[test]
    fn test_reselect_is_idempotent() {
        let mut once = RoutingEngine::new([OutputId(1)]);
        let first = once.process(select(1, 4));

        let mut twice = RoutingEngine::new([OutputId(1)]);
        twice.process(select(1, 4));
        let second = twice.process(select(1, 4));

        assert_eq!(first, second);
        assert_eq!(once.snapshot(), twice.snapshot());
    }

    #[test]
    fn test_outputs_are_independent() {
        let mut engine = RoutingEngine::new([OutputId(1), OutputId(2)]);
        engine.process(select(1, 1));
        engine.process(select(2, 5));
        engine.process(clear(1));

        assert_eq!(engine.state(OutputId(1)), Some(OutputState::Unselected));
        assert_eq!(
            engine.state(OutputId(2)),
            Some(OutputState::SelectedTo(SourceIndex(5)))
        );
    }

    #[test]
    fn test_informational_events_pass_through() {
        let mut engine = RoutingEngine::new([OutputId(1)]);
        engine.process(select(1, 2));
        let before = engine.snapshot();

        let event = NormalizedEvent::ReachabilityChanged {
            endpoint: PANEL,
            online: false,
        };
        let actions = engine.process(event.clone());

        assert_eq!(actions, vec![EngineAction::Notify(event)]);
        assert_eq!(engine.snapshot(), before);
    }

    #[test]
    fn test_unknown_output_is_ignored() {
        let mut engine = RoutingEngine::new([OutputId(1)]);
        assert!(engine.process(select(7, 1)).is_empty());
        assert!(engine.process(clear(7)).is_empty());
        assert_eq!(engine.outputs().count(), 1);
    }
}
