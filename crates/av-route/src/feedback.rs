//! Feedback synchronizer
//!
//! Pushes selection state to every reachable control surface. Every push for
//! an output rewrites the whole button group (each selector join, the clear
//! join and the source-name text), never a delta.

use std::collections::BTreeMap;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use crate::config::{ButtonGroupConfig, SurfaceConfig};
use crate::error::RouteError;
use crate::registry::{EndpointId, EndpointRegistry};
use crate::state::{OutputId, OutputState, SelectionSnapshot, SourceCatalog};

/// A single join write to a surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedbackSignal {
    /// Digital join (true = lit)
    Digital {
        /// Join number
        join: u32,
        /// Value to set
        value: bool,
    },
    /// Serial join (text field)
    Serial {
        /// Join number
        join: u32,
        /// Text to show
        text: String,
    },
}

/// Batch of join writes for one surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackFrame {
    /// Target surface
    pub surface: EndpointId,
    /// Writes, applied in order
    pub signals: Vec<FeedbackSignal>,
}

/// Sender half of a surface's feedback link
pub type SurfaceLink = mpsc::Sender<FeedbackFrame>;

struct SurfaceFeedback {
    name: String,
    groups: Vec<ButtonGroupConfig>,
    program_label_join: Option<u32>,
    link: Option<SurfaceLink>,
}

/// Keeps every reachable surface's buttons and text in line with the selection
pub struct FeedbackSynchronizer {
    catalog: SourceCatalog,
    no_selection_text: String,
    program_label: Option<String>,
    surfaces: BTreeMap<EndpointId, SurfaceFeedback>,
}

impl std::fmt::Debug for FeedbackSynchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedbackSynchronizer")
            .field("catalog", &self.catalog)
            .field("surfaces", &self.surfaces.len())
            .finish()
    }
}

impl FeedbackSynchronizer {
    /// Create a synchronizer
    pub fn new(
        catalog: SourceCatalog,
        no_selection_text: impl Into<String>,
        program_label: Option<String>,
    ) -> Self {
        Self {
            catalog,
            no_selection_text: no_selection_text.into(),
            program_label,
            surfaces: BTreeMap::new(),
        }
    }

    /// Add a surface's button layout
    pub fn add_surface(&mut self, id: EndpointId, config: &SurfaceConfig) {
        self.surfaces.insert(
            id,
            SurfaceFeedback {
                name: config.name.clone(),
                groups: config.groups.clone(),
                program_label_join: config.program_label_join,
                link: None,
            },
        );
    }

    /// Attach the link frames for a surface are written to
    pub fn attach(&mut self, id: EndpointId, link: SurfaceLink) -> Result<(), RouteError> {
        let surface = self
            .surfaces
            .get_mut(&id)
            .ok_or(RouteError::UnknownEndpoint(id))?;
        surface.link = Some(link);
        Ok(())
    }

    /// Join writes describing the full display state of one button group
    pub fn group_signals(&self, group: &ButtonGroupConfig, state: OutputState) -> Vec<FeedbackSignal> {
        let selected = state.selected();
        let mut signals: Vec<FeedbackSignal> = group
            .select_joins()
            .map(|join| FeedbackSignal::Digital {
                join,
                value: selected.is_some() && group.slot_of(join) == selected,
            })
            .collect();

        signals.push(FeedbackSignal::Digital {
            join: group.clear_button,
            value: false,
        });

        let text = selected
            .and_then(|s| self.catalog.name(s))
            .unwrap_or(self.no_selection_text.as_str())
            .to_string();
        signals.push(FeedbackSignal::Serial {
            join: group.source_name_join,
            text,
        });

        signals
    }

    /// Frames for every reachable surface showing `output`
    pub fn frames_for(
        &self,
        registry: &EndpointRegistry,
        output: OutputId,
        state: OutputState,
    ) -> Vec<FeedbackFrame> {
        self.surfaces
            .iter()
            .filter(|(id, _)| registry.is_online(**id))
            .filter_map(|(id, surface)| {
                let group = surface.groups.iter().find(|g| g.output == output)?;
                Some(FeedbackFrame {
                    surface: *id,
                    signals: self.group_signals(group, state),
                })
            })
            .collect()
    }

    /// Full-state frame for one surface
    pub fn full_frame(&self, surface: EndpointId, snapshot: &SelectionSnapshot) -> Option<FeedbackFrame> {
        let config = self.surfaces.get(&surface)?;
        let mut signals = Vec::new();

        if let (Some(join), Some(label)) = (config.program_label_join, &self.program_label) {
            signals.push(FeedbackSignal::Serial {
                join,
                text: label.clone(),
            });
        }
        for group in &config.groups {
            let state = snapshot.get(&group.output).copied().unwrap_or_default();
            signals.extend(self.group_signals(group, state));
        }

        Some(FeedbackFrame { surface, signals })
    }

    /// Push the display state of `output` to every reachable surface
    ///
    /// Returns the number of surfaces the frame was delivered to.
    pub fn sync(&self, registry: &EndpointRegistry, output: OutputId, state: OutputState) -> usize {
        self.frames_for(registry, output, state)
            .into_iter()
            .map(|frame| self.deliver(frame))
            .filter(|delivered| *delivered)
            .count()
    }

    /// Push the whole selection to one surface (used when it comes online)
    pub fn push_full(&self, surface: EndpointId, snapshot: &SelectionSnapshot) -> bool {
        match self.full_frame(surface, snapshot) {
            Some(frame) => self.deliver(frame),
            None => false,
        }
    }

    fn deliver(&self, frame: FeedbackFrame) -> bool {
        let Some(surface) = self.surfaces.get(&frame.surface) else {
            return false;
        };
        let Some(link) = &surface.link else {
            debug!("No feedback link for {}, dropping frame", surface.name);
            return false;
        };

        match link.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!("Feedback queue full for {}, dropping frame", surface.name);
                false
            }
            Err(TrySendError::Closed(_)) => {
                warn!("Feedback link closed for {}", surface.name);
                false
            }
        }
    }
}
