//! Virtual control surface for testing
//!
//! Applies feedback frames to a join table the way a touch panel would, and
//! builds the raw press/release events a user would generate.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use av_route::{EndpointId, FeedbackFrame, FeedbackSignal, RawEvent};

/// Virtual touch panel or software panel
#[derive(Debug, Clone)]
pub struct VirtualPanel {
    name: String,
    surface: EndpointId,
    digital: BTreeMap<u32, bool>,
    serial: BTreeMap<u32, String>,
    frames_applied: usize,
}

impl VirtualPanel {
    /// Create a blank panel for a registered surface
    pub fn new(name: impl Into<String>, surface: EndpointId) -> Self {
        Self {
            name: name.into(),
            surface,
            digital: BTreeMap::new(),
            serial: BTreeMap::new(),
            frames_applied: 0,
        }
    }

    /// Panel name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Surface id in the controller's registry
    pub fn surface(&self) -> EndpointId {
        self.surface
    }

    /// Number of frames applied so far
    pub fn frames_applied(&self) -> usize {
        self.frames_applied
    }

    /// Apply one feedback frame
    ///
    /// Frames addressed to another surface are ignored; returns whether the
    /// frame was applied.
    pub fn apply(&mut self, frame: &FeedbackFrame) -> bool {
        if frame.surface != self.surface {
            return false;
        }
        for signal in &frame.signals {
            match signal {
                FeedbackSignal::Digital { join, value } => {
                    self.digital.insert(*join, *value);
                }
                FeedbackSignal::Serial { join, text } => {
                    self.serial.insert(*join, text.clone());
                }
            }
        }
        self.frames_applied += 1;
        true
    }

    /// Whether a digital join is lit
    pub fn is_lit(&self, join: u32) -> bool {
        self.digital.get(&join).copied().unwrap_or(false)
    }

    /// Lit joins within a range, ascending
    pub fn lit_in(&self, joins: RangeInclusive<u32>) -> Vec<u32> {
        self.digital
            .range(joins)
            .filter(|(_, lit)| **lit)
            .map(|(join, _)| *join)
            .collect()
    }

    /// Text on a serial join
    pub fn text(&self, join: u32) -> Option<&str> {
        self.serial.get(&join).map(String::as_str)
    }

    /// All serial joins
    pub fn texts(&self) -> &BTreeMap<u32, String> {
        &self.serial
    }

    /// Event for a user pressing `join`
    pub fn press(&self, join: u32) -> RawEvent {
        RawEvent::press(self.surface, join)
    }

    /// Event for a user releasing `join`
    pub fn release(&self, join: u32) -> RawEvent {
        RawEvent::release(self.surface, join)
    }
}
