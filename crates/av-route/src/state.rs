//! Outputs, sources and per-output selection state

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Switcher output identifier (hardware numbering)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutputId(pub u32);

impl OutputId {
    /// Get the raw output number
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for OutputId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "output {}", self.0)
    }
}

/// 1-based source index, matching the switcher's input numbering
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceIndex(pub u32);

impl SourceIndex {
    /// Get the raw index
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for SourceIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "input {}", self.0)
    }
}

/// A selectable input device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    /// Position in the catalog
    pub index: SourceIndex,
    /// Display name shown on the panels
    pub name: String,
}

/// Ordered, immutable source catalog
#[derive(Debug, Clone, Default)]
pub struct SourceCatalog {
    sources: Vec<Source>,
}

impl SourceCatalog {
    /// Build a catalog from display names; indices are assigned from 1
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let sources = names
            .into_iter()
            .zip(1u32..)
            .map(|(name, i)| Source {
                index: SourceIndex(i),
                name: name.into(),
            })
            .collect();
        Self { sources }
    }

    /// Look up a source by index
    pub fn get(&self, index: SourceIndex) -> Option<&Source> {
        let pos = index.0.checked_sub(1)? as usize;
        self.sources.get(pos)
    }

    /// Check whether an index is inside the catalog
    pub fn contains(&self, index: SourceIndex) -> bool {
        self.get(index).is_some()
    }

    /// Display name for an index
    pub fn name(&self, index: SourceIndex) -> Option<&str> {
        self.get(index).map(|s| s.name.as_str())
    }

    /// Number of sources
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// True when there are no sources
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Iterate over sources in index order
    pub fn iter(&self) -> impl Iterator<Item = &Source> {
        self.sources.iter()
    }
}

/// Routing state of a single output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputState {
    /// Nothing routed
    #[default]
    Unselected,
    /// Routed to the given source
    SelectedTo(SourceIndex),
}

impl OutputState {
    /// Selected source, if any
    pub fn selected(&self) -> Option<SourceIndex> {
        match self {
            Self::Unselected => None,
            Self::SelectedTo(source) => Some(*source),
        }
    }
}

/// Point-in-time copy of the selection table
pub type SelectionSnapshot = BTreeMap<OutputId, OutputState>;
