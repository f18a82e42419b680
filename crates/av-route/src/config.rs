//! Room configuration
//!
//! The room is described once at startup: the source catalog, the switcher
//! outputs, the switcher endpoint and every control surface with its button
//! groups. [`RoomConfig::validate`] checks the description and
//! [`SurfaceConfig::button_map`] turns each surface's button groups into an
//! explicit join → role table.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::ops::RangeInclusive;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ConfigError;
use crate::state::{OutputId, SourceCatalog, SourceIndex};

/// Switcher endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SwitcherConfig {
    /// Display name
    pub name: String,
    /// Control bus IP-ID
    pub ip_id: u8,
    /// Network address of the switcher
    pub address: String,
}

impl Default for SwitcherConfig {
    fn default() -> Self {
        Self {
            name: "Desk Switcher".to_string(),
            ip_id: 0x12,
            address: "192.168.1.15".to_string(),
        }
    }
}

/// Selector buttons for one output on one surface
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ButtonGroupConfig {
    /// Output these buttons route to
    pub output: OutputId,
    /// Inclusive digital join range; the first join selects source 1
    pub select_range: [u32; 2],
    /// Digital join of the clear button
    pub clear_button: u32,
    /// Serial join of the source-name text field
    pub source_name_join: u32,
}

impl ButtonGroupConfig {
    /// Selector joins in source order
    pub fn select_joins(&self) -> RangeInclusive<u32> {
        self.select_range[0]..=self.select_range[1]
    }

    /// Number of selector buttons
    pub fn width(&self) -> u32 {
        self.select_range[1]
            .saturating_sub(self.select_range[0])
            .saturating_add(1)
    }

    /// Join that selects a given source
    pub fn join_for(&self, source: SourceIndex) -> Option<u32> {
        let offset = source.0.checked_sub(1)?;
        let join = self.select_range[0].checked_add(offset)?;
        self.select_joins().contains(&join).then_some(join)
    }

    /// Source slot addressed by a selector join
    pub fn slot_of(&self, join: u32) -> Option<SourceIndex> {
        self.select_joins()
            .contains(&join)
            .then(|| SourceIndex(join - self.select_range[0] + 1))
    }
}

/// Control surface configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SurfaceConfig {
    /// Display name
    pub name: String,
    /// Control bus IP-ID
    pub ip_id: u8,
    /// Serial join showing the program label
    #[serde(default)]
    pub program_label_join: Option<u32>,
    /// Button groups, one per output
    pub groups: Vec<ButtonGroupConfig>,
}

/// Role of a digital join on a control surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonRole {
    /// Selects a source slot on an output
    Select {
        /// Output the button routes
        output: OutputId,
        /// Source slot (may exceed the catalog for spare buttons)
        slot: SourceIndex,
    },
    /// Clears an output
    Clear {
        /// Output the button clears
        output: OutputId,
    },
}

/// Join → role table for one surface
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ButtonMap {
    roles: HashMap<u32, ButtonRole>,
}

impl ButtonMap {
    /// Role of a digital join, if it has one
    pub fn role(&self, join: u32) -> Option<ButtonRole> {
        self.roles.get(&join).copied()
    }

    /// Number of mapped joins
    pub fn len(&self) -> usize {
        self.roles.len()
    }

    /// True when no joins are mapped
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

impl SurfaceConfig {
    /// Build the join → role table for this surface
    ///
    /// Call after [`RoomConfig::validate`]; later groups win on overlapping joins.
    pub fn button_map(&self) -> ButtonMap {
        let mut roles = HashMap::new();
        for group in &self.groups {
            for join in group.select_joins() {
                if let Some(slot) = group.slot_of(join) {
                    roles.insert(
                        join,
                        ButtonRole::Select {
                            output: group.output,
                            slot,
                        },
                    );
                }
            }
            roles.insert(
                group.clear_button,
                ButtonRole::Clear {
                    output: group.output,
                },
            );
        }
        ButtonMap { roles }
    }

    /// Button group for an output, if this surface has one
    pub fn group_for(&self, output: OutputId) -> Option<&ButtonGroupConfig> {
        self.groups.iter().find(|g| g.output == output)
    }
}

/// Complete room description
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoomConfig {
    /// Source display names, in switcher input order
    pub sources: Vec<String>,
    /// Switcher outputs under control
    #[serde(default = "default_outputs")]
    pub outputs: Vec<OutputId>,
    /// Switcher endpoint
    #[serde(default)]
    pub switcher: SwitcherConfig,
    /// Control surfaces
    pub surfaces: Vec<SurfaceConfig>,
    /// Text written to each surface's program label join
    #[serde(default)]
    pub program_label: Option<String>,
    /// Source-name text shown when an output has no selection
    #[serde(default = "default_no_selection_text")]
    pub no_selection_text: String,
    /// Time allowed for the switcher to acknowledge a command
    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,
    /// Capacity of the controller's event queue
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

/// Buttons a select range may have beyond the source catalog
pub const MAX_SPARE_BUTTONS: usize = 128;

fn default_outputs() -> Vec<OutputId> {
    vec![OutputId(1)]
}

fn default_no_selection_text() -> String {
    "No Input Selected".to_string()
}

fn default_command_timeout_ms() -> u64 {
    2000
}

fn default_queue_capacity() -> usize {
    256
}

fn desk_group() -> ButtonGroupConfig {
    ButtonGroupConfig {
        output: OutputId(1),
        select_range: [11, 15],
        clear_button: 16,
        source_name_join: 11,
    }
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            sources: vec![
                "Main PC".to_string(),
                "Laptop".to_string(),
                "BrightSign".to_string(),
                "AppleTv".to_string(),
                "Video Conference".to_string(),
            ],
            outputs: default_outputs(),
            switcher: SwitcherConfig::default(),
            surfaces: vec![
                SurfaceConfig {
                    name: "Touch Panel".to_string(),
                    ip_id: 0x03,
                    program_label_join: Some(10),
                    groups: vec![desk_group()],
                },
                SurfaceConfig {
                    name: "Xpanel".to_string(),
                    ip_id: 0x04,
                    program_label_join: Some(10),
                    groups: vec![desk_group()],
                },
            ],
            program_label: Some("Beta - Prog".to_string()),
            no_selection_text: default_no_selection_text(),
            command_timeout_ms: default_command_timeout_ms(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl RoomConfig {
    /// Parse and validate a JSON room description
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON room description from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Build the source catalog
    pub fn catalog(&self) -> SourceCatalog {
        SourceCatalog::new(self.sources.iter().cloned())
    }

    /// Check the room description for consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sources.is_empty() {
            return Err(ConfigError::EmptyCatalog);
        }
        if self.outputs.is_empty() {
            return Err(ConfigError::NoOutputs);
        }
        if self.command_timeout_ms == 0 {
            return Err(ConfigError::InvalidSetting {
                name: "command_timeout_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::InvalidSetting {
                name: "queue_capacity",
                reason: "must be greater than zero".to_string(),
            });
        }

        let mut outputs = BTreeSet::new();
        for output in &self.outputs {
            if !outputs.insert(*output) {
                return Err(ConfigError::DuplicateOutput(*output));
            }
        }

        let mut names = HashSet::new();
        names.insert(self.switcher.name.as_str());
        for surface in &self.surfaces {
            if !names.insert(surface.name.as_str()) {
                return Err(ConfigError::DuplicateEndpoint(surface.name.clone()));
            }
            self.validate_surface(surface, &outputs)?;
        }

        Ok(())
    }

    fn validate_surface(
        &self,
        surface: &SurfaceConfig,
        outputs: &BTreeSet<OutputId>,
    ) -> Result<(), ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidButtonGroup {
            surface: surface.name.clone(),
            reason,
        };

        if surface.groups.is_empty() {
            return Err(invalid("no button groups".to_string()));
        }

        let mut digital = HashSet::new();
        let mut serial = HashSet::new();
        let mut grouped_outputs = HashSet::new();

        if let Some(join) = surface.program_label_join {
            serial.insert(join);
        }

        for group in &surface.groups {
            if !outputs.contains(&group.output) {
                return Err(ConfigError::UnknownOutput {
                    surface: surface.name.clone(),
                    output: group.output,
                });
            }
            if !grouped_outputs.insert(group.output) {
                return Err(invalid(format!("{} has more than one group", group.output)));
            }

            let [low, high] = group.select_range;
            if low == 0 || low > high {
                return Err(invalid(format!("select range [{low}, {high}] is invalid")));
            }
            let width = group.width() as usize;
            if width < self.sources.len() {
                return Err(invalid(format!(
                    "select range [{low}, {high}] has {width} buttons for {} sources",
                    self.sources.len()
                )));
            }
            if width > self.sources.len() + MAX_SPARE_BUTTONS {
                return Err(invalid(format!(
                    "select range [{low}, {high}] has {width} buttons, at most {} allowed",
                    self.sources.len() + MAX_SPARE_BUTTONS
                )));
            }
            if width > self.sources.len() {
                warn!(
                    "Surface {}: {} buttons beyond the catalog on {} will be rejected",
                    surface.name,
                    width - self.sources.len(),
                    group.output
                );
            }

            for join in group.select_joins().chain(std::iter::once(group.clear_button)) {
                if !digital.insert(join) {
                    return Err(ConfigError::JoinConflict {
                        surface: surface.name.clone(),
                        join,
                    });
                }
            }
            if !serial.insert(group.source_name_join) {
                return Err(ConfigError::JoinConflict {
                    surface: surface.name.clone(),
                    join: group.source_name_join,
                });
            }
        }

        Ok(())
    }
}
