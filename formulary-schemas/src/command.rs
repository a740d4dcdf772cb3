use crate::formula::{LinePatch, SectionSpec};
use crate::rule::ValidationRuleSet;
use serde::{Deserialize, Serialize};

/// Where a drag gesture started.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DropSource {
    /// An ingredient picked from the catalog palette.
    Palette { ingredient_id: String },
    /// A line already placed in a container.
    Container { container_id: String, line_id: String },
}

/// A user intent emitted by the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    AddLine {
        container_id: String,
        ingredient_id: String,
        #[serde(default)]
        patch: LinePatch,
    },
    RemoveLine {
        container_id: String,
        line_id: String,
    },
    UpdateLine {
        container_id: String,
        line_id: String,
        patch: LinePatch,
    },
    MoveLine {
        from_container_id: String,
        to_container_id: String,
        line_id: String,
    },
    ReorderLine {
        container_id: String,
        from_index: usize,
        to_index: usize,
    },
    /// A completed drag: names a source and the container it was dropped on.
    Drop {
        source: DropSource,
        destination: String,
    },
    ConfigureSections {
        sections: Vec<SectionSpec>,
    },
    AddTrial,
    DeleteTrial {
        trial_id: String,
    },
    RenameTrial {
        trial_id: String,
        name: String,
    },
    SwitchTrial {
        trial_id: String,
    },
    SetRules {
        rules: ValidationRuleSet,
    },
}
