use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Which container strategy a formula session is organised around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrganizationMode {
    Sections,
    Trials,
}

impl std::fmt::Display for OrganizationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrganizationMode::Sections => write!(f, "sections"),
            OrganizationMode::Trials => write!(f, "trials"),
        }
    }
}

/// Configuration of one section: everything except its lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionSpec {
    pub id: String,
    pub name: String,
    /// Free-text target range, e.g. "20-30%".
    pub percentage: String,
}

impl SectionSpec {
    pub fn new(id: &str, name: &str, percentage: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            percentage: percentage.to_string(),
        }
    }
}

pub fn default_sections() -> Vec<SectionSpec> {
    vec![
        SectionSpec::new("top-notes", "Top Notes", "20-30%"),
        SectionSpec::new("middle-notes", "Middle/Heart Notes", "20-30%"),
        SectionSpec::new("base-notes", "Base Notes", "20-30%"),
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CostPolicy {
    /// Every new line gets the same cost.
    Fixed { value: f64 },
    /// Placeholder pricing: a whole number drawn from `[min, max]`.
    Spread { min: f64, max: f64 },
}

/// Values given to a freshly placed line when the caller supplies none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementDefaults {
    pub concentration: f64,
    pub quantity: f64,
    pub cost: CostPolicy,
}

impl Default for PlacementDefaults {
    fn default() -> Self {
        Self {
            concentration: 5.0,
            quantity: 10.0,
            cost: CostPolicy::Spread { min: 10.0, max: 60.0 },
        }
    }
}

/// Partial update of a formula line. Unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concentration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    /// Descriptive overrides. Keys naming a line field (`name`, `cas_no`,
    /// `ifra_category`, ...) replace it; other keys merge into the attributes.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl LinePatch {
    pub fn concentration(value: f64) -> Self {
        Self {
            concentration: Some(value),
            ..Self::default()
        }
    }

    pub fn quantity(value: f64) -> Self {
        Self {
            quantity: Some(value),
            ..Self::default()
        }
    }

    pub fn with_cost(mut self, value: f64) -> Self {
        self.cost = Some(value);
        self
    }

    pub fn with_quantity(mut self, value: f64) -> Self {
        self.quantity = Some(value);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Ascending,
    Descending,
}
