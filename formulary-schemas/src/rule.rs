use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndividualLimits {
    pub concentration: Bounds,
    pub quantity: Bounds,
}

impl Default for IndividualLimits {
    fn default() -> Self {
        Self {
            concentration: Bounds { min: 0.1, max: 50.0 },
            quantity: Bounds { min: 0.0, max: 1000.0 },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IfraCategoryLimit {
    pub max_concentration: f64,
    #[serde(default)]
    pub description: String,
}

/// Limits every formula line is checked against.
///
/// Missing fields fall back to the defaults, so a rules file only needs to
/// name what it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationRuleSet {
    /// Ceiling for the summed concentration of the current scope.
    pub max_concentration: f64,
    pub individual: IndividualLimits,
    /// Keyed by the label found in an ingredient's `ifra_category`.
    pub ifra_categories: BTreeMap<String, IfraCategoryLimit>,
}

impl Default for ValidationRuleSet {
    fn default() -> Self {
        Self {
            max_concentration: 100.0,
            individual: IndividualLimits::default(),
            ifra_categories: BTreeMap::new(),
        }
    }
}

impl ValidationRuleSet {
    pub fn with_ifra_category(mut self, label: &str, max_concentration: f64, description: &str) -> Self {
        self.ifra_categories.insert(
            label.to_string(),
            IfraCategoryLimit {
                max_concentration,
                description: description.to_string(),
            },
        );
        self
    }
}
