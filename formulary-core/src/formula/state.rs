use crate::{
    aggregate::{ContainerTotals, Totals},
    error::{FormulaError, Operation},
    validation::ValidationReport,
};
use chrono::{DateTime, Utc};
use formulary_schemas::{
    formula::{LinePatch, OrganizationMode, SectionSpec},
    ingredient::Ingredient,
};
use serde::Serialize;
use std::collections::BTreeMap;

/// One placed ingredient. Catalog attributes are copied at placement time,
/// so later catalog edits never reach lines already in a formula.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormulaLine {
    pub id: String,
    pub name: String,
    pub cas_no: Option<String>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub description: Option<String>,
    pub ifra_category: Option<String>,
    pub attributes: BTreeMap<String, serde_json::Value>,
    pub concentration: f64,
    pub quantity: f64,
    pub cost: f64,
}

impl FormulaLine {
    pub fn from_ingredient(ingredient: &Ingredient, concentration: f64, quantity: f64, cost: f64) -> Self {
        Self {
            id: ingredient.id.clone(),
            name: ingredient.name.clone(),
            cas_no: ingredient.cas_no.clone(),
            category: ingredient.category.clone(),
            subcategory: ingredient.subcategory.clone(),
            description: ingredient.description.clone(),
            ifra_category: ingredient.ifra_category.clone(),
            attributes: ingredient.attributes.clone(),
            concentration,
            quantity,
            cost,
        }
    }

    /// Merges `patch` into the line. Descriptive keys land on their typed
    /// fields; anything else goes to `attributes`. Either the whole patch
    /// applies or the line is left as it was.
    pub fn apply(&mut self, operation: Operation, patch: &LinePatch) -> Result<(), FormulaError> {
        let mut updated = self.clone();
        if let Some(concentration) = patch.concentration {
            updated.concentration = concentration;
        }
        if let Some(quantity) = patch.quantity {
            updated.quantity = quantity;
        }
        if let Some(cost) = patch.cost {
            updated.cost = cost;
        }

        for (key, value) in &patch.attributes {
            let invalid = |reason: &str| FormulaError::InvalidOverride {
                operation,
                line_id: self.id.clone(),
                field: key.clone(),
                reason: reason.to_string(),
            };
            let slot = match key.as_str() {
                "id" => return Err(invalid("a line keeps the id it was placed with")),
                "name" => {
                    updated.name = text_value(value)
                        .ok_or_else(|| invalid("expected text"))?
                        .ok_or_else(|| invalid("a line must keep a name"))?;
                    continue;
                }
                "cas_no" => &mut updated.cas_no,
                "category" => &mut updated.category,
                "subcategory" => &mut updated.subcategory,
                "description" => &mut updated.description,
                "ifra_category" => &mut updated.ifra_category,
                _ => {
                    updated.attributes.insert(key.clone(), value.clone());
                    continue;
                }
            };
            *slot = text_value(value).ok_or_else(|| invalid("expected text"))?;
        }

        *self = updated;
        Ok(())
    }
}

/// Reads a descriptive override. Scalars keep their literal form, so
/// `ifra_category: 4` means "4". Null clears the field; lists and maps are
/// rejected.
fn text_value(value: &serde_json::Value) -> Option<Option<String>> {
    match value {
        serde_json::Value::Null => Some(None),
        serde_json::Value::String(s) => Some(Some(s.clone())),
        serde_json::Value::Number(n) => Some(Some(n.to_string())),
        serde_json::Value::Bool(b) => Some(Some(b.to_string())),
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => None,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Section {
    pub id: String,
    pub name: String,
    pub percentage: String,
    pub lines: Vec<FormulaLine>,
}

impl Section {
    pub fn from_spec(spec: SectionSpec, lines: Vec<FormulaLine>) -> Self {
        Self {
            id: spec.id,
            name: spec.name,
            percentage: spec.percentage,
            lines,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trial {
    pub id: String,
    pub name: String,
    pub lines: Vec<FormulaLine>,
    pub created_at: DateTime<Utc>,
}

impl Trial {
    pub(crate) fn numbered(number: u32) -> Self {
        Self {
            id: format!("trial-{}", number),
            name: format!("Trial {}", number),
            lines: Vec::new(),
            created_at: Utc::now(),
        }
    }
}

/// The trials of a session plus the pointer to the one being edited.
/// `active_trial_id` always names a trial in `trials`.
#[derive(Debug, Clone)]
pub struct TrialSet {
    pub trials: Vec<Trial>,
    pub active_trial_id: String,
    pub(crate) next_number: u32,
}

impl TrialSet {
    pub(crate) fn initial() -> Self {
        let first = Trial::numbered(1);
        Self {
            active_trial_id: first.id.clone(),
            trials: vec![first],
            next_number: 2,
        }
    }

    pub fn active(&self) -> &Trial {
        self.trials
            .iter()
            .find(|t| t.id == self.active_trial_id)
            .unwrap_or(&self.trials[0])
    }

    pub(crate) fn position(&self, trial_id: &str) -> Option<usize> {
        self.trials.iter().position(|t| t.id == trial_id)
    }
}

#[derive(Debug, Clone)]
pub enum Organization {
    Sections(Vec<Section>),
    Trials(TrialSet),
}

impl Organization {
    pub fn mode(&self) -> OrganizationMode {
        match self {
            Organization::Sections(_) => OrganizationMode::Sections,
            Organization::Trials(_) => OrganizationMode::Trials,
        }
    }
}

/// Everything derived from the current lines. Rebuilt after every operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormulaSnapshot {
    pub revision: u64,
    pub mode: OrganizationMode,
    /// The active trial in a trials session.
    pub active_container_id: Option<String>,
    /// Sums over the current scope: every section, or the active trial.
    pub totals: Totals,
    pub container_totals: Vec<ContainerTotals>,
    pub validation: ValidationReport,
}

impl FormulaSnapshot {
    pub fn is_over_limit(&self) -> bool {
        self.validation.is_over_limit
    }

    pub fn container_totals(&self, container_id: &str) -> Option<&Totals> {
        self.container_totals
            .iter()
            .find(|c| c.container_id == container_id)
            .map(|c| &c.totals)
    }
}
