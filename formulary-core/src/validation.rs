//! Rule-based classification of formula lines.
//!
//! Validation never fails: findings are data attached to each line. The
//! checks run in a fixed order and their messages keep that order.

use crate::formula::state::FormulaLine;
use formulary_schemas::rule::ValidationRuleSet;
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineValidation {
    pub container_id: String,
    pub line_id: String,
    pub result: ValidationResult,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    /// One entry per line, in container iteration order.
    pub lines: Vec<LineValidation>,
    pub total_concentration: f64,
    pub max_concentration: f64,
    pub is_over_limit: bool,
}

impl ValidationReport {
    /// First result recorded for `line_id`.
    pub fn get(&self, line_id: &str) -> Option<&ValidationResult> {
        self.lines.iter().find(|l| l.line_id == line_id).map(|l| &l.result)
    }

    pub fn get_in(&self, container_id: &str, line_id: &str) -> Option<&ValidationResult> {
        self.lines
            .iter()
            .find(|l| l.container_id == container_id && l.line_id == line_id)
            .map(|l| &l.result)
    }

    pub fn is_clean(&self) -> bool {
        !self.is_over_limit && self.lines.iter().all(|l| l.result.errors.is_empty() && l.result.warnings.is_empty())
    }

    pub fn error_count(&self) -> usize {
        self.lines.iter().map(|l| l.result.errors.len()).sum()
    }

    pub fn warning_count(&self) -> usize {
        self.lines.iter().map(|l| l.result.warnings.len()).sum()
    }

    pub fn all_errors(&self) -> Vec<&str> {
        self.lines
            .iter()
            .flat_map(|l| l.result.errors.iter().map(String::as_str))
            .collect()
    }

    pub fn all_warnings(&self) -> Vec<&str> {
        self.lines
            .iter()
            .flat_map(|l| l.result.warnings.iter().map(String::as_str))
            .collect()
    }

    pub fn over_limit_message(&self) -> Option<String> {
        self.is_over_limit.then(|| {
            format!(
                "Total concentration ({:.1}%) exceeds maximum allowed ({}%)",
                self.total_concentration, self.max_concentration
            )
        })
    }
}

pub fn validate_line(line: &FormulaLine, rules: &ValidationRuleSet) -> ValidationResult {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let limits = &rules.individual;

    if line.concentration > limits.concentration.max {
        errors.push(format!(
            "Concentration {}% exceeds maximum {}%",
            line.concentration, limits.concentration.max
        ));
    }
    if line.concentration < limits.concentration.min {
        warnings.push(format!(
            "Concentration {}% is below recommended minimum {}%",
            line.concentration, limits.concentration.min
        ));
    }
    if line.quantity > limits.quantity.max {
        warnings.push(format!(
            "Quantity {}ml is above recommended maximum {}ml",
            line.quantity, limits.quantity.max
        ));
    }
    if let Some(category) = &line.ifra_category {
        if let Some(limit) = rules.ifra_categories.get(category) {
            if line.concentration > limit.max_concentration {
                errors.push(format!(
                    "IFRA Category {} limits this ingredient to {}%",
                    category, limit.max_concentration
                ));
            }
        }
    }

    ValidationResult {
        is_valid: errors.is_empty(),
        errors,
        warnings,
    }
}

/// Validates `(container_id, line)` pairs and flags the scope when the
/// summed concentration passes `rules.max_concentration`.
pub fn validate<'a, I>(lines: I, rules: &ValidationRuleSet) -> ValidationReport
where
    I: IntoIterator<Item = (&'a str, &'a FormulaLine)>,
{
    let mut report = ValidationReport {
        max_concentration: rules.max_concentration,
        ..ValidationReport::default()
    };
    for (container_id, line) in lines {
        report.total_concentration += line.concentration;
        report.lines.push(LineValidation {
            container_id: container_id.to_string(),
            line_id: line.id.clone(),
            result: validate_line(line, rules),
        });
    }
    report.is_over_limit = report.total_concentration > rules.max_concentration;
    report
}
