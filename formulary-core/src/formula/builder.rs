use super::{
    engine::{check_cost_policy, check_section_specs, FormulaEngine},
    state::{FormulaSnapshot, Organization, Section, TrialSet},
};
use crate::{
    aggregate::Totals,
    error::{FormulaError, Operation},
    logger::OperationLogger,
    validation::ValidationReport,
};
use formulary_schemas::{
    formula::{default_sections, OrganizationMode, PlacementDefaults, SectionSpec},
    rule::ValidationRuleSet,
};

/// A fluent builder for constructing a `FormulaEngine`.
///
/// A sections session starts from the default Top/Middle/Base notes unless
/// sections are given; a trials session starts with a single empty "Trial 1".
pub struct FormulaBuilder {
    mode: OrganizationMode,
    sections: Option<Vec<SectionSpec>>,
    rules: ValidationRuleSet,
    defaults: PlacementDefaults,
    log_path: Option<String>,
}

impl Default for FormulaBuilder {
    fn default() -> Self {
        Self {
            mode: OrganizationMode::Sections,
            sections: None,
            rules: ValidationRuleSet::default(),
            defaults: PlacementDefaults::default(),
            log_path: None,
        }
    }
}

impl FormulaBuilder {
    /// Creates a builder for a sections session with default rules.
    pub fn new() -> Self {
        Self::default()
    }

    /// Organises the formula as named sections.
    pub fn with_sections(mut self, sections: Vec<SectionSpec>) -> Self {
        self.mode = OrganizationMode::Sections;
        self.sections = Some(sections);
        self
    }

    /// Organises the formula as a flat list per trial.
    pub fn with_trials(mut self) -> Self {
        self.mode = OrganizationMode::Trials;
        self
    }

    pub fn with_rules(mut self, rules: ValidationRuleSet) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_placement_defaults(mut self, defaults: PlacementDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Configures the engine to write one CSV row per operation to `path`.
    pub fn with_operation_log_to_file(mut self, path: &str) -> Self {
        self.log_path = Some(path.to_string());
        self
    }

    /// Consumes the builder and returns a ready engine whose snapshot already
    /// reflects the initial, empty formula.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` for an empty or duplicated section list
    /// or a non-finite placement cost, and `CsvError` when the operation log
    /// cannot be created.
    pub fn build(self) -> Result<FormulaEngine, FormulaError> {
        check_cost_policy(&self.defaults.cost)?;
        let organization = match self.mode {
            OrganizationMode::Sections => {
                let specs = self.sections.unwrap_or_else(default_sections);
                check_section_specs(Operation::ConfigureSections, &specs)?;
                Organization::Sections(
                    specs
                        .into_iter()
                        .map(|spec| Section::from_spec(spec, Vec::new()))
                        .collect(),
                )
            }
            OrganizationMode::Trials => Organization::Trials(TrialSet::initial()),
        };

        let logger = match self.log_path {
            Some(path) => Some(
                OperationLogger::new(&path).map_err(|e| FormulaError::CsvError(path.clone(), e))?,
            ),
            None => None,
        };

        let mut engine = FormulaEngine {
            snapshot: FormulaSnapshot {
                revision: 0,
                mode: organization.mode(),
                active_container_id: None,
                totals: Totals::default(),
                container_totals: Vec::new(),
                validation: ValidationReport::default(),
            },
            organization,
            rules: self.rules,
            defaults: self.defaults,
            logger,
            listeners: Vec::new(),
        };
        engine.snapshot = engine.compute_snapshot(0);
        engine.record(None, "initial")?;
        Ok(engine)
    }
}
