use super::{
    state::{FormulaLine, FormulaSnapshot, Organization, Section, Trial, TrialSet},
    view,
};
use crate::{
    aggregate::{ContainerTotals, Totals},
    catalog::IngredientCatalog,
    error::{FormulaError, Operation},
    logger::OperationLogger,
    validation,
};
use formulary_schemas::{
    command::{Command, DropSource},
    formula::{CostPolicy, LinePatch, OrganizationMode, PlacementDefaults, SectionSpec, SortDirection},
    ingredient::Ingredient,
    rule::ValidationRuleSet,
};
use std::collections::{HashMap, HashSet};

pub type ChangeListener = Box<dyn FnMut(Operation, &FormulaSnapshot)>;

/// Owns the lines of one formula session and keeps totals and validation
/// results in step with them.
///
/// Every operation runs to completion before returning: the mutation, the
/// recomputed snapshot, the operation log row and the listener calls. A
/// rejected operation changes nothing and notifies nobody.
pub struct FormulaEngine {
    pub(super) organization: Organization,
    pub(super) rules: ValidationRuleSet,
    pub(super) defaults: PlacementDefaults,
    pub(super) snapshot: FormulaSnapshot,
    pub(super) logger: Option<OperationLogger>,
    pub(super) listeners: Vec<ChangeListener>,
}

impl FormulaEngine {
    /// Places a catalog leaf at the end of a container.
    pub fn add_line(
        &mut self,
        container_id: &str,
        ingredient: &Ingredient,
        patch: LinePatch,
    ) -> Result<&FormulaSnapshot, FormulaError> {
        let op = Operation::AddLine;
        if !ingredient.is_placeable() {
            return Err(FormulaError::NotALeaf(ingredient.id.clone()));
        }

        let concentration = self.defaults.concentration;
        let quantity = self.defaults.quantity;
        let cost = draw_cost(&self.defaults.cost);

        let lines = self.lines_mut(op, container_id)?;
        if lines.iter().any(|l| l.id == ingredient.id) {
            return Err(FormulaError::DuplicateIngredient {
                operation: op,
                container_id: container_id.to_string(),
                ingredient_id: ingredient.id.clone(),
            });
        }

        let mut line = FormulaLine::from_ingredient(ingredient, concentration, quantity, cost);
        line.apply(op, &patch)?;
        lines.push(line);

        self.commit(op, container_id)
    }

    /// Resolves `ingredient_id` in the catalog and places it.
    pub fn add_from_catalog(
        &mut self,
        container_id: &str,
        catalog: &IngredientCatalog,
        ingredient_id: &str,
        patch: LinePatch,
    ) -> Result<&FormulaSnapshot, FormulaError> {
        let ingredient = catalog.resolve_leaf(ingredient_id)?;
        self.add_line(container_id, ingredient, patch)
    }

    /// Removing a line that is not there is a no-op.
    pub fn remove_line(&mut self, container_id: &str, line_id: &str) -> Result<&FormulaSnapshot, FormulaError> {
        let op = Operation::RemoveLine;
        let lines = self.lines_mut(op, container_id)?;
        lines.retain(|l| l.id != line_id);
        self.commit(op, container_id)
    }

    pub fn update_line(
        &mut self,
        container_id: &str,
        line_id: &str,
        patch: &LinePatch,
    ) -> Result<&FormulaSnapshot, FormulaError> {
        let op = Operation::UpdateLine;
        let lines = self.lines_mut(op, container_id)?;
        let line = lines
            .iter_mut()
            .find(|l| l.id == line_id)
            .ok_or_else(|| FormulaError::LineNotFound {
                operation: op,
                container_id: container_id.to_string(),
                line_id: line_id.to_string(),
            })?;
        line.apply(op, patch)?;
        self.commit(op, container_id)
    }

    /// Moves a line between sections, keeping its current figures.
    ///
    /// A line missing from the source (a stale drag) is a no-op. A destination
    /// that already holds the same id rejects the move.
    pub fn move_line(
        &mut self,
        from_container_id: &str,
        to_container_id: &str,
        line_id: &str,
    ) -> Result<&FormulaSnapshot, FormulaError> {
        let op = Operation::MoveLine;
        let sections = self.sections_mut(op)?;
        let from = section_index(sections, op, from_container_id)?;
        let to = section_index(sections, op, to_container_id)?;

        if from != to {
            if let Some(position) = sections[from].lines.iter().position(|l| l.id == line_id) {
                if sections[to].lines.iter().any(|l| l.id == line_id) {
                    return Err(FormulaError::DuplicateIngredient {
                        operation: op,
                        container_id: to_container_id.to_string(),
                        ingredient_id: line_id.to_string(),
                    });
                }
                let line = sections[from].lines.remove(position);
                sections[to].lines.push(line);
            }
        }

        self.commit(op, line_id)
    }

    /// Moves the line at `from_index` to `to_index`. Indices past the end are
    /// clamped to the last line.
    pub fn reorder_line(
        &mut self,
        container_id: &str,
        from_index: usize,
        to_index: usize,
    ) -> Result<&FormulaSnapshot, FormulaError> {
        let op = Operation::ReorderLine;
        let lines = self.lines_mut(op, container_id)?;
        if let Some(last) = lines.len().checked_sub(1) {
            let from = from_index.min(last);
            let to = to_index.min(last);
            if from != to {
                let line = lines.remove(from);
                lines.insert(to, line);
            }
        }
        self.commit(op, container_id)
    }

    /// Replaces the section list. Sections keep their lines when their id
    /// survives; dropped sections lose theirs.
    pub fn configure_sections(&mut self, specs: Vec<SectionSpec>) -> Result<&FormulaSnapshot, FormulaError> {
        let op = Operation::ConfigureSections;
        check_section_specs(op, &specs)?;

        let sections = self.sections_mut(op)?;
        let mut previous: HashMap<String, Vec<FormulaLine>> =
            sections.drain(..).map(|s| (s.id, s.lines)).collect();
        *sections = specs
            .into_iter()
            .map(|spec| {
                let lines = previous.remove(&spec.id).unwrap_or_default();
                Section::from_spec(spec, lines)
            })
            .collect();

        self.commit(op, "sections")
    }

    /// Creates an empty trial and makes it the active one.
    pub fn add_trial(&mut self) -> Result<&FormulaSnapshot, FormulaError> {
        let op = Operation::AddTrial;
        let trials = self.trials_mut(op)?;
        let trial = Trial::numbered(trials.next_number);
        trials.next_number += 1;
        let trial_id = trial.id.clone();
        trials.active_trial_id = trial_id.clone();
        trials.trials.push(trial);
        self.commit(op, &trial_id)
    }

    /// Deleting the active trial hands the focus to the trial before it, or
    /// to the new first trial when the deleted one led the list.
    pub fn delete_trial(&mut self, trial_id: &str) -> Result<&FormulaSnapshot, FormulaError> {
        let op = Operation::DeleteTrial;
        let trials = self.trials_mut(op)?;
        let position = trials
            .position(trial_id)
            .ok_or_else(|| container_not_found(op, trial_id))?;
        if trials.trials.len() == 1 {
            return Err(FormulaError::LastTrial {
                operation: op,
                trial_id: trial_id.to_string(),
            });
        }

        trials.trials.remove(position);
        if trials.active_trial_id == trial_id {
            let next = position.saturating_sub(1);
            trials.active_trial_id = trials.trials[next].id.clone();
        }
        self.commit(op, trial_id)
    }

    pub fn rename_trial(&mut self, trial_id: &str, new_name: &str) -> Result<&FormulaSnapshot, FormulaError> {
        let op = Operation::RenameTrial;
        let name = new_name.trim();
        if name.is_empty() {
            return Err(FormulaError::InvalidConfiguration {
                operation: op,
                reason: format!("trial '{}' needs a non-empty name", trial_id),
            });
        }
        let trials = self.trials_mut(op)?;
        let position = trials
            .position(trial_id)
            .ok_or_else(|| container_not_found(op, trial_id))?;
        trials.trials[position].name = name.to_string();
        self.commit(op, trial_id)
    }

    pub fn switch_active_trial(&mut self, trial_id: &str) -> Result<&FormulaSnapshot, FormulaError> {
        let op = Operation::SwitchTrial;
        let trials = self.trials_mut(op)?;
        if trials.position(trial_id).is_none() {
            return Err(container_not_found(op, trial_id));
        }
        trials.active_trial_id = trial_id.to_string();
        self.commit(op, trial_id)
    }

    /// Swaps the rule set and re-runs validation.
    pub fn set_rules(&mut self, rules: ValidationRuleSet) -> Result<&FormulaSnapshot, FormulaError> {
        self.rules = rules;
        self.commit(Operation::SetRules, "rules")
    }

    /// A sorted view of one container. Stored order is not changed, so
    /// dropping the sort shows the manual order again.
    pub fn sort_container(
        &self,
        container_id: &str,
        field: &str,
        direction: SortDirection,
    ) -> Result<Vec<&FormulaLine>, FormulaError> {
        let lines = self
            .container_lines(container_id)
            .ok_or_else(|| container_not_found(Operation::SortContainer, container_id))?;
        Ok(view::sorted_lines(lines, field, direction))
    }

    /// Applies one recorded user intent.
    pub fn execute(&mut self, command: Command, catalog: &IngredientCatalog) -> Result<&FormulaSnapshot, FormulaError> {
        match command {
            Command::AddLine {
                container_id,
                ingredient_id,
                patch,
            } => self.add_from_catalog(&container_id, catalog, &ingredient_id, patch),
            Command::RemoveLine { container_id, line_id } => self.remove_line(&container_id, &line_id),
            Command::UpdateLine {
                container_id,
                line_id,
                patch,
            } => self.update_line(&container_id, &line_id, &patch),
            Command::MoveLine {
                from_container_id,
                to_container_id,
                line_id,
            } => self.move_line(&from_container_id, &to_container_id, &line_id),
            Command::ReorderLine {
                container_id,
                from_index,
                to_index,
            } => self.reorder_line(&container_id, from_index, to_index),
            Command::Drop { source, destination } => match source {
                DropSource::Palette { ingredient_id } => {
                    self.add_from_catalog(&destination, catalog, &ingredient_id, LinePatch::default())
                }
                DropSource::Container { container_id, line_id } => {
                    self.move_line(&container_id, &destination, &line_id)
                }
            },
            Command::ConfigureSections { sections } => self.configure_sections(sections),
            Command::AddTrial => self.add_trial(),
            Command::DeleteTrial { trial_id } => self.delete_trial(&trial_id),
            Command::RenameTrial { trial_id, name } => self.rename_trial(&trial_id, &name),
            Command::SwitchTrial { trial_id } => self.switch_active_trial(&trial_id),
            Command::SetRules { rules } => self.set_rules(rules),
        }
    }

    /// Registers a callback fired once after every successful operation.
    pub fn subscribe<F>(&mut self, listener: F)
    where
        F: FnMut(Operation, &FormulaSnapshot) + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    fn commit(&mut self, operation: Operation, target: &str) -> Result<&FormulaSnapshot, FormulaError> {
        self.snapshot = self.compute_snapshot(self.snapshot.revision + 1);
        // Listeners see every committed change, including one whose log write failed.
        let logged = self.record(Some(operation), target);
        for listener in &mut self.listeners {
            listener(operation, &self.snapshot);
        }
        logged?;
        Ok(&self.snapshot)
    }

    pub(super) fn record(&mut self, operation: Option<Operation>, target: &str) -> Result<(), FormulaError> {
        if let Some(logger) = &mut self.logger {
            let lines: Vec<&FormulaLine> = match &self.organization {
                Organization::Sections(sections) => sections.iter().flat_map(|s| s.lines.iter()).collect(),
                Organization::Trials(trials) => trials.active().lines.iter().collect(),
            };
            logger.log_operation(operation, target, &self.snapshot, &lines)?;
        }
        Ok(())
    }

    pub(super) fn compute_snapshot(&self, revision: u64) -> FormulaSnapshot {
        match &self.organization {
            Organization::Sections(sections) => {
                let scoped = sections
                    .iter()
                    .flat_map(|s| s.lines.iter().map(move |l| (s.id.as_str(), l)));
                FormulaSnapshot {
                    revision,
                    mode: OrganizationMode::Sections,
                    active_container_id: None,
                    totals: Totals::from_lines(sections.iter().flat_map(|s| s.lines.iter())),
                    container_totals: sections
                        .iter()
                        .map(|s| ContainerTotals {
                            container_id: s.id.clone(),
                            name: s.name.clone(),
                            totals: Totals::from_lines(&s.lines),
                        })
                        .collect(),
                    validation: validation::validate(scoped, &self.rules),
                }
            }
            Organization::Trials(trials) => {
                let active = trials.active();
                FormulaSnapshot {
                    revision,
                    mode: OrganizationMode::Trials,
                    active_container_id: Some(active.id.clone()),
                    totals: Totals::from_lines(&active.lines),
                    container_totals: trials
                        .trials
                        .iter()
                        .map(|t| ContainerTotals {
                            container_id: t.id.clone(),
                            name: t.name.clone(),
                            totals: Totals::from_lines(&t.lines),
                        })
                        .collect(),
                    validation: validation::validate(
                        active.lines.iter().map(|l| (active.id.as_str(), l)),
                        &self.rules,
                    ),
                }
            }
        }
    }

    fn lines_mut(&mut self, op: Operation, container_id: &str) -> Result<&mut Vec<FormulaLine>, FormulaError> {
        let lines = match &mut self.organization {
            Organization::Sections(sections) => sections
                .iter_mut()
                .find(|s| s.id == container_id)
                .map(|s| &mut s.lines),
            Organization::Trials(trials) => trials
                .trials
                .iter_mut()
                .find(|t| t.id == container_id)
                .map(|t| &mut t.lines),
        };
        lines.ok_or_else(|| container_not_found(op, container_id))
    }

    fn sections_mut(&mut self, op: Operation) -> Result<&mut Vec<Section>, FormulaError> {
        match &mut self.organization {
            Organization::Sections(sections) => Ok(sections),
            Organization::Trials(_) => Err(FormulaError::UnsupportedInMode {
                operation: op,
                mode: OrganizationMode::Trials,
            }),
        }
    }

    fn trials_mut(&mut self, op: Operation) -> Result<&mut TrialSet, FormulaError> {
        match &mut self.organization {
            Organization::Trials(trials) => Ok(trials),
            Organization::Sections(_) => Err(FormulaError::UnsupportedInMode {
                operation: op,
                mode: OrganizationMode::Sections,
            }),
        }
    }

    pub fn mode(&self) -> OrganizationMode {
        self.organization.mode()
    }

    pub fn snapshot(&self) -> &FormulaSnapshot {
        &self.snapshot
    }

    pub fn rules(&self) -> &ValidationRuleSet {
        &self.rules
    }

    /// Sections of a sections session; empty for a trials session.
    pub fn sections(&self) -> &[Section] {
        match &self.organization {
            Organization::Sections(sections) => sections,
            Organization::Trials(_) => &[],
        }
    }

    /// Trials of a trials session; empty for a sections session.
    pub fn trials(&self) -> &[Trial] {
        match &self.organization {
            Organization::Trials(trials) => &trials.trials,
            Organization::Sections(_) => &[],
        }
    }

    pub fn active_trial(&self) -> Option<&Trial> {
        match &self.organization {
            Organization::Trials(trials) => Some(trials.active()),
            Organization::Sections(_) => None,
        }
    }

    pub fn container_lines(&self, container_id: &str) -> Option<&[FormulaLine]> {
        match &self.organization {
            Organization::Sections(sections) => sections
                .iter()
                .find(|s| s.id == container_id)
                .map(|s| s.lines.as_slice()),
            Organization::Trials(trials) => trials
                .trials
                .iter()
                .find(|t| t.id == container_id)
                .map(|t| t.lines.as_slice()),
        }
    }

    /// The lines in scope: every section in order, or the active trial.
    pub fn current_lines(&self) -> Vec<&FormulaLine> {
        match &self.organization {
            Organization::Sections(sections) => sections.iter().flat_map(|s| s.lines.iter()).collect(),
            Organization::Trials(trials) => trials.active().lines.iter().collect(),
        }
    }

    pub fn used_ingredient_ids(&self) -> HashSet<String> {
        self.current_lines().into_iter().map(|l| l.id.clone()).collect()
    }
}

pub(super) fn check_section_specs(op: Operation, specs: &[SectionSpec]) -> Result<(), FormulaError> {
    if specs.is_empty() {
        return Err(FormulaError::InvalidConfiguration {
            operation: op,
            reason: "a formula needs at least one section".to_string(),
        });
    }
    let mut seen = HashSet::new();
    for spec in specs {
        if !seen.insert(spec.id.as_str()) {
            return Err(FormulaError::InvalidConfiguration {
                operation: op,
                reason: format!("section id '{}' appears more than once", spec.id),
            });
        }
    }
    Ok(())
}

/// Placement defaults feed every `add_line`, so bad pricing is reported
/// against that operation.
pub(super) fn check_cost_policy(policy: &CostPolicy) -> Result<(), FormulaError> {
    let finite = match policy {
        CostPolicy::Fixed { value } => value.is_finite(),
        CostPolicy::Spread { min, max } => min.is_finite() && max.is_finite(),
    };
    if !finite {
        return Err(FormulaError::InvalidConfiguration {
            operation: Operation::AddLine,
            reason: format!("placement cost must be a finite number, got {policy:?}"),
        });
    }
    Ok(())
}

fn section_index(sections: &[Section], op: Operation, container_id: &str) -> Result<usize, FormulaError> {
    sections
        .iter()
        .position(|s| s.id == container_id)
        .ok_or_else(|| container_not_found(op, container_id))
}

fn container_not_found(operation: Operation, container_id: &str) -> FormulaError {
    FormulaError::ContainerNotFound {
        operation,
        container_id: container_id.to_string(),
    }
}

/// Placeholder pricing for new lines. `Spread` picks a whole number from the
/// clock's sub-second nanos, so it is not reproducible between runs.
fn draw_cost(policy: &CostPolicy) -> f64 {
    match policy {
        CostPolicy::Fixed { value } => *value,
        CostPolicy::Spread { min, max } => {
            let low = min.round();
            let span = (max.round() - low).max(0.0) as u64;
            let nanos = u64::from(chrono::Utc::now().timestamp_subsec_nanos());
            low + (nanos % span.saturating_add(1)) as f64
        }
    }
}
