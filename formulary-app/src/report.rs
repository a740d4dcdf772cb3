use crate::session::SessionOutcome;
use anyhow::{Context, Result};
use formulary_core::{formula::state::FormulaLine, FormulaEngine};
use formulary_schemas::{file_formats::SortRequest, formula::OrganizationMode};
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Serialize)]
struct FormulaRow<'a> {
    container_id: &'a str,
    container_name: &'a str,
    ingredient_id: &'a str,
    name: &'a str,
    cas_no: &'a str,
    concentration: f64,
    quantity: f64,
    cost: f64,
    is_valid: bool,
    errors: String,
    warnings: String,
}

/// Writes the final formula, one row per line across every container.
pub fn write_formula_csv(path: &Path, engine: &FormulaEngine) -> Result<()> {
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("Failed to create {:?}", path))?;

    let containers: Vec<(&str, &str, &[FormulaLine])> = match engine.mode() {
        OrganizationMode::Sections => engine
            .sections()
            .iter()
            .map(|s| (s.id.as_str(), s.name.as_str(), s.lines.as_slice()))
            .collect(),
        OrganizationMode::Trials => engine
            .trials()
            .iter()
            .map(|t| (t.id.as_str(), t.name.as_str(), t.lines.as_slice()))
            .collect(),
    };

    let snapshot = engine.snapshot();
    for (container_id, container_name, lines) in containers {
        for line in lines {
            // Only lines in the current scope carry validation results.
            let result = snapshot.validation.get_in(container_id, &line.id);
            writer.serialize(FormulaRow {
                container_id,
                container_name,
                ingredient_id: &line.id,
                name: &line.name,
                cas_no: line.cas_no.as_deref().unwrap_or(""),
                concentration: line.concentration,
                quantity: line.quantity,
                cost: line.cost,
                is_valid: result.map_or(true, |r| r.is_valid),
                errors: result.map_or_else(String::new, |r| r.errors.join("; ")),
                warnings: result.map_or_else(String::new, |r| r.warnings.join("; ")),
            })?;
        }
    }
    writer.flush()?;
    Ok(())
}

pub fn print_summary_report(engine: &FormulaEngine, outcome: &SessionOutcome, sort: Option<&SortRequest>) {
    let snapshot = engine.snapshot();
    let max_concentration = engine.rules().max_concentration;

    println!("\n\n--- [Formula Summary Report] ---");
    println!("========================================");
    println!(
        "Commands applied: {} | rejected: {}",
        outcome.applied,
        outcome.rejected.len()
    );

    match engine.mode() {
        OrganizationMode::Sections => {
            println!("\nSections:");
            for section in engine.sections() {
                let totals = snapshot.container_totals(&section.id).cloned().unwrap_or_default();
                println!(
                    "  - {:<20} target {:<8} | {:>2} items | {:>6.1}%",
                    section.name, section.percentage, totals.total_items, totals.total_concentration
                );
                for line in &section.lines {
                    println!("      * {:<28} {:>6.2}% {:>7.1} ml", line.name, line.concentration, line.quantity);
                }
            }
        }
        OrganizationMode::Trials => {
            println!("\nTrials:");
            for trial in engine.trials() {
                let marker = if snapshot.active_container_id.as_deref() == Some(trial.id.as_str()) { "*" } else { " " };
                let totals = snapshot.container_totals(&trial.id).cloned().unwrap_or_default();
                println!(
                    "  {} {:<16} created {} | {:>2} items | {:>6.1}%",
                    marker,
                    trial.name,
                    trial.created_at.format("%Y-%m-%d %H:%M:%S"),
                    totals.total_items,
                    totals.total_concentration
                );
            }
            if let Some(active) = engine.active_trial() {
                for line in &active.lines {
                    println!("      * {:<28} {:>6.2}% {:>7.1} ml", line.name, line.concentration, line.quantity);
                }
            }
        }
    }

    println!("----------------------------------------");
    println!("\nTotals (current scope):");
    println!("  - Ingredients:   {}", snapshot.totals.total_items);
    println!(
        "  - Concentration: {:.1}% of {}% ({:.0}% full)",
        snapshot.totals.total_concentration,
        max_concentration,
        snapshot.totals.fill_percentage(max_concentration)
    );
    println!("  - Quantity:      {:.1} ml", snapshot.totals.total_quantity);
    println!("  - Cost:          ${:.2} USD", snapshot.totals.total_cost);

    if let Some(sort) = sort {
        match engine.sort_container(&sort.container_id, &sort.field, sort.direction) {
            Ok(lines) => {
                println!("\nSorted view of '{}' by {} ({:?}):", sort.container_id, sort.field, sort.direction);
                for line in lines {
                    println!("  - {:<28} {:>6.2}%", line.name, line.concentration);
                }
            }
            Err(e) => println!("\nSorted view unavailable: {}", e),
        }
    }

    let validation = &snapshot.validation;
    println!("\nValidation:");
    if validation.is_clean() {
        println!("  No issues.");
    }
    if let Some(message) = validation.over_limit_message() {
        println!("  ! {}", message);
    }
    for error in validation.all_errors() {
        println!("  - Error:   {}", error);
    }
    for warning in validation.all_warnings() {
        println!("  - Warning: {}", warning);
    }
    for rejected in &outcome.rejected {
        println!("  - Rejected command {}: {}", rejected.index, rejected.reason);
    }
    println!("========================================");
}
