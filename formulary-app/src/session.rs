use crate::config::Workbench;
use anyhow::Result;
use formulary_core::{FormulaBuilder, FormulaEngine};
use formulary_schemas::{file_formats::SessionFile, formula::OrganizationMode};
use std::path::Path;

/// A command the engine turned down, with the reason it gave.
#[derive(Debug, Clone)]
pub struct RejectedCommand {
    pub index: usize,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct SessionOutcome {
    pub applied: usize,
    pub rejected: Vec<RejectedCommand>,
}

/// Replays a recorded session against a fresh engine.
///
/// Rejected commands are reported and skipped, the way the builder UI shows
/// a notice and carries on.
pub fn replay_session(
    session: SessionFile,
    workbench: &Workbench,
    log_path: &Path,
) -> Result<(FormulaEngine, SessionOutcome)> {
    println!("\n--- [Session] Replaying {} commands ({} mode) ---", session.commands.len(), session.mode);

    let mut builder = FormulaBuilder::new()
        .with_rules(workbench.rules.clone())
        .with_placement_defaults(workbench.placement.clone())
        .with_operation_log_to_file(&log_path.to_string_lossy());
    builder = match session.mode {
        OrganizationMode::Sections => match session.sections {
            Some(sections) => builder.with_sections(sections),
            None => builder,
        },
        OrganizationMode::Trials => builder.with_trials(),
    };
    let mut engine = builder.build()?;

    engine.subscribe(|operation, snapshot| {
        println!(
            "  [rev {:>3}] {:<18} items: {:>2} | conc: {:>6.1}% | errors: {} | warnings: {}{}",
            snapshot.revision,
            operation.to_string(),
            snapshot.totals.total_items,
            snapshot.totals.total_concentration,
            snapshot.validation.error_count(),
            snapshot.validation.warning_count(),
            if snapshot.is_over_limit() { " | OVER LIMIT" } else { "" }
        );
    });

    let mut outcome = SessionOutcome::default();
    for (index, command) in session.commands.into_iter().enumerate() {
        match engine.execute(command, &workbench.catalog) {
            Ok(_) => outcome.applied += 1,
            Err(e) => {
                println!("  ! command {} rejected: {}", index + 1, e);
                outcome.rejected.push(RejectedCommand {
                    index: index + 1,
                    reason: e.to_string(),
                });
            }
        }
    }

    Ok((engine, outcome))
}
