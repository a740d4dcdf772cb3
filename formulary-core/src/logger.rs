use crate::{
    error::Operation,
    formula::state::{FormulaLine, FormulaSnapshot},
};
use csv::Writer;
use serde::Serialize;
use std::fs;

#[derive(Debug, Serialize)]
struct LogEntry {
    revision: u64,
    operation: String,
    target: String,
    mode: String,
    active_container: String,
    total_items: usize,
    total_concentration: f64,
    total_quantity: f64,
    total_cost: f64,
    is_over_limit: bool,
    error_count: usize,
    warning_count: usize,
    lines_json: String,
}

/// Appends one CSV row per completed formula operation.
pub struct OperationLogger {
    writer: Writer<fs::File>,
}

impl OperationLogger {
    pub fn new(path: &str) -> Result<Self, csv::Error> {
        let writer = Writer::from_path(path)?;
        Ok(Self { writer })
    }

    pub fn log_operation(
        &mut self,
        operation: Option<Operation>,
        target: &str,
        snapshot: &FormulaSnapshot,
        lines: &[&FormulaLine],
    ) -> Result<(), anyhow::Error> {
        let lines_json = serde_json::to_string(lines)?;

        let entry = LogEntry {
            revision: snapshot.revision,
            operation: operation.map_or_else(|| "initial".to_string(), |op| op.to_string()),
            target: target.to_string(),
            mode: snapshot.mode.to_string(),
            active_container: snapshot.active_container_id.clone().unwrap_or_default(),
            total_items: snapshot.totals.total_items,
            total_concentration: snapshot.totals.total_concentration,
            total_quantity: snapshot.totals.total_quantity,
            total_cost: snapshot.totals.total_cost,
            is_over_limit: snapshot.is_over_limit(),
            error_count: snapshot.validation.error_count(),
            warning_count: snapshot.validation.warning_count(),
            lines_json,
        };

        self.writer.serialize(entry)?;
        self.writer.flush()?;
        Ok(())
    }
}
