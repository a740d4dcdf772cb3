use formulary_schemas::formula::OrganizationMode;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Engine operations, named in every error so a host can build its own messaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    AddLine,
    RemoveLine,
    UpdateLine,
    MoveLine,
    ReorderLine,
    ConfigureSections,
    AddTrial,
    DeleteTrial,
    RenameTrial,
    SwitchTrial,
    SetRules,
    SortContainer,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::AddLine => "add_line",
            Operation::RemoveLine => "remove_line",
            Operation::UpdateLine => "update_line",
            Operation::MoveLine => "move_line",
            Operation::ReorderLine => "reorder_line",
            Operation::ConfigureSections => "configure_sections",
            Operation::AddTrial => "add_trial",
            Operation::DeleteTrial => "delete_trial",
            Operation::RenameTrial => "rename_trial",
            Operation::SwitchTrial => "switch_trial",
            Operation::SetRules => "set_rules",
            Operation::SortContainer => "sort_container",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum FormulaError {
    #[error("{operation}: ingredient '{ingredient_id}' is already in '{container_id}'")]
    DuplicateIngredient {
        operation: Operation,
        container_id: String,
        ingredient_id: String,
    },

    #[error("{operation}: line '{line_id}' not found in '{container_id}'")]
    LineNotFound {
        operation: Operation,
        container_id: String,
        line_id: String,
    },

    #[error("{operation}: invalid configuration: {reason}")]
    InvalidConfiguration { operation: Operation, reason: String },

    #[error("{operation}: cannot set '{field}' on line '{line_id}': {reason}")]
    InvalidOverride {
        operation: Operation,
        line_id: String,
        field: String,
        reason: String,
    },

    #[error("{operation}: trial '{trial_id}' is the last remaining trial")]
    LastTrial { operation: Operation, trial_id: String },

    #[error("{operation}: container '{container_id}' does not exist")]
    ContainerNotFound {
        operation: Operation,
        container_id: String,
    },

    #[error("{operation} is not available in a {mode} formula")]
    UnsupportedInMode {
        operation: Operation,
        mode: OrganizationMode,
    },

    #[error("Ingredient '{0}' not found in catalog")]
    IngredientNotFound(String),

    #[error("Catalog entry '{0}' is a group, not a placeable ingredient")]
    NotALeaf(String),

    #[error("Failed to write CSV file '{0}': {1}")]
    CsvError(String, #[source] csv::Error),

    #[error("An error occurred during logging: {0}")]
    LoggingError(#[from] anyhow::Error),
}

impl FormulaError {
    /// The operation that failed, when the error came from an engine operation.
    pub fn operation(&self) -> Option<Operation> {
        match self {
            FormulaError::DuplicateIngredient { operation, .. }
            | FormulaError::LineNotFound { operation, .. }
            | FormulaError::InvalidConfiguration { operation, .. }
            | FormulaError::InvalidOverride { operation, .. }
            | FormulaError::LastTrial { operation, .. }
            | FormulaError::ContainerNotFound { operation, .. }
            | FormulaError::UnsupportedInMode { operation, .. } => Some(*operation),
            _ => None,
        }
    }
}
