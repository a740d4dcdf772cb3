use crate::{
    command::Command,
    formula::{OrganizationMode, PlacementDefaults, SectionSpec, SortDirection},
    ingredient::Ingredient,
    rule::ValidationRuleSet,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct CatalogFile {
    pub schema_version: String,
    pub ingredients: Vec<Ingredient>,
}

#[derive(Debug, Deserialize)]
pub struct RuleSetFile {
    pub schema_version: String,
    pub validation: ValidationRuleSet,
    #[serde(default)]
    pub placement: PlacementDefaults,
}

#[derive(Debug, Deserialize)]
pub struct SortRequest {
    pub container_id: String,
    pub field: String,
    pub direction: SortDirection,
}

/// A recorded formula-building session, replayed command by command.
#[derive(Debug, Deserialize)]
pub struct SessionFile {
    pub schema_version: String,
    pub mode: OrganizationMode,
    /// Initial sections for a `sections` session; the default set when omitted.
    #[serde(default)]
    pub sections: Option<Vec<SectionSpec>>,
    pub commands: Vec<Command>,
    #[serde(default)]
    pub sort: Option<SortRequest>,
}
