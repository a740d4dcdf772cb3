use anyhow::{Context, Result};
use formulary_core::IngredientCatalog;
use formulary_schemas::{
    file_formats::{CatalogFile, RuleSetFile, SessionFile},
    formula::PlacementDefaults,
    rule::ValidationRuleSet,
};
use std::{fs, path::Path};

/// Everything a formula session reads but never changes: the ingredient
/// catalog, the validation limits and the placement defaults.
pub struct Workbench {
    pub catalog: IngredientCatalog,
    pub rules: ValidationRuleSet,
    pub placement: PlacementDefaults,
}

impl Workbench {
    /// Loads `catalog/*.yaml` and the optional `rules.yaml` from `base_path`.
    /// Without a rules file the built-in defaults apply.
    pub fn load(base_path: &str) -> Result<Self> {
        println!("Loading workbench from '{}'...", base_path);

        let ingredients = load_yaml_files_into_vec(
            Path::new(base_path).join("catalog"),
            |file: CatalogFile| file.ingredients,
        )?;
        let catalog = IngredientCatalog::new(ingredients);

        let rules_path = Path::new(base_path).join("rules.yaml");
        let (rules, placement) = if rules_path.is_file() {
            let content = fs::read_to_string(&rules_path)
                .with_context(|| format!("Failed to read {:?}", rules_path))?;
            let file: RuleSetFile = serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML from {:?}", rules_path))?;
            (file.validation, file.placement)
        } else {
            println!("No rules.yaml found, using default validation rules.");
            (ValidationRuleSet::default(), PlacementDefaults::default())
        };

        println!(
            "Workbench loaded: {} catalog entries, {} IFRA categories.",
            catalog.len(),
            rules.ifra_categories.len()
        );
        Ok(Self {
            catalog,
            rules,
            placement,
        })
    }
}

pub fn load_session(path: &str) -> Result<SessionFile> {
    let content = fs::read_to_string(path).with_context(|| format!("Failed to read session file {}", path))?;
    serde_yaml::from_str(&content).with_context(|| format!("Failed to parse session file {}", path))
}

/// Reads every YAML file in a directory, in file-name order, and concatenates
/// the items they hold.
fn load_yaml_files_into_vec<P, F, E, T>(dir_path: P, extract_vec: E) -> Result<Vec<T>>
where
    P: AsRef<Path>,
    F: for<'de> serde::Deserialize<'de>, // The file wrapper struct (e.g., CatalogFile)
    E: Fn(F) -> Vec<T>,                  // A closure to extract the items from the wrapper
{
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir_path.as_ref())
        .with_context(|| format!("Failed to read directory: {:?}", dir_path.as_ref()))?
    {
        let path = entry?.path();
        if path.is_file() && path.extension().map_or(false, |s| s == "yaml" || s == "yml") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut items = Vec::new();
    for path in paths {
        let content = fs::read_to_string(&path)?;
        let file_wrapper: F = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML from {:?}", path))?;
        items.extend(extract_vec(file_wrapper));
    }
    Ok(items)
}
