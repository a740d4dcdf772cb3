use crate::error::FormulaError;
use formulary_schemas::ingredient::Ingredient;
use std::collections::{HashMap, HashSet};

/// Read-only lookup over the ingredient tree.
///
/// Nodes are indexed by id through their child-index path from the roots.
/// When two nodes share an id the first one in tree order wins.
pub struct IngredientCatalog {
    roots: Vec<Ingredient>,
    paths: HashMap<String, Vec<usize>>,
}

impl IngredientCatalog {
    pub fn new(roots: Vec<Ingredient>) -> Self {
        let mut paths = HashMap::new();
        let mut path = Vec::new();
        for (index, root) in roots.iter().enumerate() {
            path.push(index);
            index_node(root, &mut path, &mut paths);
            path.pop();
        }
        Self { roots, paths }
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn resolve(&self, id: &str) -> Option<&Ingredient> {
        let path = self.paths.get(id)?;
        let (first, rest) = path.split_first()?;
        let mut node = self.roots.get(*first)?;
        for index in rest {
            node = node.children.get(*index)?;
        }
        Some(node)
    }

    /// Resolves a drop: the id must exist and name a placeable ingredient.
    pub fn resolve_leaf(&self, id: &str) -> Result<&Ingredient, FormulaError> {
        let node = self
            .resolve(id)
            .ok_or_else(|| FormulaError::IngredientNotFound(id.to_string()))?;
        if !node.is_placeable() {
            return Err(FormulaError::NotALeaf(id.to_string()));
        }
        Ok(node)
    }

    pub fn leaves(&self) -> Vec<&Ingredient> {
        let mut leaves = Vec::new();
        for root in &self.roots {
            collect_leaves(root, &mut leaves);
        }
        leaves
    }

    /// Leaves not yet placed, for palettes that hide used ingredients.
    pub fn unused_leaves(&self, used_ids: &HashSet<String>) -> Vec<&Ingredient> {
        self.leaves()
            .into_iter()
            .filter(|leaf| !used_ids.contains(&leaf.id))
            .collect()
    }

    /// The tree pruned to nodes that match `term` or lead to a match.
    /// A blank term keeps the whole tree.
    pub fn search(&self, term: &str) -> Vec<Ingredient> {
        let term = term.trim();
        if term.is_empty() {
            return self.roots.clone();
        }
        self.roots.iter().filter_map(|root| prune(root, term)).collect()
    }
}

fn index_node(node: &Ingredient, path: &mut Vec<usize>, paths: &mut HashMap<String, Vec<usize>>) {
    paths.entry(node.id.clone()).or_insert_with(|| path.clone());
    for (index, child) in node.children.iter().enumerate() {
        path.push(index);
        index_node(child, path, paths);
        path.pop();
    }
}

fn collect_leaves<'a>(node: &'a Ingredient, leaves: &mut Vec<&'a Ingredient>) {
    if node.is_placeable() {
        leaves.push(node);
    }
    for child in &node.children {
        collect_leaves(child, leaves);
    }
}

fn prune(node: &Ingredient, term: &str) -> Option<Ingredient> {
    if !matches_or_has_matching_descendant(node, term) {
        return None;
    }
    let mut kept = node.clone();
    kept.children = node.children.iter().filter_map(|child| prune(child, term)).collect();
    Some(kept)
}

/// Case-insensitive substring match on name, CAS number, category and subcategory.
pub fn matches_term(node: &Ingredient, term: &str) -> bool {
    let needle = term.to_lowercase();
    let contains = |field: Option<&str>| field.map_or(false, |v| v.to_lowercase().contains(&needle));
    contains(Some(node.name.as_str()))
        || contains(node.cas_no.as_deref())
        || contains(node.category.as_deref())
        || contains(node.subcategory.as_deref())
}

pub fn matches_or_has_matching_descendant(node: &Ingredient, term: &str) -> bool {
    matches_term(node, term)
        || node
            .children
            .iter()
            .any(|child| matches_or_has_matching_descendant(child, term))
}
