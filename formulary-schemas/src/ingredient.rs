use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A node of the ingredient catalog tree.
///
/// Branch nodes group other nodes through `children`; leaf nodes are the
/// ingredients a formula can actually hold. Everything except `id` and `name`
/// is optional reference data, never mutated by the formula engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cas_no: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ifra_category: Option<String>,

    // Catalog-declared figures. Placement ignores these in favour of the
    // placement defaults unless the caller passes them through a patch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concentration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,

    #[serde(default)]
    pub is_leaf: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Ingredient>,

    /// Olfactive, technical, regulatory and sustainability descriptors
    /// (`olfactive_family`, `flash_point`, `eu_regulation`, ...).
    #[serde(flatten)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl Ingredient {
    pub fn leaf(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            cas_no: None,
            category: None,
            subcategory: None,
            description: None,
            ifra_category: None,
            concentration: None,
            quantity: None,
            cost: None,
            is_leaf: true,
            children: Vec::new(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn branch(id: &str, name: &str, children: Vec<Ingredient>) -> Self {
        Self {
            is_leaf: false,
            children,
            ..Self::leaf(id, name)
        }
    }

    pub fn with_cas_no(mut self, cas_no: &str) -> Self {
        self.cas_no = Some(cas_no.to_string());
        self
    }

    pub fn with_category(mut self, category: &str, subcategory: &str) -> Self {
        self.category = Some(category.to_string());
        self.subcategory = Some(subcategory.to_string());
        self
    }

    pub fn with_ifra_category(mut self, ifra_category: &str) -> Self {
        self.ifra_category = Some(ifra_category.to_string());
        self
    }

    /// A node is placeable when it is flagged as a leaf or simply has no children.
    pub fn is_placeable(&self) -> bool {
        self.is_leaf || self.children.is_empty()
    }
}
