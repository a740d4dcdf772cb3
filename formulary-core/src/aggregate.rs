use crate::formula::state::FormulaLine;
use serde::Serialize;

/// Running sums shown alongside a formula.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct Totals {
    pub total_items: usize,
    pub total_concentration: f64,
    pub total_quantity: f64,
    pub total_cost: f64,
}

impl Totals {
    pub fn from_lines<'a, I>(lines: I) -> Self
    where
        I: IntoIterator<Item = &'a FormulaLine>,
    {
        let mut totals = Totals::default();
        for line in lines {
            totals.total_items += 1;
            totals.total_concentration += line.concentration;
            totals.total_quantity += line.quantity;
            totals.total_cost += line.cost;
        }
        totals
    }

    /// Share of `max_concentration` filled, capped at 100.
    pub fn fill_percentage(&self, max_concentration: f64) -> f64 {
        if max_concentration <= 0.0 {
            return if self.total_concentration > 0.0 { 100.0 } else { 0.0 };
        }
        (self.total_concentration / max_concentration * 100.0).min(100.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContainerTotals {
    pub container_id: String,
    pub name: String,
    pub totals: Totals,
}
