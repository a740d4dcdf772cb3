pub mod aggregate;
pub mod catalog;
pub mod error;
pub mod formula;
pub mod logger;
pub mod validation;

pub use catalog::IngredientCatalog;
pub use error::{FormulaError, Operation};
pub use formula::{builder::FormulaBuilder, engine::FormulaEngine};
