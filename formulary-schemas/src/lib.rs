pub mod command;
pub mod file_formats;
pub mod formula;
pub mod ingredient;
pub mod rule;
