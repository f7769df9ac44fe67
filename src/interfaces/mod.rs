//! Driving adapters: the JSON-lines command script and the CSV ledger output.

pub mod csv;
pub mod script;
