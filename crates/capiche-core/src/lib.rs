//! Process stack model for capiche.
//!
//! This crate holds the pieces every other stage agrees on: the validated
//! layer graph of a metal/dielectric stackup, the cross-section ordering
//! derived from it, parallel-plate area capacitance, unit conventions and
//! the on-disk result table format.

pub mod error;
pub mod layer;
pub mod section;
pub mod stack;
pub mod table;
pub mod units;

pub use error::{Error, Result};
pub use layer::{Layer, Limits};
pub use section::{CrossSection, Stratum, WireLevel, Wrap};
pub use stack::{series_capacitance, StackDescription, StackModel, AIR};
pub use table::{analysis_table_path, ResultRow, ResultTable, RowKey, TableKind, ANALYSIS_DIR};
