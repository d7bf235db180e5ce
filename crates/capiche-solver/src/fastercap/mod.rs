//! FasterCap integration module.
//!
//! This module renders geometries as FasterCap list files and runs them
//! through the solver executable.

pub mod listfile;
pub mod runner;

pub use listfile::write_list_file;
pub use runner::{FasterCapConfig, RunOutput, is_fastercap_available, run_fastercap};
