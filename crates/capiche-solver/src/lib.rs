//! Field-solver driver for capiche.
//!
//! This crate turns a compiled [`capiche_geometry::GeometryInstance`] into a
//! capacitance matrix:
//! - Writing the geometry as a FasterCap list file
//! - Running FasterCap with a timeout, relaxing the tolerance on timeouts
//! - Parsing the last capacitance matrix out of the solver output
//!
//! The [`FieldSolver`] trait is the seam used by the sweep layer.

pub mod driver;
pub mod error;
pub mod fastercap;
pub mod matrix;

pub use driver::{FasterCap, FieldSolver, check_matrix};
pub use error::{Error, Result};
pub use fastercap::{FasterCapConfig, is_fastercap_available, run_fastercap, write_list_file};
pub use matrix::CapacitanceMatrix;
