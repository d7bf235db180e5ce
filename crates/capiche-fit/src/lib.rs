//! Capacitance model fitting for capiche.
//!
//! This crate turns sweep result tables into the coefficients of five
//! analytic capacitance models:
//! - areacap: parallel-plate capacitance, computed from the stack
//! - fringecap: single-edge fringe, derived algebraically
//! - sidewall, fringeshield, fringepartial: fitted by Levenberg-Marquardt
//!
//! It reads the table format from `capiche-core` and knows nothing about
//! how the tables were produced.

pub mod coefficients;
pub mod error;
pub mod fitter;
pub mod levenberg;
pub mod linear;
pub mod model;

pub use coefficients::{CoefficientRecord, CoefficientTable, Omission};
pub use error::{Error, Result};
pub use fitter::{CoefficientFitter, FitConfig};
pub use levenberg::{FitCriteria, LmResult, ModelFunction, solve_levenberg_marquardt};
pub use linear::solve_dense;
pub use model::{CoefficientKind, CurveModel};
