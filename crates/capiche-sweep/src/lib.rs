//! Resumable parameter sweeps for capiche.
//!
//! This crate provides:
//! - [`ResultCache`]: the append-only store consulted before every solve
//! - [`SweepOrchestrator`]: runs one topology over its sweep axes
//! - [`plan_sweeps`]: the full set of sweeps behind a coefficient table
//!
//! # Usage
//!
//! ```ignore
//! use capiche_core::{ResultTable, StackModel};
//! use capiche_solver::FasterCap;
//! use capiche_sweep::{SweepAxes, SweepOrchestrator};
//!
//! let stack = StackModel::load_file("stacks/sky130A.json")?;
//! let solver = FasterCap::default();
//! let orchestrator = SweepOrchestrator::new(&stack, &solver).with_tolerance(0.008);
//!
//! let mut table = ResultTable::open("out/m1_m1.txt", template.table_kind())?;
//! let axes = SweepAxes::widths(vec![0.14]).with_seps(vec![0.14, 0.39, 0.64]);
//! let report = orchestrator.run_sweep(&template, &axes, &mut table)?;
//! println!("{} solved, {} cached", report.solved, report.cached);
//! ```

pub mod cache;
pub mod error;
pub mod orchestrator;
pub mod plan;

pub use cache::{MemoryCache, ResultCache};
pub use error::{Error, Result};
pub use orchestrator::{SkippedPoint, SweepAxes, SweepOrchestrator, SweepReport, row_values};
pub use plan::{
    JobKind, PlanConfig, SweepJob, analysis_dir, area_capacitances, areacap_path, plan_sweeps, run_jobs,
    table_path, write_areacap_results,
};
