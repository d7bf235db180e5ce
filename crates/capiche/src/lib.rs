//! # Capiche
//!
//! Parasitic capacitance coefficients from a metal stack description.
//!
//! Capiche provides the whole extraction flow:
//! - Stack description loading and validation
//! - Cross-section compilation of test structures into boundary panels
//! - FasterCap invocation and capacitance matrix parsing
//! - Resumable parameter sweeps cached in plain-text tables
//! - Model fitting into an areacap/fringecap/sidewall/fringeshield/fringepartial table
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use capiche::prelude::*;
//!
//! let stack = StackModel::load_file("stacks/sky130A.json")?;
//! let solver = FasterCap::default();
//!
//! // Sweep everything the coefficient table needs into out/analysis/
//! let jobs = plan_sweeps(&stack, "out".as_ref(), &PlanConfig::default());
//! let mut orchestrator = SweepOrchestrator::new(&stack, &solver);
//! run_jobs(&mut orchestrator, &jobs)?;
//!
//! // Fit and save
//! let table = CoefficientFitter::new(&stack).fit_all("out".as_ref());
//! table.write("out/coefficients.txt")?;
//! println!("{}", table.summary());
//! ```

// Re-export component crates
pub use capiche_core as core;
pub use capiche_fit as fit;
pub use capiche_geometry as geometry;
pub use capiche_solver as solver;
pub use capiche_sweep as sweep;

// ============================================================================
// Convenient re-exports from capiche_core
// ============================================================================

pub use capiche_core::{
    CrossSection,
    // Errors
    Error as StackError,
    Layer,
    Limits,
    ResultRow,
    // Result tables
    ResultTable,
    RowKey,
    // Stack model
    StackDescription,
    StackModel,
    Stratum,
    TableKind,
    series_capacitance,
};

// ============================================================================
// Convenient re-exports from capiche_geometry
// ============================================================================

pub use capiche_geometry::{
    // Errors
    Error as GeometryError,
    GeometryCompiler,
    GeometryConfig,
    GeometryInstance,
    Panel,
    PanelKind,
    TestTopology,
};

// ============================================================================
// Convenient re-exports from capiche_solver
// ============================================================================

pub use capiche_solver::{
    CapacitanceMatrix,
    // Errors
    Error as SolverError,
    FasterCap,
    FasterCapConfig,
    FieldSolver,
};

// ============================================================================
// Convenient re-exports from capiche_sweep
// ============================================================================

pub use capiche_sweep::{
    // Errors
    Error as SweepError,
    JobKind,
    MemoryCache,
    PlanConfig,
    ResultCache,
    SweepAxes,
    SweepJob,
    SweepOrchestrator,
    SweepReport,
    plan_sweeps,
    run_jobs,
    write_areacap_results,
};

// ============================================================================
// Convenient re-exports from capiche_fit
// ============================================================================

pub use capiche_fit::{
    CoefficientFitter,
    CoefficientKind,
    CoefficientRecord,
    CoefficientTable,
    // Errors
    Error as FitError,
    FitConfig,
};

/// Prelude module for convenient imports.
///
/// ```rust
/// use capiche::prelude::*;
/// ```
pub mod prelude {
    // Stack
    pub use crate::{Layer, StackModel, TableKind};

    // Geometry
    pub use crate::{GeometryCompiler, GeometryInstance, TestTopology};

    // Solver
    pub use crate::{CapacitanceMatrix, FasterCap, FasterCapConfig, FieldSolver};

    // Sweeps
    pub use crate::{PlanConfig, ResultTable, SweepAxes, SweepOrchestrator, plan_sweeps, run_jobs};

    // Fitting
    pub use crate::{CoefficientFitter, CoefficientKind, CoefficientTable, FitConfig};
}

#[cfg(test)]
mod tests {
    use super::*;

    const SKY130: &str = include_str!("../../../stacks/sky130A.json");

    #[test]
    fn test_load_stack() {
        let stack = StackModel::load(SKY130).unwrap();
        assert_eq!(stack.process(), "sky130A");
        assert_eq!(stack.metals().len(), 7);
    }

    #[test]
    fn test_prelude_imports() {
        use crate::prelude::*;

        let stack = StackModel::load(SKY130).unwrap();
        let topology = TestTopology::SingleWire {
            metal: "m1".into(),
            reference: "subs".into(),
            width: 0.14,
        };
        assert_eq!(topology.table_kind(), TableKind::SingleWire);
        let geometry = GeometryCompiler::new(&stack).compile(&topology).unwrap();
        assert_eq!(geometry.conductors().len(), 2);
    }
}
