//! Error types for capiche-sweep.

use thiserror::Error;

use capiche_core::TableKind;

/// Result type for sweep operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort a sweep.
///
/// Per-point failures (an incompatible combination, a solver error) do not
/// appear here; they are collected in the sweep report instead.
#[derive(Debug, Error)]
pub enum Error {
    /// The stack or a result table is unusable.
    #[error(transparent)]
    Stack(#[from] capiche_core::Error),

    /// Geometry compilation failed for a structural reason.
    #[error(transparent)]
    Geometry(#[from] capiche_geometry::Error),

    /// The solver cannot be used at all.
    #[error(transparent)]
    Solver(#[from] capiche_solver::Error),

    /// The cache holds rows for a different topology.
    #[error("cache holds {found:?} rows, sweep produces {expected:?} rows")]
    TableMismatch { expected: TableKind, found: TableKind },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
