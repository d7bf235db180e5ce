//! Error types for capiche-solver.

use thiserror::Error;

/// Result type for solver operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while running the field solver.
#[derive(Debug, Error)]
pub enum Error {
    /// The solver executable could not be started.
    #[error("field solver not found: {0}")]
    SolverNotFound(String),

    /// The solver ran but failed.
    #[error("field solver invocation failed: {0}")]
    SolverInvocation(String),

    /// The solver did not finish, even at the most relaxed tolerance tried.
    #[error("field solver timed out after {secs} seconds at tolerance {tolerance:.3}")]
    SolverTimeout { secs: u64, tolerance: f64 },

    /// The solver output holds no well-formed capacitance matrix.
    #[error("failed to parse capacitance matrix: {0}")]
    MatrixParse(String),

    /// Temp file error.
    #[error("temp file error: {0}")]
    TempFile(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
